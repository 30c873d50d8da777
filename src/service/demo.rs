use crate::domain::OrderError;
use crate::service::{boot, SystemConfig};
use rand::Rng;
use rust_decimal::Decimal;

/// Drive a randomized create/pay/ship scenario against a freshly booted
/// system and print the final statuses once the close delay has passed.
///
/// Roughly a third of the orders are paid and shipped, a third only paid,
/// and the rest left untouched so the delayed Close event expires them.
pub async fn run_demo(config: SystemConfig, orders: usize) -> Result<(), OrderError> {
    let close_delay = config.close_delay;
    let system = boot(config).await;

    let mut rng = rand::rng();
    for _ in 0..orders {
        let cents: i64 = rng.random_range(100..100_000);
        let amount = Decimal::new(cents, 2);

        let order_id = system.coordinator.create_order(amount).await?;

        match rng.random_range(0..3) {
            0 => {
                system.coordinator.pay(&order_id).await?;
                system.coordinator.ship(&order_id).await?;
            }
            1 => {
                system.coordinator.pay(&order_id).await?;
            }
            _ => {} // left to expire
        }
    }

    // Let the delayed close events become visible and drain
    tokio::time::sleep(close_delay + close_delay / 2).await;

    println!("{:<16} {:>10} {:>8}", "order", "amount", "status");
    for order in system.store.list_orders().await {
        println!(
            "{:<16} {:>10} {:>8}",
            order.order_id, order.amount, order.status
        );
    }

    let dead = system.transport.dead_letters();
    if !dead.is_empty() {
        tracing::error!("{} deliveries were dead-lettered", dead.len());
    }

    system.shutdown();
    Ok(())
}
