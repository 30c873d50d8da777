mod context;

use context::TestContext;
use orderflow::domain::{EventKind, OrderStatus};
use rust_decimal_macros::dec;
use std::time::Duration;

#[tokio::test]
async fn unpaid_order_is_closed_after_the_delay_and_not_before() {
    let ctx = TestContext::new().await;
    let order_id = ctx.create(dec!(20.00)).await;

    // Well inside the delay nothing has happened yet
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(ctx.status(&order_id).await, Some(OrderStatus::Created));
    assert_eq!(ctx.recorder.count_for(EventKind::Close, &order_id), 0);

    assert!(ctx.wait_for_status(&order_id, OrderStatus::Closed).await);
    assert_eq!(ctx.recorder.count_for(EventKind::Close, &order_id), 1);
}

#[tokio::test]
async fn paid_order_survives_the_expiration_timer() {
    let ctx = TestContext::new().await;
    let order_id = ctx.create(dec!(15.00)).await;

    ctx.coordinator.pay(&order_id).await.unwrap();
    assert!(ctx.wait_for_status(&order_id, OrderStatus::Paid).await);

    // Let the close event fire and be dispatched as a no-op
    assert!(
        ctx.wait_until(|| ctx.recorder.count_for(EventKind::Close, &order_id) == 1)
            .await
    );
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(ctx.status(&order_id).await, Some(OrderStatus::Paid));
    assert!(ctx.transport.dead_letters().is_empty());
}

#[tokio::test]
async fn shipped_order_survives_the_expiration_timer() {
    let ctx = TestContext::new().await;
    let order_id = ctx.create(dec!(9.00)).await;

    ctx.coordinator.pay(&order_id).await.unwrap();
    assert!(ctx.wait_for_status(&order_id, OrderStatus::Paid).await);
    ctx.coordinator.ship(&order_id).await.unwrap();
    assert!(ctx.wait_for_status(&order_id, OrderStatus::Shipped).await);

    assert!(
        ctx.wait_until(|| ctx.recorder.count_for(EventKind::Close, &order_id) == 1)
            .await
    );
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(ctx.status(&order_id).await, Some(OrderStatus::Shipped));
}

#[tokio::test]
async fn late_payment_cannot_reopen_a_closed_order() {
    let ctx = TestContext::new().await;
    let order_id = ctx.create(dec!(11.00)).await;

    assert!(ctx.wait_for_status(&order_id, OrderStatus::Closed).await);

    ctx.coordinator.pay(&order_id).await.unwrap();
    assert!(
        ctx.wait_until(|| ctx.recorder.count_for(EventKind::Paid, &order_id) == 1)
            .await
    );
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(ctx.status(&order_id).await, Some(OrderStatus::Closed));
    assert!(ctx.transport.dead_letters().is_empty());
}
