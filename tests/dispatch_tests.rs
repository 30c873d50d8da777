mod context;

use context::TestContext;
use orderflow::{
    domain::{EventEnvelope, EventKind, NewOrder, OrderEvent, OrderId, OrderStatus, Paid},
    port::{OrderStore, Transport},
};
use rust_decimal_macros::dec;
use std::time::Duration;

// Keep the expiration path out of these tests
fn far_close() -> Duration {
    Duration::from_secs(30)
}

#[tokio::test]
async fn pay_then_ship_drives_the_order_to_shipped() {
    let ctx = TestContext::with_close_delay(far_close()).await;
    let order_id = ctx.create(dec!(12.00)).await;

    ctx.coordinator.pay(&order_id).await.unwrap();
    assert!(ctx.wait_for_status(&order_id, OrderStatus::Paid).await);

    ctx.coordinator.ship(&order_id).await.unwrap();
    assert!(ctx.wait_for_status(&order_id, OrderStatus::Shipped).await);

    assert!(ctx.transport.dead_letters().is_empty());
}

#[tokio::test]
async fn rapid_pay_and_ship_are_applied_in_publish_order() {
    let ctx = TestContext::with_close_delay(far_close()).await;
    let order_id = ctx.create(dec!(4.50)).await;

    // No waiting in between: both events queue behind the same ordering key
    ctx.coordinator.pay(&order_id).await.unwrap();
    ctx.coordinator.ship(&order_id).await.unwrap();

    assert!(ctx.wait_for_status(&order_id, OrderStatus::Shipped).await);
    assert!(ctx.transport.dead_letters().is_empty());
}

#[tokio::test]
async fn duplicate_paid_delivery_is_consumed_but_applied_once() {
    let ctx = TestContext::with_close_delay(far_close()).await;
    let order_id = ctx.create(dec!(8.00)).await;

    ctx.coordinator.pay(&order_id).await.unwrap();
    assert!(ctx.wait_for_status(&order_id, OrderStatus::Paid).await);

    // A duplicate of the same logical event arrives again
    let event = OrderEvent::Paid(Paid {
        order_id: order_id.clone(),
    });
    let envelope = EventEnvelope::fifo(&event).unwrap();
    ctx.transport.publish(envelope).await.unwrap();

    assert!(
        ctx.wait_until(|| ctx.recorder.count_for(EventKind::Paid, &order_id) == 2)
            .await
    );
    assert_eq!(ctx.status(&order_id).await, Some(OrderStatus::Paid));

    // The duplicate was acknowledged, not bounced into redelivery
    assert!(ctx.transport.dead_letters().is_empty());
}

#[tokio::test]
async fn shipped_before_paid_leaves_the_order_created() {
    let ctx = TestContext::with_close_delay(far_close()).await;
    let order_id = ctx.create(dec!(3.00)).await;

    ctx.coordinator.ship(&order_id).await.unwrap();
    assert!(
        ctx.wait_until(|| ctx.recorder.count_for(EventKind::Shipped, &order_id) == 1)
            .await
    );
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(ctx.status(&order_id).await, Some(OrderStatus::Created));

    // The premature event was dropped, not queued for later
    ctx.coordinator.pay(&order_id).await.unwrap();
    assert!(ctx.wait_for_status(&order_id, OrderStatus::Paid).await);
    assert!(ctx.transport.dead_letters().is_empty());
}

#[tokio::test]
async fn malformed_body_is_dead_lettered_after_bounded_redelivery() {
    let ctx = TestContext::with_close_delay(far_close()).await;
    let order_id = ctx.create(dec!(6.00)).await;

    let event = OrderEvent::Paid(Paid {
        order_id: order_id.clone(),
    });
    let mut envelope = EventEnvelope::fifo(&event).unwrap();
    envelope.body = b"not an event".to_vec();
    ctx.transport.publish(envelope).await.unwrap();

    assert!(
        ctx.wait_until(|| ctx.transport.dead_letters().len() == 1)
            .await
    );
    // All four attempts reached the consumer before giving up
    assert_eq!(ctx.recorder.count_for(EventKind::Paid, &order_id), 4);
    assert_eq!(ctx.status(&order_id).await, Some(OrderStatus::Created));
}

#[tokio::test]
async fn event_arriving_before_the_row_is_healed_by_redelivery() {
    let ctx = TestContext::with_close_delay(far_close()).await;

    // The Paid event shows up before the order row is visible
    let order_id = OrderId::generate();
    let event = OrderEvent::Paid(Paid {
        order_id: order_id.clone(),
    });
    ctx.transport
        .publish(EventEnvelope::fifo(&event).unwrap())
        .await
        .unwrap();

    ctx.store
        .insert_order(NewOrder {
            order_id: order_id.clone(),
            amount: dec!(2.00),
        })
        .await
        .unwrap();

    assert!(ctx.wait_for_status(&order_id, OrderStatus::Paid).await);
    assert!(ctx.transport.dead_letters().is_empty());
}

#[tokio::test]
async fn independent_orders_progress_independently() {
    let ctx = TestContext::with_close_delay(far_close()).await;
    let first = ctx.create(dec!(1.00)).await;
    let second = ctx.create(dec!(2.00)).await;

    ctx.coordinator.pay(&first).await.unwrap();
    ctx.coordinator.pay(&second).await.unwrap();
    ctx.coordinator.ship(&second).await.unwrap();

    assert!(ctx.wait_for_status(&first, OrderStatus::Paid).await);
    assert!(ctx.wait_for_status(&second, OrderStatus::Shipped).await);
}
