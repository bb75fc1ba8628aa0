use std::sync::Arc;

use tokio::time::{Duration, sleep};
use topicbus::{Context, Event, EventBus, Handler, Result, async_trait};

#[derive(Event, Debug)]
#[event(topic = "order.placed")]
struct OrderPlaced {
    id: u64,
    amount_cents: u64,
}

struct Billing;

#[async_trait]
impl Handler<OrderPlaced> for Billing {
    async fn handle(&self, _ctx: &Context, event: &Arc<OrderPlaced>) -> Result<()> {
        println!("[billing] charging {} cents for order {}", event.amount_cents, event.id);
        Ok(())
    }
}

struct Shipping;

#[async_trait]
impl Handler<OrderPlaced> for Shipping {
    async fn handle(&self, _ctx: &Context, event: &Arc<OrderPlaced>) -> Result<()> {
        println!("[shipping] preparing parcel for order {}", event.id);
        Ok(())
    }
}

struct Analytics;

#[async_trait]
impl Handler<OrderPlaced> for Analytics {
    async fn handle(&self, _ctx: &Context, event: &Arc<OrderPlaced>) -> Result<()> {
        println!("[analytics] recorded order {}", event.id);
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let bus = EventBus::<OrderPlaced>::default();

    // Every handler on a topic receives every event, in subscription order.
    bus.subscribe("order.placed", Arc::new(Billing)).await?;
    bus.subscribe("order.placed", Arc::new(Shipping)).await?;
    bus.subscribe("order.placed", Arc::new(Analytics)).await?;

    for id in 1..=3 {
        bus.publish(
            Context::background(),
            OrderPlaced {
                id,
                amount_cents: id * 1250,
            },
        )
        .await?;
    }

    sleep(Duration::from_millis(100)).await;
    bus.close().await
}
