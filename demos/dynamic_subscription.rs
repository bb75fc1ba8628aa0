use std::sync::Arc;

use tokio::time::{Duration, sleep};
use topicbus::{Context, Event, EventBus, Handler, Result, async_trait};

#[derive(Event, Debug)]
#[event(topic = "dynamic")]
struct Message {
    id: u32,
    text: &'static str,
}

struct Named(&'static str);

#[async_trait]
impl Handler<Message> for Named {
    async fn handle(&self, _ctx: &Context, event: &Arc<Message>) -> Result<()> {
        println!("[{}] message {}: {}", self.0, event.id, event.text);
        Ok(())
    }
}

async fn step(bus: &EventBus<Message>, id: u32, text: &'static str) -> Result<()> {
    bus.publish(Context::background(), Message { id, text }).await?;
    sleep(Duration::from_millis(100)).await;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let bus = EventBus::<Message>::default();

    // Keep the Arcs: unsubscribe matches the exact handler instance.
    let first: Arc<dyn Handler<Message>> = Arc::new(Named("first"));
    let second: Arc<dyn Handler<Message>> = Arc::new(Named("second"));
    let third: Arc<dyn Handler<Message>> = Arc::new(Named("third"));

    println!("phase 1: only the first handler");
    bus.subscribe("dynamic", first.clone()).await?;
    step(&bus, 1, "hello").await?;

    println!("phase 2: second handler joins");
    bus.subscribe("dynamic", second.clone()).await?;
    step(&bus, 2, "still here").await?;

    println!("phase 3: third joins, first leaves");
    bus.subscribe("dynamic", third.clone()).await?;
    bus.unsubscribe("dynamic", &first).await;
    step(&bus, 3, "changing guard").await?;

    println!("phase 4: everybody leaves");
    bus.unsubscribe("dynamic", &second).await;
    bus.unsubscribe("dynamic", &third).await;
    println!("topics left: {:?}", bus.topics().await);
    step(&bus, 4, "nobody hears this").await?;

    bus.close().await
}
