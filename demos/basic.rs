use std::sync::Arc;

use tokio::time::{Duration, sleep};
use topicbus::{Context, Event, EventBus, Handler, Result, async_trait};

// Define your event
#[derive(Event, Debug)]
#[event(topic = "user.created")]
struct UserCreated {
    name: String,
}

// Create a handler
struct Welcome;

#[async_trait]
impl Handler<UserCreated> for Welcome {
    async fn handle(&self, _ctx: &Context, event: &Arc<UserCreated>) -> Result<()> {
        println!("Welcome aboard, {}!", event.name);
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let bus = EventBus::<UserCreated>::default();
    bus.subscribe("user.created", Arc::new(Welcome)).await?;

    bus.publish(
        Context::background(),
        UserCreated {
            name: "Ada".into(),
        },
    )
    .await?;

    // Publishing doesn't wait for handlers; give the worker a moment.
    sleep(Duration::from_millis(100)).await;
    bus.close().await
}
