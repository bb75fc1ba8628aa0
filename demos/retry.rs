use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use tokio::time::{Duration, sleep};
use topicbus::{Config, Context, Error, Event, EventBus, Handler, Result, async_trait};

#[derive(Event, Debug)]
#[event(topic = "payments")]
struct Payment {
    id: u64,
}

/// Fails a fixed number of times before it succeeds.
struct FlakyGateway {
    attempts: AtomicUsize,
    failures: usize,
}

#[async_trait]
impl Handler<Payment> for FlakyGateway {
    async fn handle(&self, _ctx: &Context, event: &Arc<Payment>) -> Result<()> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        println!("processing payment {} (attempt {attempt})", event.id);
        if attempt <= self.failures {
            return Err(Error::external("gateway timeout"));
        }
        println!("payment {} settled after {attempt} attempts", event.id);
        Ok(())
    }
}

struct Unreachable;

#[async_trait]
impl Handler<Payment> for Unreachable {
    async fn handle(&self, _ctx: &Context, _event: &Arc<Payment>) -> Result<()> {
        panic!("ledger connection lost");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let config = Config::default()
        .with_max_retries(3)
        .with_retry_delay(Duration::from_millis(50));
    let bus = EventBus::<Payment>::new(config);

    // Two failures, then success on the third and last attempt.
    bus.subscribe(
        "payments",
        Arc::new(FlakyGateway {
            attempts: AtomicUsize::new(0),
            failures: 2,
        }),
    )
    .await?;
    // Panics are caught, logged and retried like errors, then the task is dropped.
    bus.subscribe("payments", Arc::new(Unreachable)).await?;

    bus.publish(Context::background(), Payment { id: 1001 }).await?;

    sleep(Duration::from_millis(500)).await;
    bus.close().await
}
