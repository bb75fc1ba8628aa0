use std::{fmt, sync::Arc};

use tokio::time::{Duration, sleep};
use topicbus::{Config, Context, Error, Event, EventBus, Logger, Result, handler_fn};

#[derive(Event, Debug)]
#[event(topic = "config")]
struct Reload {
    section: &'static str,
}

/// Plain stdout logger with a prefix.
struct PrefixLogger(&'static str);

impl Logger for PrefixLogger {
    fn info(&self, args: fmt::Arguments<'_>) {
        println!("[{} INFO] {args}", self.0);
    }

    fn error(&self, args: fmt::Arguments<'_>) {
        println!("[{} ERROR] {args}", self.0);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::default()
        .with_max_retries(5)
        .with_channel_size(500)
        .with_logger(Arc::new(PrefixLogger("custom")));
    println!("{config:?}");

    let bus = EventBus::<Reload>::new(config);
    bus.subscribe(
        "config",
        handler_fn(|_ctx, event: Arc<Reload>| async move {
            if event.section.is_empty() {
                return Err(Error::external("empty section"));
            }
            println!("reloading section {}", event.section);
            Ok(())
        }),
    )
    .await?;

    bus.publish(Context::background(), Reload { section: "database" })
        .await?;
    bus.publish(Context::background(), Reload { section: "" }).await?;

    sleep(Duration::from_millis(200)).await;
    bus.close().await
}
