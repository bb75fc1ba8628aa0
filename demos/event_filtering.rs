use std::sync::Arc;

use tokio::time::{Duration, sleep};
use topicbus::{Context, Event, EventBus, Handler, Result, async_trait};

#[derive(Event, Debug)]
#[event(topic = "notifications")]
struct Notification {
    category: &'static str,
    priority: u8,
    text: &'static str,
}

/// Handles only one category; everything else is acknowledged and skipped.
struct CategoryFilter {
    category: &'static str,
}

#[async_trait]
impl Handler<Notification> for CategoryFilter {
    async fn handle(&self, _ctx: &Context, event: &Arc<Notification>) -> Result<()> {
        if event.category == self.category {
            println!("[category] handling '{}': {}", event.category, event.text);
        } else {
            println!("[category] skipping '{}'", event.category);
        }
        Ok(())
    }
}

/// Handles only notifications at or above a priority.
struct PriorityFilter {
    min_priority: u8,
}

#[async_trait]
impl Handler<Notification> for PriorityFilter {
    async fn handle(&self, _ctx: &Context, event: &Arc<Notification>) -> Result<()> {
        if event.priority >= self.min_priority {
            println!("[priority] handling priority {}: {}", event.priority, event.text);
        } else {
            println!("[priority] skipping priority {}", event.priority);
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let bus = EventBus::<Notification>::default();
    bus.subscribe("notifications", Arc::new(CategoryFilter { category: "system" }))
        .await?;
    bus.subscribe("notifications", Arc::new(PriorityFilter { min_priority: 5 }))
        .await?;

    let notifications = [
        ("system", 3, "low priority system notice"),
        ("user", 7, "high priority user notice"),
        ("system", 8, "high priority system notice"),
        ("user", 2, "low priority user notice"),
    ];

    for (category, priority, text) in notifications {
        println!("publishing: category={category}, priority={priority}");
        bus.publish(
            Context::background(),
            Notification {
                category,
                priority,
                text,
            },
        )
        .await?;
        sleep(Duration::from_millis(50)).await;
    }

    sleep(Duration::from_millis(100)).await;
    bus.close().await
}
