use std::sync::Arc;

use tokio::sync::RwLock;
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use uuid::Uuid;

use crate::{
    Config, Context, Error, Event, Handler, Logger, Result,
    internal::{Registry, Removal, Snapshot, Task, TopicWorker},
};

/// Topic-keyed event dispatcher and the owner of all topic workers.
///
/// - `subscribe(topic, handler)` registers a handler; the first handler of a
///   topic starts that topic's queue and worker.
/// - `unsubscribe(topic, &handler)` removes one registration; removing the
///   last one lets the worker drain its queue and exit.
/// - `publish(ctx, event)` enqueues one task per handler of the event's topic
///   and returns without waiting for any handler.
/// - `close()` stops every worker and waits for them to exit.
///
/// Each topic is processed by its own task, strictly in publish order, one
/// delivery at a time. Different topics run concurrently. Failed deliveries are
/// retried up to [`Config::max_retries`] attempts and then dropped; failures are
/// only visible through the configured [`Logger`].
///
/// The bus is `Send + Sync`; share it with `Arc<EventBus<E>>`. Dropping the bus
/// without calling [`close`](EventBus::close) cancels the workers without
/// waiting for them.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use topicbus::{Context, Event, EventBus, handler_fn};
///
/// struct Greeting(String);
/// impl Event for Greeting {
///     fn topic(&self) -> &str { "greetings" }
/// }
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> topicbus::Result {
/// let bus = EventBus::<Greeting>::default();
/// bus.subscribe("greetings", handler_fn(|_ctx, event: Arc<Greeting>| async move {
///     println!("Hello, {}!", event.0);
///     Ok(())
/// }))
/// .await?;
///
/// bus.publish(Context::background(), Greeting("World".into())).await?;
/// bus.close().await?;
/// # Ok(())
/// # }
/// ```
///
/// See also: [`Handler`], [`Context`], [`Config`].
pub struct EventBus<E: Event> {
    config: Config,
    registry: RwLock<Registry<E>>,
    shutdown: CancellationToken,
    workers: TaskTracker,
}

impl<E: Event> EventBus<E> {
    /// Create a new bus with the given configuration.
    pub fn new(config: Config) -> Self {
        Self {
            config,
            registry: RwLock::new(Registry::new()),
            shutdown: CancellationToken::new(),
            workers: TaskTracker::new(),
        }
    }

    /// Register `handler` for `topic`.
    ///
    /// The same `Arc` may be registered more than once and is then invoked once
    /// per registration. Must be called from within a Tokio runtime, since the
    /// first subscription of a topic spawns its worker.
    ///
    /// # Errors
    ///
    /// [`Error::Closed`] if the bus has been closed.
    pub async fn subscribe(&self, topic: &str, handler: Arc<dyn Handler<E>>) -> Result<()> {
        let mut registry = self.registry.write().await;
        let created = registry.subscribe(topic, handler, self.config.channel_size())?;

        if let Some((topic, receiver)) = created {
            let worker =
                TopicWorker::new(topic.clone(), receiver, self.shutdown.clone(), &self.config);
            self.workers.spawn(worker.run());
            self.logger().info(format_args!("topic {topic} created"));
        }
        Ok(())
    }

    /// Remove one registration of exactly this `handler` (compared by `Arc`
    /// identity) from `topic`.
    ///
    /// Removing the last handler removes the topic: tasks already queued are
    /// still delivered, new publishes to the topic become no-ops.
    /// Returns `false` if nothing matched.
    pub async fn unsubscribe(&self, topic: &str, handler: &Arc<dyn Handler<E>>) -> bool {
        let removal = self.registry.write().await.unsubscribe(topic, handler);
        if removal == Removal::TopicRemoved {
            self.logger().info(format_args!("topic {topic} removed"));
        }
        removal != Removal::NotFound
    }

    /// Enqueue `event` once for every handler currently subscribed to its topic.
    ///
    /// Returns as soon as all tasks are queued; handler outcomes are never
    /// reported here. If the topic has no subscribers the event is discarded.
    /// When a topic's queue is full this waits for room, which is the only
    /// backpressure the bus applies.
    ///
    /// `ctx` is handed to each handler's first attempt only.
    ///
    /// A handler publishing to its own topic can deadlock on a full queue,
    /// since the worker waiting for room is the one that would make it.
    ///
    /// # Errors
    ///
    /// [`Error::Closed`] if the bus was closed before or while enqueueing.
    pub async fn publish(&self, ctx: Context, event: E) -> Result<()> {
        let snapshot = self.registry.read().await.snapshot(event.topic())?;
        let Some(Snapshot { handlers, sender }) = snapshot else {
            return Ok(());
        };

        let id = Uuid::new_v4().as_u128();
        let event = Arc::new(event);
        for handler in handlers {
            let task = Task::new(id, ctx.clone(), event.clone(), handler);
            sender.send(task).await.map_err(|_| Error::Closed)?;
        }
        Ok(())
    }

    /// Stop all topic workers and wait until every one of them has exited.
    ///
    /// # Shutdown Process
    ///
    /// 1. Under the write lock: drop every topic queue and clear the registry
    /// 2. Cancel the shutdown token; workers let the attempt in flight return,
    ///    skip its remaining retries and abandon whatever is still queued
    /// 3. Release the lock and wait for all workers
    ///
    /// A handler that never returns keeps this waiting.
    ///
    /// # Errors
    ///
    /// [`Error::AlreadyClosed`] if called more than once.
    pub async fn close(&self) -> Result<()> {
        {
            let mut registry = self.registry.write().await;
            if !registry.close() {
                return Err(Error::AlreadyClosed);
            }
            self.shutdown.cancel();
            self.workers.close();
        }

        self.workers.wait().await;
        self.logger().info(format_args!("event bus closed"));
        Ok(())
    }

    /// Whether [`close`](EventBus::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Topics that currently have at least one handler, sorted.
    pub async fn topics(&self) -> Vec<String> {
        self.registry.read().await.topics()
    }

    /// Number of registrations on `topic` (duplicates counted).
    pub async fn handler_count(&self, topic: &str) -> usize {
        self.registry.read().await.handler_count(topic)
    }

    /// Tasks waiting in the queue of `topic`, or `None` if the topic is absent.
    pub async fn queue_len(&self, topic: &str) -> Option<usize> {
        self.registry.read().await.queue_len(topic)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn logger(&self) -> &dyn Logger {
        self.config.logger().as_ref()
    }
}

impl<E: Event> Default for EventBus<E> {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl<E: Event> Drop for EventBus<E> {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

#[cfg(test)]
mod tests {
    use std::pin::Pin;

    use tokio::{sync::Semaphore, time::Duration};

    use super::*;
    use crate::testing::{RecordingLogger, ScriptedHandler};

    const WAIT: Duration = Duration::from_secs(2);

    #[derive(Debug, PartialEq)]
    struct TestEvent {
        topic: &'static str,
        seq: u32,
    }

    impl TestEvent {
        fn on(topic: &'static str, seq: u32) -> Self {
            Self { topic, seq }
        }
    }

    impl Event for TestEvent {
        fn topic(&self) -> &str {
            self.topic
        }
    }

    fn bus(max_retries: usize, channel_size: usize) -> (EventBus<TestEvent>, Arc<RecordingLogger>) {
        let logger = Arc::new(RecordingLogger::default());
        let config = Config::default()
            .with_max_retries(max_retries)
            .with_channel_size(channel_size)
            .with_logger(logger.clone());
        (EventBus::new(config), logger)
    }

    fn as_dyn(h: &Arc<ScriptedHandler<TestEvent>>) -> Arc<dyn Handler<TestEvent>> {
        h.clone()
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_noop() {
        let (bus, _) = bus(3, 10);
        let other = Arc::new(ScriptedHandler::succeeding());
        bus.subscribe("other", as_dyn(&other)).await.unwrap();

        bus.publish(Context::background(), TestEvent::on("t", 1))
            .await
            .unwrap();

        assert!(bus.topics().await == vec!["other".to_string()]);
        assert_eq!(bus.queue_len("t").await, None);
        bus.close().await.unwrap();
        assert_eq!(other.calls(), 0);
    }

    #[tokio::test]
    async fn test_success_on_first_call_is_delivered_once() {
        let (bus, logger) = bus(3, 10);
        let h = Arc::new(ScriptedHandler::succeeding());
        bus.subscribe("t", as_dyn(&h)).await.unwrap();

        bus.publish(Context::background(), TestEvent::on("t", 1))
            .await
            .unwrap();
        assert!(h.wait_for_calls(1, WAIT).await);
        bus.close().await.unwrap();

        assert_eq!(h.calls(), 1);
        assert!(logger.errors().is_empty());
    }

    #[tokio::test]
    async fn test_always_failing_handler_gets_exactly_max_retries() {
        let (bus, logger) = bus(3, 10);
        let h = Arc::new(ScriptedHandler::failing());
        bus.subscribe("t", as_dyn(&h)).await.unwrap();

        bus.publish(Context::background(), TestEvent::on("t", 1))
            .await
            .unwrap();
        assert!(h.wait_for_calls(3, WAIT).await);
        // Unsubscribe to drain, then close; no fourth attempt can appear.
        bus.unsubscribe("t", &as_dyn(&h)).await;
        bus.close().await.unwrap();

        assert_eq!(h.calls(), 3);
        assert_eq!(logger.errors_containing("attempt 3/3"), 1);
        assert_eq!(logger.errors_containing("dropped after 3 failed attempts"), 1);
    }

    #[tokio::test]
    async fn test_recovering_handler_is_retried_k_plus_one_times() {
        let (bus, logger) = bus(3, 10);
        let h = Arc::new(ScriptedHandler::failing_times(2));
        bus.subscribe("t", as_dyn(&h)).await.unwrap();

        bus.publish(Context::background(), TestEvent::on("t", 1))
            .await
            .unwrap();
        assert!(h.wait_for_calls(3, WAIT).await);
        bus.close().await.unwrap();

        assert_eq!(h.calls(), 3);
        assert_eq!(logger.errors_containing("handle failed"), 2);
        assert_eq!(logger.errors_containing("dropped after"), 0);
    }

    #[tokio::test]
    async fn test_every_subscriber_receives_the_same_event() {
        let (bus, _) = bus(3, 10);
        let h1 = Arc::new(ScriptedHandler::succeeding());
        let h2 = Arc::new(ScriptedHandler::succeeding());
        bus.subscribe("t", as_dyn(&h1)).await.unwrap();
        bus.subscribe("t", as_dyn(&h2)).await.unwrap();

        bus.publish(Context::background(), TestEvent::on("t", 7))
            .await
            .unwrap();
        assert!(h1.wait_for_calls(1, WAIT).await);
        assert!(h2.wait_for_calls(1, WAIT).await);
        bus.close().await.unwrap();

        let (e1, e2) = (h1.events(), h2.events());
        assert_eq!(e1.len(), 1);
        assert_eq!(e2.len(), 1);
        assert!(Arc::ptr_eq(&e1[0], &e2[0]));
        assert_eq!(e1[0].seq, 7);
    }

    #[tokio::test]
    async fn test_duplicate_subscription_delivers_twice() {
        let (bus, _) = bus(3, 10);
        let h = Arc::new(ScriptedHandler::succeeding());
        bus.subscribe("t", as_dyn(&h)).await.unwrap();
        bus.subscribe("t", as_dyn(&h)).await.unwrap();
        assert_eq!(bus.handler_count("t").await, 2);

        bus.publish(Context::background(), TestEvent::on("t", 1))
            .await
            .unwrap();
        assert!(h.wait_for_calls(2, WAIT).await);
        bus.close().await.unwrap();
        assert_eq!(h.calls(), 2);
    }

    #[tokio::test]
    async fn test_unsubscribe_between_publishes() {
        let (bus, _) = bus(3, 10);
        let h = Arc::new(ScriptedHandler::succeeding());
        bus.subscribe("t", as_dyn(&h)).await.unwrap();

        bus.publish(Context::background(), TestEvent::on("t", 1))
            .await
            .unwrap();
        assert!(bus.unsubscribe("t", &as_dyn(&h)).await);
        assert!(bus.topics().await.is_empty());
        bus.publish(Context::background(), TestEvent::on("t", 2))
            .await
            .unwrap();

        // A was queued before the topic went away and is still drained.
        assert!(h.wait_for_calls(1, WAIT).await);
        bus.close().await.unwrap();
        let seqs: Vec<u32> = h.events().iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![1]);
    }

    #[tokio::test]
    async fn test_unsubscribe_unknown_handler_is_noop() {
        let (bus, _) = bus(3, 10);
        let registered = Arc::new(ScriptedHandler::succeeding());
        let stranger = Arc::new(ScriptedHandler::succeeding());
        bus.subscribe("t", as_dyn(&registered)).await.unwrap();

        assert!(!bus.unsubscribe("t", &as_dyn(&stranger)).await);
        assert!(!bus.unsubscribe("nope", &as_dyn(&registered)).await);
        assert_eq!(bus.handler_count("t").await, 1);
        bus.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_topic_can_be_recreated_after_removal() {
        let (bus, _) = bus(3, 10);
        let h = Arc::new(ScriptedHandler::succeeding());
        bus.subscribe("t", as_dyn(&h)).await.unwrap();
        bus.unsubscribe("t", &as_dyn(&h)).await;
        bus.subscribe("t", as_dyn(&h)).await.unwrap();

        bus.publish(Context::background(), TestEvent::on("t", 1))
            .await
            .unwrap();
        assert!(h.wait_for_calls(1, WAIT).await);
        bus.close().await.unwrap();
        assert_eq!(h.calls(), 1);
    }

    #[tokio::test]
    async fn test_order_within_topic_follows_publish_order() {
        let (bus, _) = bus(3, 100);
        let h = Arc::new(ScriptedHandler::succeeding());
        bus.subscribe("t", as_dyn(&h)).await.unwrap();

        for seq in 0..50 {
            bus.publish(Context::background(), TestEvent::on("t", seq))
                .await
                .unwrap();
        }
        assert!(h.wait_for_calls(50, WAIT).await);
        bus.close().await.unwrap();

        let seqs: Vec<u32> = h.events().iter().map(|e| e.seq).collect();
        assert_eq!(seqs, (0..50).collect::<Vec<_>>());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_blocked_topic_does_not_stall_others() {
        let (bus, _) = bus(3, 10);
        let gate = Arc::new(Semaphore::new(0));
        let slow = Arc::new(ScriptedHandler::succeeding().with_gate(gate.clone()));
        let fast = Arc::new(ScriptedHandler::succeeding());
        bus.subscribe("slow", as_dyn(&slow)).await.unwrap();
        bus.subscribe("fast", as_dyn(&fast)).await.unwrap();

        bus.publish(Context::background(), TestEvent::on("slow", 1))
            .await
            .unwrap();
        bus.publish(Context::background(), TestEvent::on("fast", 1))
            .await
            .unwrap();

        assert!(fast.wait_for_calls(1, WAIT).await);
        assert!(slow.wait_for_calls(1, WAIT).await);
        gate.add_permits(1);
        bus.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_publish_waits_for_room_in_full_queue() {
        let (bus, _) = bus(3, 1);
        let bus = Arc::new(bus);
        let gate = Arc::new(Semaphore::new(0));
        let h = Arc::new(ScriptedHandler::succeeding().with_gate(gate.clone()));
        bus.subscribe("t", as_dyn(&h)).await.unwrap();

        // First task is taken by the worker and parks on the gate.
        bus.publish(Context::background(), TestEvent::on("t", 1))
            .await
            .unwrap();
        assert!(h.wait_for_calls(1, WAIT).await);
        // Second task fills the single slot.
        bus.publish(Context::background(), TestEvent::on("t", 2))
            .await
            .unwrap();
        assert_eq!(bus.queue_len("t").await, Some(1));

        let publisher = {
            let bus = bus.clone();
            tokio::spawn(async move { bus.publish(Context::background(), TestEvent::on("t", 3)).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!publisher.is_finished());

        gate.add_permits(3);
        publisher.await.unwrap().unwrap();
        assert!(h.wait_for_calls(3, WAIT).await);
        bus.close().await.unwrap();

        let seqs: Vec<u32> = h.events().iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_first_attempt_sees_publisher_context_only() {
        let (bus, _) = bus(3, 10);
        let h = Arc::new(ScriptedHandler::failing());
        bus.subscribe("t", as_dyn(&h)).await.unwrap();

        let ctx = Context::background();
        ctx.cancel();
        bus.publish(ctx, TestEvent::on("t", 1)).await.unwrap();
        assert!(h.wait_for_calls(3, WAIT).await);
        bus.close().await.unwrap();

        assert_eq!(h.cancelled_flags(), vec![true, false, false]);
    }

    #[tokio::test]
    async fn test_panicking_handler_does_not_kill_worker() {
        let (bus, logger) = bus(2, 10);
        let h = Arc::new(ScriptedHandler::panicking_times(2));
        bus.subscribe("t", as_dyn(&h)).await.unwrap();

        bus.publish(Context::background(), TestEvent::on("t", 1))
            .await
            .unwrap();
        bus.publish(Context::background(), TestEvent::on("t", 2))
            .await
            .unwrap();
        assert!(h.wait_for_calls(3, WAIT).await);
        bus.close().await.unwrap();

        // Event 1 panics twice and is dropped; event 2 succeeds.
        let seqs: Vec<u32> = h.events().iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![1, 1, 2]);
        assert_eq!(logger.errors_containing("handle panic"), 2);
        assert_eq!(logger.errors_containing("dropped after 2 failed attempts"), 1);
    }

    /// Panics inside `handle` itself, before a future exists, for `seq == 0`.
    struct PanicsOnCall(Arc<ScriptedHandler<TestEvent>>);

    impl Handler<TestEvent> for PanicsOnCall {
        fn handle<'life0, 'life1, 'life2, 'async_trait>(
            &'life0 self,
            ctx: &'life1 Context,
            event: &'life2 Arc<TestEvent>,
        ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'async_trait>>
        where
            'life0: 'async_trait,
            'life1: 'async_trait,
            'life2: 'async_trait,
            Self: 'async_trait,
        {
            if event.seq == 0 {
                panic!("no future for you");
            }
            self.0.handle(ctx, event)
        }
    }

    #[tokio::test]
    async fn test_topic_stays_served_after_handler_panics_on_call() {
        let (bus, logger) = bus(2, 10);
        let inner = Arc::new(ScriptedHandler::succeeding());
        bus.subscribe("t", Arc::new(PanicsOnCall(inner.clone())))
            .await
            .unwrap();

        bus.publish(Context::background(), TestEvent::on("t", 0))
            .await
            .unwrap();
        bus.publish(Context::background(), TestEvent::on("t", 1))
            .await
            .unwrap();
        assert!(inner.wait_for_calls(1, WAIT).await);

        assert_eq!(bus.topics().await, vec!["t".to_string()]);
        bus.publish(Context::background(), TestEvent::on("t", 2))
            .await
            .unwrap();
        assert!(inner.wait_for_calls(2, WAIT).await);
        bus.close().await.unwrap();

        let seqs: Vec<u32> = inner.events().iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![1, 2]);
        assert_eq!(logger.errors_containing("handle panic: no future for you"), 2);
    }

    #[tokio::test]
    async fn test_close_waits_and_nothing_runs_after() {
        let (bus, logger) = bus(3, 10);
        let gate = Arc::new(Semaphore::new(0));
        let h = Arc::new(ScriptedHandler::succeeding().with_gate(gate.clone()));
        bus.subscribe("a", as_dyn(&h)).await.unwrap();
        bus.subscribe("b", as_dyn(&h)).await.unwrap();

        for seq in 0..5 {
            bus.publish(Context::background(), TestEvent::on("a", seq))
                .await
                .unwrap();
        }
        assert!(h.wait_for_calls(1, WAIT).await);

        let bus = Arc::new(bus);
        let closing = {
            let bus = bus.clone();
            tokio::spawn(async move { bus.close().await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        // The handler in flight holds close() back.
        assert!(!closing.is_finished());

        gate.add_permits(100);
        closing.await.unwrap().unwrap();
        let calls_at_close = h.calls();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(calls_at_close, 1);
        assert_eq!(h.calls(), 1);
        assert!(bus.is_closed());
        assert!(bus.topics().await.is_empty());
        assert_eq!(logger.infos_containing("worker stopped"), 2);
    }

    #[tokio::test]
    async fn test_misuse_after_close_is_reported() {
        let (bus, _) = bus(3, 10);
        let h = Arc::new(ScriptedHandler::succeeding());
        bus.subscribe("t", as_dyn(&h)).await.unwrap();
        bus.close().await.unwrap();

        assert!(matches!(bus.close().await, Err(Error::AlreadyClosed)));
        assert!(matches!(
            bus.subscribe("t", as_dyn(&h)).await,
            Err(Error::Closed)
        ));
        assert!(matches!(
            bus.publish(Context::background(), TestEvent::on("t", 1)).await,
            Err(Error::Closed)
        ));
        assert!(!bus.unsubscribe("t", &as_dyn(&h)).await);
    }

    #[tokio::test]
    async fn test_publisher_blocked_on_full_queue_is_released_by_close() {
        let (bus, _) = bus(3, 1);
        let bus = Arc::new(bus);
        let gate = Arc::new(Semaphore::new(0));
        let h = Arc::new(ScriptedHandler::succeeding().with_gate(gate.clone()));
        bus.subscribe("t", as_dyn(&h)).await.unwrap();

        bus.publish(Context::background(), TestEvent::on("t", 1))
            .await
            .unwrap();
        assert!(h.wait_for_calls(1, WAIT).await);
        bus.publish(Context::background(), TestEvent::on("t", 2))
            .await
            .unwrap();

        let publisher = {
            let bus = bus.clone();
            tokio::spawn(async move { bus.publish(Context::background(), TestEvent::on("t", 3)).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        let closing = {
            let bus = bus.clone();
            tokio::spawn(async move { bus.close().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        gate.add_permits(100);

        closing.await.unwrap().unwrap();
        assert!(matches!(publisher.await.unwrap(), Err(Error::Closed)));
        assert_eq!(h.calls(), 1);
    }
}
