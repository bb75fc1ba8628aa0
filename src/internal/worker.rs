use std::{any::Any, panic::AssertUnwindSafe, sync::Arc};

use futures_util::FutureExt;
use tokio::{select, sync::mpsc::Receiver, time::Duration};
use tokio_util::sync::CancellationToken;

use super::Task;
use crate::{Config, Context, Error, Event, Handler, Logger, Result};

/// Sequential consumer of one topic's queue.
///
/// Runs from the first subscription of a topic until either the queue is
/// closed and drained, or the bus-wide shutdown token is cancelled.
pub(crate) struct TopicWorker<E: Event> {
    topic: Arc<str>,
    receiver: Receiver<Task<E>>,
    shutdown: CancellationToken,
    max_retries: usize,
    retry_delay: Duration,
    logger: Arc<dyn Logger>,
}

impl<E: Event> TopicWorker<E> {
    pub fn new(
        topic: Arc<str>,
        receiver: Receiver<Task<E>>,
        shutdown: CancellationToken,
        config: &Config,
    ) -> Self {
        Self {
            topic,
            receiver,
            shutdown,
            max_retries: config.max_retries(),
            retry_delay: config.retry_delay(),
            logger: config.logger().clone(),
        }
    }

    pub async fn run(mut self) {
        loop {
            self.logger.info(format_args!(
                "topic {} queue length: {}",
                self.topic,
                self.receiver.len()
            ));

            select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                task = self.receiver.recv() => match task {
                    Some(task) => self.deliver(task).await,
                    None => break,
                },
            }
        }
        self.logger
            .info(format_args!("topic {} worker stopped", self.topic));
    }

    /// Attempt a task up to `max_retries` times.
    ///
    /// Only the first attempt sees the publisher's context. Once shutdown has
    /// fired, the attempt in flight is the last one.
    async fn deliver(&self, task: Task<E>) {
        let Task {
            id,
            ctx,
            event,
            handler,
        } = task;
        let mut publisher_ctx = Some(ctx);

        for attempt in 1..=self.max_retries {
            let ctx = publisher_ctx.take().unwrap_or_else(Context::background);
            let Err(err) = self.attempt(&ctx, &event, &handler).await else {
                return;
            };

            self.logger.error(format_args!(
                "event topic {} handle failed: {} (event {}, id {:032x}), attempt {}/{}",
                self.topic,
                err,
                event.name(),
                id,
                attempt,
                self.max_retries
            ));

            if attempt < self.max_retries && !self.pause().await {
                self.logger.error(format_args!(
                    "event topic {} abandoned on shutdown after {} failed attempts (event {}, id {:032x})",
                    self.topic,
                    attempt,
                    event.name(),
                    id
                ));
                return;
            }
        }

        self.logger.error(format_args!(
            "event topic {} dropped after {} failed attempts (event {}, id {:032x})",
            self.topic,
            self.max_retries,
            event.name(),
            id
        ));
    }

    /// Sleep `retry_delay` between attempts. Returns `false` if shutdown
    /// fired first.
    async fn pause(&self) -> bool {
        if self.shutdown.is_cancelled() {
            return false;
        }
        if self.retry_delay.is_zero() {
            return true;
        }
        select! {
            biased;
            _ = self.shutdown.cancelled() => false,
            _ = tokio::time::sleep(self.retry_delay) => true,
        }
    }

    async fn attempt(
        &self,
        ctx: &Context,
        event: &Arc<E>,
        handler: &Arc<dyn Handler<E>>,
    ) -> Result<()> {
        // The call itself may panic before any future exists, so it stays inside the guard.
        match AssertUnwindSafe(async { handler.handle(ctx, event).await })
            .catch_unwind()
            .await
        {
            Ok(res) => res,
            Err(payload) => {
                let msg = panic_message(payload.as_ref());
                self.logger.error(format_args!(
                    "event topic {} handle panic: {}",
                    self.topic, msg
                ));
                Err(Error::HandlerPanicked(msg))
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
