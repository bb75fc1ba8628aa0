use std::{fmt, sync::Arc};

use tokio::time::Duration;

use crate::{Logger, TracingLogger};

/// Construction-time configuration for an [`EventBus`](crate::EventBus).
///
/// Controls retry behavior, per-topic queue capacity and where diagnostics go.
/// Use the builder methods to customize, or use [`Default`] for sensible defaults.
///
/// # Examples
///
/// ```rust
/// use topicbus::Config;
///
/// let config = Config::default()
///     .with_max_retries(5)        // More attempts per delivery
///     .with_channel_size(500);    // Smaller per-topic queues
///
/// assert_eq!(config.max_retries(), 5);
/// assert_eq!(config.channel_size(), 500);
/// ```
#[derive(Clone)]
pub struct Config {
    max_retries: usize,
    channel_size: usize,
    retry_delay: Duration,
    logger: Arc<dyn Logger>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            max_retries: 3,
            channel_size: 1000,
            retry_delay: Duration::ZERO,
            logger: Arc::new(TracingLogger),
        }
    }
}

impl Config {
    /// Set how many times a task is attempted before it is dropped.
    ///
    /// This is the total number of attempts, not the number of retries after
    /// the first one. Zero is ignored and the current value is kept.
    /// Default: 3
    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        if max_retries > 0 {
            self.max_retries = max_retries;
        }
        self
    }

    /// Set the queue capacity of every topic.
    ///
    /// When a topic queue is full, [`publish`](crate::EventBus::publish) waits
    /// (backpressure). Larger queues absorb bursts but use more memory.
    /// Zero is ignored and the current value is kept.
    /// Default: 1000
    pub fn with_channel_size(mut self, size: usize) -> Self {
        if size > 0 {
            self.channel_size = size;
        }
        self
    }

    /// Set a pause between failed attempts of the same task.
    ///
    /// The worker sleeps while the topic queue keeps filling up, so keep this short.
    /// Default: no pause
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Replace the logger that receives failure and lifecycle messages.
    /// Default: [`TracingLogger`]
    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn max_retries(&self) -> usize {
        self.max_retries
    }

    pub fn channel_size(&self) -> usize {
        self.channel_size
    }

    pub fn retry_delay(&self) -> Duration {
        self.retry_delay
    }

    pub fn logger(&self) -> &Arc<dyn Logger> {
        &self.logger
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("max_retries", &self.max_retries)
            .field("channel_size", &self.channel_size)
            .field("retry_delay", &self.retry_delay)
            .finish_non_exhaustive()
    }
}
