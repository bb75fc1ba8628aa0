//! Test doubles for code built on the bus.
//!
//! Available in this crate's own tests and, for downstream crates, behind the
//! `test-harness` feature.
//!
//! - [`RecordingLogger`] keeps every log line so tests can assert on failures
//!   the bus never returns to the publisher.
//! - [`ScriptedHandler`] follows a script of successes, failures and panics,
//!   recording each call.
//!
//! ```rust,ignore
//! use topicbus::testing::{RecordingLogger, ScriptedHandler};
//!
//! let logger = Arc::new(RecordingLogger::default());
//! let bus = EventBus::new(Config::default().with_logger(logger.clone()));
//! let handler = Arc::new(ScriptedHandler::failing_times(2));
//! bus.subscribe("orders", handler.clone()).await?;
//! bus.publish(Context::background(), OrderPlaced { id: 1 }).await?;
//!
//! assert!(handler.wait_for_calls(3, Duration::from_secs(1)).await);
//! assert_eq!(logger.errors_containing("handle failed"), 2);
//! ```

mod recording_logger;
mod scripted_handler;

pub use recording_logger::{Level, LogRecord, RecordingLogger};
pub use scripted_handler::{Outcome, ScriptedHandler};
