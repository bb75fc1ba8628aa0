//! topicbus - in-process event bus
//!
//! Producers publish events under a topic; every handler subscribed to that
//! topic receives each event on a worker owned by the topic. Workers process
//! their topic strictly in order, retry failed handlers a bounded number of
//! times and keep handler panics from spreading.
//!
//! Publishing is fire-and-forget: failures show up only in the configured
//! [`Logger`]. Delivery is at-least-once per handler while the process lives.
//!
//! See the programs in `demos/`, e.g. `cargo run --example basic`.

mod bus;
mod config;
mod context;
mod error;
mod event;
mod handler;
mod logger;

mod internal;

#[cfg(any(test, feature = "test-harness"))]
pub mod testing;

pub use bus::EventBus;
pub use config::Config;
pub use context::Context;
pub use error::Error;
pub use event::Event;
pub use handler::{Handler, HandlerFn, handler_fn};
pub use logger::{Logger, TracingLogger};

pub use async_trait::async_trait;
pub use tokio_util::sync::CancellationToken;

#[cfg(feature = "macros")]
pub use topicbus_macros::Event;

pub type Result<T = ()> = std::result::Result<T, Error>;
pub type EventId = u128;
