use std::{fmt, future::Future, sync::Arc};

use async_trait::async_trait;

use crate::{Context, Event, Result};

/// A subscriber that consumes events of one topic.
///
/// Handlers are registered as `Arc<dyn Handler<E>>` and are identified by that
/// allocation: subscribing the same `Arc` twice registers it twice, and
/// [`EventBus::unsubscribe`] removes one registration of exactly that `Arc`.
/// Two structurally identical handlers in separate `Arc`s are separate
/// subscribers.
///
/// Returning `Err` (or panicking) makes the worker retry the delivery, up to
/// [`Config::max_retries`] attempts in total. The first attempt receives the
/// publisher's [`Context`]; later attempts receive [`Context::background`].
/// Handlers run one at a time per topic, so a handler that never returns stalls
/// its topic.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use topicbus::{Context, Event, Handler, Result, async_trait};
///
/// struct Ping;
/// impl Event for Ping {
///     fn topic(&self) -> &str { "ping" }
/// }
///
/// struct Printer;
///
/// #[async_trait]
/// impl Handler<Ping> for Printer {
///     async fn handle(&self, ctx: &Context, _event: &Arc<Ping>) -> Result<()> {
///         ctx.check()?;
///         println!("pong");
///         Ok(())
///     }
/// }
/// ```
///
/// [`EventBus::unsubscribe`]: crate::EventBus::unsubscribe
/// [`Config::max_retries`]: crate::Config::max_retries
#[async_trait]
pub trait Handler<E: Event>: Send + Sync + 'static {
    /// Handle a single delivery of `event`.
    async fn handle(&self, ctx: &Context, event: &Arc<E>) -> Result<()>;
}

/// Function-backed handler.
///
/// Wraps a closure that *creates* a new future per attempt, receiving owned
/// copies of the context and the shared event.
pub struct HandlerFn<F> {
    f: F,
}

impl<F> HandlerFn<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> fmt::Debug for HandlerFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerFn").finish_non_exhaustive()
    }
}

#[async_trait]
impl<E, F, Fut> Handler<E> for HandlerFn<F>
where
    E: Event,
    F: Fn(Context, Arc<E>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    async fn handle(&self, ctx: &Context, event: &Arc<E>) -> Result<()> {
        (self.f)(ctx.clone(), Arc::clone(event)).await
    }
}

/// Create a shared handler from a closure.
///
/// ```rust
/// use topicbus::{Event, handler_fn};
///
/// struct Tick;
/// impl Event for Tick {
///     fn topic(&self) -> &str { "tick" }
/// }
///
/// let handler = handler_fn(|_ctx, _event: std::sync::Arc<Tick>| async { Ok(()) });
/// ```
pub fn handler_fn<E, F, Fut>(f: F) -> Arc<dyn Handler<E>>
where
    E: Event,
    F: Fn(Context, Arc<E>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(HandlerFn::new(f))
}

/// Whether two handler references point at the same registration target.
///
/// Only the data pointer is compared; vtable pointers for the same type may
/// differ between codegen units.
#[inline]
pub(crate) fn same_handler<E: Event>(a: &Arc<dyn Handler<E>>, b: &Arc<dyn Handler<E>>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}
