use std::borrow::Cow;

/// Trait for events published on the bus.
///
/// An event only has to say which topic it belongs to. Events must be
/// `Send + Sync + 'static` because they:
/// - Are wrapped in `Arc<E>` and shared by every handler of the topic (Sync)
/// - Cross task boundaries into per-topic workers (Send, 'static)
///
/// Events are never cloned by the bus. One `Arc<E>` is fanned out to all
/// handlers subscribed to the event's topic.
///
/// # Event Names
///
/// The `name()` method returns a human-readable name for the event used in
/// log lines. The default implementation returns the full type name via
/// `std::any::type_name`. When using `#[derive(Event)]` on an enum, `name()`
/// returns the variant name (e.g., "OrderPlaced").
pub trait Event: Send + Sync + 'static {
    /// Topic key this event is published under.
    fn topic(&self) -> &str;

    /// Returns a human-readable name for this event.
    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed(std::any::type_name::<Self>())
    }
}
