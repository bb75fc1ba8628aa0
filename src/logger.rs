use std::fmt;

/// Output boundary for everything the bus reports.
///
/// Handler failures never reach the publisher, so the logger is the only place
/// they show up. Implementations must be cheap and non-blocking, and safe to
/// call from several topic workers at once.
///
/// Call sites pass `format_args!`, so nothing is allocated unless the
/// implementation decides to format.
///
/// # Examples
///
/// ```rust
/// use std::fmt;
/// use topicbus::Logger;
///
/// struct Stderr;
///
/// impl Logger for Stderr {
///     fn info(&self, args: fmt::Arguments<'_>) {
///         eprintln!("[INFO] {args}");
///     }
///     fn error(&self, args: fmt::Arguments<'_>) {
///         eprintln!("[ERROR] {args}");
///     }
/// }
/// ```
pub trait Logger: Send + Sync + 'static {
    fn info(&self, args: fmt::Arguments<'_>);
    fn error(&self, args: fmt::Arguments<'_>);
}

/// Default logger: forwards to the `tracing` macros under the `topicbus` target.
///
/// Install a `tracing` subscriber (e.g. `tracing_subscriber::fmt`) to see the output.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn info(&self, args: fmt::Arguments<'_>) {
        tracing::info!(target: "topicbus", "{}", args);
    }

    fn error(&self, args: fmt::Arguments<'_>) {
        tracing::error!(target: "topicbus", "{}", args);
    }
}
