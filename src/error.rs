use std::{fmt::Display, sync::Arc};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("The event bus is closed")]
    Closed,

    #[error("The event bus has already been closed")]
    AlreadyClosed,

    #[error("Handler panicked: {0}")]
    HandlerPanicked(String),

    #[error("Context was cancelled")]
    Cancelled,

    #[error("Context deadline exceeded")]
    DeadlineExceeded,

    #[error("Error external to topicbus occurred: {0}")]
    External(Arc<str>),
}

impl Error {
    /// Wrap any displayable error coming from handler code.
    pub fn external(err: impl Display) -> Self {
        Error::External(err.to_string().into())
    }
}
