use std::{fmt, sync::Arc};

use crate::{Context, Event, EventId, Handler};

/// One pending delivery of one event to one handler.
///
/// Created by `publish`, consumed once by the topic worker.
pub(crate) struct Task<E: Event> {
    pub id: EventId,
    pub ctx: Context,
    pub event: Arc<E>,
    pub handler: Arc<dyn Handler<E>>,
}

impl<E: Event> Task<E> {
    pub fn new(id: EventId, ctx: Context, event: Arc<E>, handler: Arc<dyn Handler<E>>) -> Self {
        Self {
            id,
            ctx,
            event,
            handler,
        }
    }
}

impl<E: Event> fmt::Debug for Task<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("topic", &self.event.topic())
            .field("event", &self.event.name())
            .finish_non_exhaustive()
    }
}
