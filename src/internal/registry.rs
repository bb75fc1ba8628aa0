use std::{collections::HashMap, sync::Arc};

use tokio::sync::mpsc::{self, Receiver, Sender};

use super::Task;
use crate::{Error, Event, Handler, Result, handler::same_handler};

/// Handlers and queue sender of one topic, copied out under the read lock.
pub(crate) struct Snapshot<E: Event> {
    pub handlers: Vec<Arc<dyn Handler<E>>>,
    pub sender: Sender<Task<E>>,
}

/// Outcome of removing a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Removal {
    NotFound,
    Removed,
    /// The last handler left and the topic's queue was released.
    TopicRemoved,
}

/// Topic → handlers and topic → queue tables.
///
/// Both maps are only ever changed together, so their key sets stay equal.
/// The registry does not lock itself; the bus keeps it behind one `RwLock`.
pub(crate) struct Registry<E: Event> {
    handlers: HashMap<Arc<str>, Vec<Arc<dyn Handler<E>>>>,
    queues: HashMap<Arc<str>, Sender<Task<E>>>,
    closed: bool,
}

impl<E: Event> Registry<E> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            queues: HashMap::new(),
            closed: false,
        }
    }

    /// Append `handler` to `topic`.
    ///
    /// When the topic is new, a queue of `channel_size` is allocated and its
    /// receiving end is returned so the caller can start the worker.
    ///
    /// An existing entry is reused as is: its worker must outlive the sender
    /// kept here, i.e. it only exits once the queue is closed or on shutdown,
    /// and shutdown also closes the registry.
    pub fn subscribe(
        &mut self,
        topic: &str,
        handler: Arc<dyn Handler<E>>,
        channel_size: usize,
    ) -> Result<Option<(Arc<str>, Receiver<Task<E>>)>> {
        if self.closed {
            return Err(Error::Closed);
        }

        if let Some(handlers) = self.handlers.get_mut(topic) {
            handlers.push(handler);
            return Ok(None);
        }

        let topic: Arc<str> = Arc::from(topic);
        let (tx, rx) = mpsc::channel(channel_size);
        self.handlers.insert(topic.clone(), vec![handler]);
        self.queues.insert(topic.clone(), tx);
        Ok(Some((topic, rx)))
    }

    /// Remove the first registration of exactly this `handler`.
    ///
    /// Dropping the registry's sender closes the queue once no in-flight
    /// publisher holds a clone; the worker then drains and exits.
    pub fn unsubscribe(&mut self, topic: &str, handler: &Arc<dyn Handler<E>>) -> Removal {
        let Some(handlers) = self.handlers.get_mut(topic) else {
            return Removal::NotFound;
        };
        let Some(pos) = handlers.iter().position(|h| same_handler(h, handler)) else {
            return Removal::NotFound;
        };
        handlers.remove(pos);

        if !handlers.is_empty() {
            return Removal::Removed;
        }
        self.handlers.remove(topic);
        self.queues.remove(topic);
        Removal::TopicRemoved
    }

    pub fn snapshot(&self, topic: &str) -> Result<Option<Snapshot<E>>> {
        if self.closed {
            return Err(Error::Closed);
        }
        let (Some(handlers), Some(sender)) = (self.handlers.get(topic), self.queues.get(topic))
        else {
            return Ok(None);
        };
        Ok(Some(Snapshot {
            handlers: handlers.clone(),
            sender: sender.clone(),
        }))
    }

    /// Release every queue and refuse further use.
    ///
    /// Returns `false` if the registry was already closed.
    pub fn close(&mut self) -> bool {
        if self.closed {
            return false;
        }
        self.closed = true;
        self.handlers.clear();
        self.queues.clear();
        true
    }

    pub fn topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self.handlers.keys().map(|t| t.to_string()).collect();
        topics.sort_unstable();
        topics
    }

    pub fn handler_count(&self, topic: &str) -> usize {
        self.handlers.get(topic).map_or(0, Vec::len)
    }

    /// Number of tasks waiting in a topic's queue.
    pub fn queue_len(&self, topic: &str) -> Option<usize> {
        self.queues
            .get(topic)
            .map(|tx| tx.max_capacity() - tx.capacity())
    }
}
