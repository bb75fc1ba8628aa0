use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;
use tokio::{
    sync::{Notify, Semaphore},
    time::Duration,
};

use crate::{Context, Error, Event, Handler, Result};

/// What a [`ScriptedHandler`] does on one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Succeed,
    Fail,
    Panic,
}

struct Call<E> {
    event: Arc<E>,
    cancelled: bool,
}

/// Handler that plays back a list of outcomes, then repeats a fallback.
///
/// Every call is recorded before the outcome is applied, so a call that panics
/// or fails still counts. An optional gate makes each call wait for one permit
/// of a semaphore, which lets tests hold a topic worker in place.
pub struct ScriptedHandler<E> {
    script: Mutex<VecDeque<Outcome>>,
    fallback: Outcome,
    calls: Mutex<Vec<Call<E>>>,
    notify: Notify,
    gate: Option<Arc<Semaphore>>,
}

impl<E> ScriptedHandler<E> {
    pub fn new(script: impl IntoIterator<Item = Outcome>, fallback: Outcome) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            fallback,
            calls: Mutex::new(Vec::new()),
            notify: Notify::new(),
            gate: None,
        }
    }

    pub fn succeeding() -> Self {
        Self::new([], Outcome::Succeed)
    }

    pub fn failing() -> Self {
        Self::new([], Outcome::Fail)
    }

    /// Fail `n` times, then succeed.
    pub fn failing_times(n: usize) -> Self {
        Self::new(std::iter::repeat_n(Outcome::Fail, n), Outcome::Succeed)
    }

    /// Panic `n` times, then succeed.
    pub fn panicking_times(n: usize) -> Self {
        Self::new(std::iter::repeat_n(Outcome::Panic, n), Outcome::Succeed)
    }

    /// Make every call wait for a permit from `gate` after it is recorded.
    pub fn with_gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn calls(&self) -> usize {
        lock(&self.calls).len()
    }

    /// Events in the order they were received, one entry per call.
    pub fn events(&self) -> Vec<Arc<E>> {
        lock(&self.calls).iter().map(|c| c.event.clone()).collect()
    }

    /// Whether the context was already cancelled, one entry per call.
    pub fn cancelled_flags(&self) -> Vec<bool> {
        lock(&self.calls).iter().map(|c| c.cancelled).collect()
    }

    /// Wait until at least `n` calls were made. Returns `false` on timeout.
    pub async fn wait_for_calls(&self, n: usize, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, async {
            loop {
                let notified = self.notify.notified();
                if self.calls() >= n {
                    return;
                }
                notified.await;
            }
        })
        .await
        .is_ok()
    }
}

#[async_trait]
impl<E: Event> Handler<E> for ScriptedHandler<E> {
    async fn handle(&self, ctx: &Context, event: &Arc<E>) -> Result<()> {
        let outcome = lock(&self.script).pop_front().unwrap_or(self.fallback);
        lock(&self.calls).push(Call {
            event: event.clone(),
            cancelled: ctx.is_cancelled(),
        });
        self.notify.notify_waiters();

        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }

        match outcome {
            Outcome::Succeed => Ok(()),
            Outcome::Fail => Err(Error::external("scripted failure")),
            Outcome::Panic => panic!("scripted panic"),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
