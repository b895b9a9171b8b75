//! Event service contract (mechanics only).

use thiserror::Error;

use crate::event::EventTarget;

/// Failure to acquire or record an event.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EventError {
    /// The target already has a running event holding the lock. `kind` is
    /// the kind of the event *currently holding* the lock, so callers can
    /// tell a conflicting duplicate of their own operation apart from an
    /// unrelated one.
    #[error("{target} locked by running {kind} event")]
    Locked { target: EventTarget, kind: String },

    /// The coordination store misbehaved.
    #[error("event storage failure: {0}")]
    Storage(String),
}

/// A running event, held as the lock on its target.
///
/// Dropping a guard without calling either method releases the lock as if
/// [`EventGuard::abort`] had been called; implementations must not leave a
/// dangling lock behind a panicked holder.
pub trait EventGuard: Send + std::fmt::Debug {
    /// Record the terminal state of the event in the journal with an
    /// optional error and result payload, releasing the lock.
    fn finalize(
        self: Box<Self>,
        error: Option<String>,
        custom_data: Option<serde_json::Value>,
    );

    /// Release the lock without recording anything.
    fn abort(self: Box<Self>);
}

/// Creates running events, enforcing one running event per target.
pub trait EventService: Send + Sync {
    /// Start a `kind` event against `target`, acquiring its lock.
    fn acquire(&self, target: EventTarget, kind: &str) -> Result<Box<dyn EventGuard>, EventError>;
}
