//! Lock/event journal for platform operations.
//!
//! An *event* here is a named, time-bounded record of an operation running
//! against a target (an app, a platform). While an event is running it acts
//! as a mutual-exclusion lock on its target: a second operation against the
//! same target is refused with the kind of the event already holding it.
//!
//! Finished events form an append-only journal used for auditing. An event
//! can end two ways:
//!
//! - **finalize** — record the terminal error (if any) and a result payload
//!   in the journal, releasing the lock
//! - **abort** — release the lock and record nothing (no-op outcomes stay
//!   out of the journal)
//!
//! The durable coordination store behind this interface belongs to another
//! subsystem; this crate defines the contract and ships an in-memory
//! implementation for tests and single-process deployments.

pub mod event;
pub mod in_memory;
pub mod service;

pub use event::{EventRecord, EventTarget, TargetKind};
pub use in_memory::InMemoryEventService;
pub use service::{EventError, EventGuard, EventService};
