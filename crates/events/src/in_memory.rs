//! In-memory event service for tests/dev.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::event::{EventRecord, EventTarget};
use crate::service::{EventError, EventGuard, EventService};

#[derive(Debug, Default)]
struct Journal {
    running: HashMap<EventTarget, RunningEvent>,
    history: Vec<EventRecord>,
}

#[derive(Debug, Clone)]
struct RunningEvent {
    id: Uuid,
    kind: String,
    started_at: DateTime<Utc>,
}

/// In-memory lock/event journal.
///
/// - No IO / no async
/// - One running event per target (named mutual exclusion)
/// - Finalized events land in an inspectable history; aborted events vanish
#[derive(Debug, Default)]
pub struct InMemoryEventService {
    journal: Arc<Mutex<Journal>>,
}

impl InMemoryEventService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Snapshot of the finished-event journal, oldest first.
    pub fn history(&self) -> Vec<EventRecord> {
        self.journal.lock().unwrap().history.clone()
    }

    /// Kind of the event currently holding `target`, if any.
    pub fn running_kind(&self, target: &EventTarget) -> Option<String> {
        self.journal
            .lock()
            .unwrap()
            .running
            .get(target)
            .map(|e| e.kind.clone())
    }
}

impl EventService for InMemoryEventService {
    fn acquire(&self, target: EventTarget, kind: &str) -> Result<Box<dyn EventGuard>, EventError> {
        let mut journal = self
            .journal
            .lock()
            .map_err(|_| EventError::Storage("event journal poisoned".to_string()))?;

        if let Some(held) = journal.running.get(&target) {
            return Err(EventError::Locked {
                target,
                kind: held.kind.clone(),
            });
        }

        let running = RunningEvent {
            id: Uuid::now_v7(),
            kind: kind.to_string(),
            started_at: Utc::now(),
        };
        journal.running.insert(target.clone(), running.clone());

        Ok(Box::new(InMemoryEventGuard {
            journal: Arc::clone(&self.journal),
            target,
            event: running,
            released: false,
        }))
    }
}

#[derive(Debug)]
struct InMemoryEventGuard {
    journal: Arc<Mutex<Journal>>,
    target: EventTarget,
    event: RunningEvent,
    released: bool,
}

impl InMemoryEventGuard {
    fn release(&mut self, record: Option<EventRecord>) {
        if self.released {
            return;
        }
        self.released = true;
        if let Ok(mut journal) = self.journal.lock() {
            journal.running.remove(&self.target);
            if let Some(record) = record {
                journal.history.push(record);
            }
        }
    }
}

impl EventGuard for InMemoryEventGuard {
    fn finalize(
        mut self: Box<Self>,
        error: Option<String>,
        custom_data: Option<serde_json::Value>,
    ) {
        let record = EventRecord {
            id: self.event.id,
            target: self.target.clone(),
            kind: self.event.kind.clone(),
            started_at: self.event.started_at,
            finished_at: Utc::now(),
            error,
            custom_data,
        };
        self.release(Some(record));
    }

    fn abort(mut self: Box<Self>) {
        self.release(None);
    }
}

impl Drop for InMemoryEventGuard {
    fn drop(&mut self) {
        // A guard dropped mid-operation (e.g. on panic) must not leave the
        // target locked forever.
        self.release(None);
    }
}
