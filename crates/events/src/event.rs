//! Event targets and journal records.

use core::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use gantry_core::AppName;

/// Kind of entity an event runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    App,
    Platform,
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetKind::App => f.write_str("app"),
            TargetKind::Platform => f.write_str("platform"),
        }
    }
}

/// The entity an event locks and records against.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventTarget {
    pub kind: TargetKind,
    pub value: String,
}

impl EventTarget {
    pub fn app(name: &AppName) -> Self {
        Self {
            kind: TargetKind::App,
            value: name.to_string(),
        }
    }

    pub fn platform(name: impl Into<String>) -> Self {
        Self {
            kind: TargetKind::Platform,
            value: name.into(),
        }
    }
}

impl fmt::Display for EventTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.value)
    }
}

/// A finished event as kept in the journal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: Uuid,
    pub target: EventTarget,
    pub kind: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Terminal error message, if the operation failed.
    pub error: Option<String>,
    /// Operation-specific result payload (e.g. partial rebuild outcomes).
    pub custom_data: Option<serde_json::Value>,
}

impl EventRecord {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}
