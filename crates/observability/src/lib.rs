//! `gantry-observability` — process-wide logging/tracing setup.

pub mod tracing;

pub use tracing::{LogFormat, init, init_with_format};
