//! `gantry-rebuild` — the routes-rebuild task subsystem.
//!
//! Keeps each application's network-routing configuration synchronized with
//! its current backend set. "Rebuild the routes for app X" is a unit of work
//! that runs promptly when triggered, never runs twice concurrently for the
//! same app, retries with backoff instead of being lost, and drains cleanly
//! on process shutdown.
//!
//! ## Components
//!
//! - [`queue::RateLimitedQueue`]: dedup, delay-scheduled queue of app names
//! - [`task::RebuildTask`]: orchestrator (inline-or-enqueue entry points)
//!   plus the fixed worker pool consuming the queue
//! - [`shutdown`]: join barrier and the process-wide shutdown registry
//! - [`config::RebuildConfig`]: backoff and pool settings

pub mod config;
pub mod queue;
pub mod shutdown;
pub mod task;


pub use config::RebuildConfig;
pub use queue::{ExponentialBackoff, RateLimitedQueue};
pub use shutdown::{ShutdownError, ShutdownRegistry, Shutdownable, WaitGroup};
pub use task::{EVENT_KIND_REBUILD, RebuildError, RebuildTask};
