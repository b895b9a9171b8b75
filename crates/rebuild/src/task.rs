//! Routes-rebuild orchestration: inline execution with queued fallback.
//!
//! [`RebuildTask`] is the subsystem handle. Constructed once by
//! [`RebuildTask::initialize`], it owns the work queue and the fixed worker
//! pool, and exposes the public rebuild entry points. There is no global
//! state: every entry point is a method on the handle, so nothing is
//! callable before initialization.
//!
//! The fire-and-forget entry points never surface an error. An inline
//! failure is logged and converted into an enqueue, trading synchronous
//! visibility for at-least-once background retry; the eventual outcome is
//! observable through logs and, when locking was used, through the recorded
//! event history.

use std::io::Write;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use gantry_core::{AppFinder, AppLookupError, AppName, RebuildFailure, RoutesRebuilder};
use gantry_events::{EventError, EventService, EventTarget};

use crate::config::RebuildConfig;
use crate::queue::{ExponentialBackoff, RateLimitedQueue};
use crate::shutdown::{ShutdownError, ShutdownRegistry, Shutdownable, WaitGroup};

/// Event kind recorded for every locked rebuild execution.
pub const EVENT_KIND_REBUILD: &str = "rebuild-routes-task";

/// Errors surfaced by the non-fire-and-forget operations.
#[derive(Debug, Error)]
pub enum RebuildError {
    #[error("error getting app {app}: {source}")]
    AppLookup {
        app: AppName,
        #[source]
        source: AppLookupError,
    },

    #[error("unable to acquire rebuild lock for app {app}: {source}")]
    Lock {
        app: AppName,
        #[source]
        source: EventError,
    },

    #[error("error rebuilding app {app}: {source}")]
    Execution {
        app: AppName,
        #[source]
        source: RebuildFailure,
    },

    /// The queue no longer accepts work (subsystem shut down).
    #[error("rebuild queue is shut down")]
    QueueClosed,

    /// Workers were still running when the shutdown deadline fired.
    #[error("shutdown deadline exceeded with rebuild workers still running")]
    ShutdownTimeout,
}

/// Everything a worker needs; cloned into each worker thread so the pool
/// holds no reference back to the handle.
#[derive(Clone)]
struct WorkerContext {
    queue: Arc<RateLimitedQueue>,
    finder: Arc<dyn AppFinder>,
    events: Arc<dyn EventService>,
    rebuilder: Arc<dyn RoutesRebuilder>,
}

/// The routes-rebuild task subsystem.
pub struct RebuildTask {
    pub(crate) queue: Arc<RateLimitedQueue>,
    ctx: WorkerContext,
    workers: Mutex<Vec<thread::JoinHandle<()>>>,
    drained: WaitGroup,
}

impl RebuildTask {
    /// Construct the subsystem: build the queue, launch the worker pool,
    /// and register with `registry` for process-wide shutdown.
    ///
    /// Call exactly once per process; the returned handle is the only way
    /// to reach the subsystem.
    pub fn initialize(
        finder: Arc<dyn AppFinder>,
        events: Arc<dyn EventService>,
        rebuilder: Arc<dyn RoutesRebuilder>,
        config: RebuildConfig,
        registry: &ShutdownRegistry,
    ) -> Arc<Self> {
        let queue = Arc::new(RateLimitedQueue::new(ExponentialBackoff::new(
            config.base_delay,
            config.max_delay,
        )));
        let ctx = WorkerContext {
            queue: Arc::clone(&queue),
            finder,
            events,
            rebuilder,
        };
        let drained = WaitGroup::new();

        let mut workers = Vec::with_capacity(config.workers);
        for i in 0..config.workers {
            let ctx = ctx.clone();
            let guard = drained.register();
            let handle = thread::Builder::new()
                .name(format!("routes-rebuild-{i}"))
                .spawn(move || {
                    let _guard = guard;
                    worker_loop(&ctx);
                })
                .expect("failed to spawn routes-rebuild worker thread");
            workers.push(handle);
        }
        info!(workers = config.workers, "routes-rebuild task started");

        let task = Arc::new(Self {
            queue,
            ctx,
            workers: Mutex::new(workers),
            drained,
        });
        registry.register("routes-rebuild", task.clone());
        task
    }

    /// Rebuild `app_name` inline without locking; on failure, log and
    /// enqueue a background retry. Never surfaces an error.
    pub fn routes_rebuild_or_enqueue(&self, app_name: &AppName) {
        self.rebuild_or_enqueue_optional_lock(app_name, false, None);
    }

    /// Like [`RebuildTask::routes_rebuild_or_enqueue`], forwarding a
    /// progress sink to the inline attempt. A queued retry runs without the
    /// sink.
    pub fn routes_rebuild_or_enqueue_with_progress(
        &self,
        app_name: &AppName,
        progress: &mut dyn Write,
    ) {
        self.rebuild_or_enqueue_optional_lock(app_name, false, Some(progress));
    }

    /// Rebuild `app_name` inline under the rebuild lock; on failure, log
    /// and enqueue a background retry. Never surfaces an error.
    pub fn locked_routes_rebuild_or_enqueue(&self, app_name: &AppName) {
        self.rebuild_or_enqueue_optional_lock(app_name, true, None);
    }

    /// Place `app_name` directly on the queue, bypassing any inline attempt.
    pub fn enqueue_routes_rebuild(&self, app_name: &AppName) -> Result<(), RebuildError> {
        if self.queue.add(app_name.clone()) {
            Ok(())
        } else {
            Err(RebuildError::QueueClosed)
        }
    }

    /// Drain the subsystem: stop the queue, then wait for every worker to
    /// finish its current item, bounded by `timeout`.
    ///
    /// Idempotent: a second call re-waits for the (already-finished) drain
    /// and returns `Ok` immediately.
    pub fn shutdown(&self, timeout: Duration) -> Result<(), RebuildError> {
        self.queue.shut_down();
        if !self.drained.wait_timeout(timeout) {
            return Err(RebuildError::ShutdownTimeout);
        }
        // Drained within the deadline: reap the worker threads.
        let mut workers = self.workers.lock().unwrap();
        for handle in workers.drain(..) {
            let _ = handle.join();
        }
        info!("routes-rebuild task drained");
        Ok(())
    }

    fn rebuild_or_enqueue_optional_lock(
        &self,
        app_name: &AppName,
        use_lock: bool,
        progress: Option<&mut dyn Write>,
    ) {
        match run_once(&self.ctx, app_name, use_lock, progress) {
            Ok(()) => {}
            Err(err) => {
                error!(app = %app_name, error = %err, "inline rebuild failed, enqueueing retry");
                if self.enqueue_routes_rebuild(app_name).is_err() {
                    warn!(app = %app_name, "rebuild queue shut down, dropping retry");
                }
            }
        }
    }
}

impl Shutdownable for RebuildTask {
    fn shutdown(&self, timeout: Duration) -> Result<(), ShutdownError> {
        RebuildTask::shutdown(self, timeout).map_err(|_| ShutdownError::DeadlineExceeded)
    }
}

/// Consumer loop: block on the queue, run each key under the lock, feed
/// failures back through the rate limiter. `done` is called regardless of
/// outcome so a dirty re-add during processing is honored.
fn worker_loop(ctx: &WorkerContext) {
    while let Some(key) = ctx.queue.get() {
        match run_once(ctx, &key, true, None) {
            Ok(()) => ctx.queue.forget(&key),
            Err(err) => {
                error!(app = %key, error = %err, "error processing rebuild, scheduling retry");
                ctx.queue.add_rate_limited(key.clone());
            }
        }
        ctx.queue.done(&key);
    }
}

/// One rebuild attempt for `app_name`.
///
/// A vanished app is benign: the task is stale, not failed. With
/// `use_lock`, a conflicting *rebuild* lock is likewise benign (that run
/// supersedes this one), while any other acquisition failure is escalated
/// so the caller retries. On execution failure the held event records the
/// error and partial outcome; on success it is aborted so no-op rebuilds
/// stay out of the journal.
fn run_once(
    ctx: &WorkerContext,
    app_name: &AppName,
    use_lock: bool,
    progress: Option<&mut dyn Write>,
) -> Result<(), RebuildError> {
    let app = match ctx.finder.find(app_name) {
        Ok(Some(app)) => app,
        Ok(None) => {
            debug!(app = %app_name, "app not found, ignoring rebuild task");
            return Ok(());
        }
        Err(source) => {
            return Err(RebuildError::AppLookup {
                app: app_name.clone(),
                source,
            });
        }
    };

    let guard = if use_lock {
        match ctx.events.acquire(EventTarget::app(app_name), EVENT_KIND_REBUILD) {
            Ok(guard) => Some(guard),
            Err(EventError::Locked { kind, .. }) if kind == EVENT_KIND_REBUILD => {
                debug!(app = %app_name, "app already locked in rebuild, ignoring task");
                return Ok(());
            }
            Err(source) => {
                return Err(RebuildError::Lock {
                    app: app_name.clone(),
                    source,
                });
            }
        }
    } else {
        None
    };

    match ctx.rebuilder.rebuild_routes(app.as_ref(), true, progress) {
        Ok(_outcome) => {
            if let Some(guard) = guard {
                guard.abort();
            }
            Ok(())
        }
        Err(failure) => {
            if let Some(guard) = guard {
                let partial = serde_json::to_value(&failure.partial).ok();
                guard.finalize(Some(failure.to_string()), partial);
            }
            Err(RebuildError::Execution {
                app: app_name.clone(),
                source: failure,
            })
        }
    }
}
