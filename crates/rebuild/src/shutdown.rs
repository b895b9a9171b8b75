//! Graceful-shutdown primitives: a join barrier for the worker pool and a
//! process-wide registry of drainable components.

use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{error, info};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ShutdownError {
    /// Drain did not complete before the supplied deadline.
    #[error("shutdown deadline exceeded")]
    DeadlineExceeded,

    /// A registered component failed to shut down.
    #[error("component {name} failed to shut down: {reason}")]
    Component { name: String, reason: String },
}

#[derive(Debug, Default)]
struct WaitGroupInner {
    count: Mutex<usize>,
    drained: Condvar,
}

/// Join barrier over a dynamic set of members.
///
/// Each member holds a [`WaitGuard`]; the guard leaving scope (normally or
/// by panic) releases its membership. [`WaitGroup::wait_timeout`] blocks
/// until every member has exited or the timeout fires.
#[derive(Debug, Clone, Default)]
pub struct WaitGroup {
    inner: Arc<WaitGroupInner>,
}

impl WaitGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join the group.
    pub fn register(&self) -> WaitGuard {
        *self.inner.count.lock().unwrap() += 1;
        WaitGuard {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Current number of members (for observability).
    pub fn members(&self) -> usize {
        *self.inner.count.lock().unwrap()
    }

    /// Block until the group is empty. Returns `false` if the timeout fired
    /// with members still registered.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut count = self.inner.count.lock().unwrap();
        while *count > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            count = self.inner.drained.wait_timeout(count, remaining).unwrap().0;
        }
        true
    }
}

/// Membership in a [`WaitGroup`], released on drop.
#[derive(Debug)]
pub struct WaitGuard {
    inner: Arc<WaitGroupInner>,
}

impl Drop for WaitGuard {
    fn drop(&mut self) {
        let mut count = self.inner.count.lock().unwrap();
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.inner.drained.notify_all();
        }
    }
}

/// A component that can drain itself under a deadline.
pub trait Shutdownable: Send + Sync {
    fn shutdown(&self, timeout: Duration) -> Result<(), ShutdownError>;
}

/// Process-wide collection of drainable components.
///
/// Long-lived subsystems register here at initialization; a top-level
/// shutdown call then drains them all under one shared deadline, in
/// registration order.
#[derive(Default)]
pub struct ShutdownRegistry {
    components: Mutex<Vec<(String, Arc<dyn Shutdownable>)>>,
}

impl ShutdownRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, name: impl Into<String>, component: Arc<dyn Shutdownable>) {
        self.components
            .lock()
            .unwrap()
            .push((name.into(), component));
    }

    pub fn len(&self) -> usize {
        self.components.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drain every registered component, sharing `timeout` across them.
    /// Stops at the first failure.
    pub fn shutdown_all(&self, timeout: Duration) -> Result<(), ShutdownError> {
        let components: Vec<_> = self.components.lock().unwrap().clone();
        let deadline = Instant::now() + timeout;
        for (name, component) in components {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match component.shutdown(remaining) {
                Ok(()) => info!(component = %name, "component drained"),
                Err(err) => {
                    error!(component = %name, error = %err, "component failed to drain");
                    return Err(ShutdownError::Component {
                        name,
                        reason: err.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn wait_group_drains_when_all_guards_drop() {
        let group = WaitGroup::new();
        let guard_a = group.register();
        let guard_b = group.register();
        assert_eq!(group.members(), 2);

        let waiter = {
            let group = group.clone();
            thread::spawn(move || group.wait_timeout(Duration::from_secs(2)))
        };

        drop(guard_a);
        thread::sleep(Duration::from_millis(20));
        drop(guard_b);

        assert!(waiter.join().unwrap());
        assert_eq!(group.members(), 0);
    }

    #[test]
    fn wait_group_times_out_with_members_left() {
        let group = WaitGroup::new();
        let _held = group.register();
        assert!(!group.wait_timeout(Duration::from_millis(30)));
    }

    #[test]
    fn empty_wait_group_returns_immediately() {
        assert!(WaitGroup::new().wait_timeout(Duration::ZERO));
    }

    struct Drains;

    impl Shutdownable for Drains {
        fn shutdown(&self, _timeout: Duration) -> Result<(), ShutdownError> {
            Ok(())
        }
    }

    struct Stuck;

    impl Shutdownable for Stuck {
        fn shutdown(&self, _timeout: Duration) -> Result<(), ShutdownError> {
            Err(ShutdownError::DeadlineExceeded)
        }
    }

    #[test]
    fn registry_drains_components_in_order() {
        let registry = ShutdownRegistry::new();
        registry.register("queue", Arc::new(Drains));
        registry.register("pool", Arc::new(Drains));
        assert_eq!(registry.len(), 2);
        assert!(registry.shutdown_all(Duration::from_secs(1)).is_ok());
    }

    #[test]
    fn registry_reports_first_failing_component() {
        let registry = ShutdownRegistry::new();
        registry.register("queue", Arc::new(Drains));
        registry.register("pool", Arc::new(Stuck));

        let err = registry.shutdown_all(Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, ShutdownError::Component { name, .. } if name == "pool"));
    }
}
