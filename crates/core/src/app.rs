//! Application identity and the collaborator contracts of the routes-rebuild
//! subsystem.
//!
//! The rebuild subsystem never touches application storage or routers
//! directly; it works against the traits defined here. [`AppName`] is the
//! unit of work: every queued rebuild is keyed by the name of the
//! application whose routes drifted.

use core::fmt;
use core::str::FromStr;
use std::collections::BTreeMap;
use std::io;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::DomainError;

/// Name of an application hosted on the platform.
///
/// App names are the multi-tenant boundary of the platform and the task key
/// of the routes-rebuild queue. They are treated as opaque: the subsystem
/// never parses or interprets them.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppName(String);

impl AppName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AppName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl From<&str> for AppName {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<AppName> for String {
    fn from(value: AppName) -> Self {
        value.0
    }
}

impl FromStr for AppName {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(DomainError::invalid_id("AppName: empty".to_string()));
        }
        Ok(Self(s.to_string()))
    }
}

/// Error surfaced by an [`AppFinder`] lookup.
///
/// "App does not exist" is **not** an error; finders report it as
/// `Ok(None)` so callers can treat it as benign.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AppLookupError {
    #[error("app storage failure: {0}")]
    Storage(String),
}

/// Handle to a resolved application, as consumed by the route-rebuild
/// routine. Opaque to the rebuild subsystem.
pub trait RebuildApp: Send + Sync {
    fn name(&self) -> &AppName;

    /// Routers the application is attached to.
    fn routers(&self) -> Vec<String>;
}

/// Resolves an app name to a live application handle.
pub trait AppFinder: Send + Sync {
    fn find(&self, name: &AppName) -> Result<Option<Arc<dyn RebuildApp>>, AppLookupError>;
}

impl<F> AppFinder for F
where
    F: Fn(&AppName) -> Result<Option<Arc<dyn RebuildApp>>, AppLookupError> + Send + Sync,
{
    fn find(&self, name: &AppName) -> Result<Option<Arc<dyn RebuildApp>>, AppLookupError> {
        self(name)
    }
}

/// Route changes applied to a single router prefix during a rebuild.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutesRebuildPrefixResult {
    pub prefix: String,
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

/// Outcome of rebuilding one router's routes for an application.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutesRebuildResult {
    pub prefix_results: Vec<RoutesRebuildPrefixResult>,
}

/// Per-router rebuild outcomes, keyed by router name.
pub type RebuildOutcome = BTreeMap<String, RoutesRebuildResult>;

/// Failure of the route-rebuild routine.
///
/// Carries whatever partial outcome was applied before the failure, so the
/// caller can record it for auditing alongside the error.
#[derive(Debug, Error)]
#[error("{cause}")]
pub struct RebuildFailure {
    pub partial: RebuildOutcome,
    pub cause: anyhow::Error,
}

impl RebuildFailure {
    pub fn new(cause: anyhow::Error) -> Self {
        Self {
            partial: RebuildOutcome::new(),
            cause,
        }
    }

    pub fn with_partial(cause: anyhow::Error, partial: RebuildOutcome) -> Self {
        Self { partial, cause }
    }
}

/// The external route-rebuild routine.
///
/// Recomputes an application's routing configuration against its current
/// backend set and applies the difference. How routes are computed is out of
/// this crate's hands entirely.
pub trait RoutesRebuilder: Send + Sync {
    /// Rebuild the routes of `app`.
    ///
    /// `progress` is a best-effort, human-readable sink; implementations may
    /// ignore it. Write failures on the sink must not fail the rebuild.
    fn rebuild_routes(
        &self,
        app: &dyn RebuildApp,
        force_full: bool,
        progress: Option<&mut dyn io::Write>,
    ) -> Result<RebuildOutcome, RebuildFailure>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_name_round_trips() {
        let name = AppName::from("myapp");
        assert_eq!(name.as_str(), "myapp");
        assert_eq!(name.to_string(), "myapp");
        assert_eq!(String::from(name), "myapp");
    }

    #[test]
    fn app_name_rejects_empty() {
        assert!("".parse::<AppName>().is_err());
        assert_eq!("web-1".parse::<AppName>().unwrap(), AppName::from("web-1"));
    }

    #[test]
    fn finder_closures_implement_app_finder() {
        let finder = |_: &AppName| -> Result<Option<Arc<dyn RebuildApp>>, AppLookupError> {
            Ok(None)
        };
        assert!(finder.find(&AppName::from("ghost")).unwrap().is_none());
    }

    #[test]
    fn rebuild_failure_keeps_partial_outcome() {
        let mut partial = RebuildOutcome::new();
        partial.insert(
            "ingress".to_string(),
            RoutesRebuildResult {
                prefix_results: vec![RoutesRebuildPrefixResult {
                    prefix: String::new(),
                    added: vec!["10.0.0.1:8080".to_string()],
                    removed: Vec::new(),
                }],
            },
        );

        let failure = RebuildFailure::with_partial(anyhow::anyhow!("router timeout"), partial);
        assert_eq!(failure.to_string(), "router timeout");
        assert_eq!(failure.partial.len(), 1);
    }
}
