//! `gantry-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure
//! concerns): application identity, the collaborator contracts consumed by
//! the routes-rebuild subsystem, and the environment-variable record shared
//! with the env storage layer.

pub mod app;
pub mod env;
pub mod error;

pub use app::{
    AppFinder, AppLookupError, AppName, RebuildApp, RebuildFailure, RebuildOutcome,
    RoutesRebuildPrefixResult, RoutesRebuildResult, RoutesRebuilder,
};
pub use env::EnvVar;
pub use error::{DomainError, DomainResult};
