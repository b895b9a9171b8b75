//! Env storage abstraction.

use std::collections::BTreeMap;

use thiserror::Error;

use gantry_core::EnvVar;

/// Env store error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EnvStoreError {
    #[error("env storage failure: {0}")]
    Storage(String),
}

/// The common way to handle an app's environment variables.
///
/// A store is scoped to a single application at construction time; names
/// passed to the methods are variable names, never app names.
pub trait EnvStore: Send + Sync {
    /// Fetch the named variables; with no names, fetch every variable.
    /// Unknown names are silently omitted from the result.
    fn get(&self, names: &[&str]) -> Result<BTreeMap<String, EnvVar>, EnvStoreError>;

    /// Insert or overwrite variables by name.
    fn set(&self, vars: Vec<EnvVar>) -> Result<(), EnvStoreError>;

    /// Remove the named variables. Removing an absent name is a no-op.
    fn unset(&self, names: &[&str]) -> Result<(), EnvStoreError>;
}
