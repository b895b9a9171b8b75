//! In-memory env store for tests/dev.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use gantry_core::{AppName, EnvVar};

use crate::store::{EnvStore, EnvStoreError};

/// In-memory env store, scoped to one application.
#[derive(Debug)]
pub struct InMemoryEnvStore {
    app_name: AppName,
    envs: RwLock<BTreeMap<String, EnvVar>>,
}

impl InMemoryEnvStore {
    pub fn new(app_name: AppName) -> Self {
        Self {
            app_name,
            envs: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn arc(app_name: AppName) -> Arc<Self> {
        Arc::new(Self::new(app_name))
    }

    pub fn app_name(&self) -> &AppName {
        &self.app_name
    }
}

impl EnvStore for InMemoryEnvStore {
    fn get(&self, names: &[&str]) -> Result<BTreeMap<String, EnvVar>, EnvStoreError> {
        let envs = self
            .envs
            .read()
            .map_err(|_| EnvStoreError::Storage("env store poisoned".to_string()))?;

        if names.is_empty() {
            return Ok(envs.clone());
        }

        Ok(names
            .iter()
            .filter_map(|name| envs.get(*name).map(|var| ((*name).to_string(), var.clone())))
            .collect())
    }

    fn set(&self, vars: Vec<EnvVar>) -> Result<(), EnvStoreError> {
        let mut envs = self
            .envs
            .write()
            .map_err(|_| EnvStoreError::Storage("env store poisoned".to_string()))?;

        for var in vars {
            envs.insert(var.name.clone(), var);
        }
        Ok(())
    }

    fn unset(&self, names: &[&str]) -> Result<(), EnvStoreError> {
        let mut envs = self
            .envs
            .write()
            .map_err(|_| EnvStoreError::Storage("env store poisoned".to_string()))?;

        for name in names {
            envs.remove(*name);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> InMemoryEnvStore {
        InMemoryEnvStore::new(AppName::from("myapp"))
    }

    #[test]
    fn set_then_get_filters_by_name() {
        let store = store();
        store
            .set(vec![
                EnvVar::new("PORT", "8080"),
                EnvVar::private("DATABASE_URL", "postgres://secret"),
            ])
            .unwrap();

        let all = store.get(&[]).unwrap();
        assert_eq!(all.len(), 2);

        let filtered = store.get(&["PORT", "MISSING"]).unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered["PORT"].value, "8080");
    }

    #[test]
    fn set_overwrites_existing_value() {
        let store = store();
        store.set(vec![EnvVar::new("PORT", "8080")]).unwrap();
        store.set(vec![EnvVar::new("PORT", "9090")]).unwrap();

        let envs = store.get(&["PORT"]).unwrap();
        assert_eq!(envs["PORT"].value, "9090");
    }

    #[test]
    fn unset_removes_and_tolerates_absent_names() {
        let store = store();
        store.set(vec![EnvVar::new("PORT", "8080")]).unwrap();

        store.unset(&["PORT", "NEVER_SET"]).unwrap();
        assert!(store.get(&[]).unwrap().is_empty());
    }

    #[test]
    fn stores_are_isolated_per_app() {
        let a = InMemoryEnvStore::new(AppName::from("app-a"));
        let b = InMemoryEnvStore::new(AppName::from("app-b"));

        a.set(vec![EnvVar::new("PORT", "8080")]).unwrap();
        assert!(b.get(&[]).unwrap().is_empty());
        assert_eq!(a.app_name().as_str(), "app-a");
    }
}
