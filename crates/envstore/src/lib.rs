//! `gantry-envstore` — environment-variable storage for applications.
//!
//! A concise interface for handling an app's environment variables over
//! backend storages. Each store instance is scoped to one application;
//! durable backends (document stores, secret managers) implement
//! [`EnvStore`] elsewhere, this crate ships the contract and an in-memory
//! backend for tests and single-process deployments.

pub mod in_memory;
pub mod store;

pub use in_memory::InMemoryEnvStore;
pub use store::{EnvStore, EnvStoreError};
