//! Infrastructure layer: stores, locking, configuration and the write paths.

pub mod catalog_cache;
pub mod config;
pub mod lock;
pub mod mutator;
pub mod provisioning;
pub mod service;
pub mod store;
pub mod templates;


pub use catalog_cache::CatalogCache;
pub use config::{ConfigError, EngineConfig};
pub use mutator::BatchMutator;
pub use provisioning::ProvisioningManager;
pub use service::{AccessService, InMemoryAccessService};
pub use store::StoreError;
pub use templates::TemplateEngine;
