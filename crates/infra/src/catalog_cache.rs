//! Process-wide catalog handle.
//!
//! Readers take an `Arc<Catalog>` snapshot per operation; a deploy swaps the
//! whole catalog at once via [`CatalogCache::replace`].

use std::path::Path;
use std::sync::{Arc, RwLock};

use permgate_auth::Catalog;

use crate::config::{load_catalog_file, ConfigError};

#[derive(Debug)]
pub struct CatalogCache {
    current: RwLock<Arc<Catalog>>,
}

impl CatalogCache {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            current: RwLock::new(Arc::new(catalog)),
        }
    }

    /// Snapshot of the live catalog.
    pub fn current(&self) -> Arc<Catalog> {
        match self.current.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Invalidate-on-deploy hook. In-flight operations keep their snapshot.
    pub fn replace(&self, catalog: Catalog) {
        let next = Arc::new(catalog);
        match self.current.write() {
            Ok(mut guard) => *guard = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
        tracing::info!("catalog replaced");
    }

    /// Load, validate and swap in a catalog file. The live catalog is left
    /// untouched on failure.
    pub fn reload_from(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let catalog = load_catalog_file(path.as_ref())?;
        self.replace(catalog);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use permgate_auth::{CatalogDefinition, Permission, PermissionGroup};
    use permgate_core::PermissionKey;

    use super::*;

    #[test]
    fn snapshots_survive_replacement() {
        let cache = CatalogCache::new(Catalog::default_catalog().unwrap());
        let before = cache.current();

        let slim = Catalog::from_definition(CatalogDefinition {
            permissions: vec![Permission::foundation("dashboard.view", "Dashboard", PermissionGroup::Dashboard)],
            ..Default::default()
        })
        .unwrap();
        cache.replace(slim);

        assert!(before.has_permission(&PermissionKey::from("expenses.view")));
        assert!(!cache.current().has_permission(&PermissionKey::from("expenses.view")));
    }

    #[test]
    fn failed_reload_keeps_the_live_catalog() {
        let cache = CatalogCache::new(Catalog::default_catalog().unwrap());
        let err = cache.reload_from("/nonexistent/permgate/catalog.json").unwrap_err();
        assert!(matches!(err, ConfigError::CatalogFile { .. }));
        assert!(cache.current().has_permission(&PermissionKey::from("expenses.view")));
    }
}
