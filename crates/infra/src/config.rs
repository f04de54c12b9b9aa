//! Engine configuration, read from the environment.
//!
//! | variable | default |
//! |---|---|
//! | `PERMGATE_CATALOG_PATH` | built-in catalog |
//! | `PERMGATE_AUDIT_PAGE_LIMIT` | 50 (capped at 1000) |
//! | `PERMGATE_SUPER_ADMIN_BYPASS_PROVISIONING` | false |

use std::path::{Path, PathBuf};

use anyhow::Context;
use thiserror::Error;

use permgate_auth::{Catalog, CatalogDefinition};
use permgate_core::AccessError;

use crate::store::audit::{DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT};

pub const CATALOG_PATH_VAR: &str = "PERMGATE_CATALOG_PATH";
pub const AUDIT_PAGE_LIMIT_VAR: &str = "PERMGATE_AUDIT_PAGE_LIMIT";
pub const SUPER_ADMIN_BYPASS_VAR: &str = "PERMGATE_SUPER_ADMIN_BYPASS_PROVISIONING";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: '{value}'")]
    InvalidVar { name: &'static str, value: String },

    #[error("catalog file {path}: {message}")]
    CatalogFile { path: PathBuf, message: String },

    #[error(transparent)]
    Catalog(#[from] AccessError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// JSON catalog document; `None` selects the built-in catalog.
    pub catalog_path: Option<PathBuf>,
    /// Default audit page size.
    pub audit_page_limit: u32,
    /// Give super-admins module permissions for modules their company has not provisioned.
    pub super_admin_bypass_provisioning: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            catalog_path: None,
            audit_page_limit: DEFAULT_PAGE_LIMIT,
            super_admin_bypass_provisioning: false,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let catalog_path = lookup(CATALOG_PATH_VAR)
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);

        let audit_page_limit = match lookup(AUDIT_PAGE_LIMIT_VAR) {
            None => DEFAULT_PAGE_LIMIT,
            Some(raw) => match raw.trim().parse::<u32>() {
                Ok(n) if n > 0 => n.min(MAX_PAGE_LIMIT),
                _ => {
                    return Err(ConfigError::InvalidVar {
                        name: AUDIT_PAGE_LIMIT_VAR,
                        value: raw,
                    });
                }
            },
        };

        let super_admin_bypass_provisioning = match lookup(SUPER_ADMIN_BYPASS_VAR) {
            None => false,
            Some(raw) => raw
                .trim()
                .to_ascii_lowercase()
                .parse::<bool>()
                .map_err(|_| ConfigError::InvalidVar {
                    name: SUPER_ADMIN_BYPASS_VAR,
                    value: raw,
                })?,
        };

        Ok(Self {
            catalog_path,
            audit_page_limit,
            super_admin_bypass_provisioning,
        })
    }

    /// The configured catalog, or the built-in one when no path is set.
    pub fn load_catalog(&self) -> Result<Catalog, ConfigError> {
        match &self.catalog_path {
            Some(path) => load_catalog_file(path),
            None => {
                tracing::warn!("{CATALOG_PATH_VAR} not set; using built-in catalog");
                Ok(Catalog::default_catalog()?)
            }
        }
    }
}

/// Read and validate a JSON catalog document.
pub fn load_catalog_file(path: &Path) -> Result<Catalog, ConfigError> {
    let definition = read_definition(path).map_err(|err| ConfigError::CatalogFile {
        path: path.to_path_buf(),
        message: format!("{err:#}"),
    })?;
    let catalog = Catalog::from_definition(definition)?;
    tracing::info!(path = %path.display(), "catalog loaded from file");
    Ok(catalog)
}

fn read_definition(path: &Path) -> anyhow::Result<CatalogDefinition> {
    let raw = std::fs::read_to_string(path).context("reading catalog")?;
    serde_json::from_str(&raw).context("parsing catalog document")
}
