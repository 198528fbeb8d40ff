//! Shared store and repository construction
//!
//! One `SqliteStore` is opened per process and handed by `Arc` to the
//! repository and to anything else that reads it.

use anyhow::{Context, Result};
use larder_core::config::{Config, ConfigSchema};
use larder_remote::{HttpRemoteSource, RemoteConfig};
use larder_store::SqliteStore;
use larder_sync::Repository;
use std::sync::Arc;
use tracing::debug;

/// Repository over the configured endpoint and database
pub type CacheRepository = Repository<HttpRemoteSource, SqliteStore>;

/// Open the configured database; needs no remote settings
pub fn open_store(schema: &ConfigSchema) -> Result<Arc<SqliteStore>> {
    schema.store.collection.validate()?;
    let path = &schema.store.path;
    debug!(path = %path.display(), collection = %schema.store.collection.name, "Opening store");

    let store = SqliteStore::open(path, schema.store.collection.clone())
        .with_context(|| format!("Opening {}", path.display()))?;
    Ok(Arc::new(store))
}

/// Validate the whole configuration and build a repository on `store`
pub fn open_repository(config: &Config, store: Arc<SqliteStore>) -> Result<CacheRepository> {
    let schema = &config.schema;
    schema.validate().with_context(|| match &config.path {
        Some(path) => format!("Invalid configuration in {}", path.display()),
        None => "Invalid configuration (no larder.toml found)".to_string(),
    })?;

    let remote = HttpRemoteSource::new(RemoteConfig::from(&schema.remote))?;
    Ok(Repository::new(
        schema.store.collection.name.clone(),
        remote,
        store,
    ))
}

/// Store plus repository, for commands that talk to the remote
pub fn open(config: &Config) -> Result<CacheRepository> {
    let store = open_store(&config.schema)?;
    open_repository(config, store)
}
