//! Explicit open → migrate → bootstrap

use std::sync::Arc;
use tracing::info;

use super::{DiagramStorage, LocalStore, RemoteStore};
use crate::config::{Backend, StorageConfig};
use crate::model::{Config, DiagramIncludes};
use crate::Result;

/// Make sure the singleton config row exists.
///
/// A missing row is created pointing at the first stored diagram, or at
/// nothing (`""`) when the store is empty. An existing row is returned as is.
pub async fn ensure_config(storage: &dyn DiagramStorage) -> Result<Config> {
    if let Some(config) = storage.get_config().await? {
        return Ok(config);
    }

    let diagrams = storage.list_diagrams(DiagramIncludes::default()).await?;
    let default_diagram_id = diagrams.first().map(|d| d.id.as_str()).unwrap_or("");
    let config = storage.initialize_config(default_diagram_id).await?;
    info!(
        "Initialized {} config (default diagram: '{}')",
        storage.backend(),
        config.default_diagram_id
    );
    Ok(config)
}

/// Open the configured backend and return it ready for use.
pub async fn open_storage(config: &StorageConfig) -> Result<Arc<dyn DiagramStorage>> {
    let storage: Arc<dyn DiagramStorage> = match config.backend {
        Backend::Embedded => Arc::new(LocalStore::open(config.database.clone()).await?),
        Backend::Remote => Arc::new(RemoteStore::new(config.api_base_url.clone())),
    };
    ensure_config(storage.as_ref()).await?;
    info!("Opened {} storage", storage.backend());
    Ok(storage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ConfigPatch, Diagram};

    #[tokio::test]
    async fn test_bootstrap_empty_store() {
        let store = LocalStore::open_in_memory().unwrap();
        let config = ensure_config(&store).await.unwrap();
        assert_eq!(config, Config::new(""));
        assert_eq!(config.id, 1);
    }

    #[tokio::test]
    async fn test_bootstrap_picks_first_diagram() {
        let store = LocalStore::open_in_memory().unwrap();
        store.add_diagram(Diagram::new("d1", "Shop", "postgres")).await.unwrap();
        store.add_diagram(Diagram::new("d2", "Blog", "mysql")).await.unwrap();

        let config = ensure_config(&store).await.unwrap();
        assert_eq!(config.default_diagram_id, "d1");
    }

    #[tokio::test]
    async fn test_bootstrap_keeps_existing_config() {
        let store = LocalStore::open_in_memory().unwrap();
        ensure_config(&store).await.unwrap();
        store.add_diagram(Diagram::new("d9", "Later", "sqlite")).await.unwrap();
        store
            .update_config(ConfigPatch::default_diagram("d9"))
            .await
            .unwrap();

        let config = ensure_config(&store).await.unwrap();
        assert_eq!(config.default_diagram_id, "d9");
    }

    #[tokio::test]
    async fn test_open_storage_embedded_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = StorageConfig {
            database: dir.path().join("chartstore.db"),
            ..StorageConfig::default()
        };
        let storage = open_storage(&config).await.unwrap();
        assert_eq!(storage.backend(), "embedded");
        assert_eq!(storage.get_config().await.unwrap(), Some(Config::new("")));
    }
}
