//! File-backed embedded store tests

use anyhow::Result;
use chartstore::config::{Backend, StorageConfig};
use chartstore::model::{Area, DBTable, Diagram, DiagramIncludes};
use chartstore::storage::{migrations, open_storage, SqliteStore};
use chartstore::Config;
use std::sync::Arc;

fn embedded(dir: &tempfile::TempDir) -> StorageConfig {
    StorageConfig {
        backend: Backend::Embedded,
        database: dir.path().join("chartstore.db"),
        ..StorageConfig::default()
    }
}

#[tokio::test]
async fn test_data_survives_reopen() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let config = embedded(&dir);

    {
        let storage = open_storage(&config).await?;
        storage.add_diagram(Diagram::new("d1", "Shop", "postgres")).await?;
        storage.add_table("d1", DBTable::new("t1", "users")).await?;
    }

    let storage = open_storage(&config).await?;
    let tables = storage.list_tables("d1").await?;
    assert_eq!(tables.len(), 1);
    assert_eq!(tables[0].name, "users");
    // Created on the first open, before any diagram existed.
    assert_eq!(storage.get_config().await?, Some(Config::new("")));

    let (_, report) = SqliteStore::open_with_report(&config.database)?;
    assert!(report.is_noop());
    assert_eq!(report.to, migrations::latest_version());
    Ok(())
}

#[tokio::test]
async fn test_concurrent_callers_share_one_store() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let storage = open_storage(&embedded(&dir)).await?;
    storage.add_diagram(Diagram::new("d1", "Shop", "postgres")).await?;

    let mut handles = Vec::new();
    for i in 0..8 {
        let storage = Arc::clone(&storage);
        handles.push(tokio::spawn(async move {
            storage
                .add_area("d1", Area::new(format!("a{}", i), format!("Area {}", i)))
                .await
        }));
    }
    for handle in handles {
        handle.await??;
    }

    let diagram = storage
        .get_diagram("d1", DiagramIncludes::all())
        .await?
        .expect("diagram exists");
    assert_eq!(diagram.areas.map(|a| a.len()), Some(8));
    Ok(())
}
