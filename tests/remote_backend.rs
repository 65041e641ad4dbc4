//! Remote backend integration tests
//!
//! Runs the record service on an ephemeral local port and drives it through
//! `RemoteStore`, checking that both backends honour the same contract.

use anyhow::Result;
use chartstore::model::{
    Cardinality, ConfigPatch, DBField, DBIndex, DBRelationship, DBTable, Diagram, DiagramFilter,
    DiagramIncludes, DiagramPatch, RelationshipPatch, RelationshipType, TablePatch,
};
use chartstore::server::{create_app, open_service_in_memory};
use chartstore::storage::{ensure_config, DiagramStorage, LocalStore, RemoteStore};
use chartstore::{Config, Error};
use chrono::{TimeZone, Utc};
use serde_json::{json, Map, Value};
use tokio::net::TcpListener;

/// Start a service without bootstrapping its config row.
async fn spawn_service() -> Result<(RemoteStore, LocalStore)> {
    let storage = open_service_in_memory()?;
    let app = create_app(storage.clone(), &[]);
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok((RemoteStore::new(format!("http://{}", addr)), storage))
}

fn users_table() -> DBTable {
    let mut table = DBTable::new("t1", "users");
    table.created_at = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
    table.fields = vec![
        DBField::new("f1", "id", "int"),
        DBField::new("f2", "email", "varchar"),
        DBField::new("f3", "created", "timestamp"),
    ];
    table.indexes = vec![DBIndex {
        id: "i1".to_string(),
        name: "users_email".to_string(),
        unique: true,
        field_ids: vec!["f2".to_string()],
        extra: Map::new(),
    }];
    table
}

fn shop() -> Diagram {
    let mut diagram = Diagram::new("d1", "Shop", "postgres");
    let stamp = Utc.with_ymd_and_hms(2024, 3, 9, 14, 0, 0).unwrap();
    diagram.created_at = stamp;
    diagram.updated_at = stamp;
    diagram
}

/// The same sequence of contract calls, reduced to a comparable snapshot.
async fn exercise(storage: &dyn DiagramStorage) -> Result<Value> {
    storage.add_diagram(shop()).await?;
    storage.add_table("d1", users_table()).await?;
    let mut orders = DBTable::new("t2", "orders");
    orders.created_at = Utc.with_ymd_and_hms(2024, 3, 9, 14, 6, 0).unwrap();
    storage.add_table("d1", orders).await?;

    let mut relationship = DBRelationship::new("r1", "t2", "t1").named("orders_users");
    relationship.created_at = Utc.with_ymd_and_hms(2024, 3, 9, 14, 7, 0).unwrap();
    storage.add_relationship("d1", relationship).await?;
    storage
        .update_relationship(
            "r1",
            RelationshipPatch {
                relationship_type: Some(Some(RelationshipType::OneToMany)),
                source_cardinality: Some(Cardinality::One),
                target_cardinality: Some(Cardinality::Many),
                ..RelationshipPatch::default()
            },
        )
        .await?;
    storage
        .update_table(
            "t2",
            TablePatch {
                color: Some(Some("#00ff00".to_string())),
                ..TablePatch::default()
            },
        )
        .await?;
    storage
        .put_diagram_filter(
            "d1",
            DiagramFilter {
                diagram_id: "d1".to_string(),
                table_ids: Some(vec![]),
                schemas_ids: None,
            },
        )
        .await?;

    let diagram = storage.get_diagram("d1", DiagramIncludes::all()).await?;
    let filter = storage.get_diagram_filter("d1").await?;
    let missing = storage.get_table("d1", "nope").await?;
    Ok(json!({
        "diagram": diagram,
        "filter": filter,
        "missing": missing,
    }))
}

#[tokio::test]
async fn test_backends_are_equivalent() -> Result<()> {
    let (remote, _service) = spawn_service().await?;
    let local = LocalStore::open_in_memory()?;

    let from_remote = exercise(&remote).await?;
    let from_local = exercise(&local).await?;
    assert_eq!(from_remote, from_local);

    let fields = &from_remote["diagram"]["tables"][0]["fields"];
    let names: Vec<&str> = fields
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["id", "email", "created"]);
    assert_eq!(from_remote["filter"]["tableIds"], json!([]));
    assert_eq!(from_remote["filter"]["schemasIds"], Value::Null);
    Ok(())
}

#[tokio::test]
async fn test_bootstrap_over_remote() -> Result<()> {
    let (remote, _service) = spawn_service().await?;

    assert_eq!(remote.get_config().await?, None);
    match remote.update_config(ConfigPatch::default_diagram("d1")).await {
        Err(Error::NotFound(_)) => {}
        other => panic!("expected not found, got {:?}", other),
    }

    let config = ensure_config(&remote).await?;
    assert_eq!(config, Config::new(""));
    assert_eq!(remote.get_config().await?, Some(Config::new("")));

    remote.update_config(ConfigPatch::default_diagram("d1")).await?;
    assert_eq!(remote.get_config().await?.unwrap().default_diagram_id, "d1");
    Ok(())
}

#[tokio::test]
async fn test_scenario_over_remote() -> Result<()> {
    let (remote, _service) = spawn_service().await?;

    remote.add_diagram(Diagram::new("d1", "Shop", "postgres")).await?;
    remote.add_table("d1", DBTable::new("t1", "users")).await?;
    let tables = remote.list_tables("d1").await?;
    assert_eq!(tables.len(), 1);
    assert_eq!(tables[0].id, "t1");

    remote.delete_diagram("d1").await?;
    assert!(remote.list_tables("d1").await?.is_empty());
    assert!(remote.list_diagrams(DiagramIncludes::default()).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_rename_over_remote() -> Result<()> {
    let (remote, _service) = spawn_service().await?;
    remote.add_diagram(shop()).await?;
    remote.add_table("d1", users_table()).await?;
    remote
        .put_diagram_filter("d1", DiagramFilter::unfiltered("d1"))
        .await?;

    remote.update_diagram("d1", DiagramPatch::move_to("d2")).await?;

    assert!(remote.get_diagram("d1", DiagramIncludes::default()).await?.is_none());
    let tables = remote.list_tables("d2").await?;
    assert_eq!(tables.len(), 1);
    assert_eq!(tables[0].diagram_id, "d2");
    assert!(remote.list_tables("d1").await?.is_empty());
    assert!(remote.get_diagram_filter("d2").await?.is_some());
    assert!(remote.get_diagram_filter("d1").await?.is_none());
    Ok(())
}

#[tokio::test]
async fn test_errors_over_remote() -> Result<()> {
    let (remote, _service) = spawn_service().await?;

    // Rejected before any request is sent.
    let err = remote.add_table("d1", DBTable::new("t1", "")).await.unwrap_err();
    assert!(err.is_validation());

    // Rejected by the service.
    let client = reqwest::Client::new();
    let response = client
        .post(format!("{}/diagrams/d1/tables", remote.base_url()))
        .json(&json!({"table": {"id": "t1"}}))
        .send()
        .await?;
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    let body: Value = response.json().await?;
    assert_eq!(body["error"], "Missing required fields: id or name");

    assert!(remote.get_diagram("nope", DiagramIncludes::all()).await?.is_none());
    assert!(remote.get_area("d1", "nope").await?.is_none());
    Ok(())
}

#[tokio::test]
async fn test_health_over_remote() -> Result<()> {
    let (remote, _service) = spawn_service().await?;
    let health = remote.health().await?;
    assert_eq!(health["status"], "healthy");
    Ok(())
}
