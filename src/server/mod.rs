//! Record service
//!
//! The HTTP surface the remote backend talks to, served over the same
//! relational shape as the embedded store.

use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, patch, put},
    Router,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::{ensure_db_dir, ServerConfig};
use crate::model::{
    Area, AreaPatch, CustomTypePatch, DBCustomType, DBDependency, DBRelationship, DBTable,
    DependencyPatch, RelationshipPatch, TablePatch, Validate,
};
use crate::storage::records::{Patch, Record};
use crate::storage::{ensure_config, LocalStore, SharedStore, SqliteStore};
use crate::{Error, Result};

pub mod routes;

/// Server state
#[derive(Clone)]
pub struct AppState {
    pub storage: LocalStore,
}

impl AppState {
    pub fn new(storage: LocalStore) -> Self {
        Self { storage }
    }

    pub fn store(&self) -> &SharedStore {
        self.storage.shared()
    }
}

/// Open the service database on the blocking pool.
pub async fn open_service_storage(path: PathBuf) -> Result<LocalStore> {
    let store = tokio::task::spawn_blocking(move || SqliteStore::open_service(&path))
        .await
        .map_err(|e| Error::Task(format!("open service database: {}", e)))??;
    Ok(LocalStore::new(SharedStore::new(store)))
}

pub fn open_service_in_memory() -> Result<LocalStore> {
    Ok(LocalStore::new(SharedStore::new(SqliteStore::open_service_in_memory()?)))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        let parsed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|origin| match origin.parse::<HeaderValue>() {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!("Ignoring invalid CORS origin '{}'", origin);
                    None
                }
            })
            .collect();
        AllowOrigin::list(parsed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::PUT,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::CONTENT_TYPE])
}

/// Routes for one child collection: nested CRUD under the diagram, plus
/// the id-only PATCH path.
fn collection_routes<R, P>(router: Router<AppState>) -> Router<AppState>
where
    R: Record + Serialize + DeserializeOwned + Validate + Sync,
    P: Patch + DeserializeOwned + Sync,
{
    let collection = format!("/diagrams/{{diagram_id}}/{}", R::PATH);
    let item = format!("/diagrams/{{diagram_id}}/{}/{{id}}", R::PATH);
    let patch_path = format!("/{}/{{id}}", R::PATH);

    router
        .route(
            &collection,
            get(routes::list_records::<R>)
                .post(routes::create_record::<R>)
                .delete(routes::delete_records::<R>),
        )
        .route(
            &item,
            get(routes::get_record::<R>).delete(routes::delete_record::<R>),
        )
        .route(&patch_path, patch(routes::update_record::<P>))
}

pub fn create_app(storage: LocalStore, cors_origins: &[String]) -> Router {
    let router = Router::new()
        .route("/health", get(routes::health))
        .route("/config", get(routes::get_config).put(routes::put_config))
        .route(
            "/diagram-filters/{diagram_id}",
            get(routes::get_filter)
                .put(routes::put_filter)
                .delete(routes::delete_filter),
        )
        .route(
            "/diagrams",
            get(routes::list_diagrams).post(routes::create_diagram),
        )
        .route(
            "/diagrams/{diagram_id}",
            get(routes::get_diagram)
                .patch(routes::update_diagram)
                .delete(routes::delete_diagram),
        );

    let router = collection_routes::<DBTable, TablePatch>(router);
    let router = collection_routes::<DBRelationship, RelationshipPatch>(router);
    let router = collection_routes::<DBDependency, DependencyPatch>(router);
    let router = collection_routes::<Area, AreaPatch>(router);
    let router = collection_routes::<DBCustomType, CustomTypePatch>(router);

    router
        .route(
            "/diagrams/{diagram_id}/tables",
            put(routes::put_record::<DBTable>),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(cors_origins))
        .with_state(AppState::new(storage))
}

/// Serve on an already bound listener, after making sure the config row
/// exists.
pub async fn serve(listener: TcpListener, storage: LocalStore, cors_origins: &[String]) -> anyhow::Result<()> {
    ensure_config(&storage).await?;
    let app = create_app(storage, cors_origins);
    axum::serve(listener, app).await?;
    Ok(())
}

pub async fn start_server(config: &ServerConfig) -> anyhow::Result<()> {
    ensure_db_dir(&config.database)?;
    let storage = open_service_storage(config.database.clone()).await?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;
    info!("Record service listening on {} (database {})", addr, config.database.display());
    println!("🌍 Server running at http://{}", addr);

    serve(listener, storage, &config.cors_origins).await
}
