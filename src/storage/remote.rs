//! Remote backend
//!
//! Speaks to the chartstore record service over HTTP. Request bodies carry
//! timestamps in the service's wire form (`YYYY-MM-DD HH:MM:SS`); responses
//! are accepted in either form.

use async_trait::async_trait;
use reqwest::{Client, Method, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use super::records::Record;
use super::DiagramStorage;
use crate::model::{
    timestamp, Area, AreaPatch, Config, ConfigPatch, CustomTypePatch, DBCustomType,
    DBDependency, DBRelationship, DBTable, DependencyPatch, Diagram, DiagramFilter,
    DiagramIncludes, DiagramPatch, RelationshipPatch, TablePatch, Validate,
};
use crate::{Error, Result};

/// Attributes rewritten to wire form on the way out.
const TIMESTAMP_KEYS: &[&str] = &["createdAt", "updatedAt"];

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Clone)]
pub struct RemoteStore {
    client: Client,
    base_url: String,
}

impl RemoteStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build a URL from path segments; each segment is percent-encoded.
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let invalid = |reason: String| {
            Error::Validation(format!("Invalid API base URL {}: {}", self.base_url, reason))
        };
        let mut url = Url::parse(&self.base_url).map_err(|e| invalid(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| invalid("cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn url_with_includes(&self, segments: &[&str], includes: DiagramIncludes) -> Result<Url> {
        let mut url = self.url(segments)?;
        let pairs = includes.query_pairs();
        if !pairs.is_empty() {
            url.query_pairs_mut().extend_pairs(pairs);
        }
        Ok(url)
    }

    async fn send(&self, method: Method, url: Url, body: Option<Value>) -> Result<Response> {
        let operation = format!("{} {}", method, url);
        debug!("{}", operation);

        let mut request = self.client.request(method, url);
        if let Some(body) = body {
            request = request.json(&body);
        }
        request
            .send()
            .await
            .map_err(|source| Error::Transport { operation, source })
    }

    /// GET a single resource. A 404, an empty body, `null` or `{}` all mean
    /// absent.
    async fn fetch<T: DeserializeOwned>(&self, url: Url) -> Result<Option<T>> {
        let response = self.send(Method::GET, url, None).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = check(response).await?;
        let operation = format!("read {}", response.url());
        let raw = response
            .text()
            .await
            .map_err(|source| Error::Transport { operation, source })?;
        if raw.trim().is_empty() {
            return Ok(None);
        }
        match serde_json::from_str::<Value>(&raw)? {
            Value::Null => Ok(None),
            Value::Object(map) if map.is_empty() => Ok(None),
            value => Ok(Some(serde_json::from_value(value)?)),
        }
    }

    async fn fetch_list<T: DeserializeOwned>(&self, url: Url) -> Result<Vec<T>> {
        let response = self.send(Method::GET, url, None).await?;
        decode(check(response).await?).await
    }

    /// Send a write and expect an empty success.
    async fn execute(&self, method: Method, url: Url, body: Option<Value>) -> Result<()> {
        let response = self.send(method, url, body).await?;
        check(response).await?;
        Ok(())
    }

    // ========== Child collection helpers ==========

    async fn create<R: Record + WireForm + Validate>(&self, diagram_id: &str, record: &R) -> Result<()> {
        record.validate()?;
        let url = self.url(&["diagrams", diagram_id, R::PATH])?;
        let body = envelope(R::BODY_KEY, wire_body(record)?);
        self.execute(Method::POST, url, Some(body)).await
    }

    async fn get_child<R: Record + DeserializeOwned>(&self, diagram_id: &str, id: &str) -> Result<Option<R>> {
        self.fetch(self.url(&["diagrams", diagram_id, R::PATH, id])?).await
    }

    async fn patch_child<R: Record, P: WireForm>(&self, id: &str, patch: &P) -> Result<()> {
        let url = self.url(&[R::PATH, id])?;
        let body = envelope("attributes", wire_body(patch)?);
        self.execute(Method::PATCH, url, Some(body)).await
    }

    async fn delete_child<R: Record>(&self, diagram_id: &str, id: &str) -> Result<()> {
        let url = self.url(&["diagrams", diagram_id, R::PATH, id])?;
        self.execute(Method::DELETE, url, None).await
    }

    async fn list_children<R: Record + DeserializeOwned>(&self, diagram_id: &str) -> Result<Vec<R>> {
        self.fetch_list(self.url(&["diagrams", diagram_id, R::PATH])?).await
    }

    async fn delete_children<R: Record>(&self, diagram_id: &str) -> Result<()> {
        let url = self.url(&["diagrams", diagram_id, R::PATH])?;
        self.execute(Method::DELETE, url, None).await
    }

    /// The service's health document.
    pub async fn health(&self) -> Result<Value> {
        let response = self.send(Method::GET, self.url(&["health"])?, None).await?;
        decode(check(response).await?).await
    }
}

/// Pass successes through; turn failures into the error taxonomy.
async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let url = response.url().to_string();
    let raw = response.text().await.map_err(|source| Error::Transport {
        operation: format!("read {} response from {}", status.as_u16(), url),
        source,
    })?;
    let message = serde_json::from_str::<ErrorBody>(&raw)
        .map(|body| body.error)
        .unwrap_or(raw);

    match status {
        StatusCode::BAD_REQUEST => Err(Error::Validation(message)),
        StatusCode::NOT_FOUND => Err(Error::NotFound(message)),
        _ => Err(Error::Remote {
            status: status.as_u16(),
            url,
            message,
        }),
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let operation = format!("decode {}", response.url());
    response
        .json::<T>()
        .await
        .map_err(|source| Error::Transport { operation, source })
}

fn envelope(key: &str, value: Value) -> Value {
    let mut body = Map::new();
    body.insert(key.to_string(), value);
    Value::Object(body)
}

/// Which attributes of a request body carry timestamps.
///
/// Only the entity's own timestamps and those of directly nested child
/// entities are rewritten. Field and index attributes are opaque and go out
/// untouched.
pub(crate) trait WireForm: Serialize {
    const TIMESTAMPS: &'static [&'static str] = &[];
    /// Attributes holding arrays of child entities.
    const CHILDREN: &'static [&'static str] = &[];
}

const CREATED: &[&str] = &["createdAt"];

impl WireForm for Diagram {
    const TIMESTAMPS: &'static [&'static str] = TIMESTAMP_KEYS;
    const CHILDREN: &'static [&'static str] =
        &["tables", "relationships", "dependencies", "areas", "customTypes"];
}
impl WireForm for DiagramPatch {
    const TIMESTAMPS: &'static [&'static str] = TIMESTAMP_KEYS;
}
impl WireForm for DBTable {
    const TIMESTAMPS: &'static [&'static str] = CREATED;
}
impl WireForm for TablePatch {
    const TIMESTAMPS: &'static [&'static str] = CREATED;
}
impl WireForm for DBRelationship {
    const TIMESTAMPS: &'static [&'static str] = CREATED;
}
impl WireForm for RelationshipPatch {
    const TIMESTAMPS: &'static [&'static str] = CREATED;
}
impl WireForm for DBDependency {
    const TIMESTAMPS: &'static [&'static str] = CREATED;
}
impl WireForm for DependencyPatch {
    const TIMESTAMPS: &'static [&'static str] = CREATED;
}
impl WireForm for Area {}
impl WireForm for AreaPatch {}
impl WireForm for DBCustomType {}
impl WireForm for CustomTypePatch {}

/// Serialize `value` with its timestamps in wire form.
pub(crate) fn wire_body<T: WireForm>(value: &T) -> Result<Value> {
    let mut value = serde_json::to_value(value)?;
    if let Value::Object(map) = &mut value {
        rewrite_timestamps(map, T::TIMESTAMPS);
        for key in T::CHILDREN {
            if let Some(Value::Array(children)) = map.get_mut(*key) {
                for child in children.iter_mut() {
                    if let Value::Object(child) = child {
                        rewrite_timestamps(child, TIMESTAMP_KEYS);
                    }
                }
            }
        }
    }
    Ok(value)
}

fn rewrite_timestamps(map: &mut Map<String, Value>, keys: &[&str]) {
    for key in keys {
        if let Some(Value::String(raw)) = map.get_mut(*key) {
            if let Ok(parsed) = timestamp::parse(raw) {
                *raw = timestamp::to_wire(&parsed);
            }
        }
    }
}

#[async_trait]
impl DiagramStorage for RemoteStore {
    fn backend(&self) -> &'static str {
        "remote"
    }

    // ========== Config ==========

    async fn get_config(&self) -> Result<Option<Config>> {
        self.fetch(self.url(&["config"])?).await
    }

    async fn update_config(&self, patch: ConfigPatch) -> Result<()> {
        if self.get_config().await?.is_none() {
            return Err(Error::NotFound("config".to_string()));
        }
        if patch.default_diagram_id.is_none() {
            return Ok(());
        }
        let url = self.url(&["config"])?;
        self.execute(Method::PUT, url, Some(serde_json::to_value(&patch)?))
            .await
    }

    async fn initialize_config(&self, default_diagram_id: &str) -> Result<Config> {
        let url = self.url(&["config"])?;
        let body = serde_json::to_value(ConfigPatch::default_diagram(default_diagram_id))?;
        self.execute(Method::PUT, url, Some(body)).await?;
        Ok(Config::new(default_diagram_id))
    }

    // ========== Diagram filters ==========

    async fn get_diagram_filter(&self, diagram_id: &str) -> Result<Option<DiagramFilter>> {
        self.fetch(self.url(&["diagram-filters", diagram_id])?).await
    }

    async fn put_diagram_filter(&self, diagram_id: &str, filter: DiagramFilter) -> Result<()> {
        let url = self.url(&["diagram-filters", diagram_id])?;
        self.execute(Method::PUT, url, Some(serde_json::to_value(&filter)?))
            .await
    }

    async fn delete_diagram_filter(&self, diagram_id: &str) -> Result<()> {
        let url = self.url(&["diagram-filters", diagram_id])?;
        self.execute(Method::DELETE, url, None).await
    }

    // ========== Diagrams ==========

    async fn add_diagram(&self, diagram: Diagram) -> Result<()> {
        diagram.validate()?;
        let url = self.url(&["diagrams"])?;
        let body = envelope("diagram", wire_body(&diagram)?);
        self.execute(Method::POST, url, Some(body)).await
    }

    async fn list_diagrams(&self, includes: DiagramIncludes) -> Result<Vec<Diagram>> {
        self.fetch_list(self.url_with_includes(&["diagrams"], includes)?)
            .await
    }

    async fn get_diagram(&self, id: &str, includes: DiagramIncludes) -> Result<Option<Diagram>> {
        self.fetch(self.url_with_includes(&["diagrams", id], includes)?)
            .await
    }

    async fn update_diagram(&self, id: &str, patch: DiagramPatch) -> Result<()> {
        let url = self.url(&["diagrams", id])?;
        let body = envelope("attributes", wire_body(&patch)?);
        self.execute(Method::PATCH, url, Some(body)).await
    }

    async fn delete_diagram(&self, id: &str) -> Result<()> {
        let url = self.url(&["diagrams", id])?;
        self.execute(Method::DELETE, url, None).await
    }

    // ========== Tables ==========

    async fn add_table(&self, diagram_id: &str, table: DBTable) -> Result<()> {
        self.create(diagram_id, &table).await
    }

    async fn get_table(&self, diagram_id: &str, id: &str) -> Result<Option<DBTable>> {
        self.get_child(diagram_id, id).await
    }

    async fn update_table(&self, id: &str, patch: TablePatch) -> Result<()> {
        self.patch_child::<DBTable, _>(id, &patch).await
    }

    async fn put_table(&self, diagram_id: &str, table: DBTable) -> Result<()> {
        table.validate()?;
        let url = self.url(&["diagrams", diagram_id, DBTable::PATH])?;
        let body = envelope(DBTable::BODY_KEY, wire_body(&table)?);
        self.execute(Method::PUT, url, Some(body)).await
    }

    async fn delete_table(&self, diagram_id: &str, id: &str) -> Result<()> {
        self.delete_child::<DBTable>(diagram_id, id).await
    }

    async fn list_tables(&self, diagram_id: &str) -> Result<Vec<DBTable>> {
        self.list_children(diagram_id).await
    }

    async fn delete_diagram_tables(&self, diagram_id: &str) -> Result<()> {
        self.delete_children::<DBTable>(diagram_id).await
    }

    // ========== Relationships ==========

    async fn add_relationship(&self, diagram_id: &str, relationship: DBRelationship) -> Result<()> {
        self.create(diagram_id, &relationship).await
    }

    async fn get_relationship(&self, diagram_id: &str, id: &str) -> Result<Option<DBRelationship>> {
        self.get_child(diagram_id, id).await
    }

    async fn update_relationship(&self, id: &str, patch: RelationshipPatch) -> Result<()> {
        self.patch_child::<DBRelationship, _>(id, &patch).await
    }

    async fn delete_relationship(&self, diagram_id: &str, id: &str) -> Result<()> {
        self.delete_child::<DBRelationship>(diagram_id, id).await
    }

    async fn list_relationships(&self, diagram_id: &str) -> Result<Vec<DBRelationship>> {
        self.list_children(diagram_id).await
    }

    async fn delete_diagram_relationships(&self, diagram_id: &str) -> Result<()> {
        self.delete_children::<DBRelationship>(diagram_id).await
    }

    // ========== Dependencies ==========

    async fn add_dependency(&self, diagram_id: &str, dependency: DBDependency) -> Result<()> {
        self.create(diagram_id, &dependency).await
    }

    async fn get_dependency(&self, diagram_id: &str, id: &str) -> Result<Option<DBDependency>> {
        self.get_child(diagram_id, id).await
    }

    async fn update_dependency(&self, id: &str, patch: DependencyPatch) -> Result<()> {
        self.patch_child::<DBDependency, _>(id, &patch).await
    }

    async fn delete_dependency(&self, diagram_id: &str, id: &str) -> Result<()> {
        self.delete_child::<DBDependency>(diagram_id, id).await
    }

    async fn list_dependencies(&self, diagram_id: &str) -> Result<Vec<DBDependency>> {
        self.list_children(diagram_id).await
    }

    async fn delete_diagram_dependencies(&self, diagram_id: &str) -> Result<()> {
        self.delete_children::<DBDependency>(diagram_id).await
    }

    // ========== Areas ==========

    async fn add_area(&self, diagram_id: &str, area: Area) -> Result<()> {
        self.create(diagram_id, &area).await
    }

    async fn get_area(&self, diagram_id: &str, id: &str) -> Result<Option<Area>> {
        self.get_child(diagram_id, id).await
    }

    async fn update_area(&self, id: &str, patch: AreaPatch) -> Result<()> {
        self.patch_child::<Area, _>(id, &patch).await
    }

    async fn delete_area(&self, diagram_id: &str, id: &str) -> Result<()> {
        self.delete_child::<Area>(diagram_id, id).await
    }

    async fn list_areas(&self, diagram_id: &str) -> Result<Vec<Area>> {
        self.list_children(diagram_id).await
    }

    async fn delete_diagram_areas(&self, diagram_id: &str) -> Result<()> {
        self.delete_children::<Area>(diagram_id).await
    }

    // ========== Custom types ==========

    async fn add_custom_type(&self, diagram_id: &str, custom_type: DBCustomType) -> Result<()> {
        self.create(diagram_id, &custom_type).await
    }

    async fn get_custom_type(&self, diagram_id: &str, id: &str) -> Result<Option<DBCustomType>> {
        self.get_child(diagram_id, id).await
    }

    async fn update_custom_type(&self, id: &str, patch: CustomTypePatch) -> Result<()> {
        self.patch_child::<DBCustomType, _>(id, &patch).await
    }

    async fn delete_custom_type(&self, diagram_id: &str, id: &str) -> Result<()> {
        self.delete_child::<DBCustomType>(diagram_id, id).await
    }

    async fn list_custom_types(&self, diagram_id: &str) -> Result<Vec<DBCustomType>> {
        self.list_children(diagram_id).await
    }

    async fn delete_diagram_custom_types(&self, diagram_id: &str) -> Result<()> {
        self.delete_children::<DBCustomType>(diagram_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DBField, DBIndex};
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_wire_body_rewrites_entity_and_child_timestamps() {
        let mut diagram = Diagram::new("d1", "Shop", "postgres");
        diagram.created_at = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        let mut table = DBTable::new("t1", "users");
        table.created_at = Utc.with_ymd_and_hms(2024, 3, 10, 0, 0, 1).unwrap();
        let mut field = DBField::new("f1", "id", "int");
        field.extra.insert("createdAt".to_string(), Value::from(1700000000000_i64));
        table.fields.push(field);
        diagram.tables = Some(vec![table]);

        let body = wire_body(&diagram).unwrap();
        assert_eq!(body["createdAt"], "2024-03-09 14:05:07");
        assert_eq!(body["tables"][0]["createdAt"], "2024-03-10 00:00:01");
        assert_eq!(body["tables"][0]["fields"][0]["createdAt"], 1700000000000_i64);
    }

    #[test]
    fn test_wire_body_leaves_field_and_index_attributes_alone() {
        let stamp = "2024-03-09T14:05:07.250Z";
        let mut field = DBField::new("f1", "id", "uuid");
        field.extra.insert("createdAt".to_string(), Value::from(stamp));
        let index = DBIndex {
            id: "i1".to_string(),
            name: "users_id".to_string(),
            unique: true,
            field_ids: vec!["f1".to_string()],
            extra: [("updatedAt".to_string(), Value::from(stamp))].into_iter().collect(),
        };
        let mut table = DBTable::new("t1", "users");
        table.fields.push(field);
        table.indexes.push(index);

        let body = wire_body(&table).unwrap();
        assert_eq!(body["fields"][0]["createdAt"], stamp);
        assert_eq!(body["indexes"][0]["updatedAt"], stamp);

        let mut diagram = Diagram::new("d1", "Shop", "postgres");
        diagram.tables = Some(vec![table]);
        let body = wire_body(&diagram).unwrap();
        assert_eq!(body["tables"][0]["fields"][0]["createdAt"], stamp);
        assert_eq!(body["tables"][0]["indexes"][0]["updatedAt"], stamp);
    }

    #[test]
    fn test_patch_body_keeps_only_set_attributes() {
        let body = wire_body(&DiagramPatch::move_to("d2")).unwrap();
        assert_eq!(body, serde_json::json!({"id": "d2"}));
    }

    #[test]
    fn test_url_encodes_segments() {
        let store = RemoteStore::new("http://localhost:3000/api/");
        let url = store.url(&["diagrams", "a b/c", "tables"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:3000/api/diagrams/a%20b%2Fc/tables");

        let includes = DiagramIncludes {
            include_areas: true,
            ..DiagramIncludes::default()
        };
        let url = store.url_with_includes(&["diagrams"], includes).unwrap();
        assert_eq!(url.as_str(), "http://localhost:3000/api/diagrams?includeAreas=true");
        let url = store
            .url_with_includes(&["diagrams"], DiagramIncludes::default())
            .unwrap();
        assert_eq!(url.query(), None);
    }

    #[test]
    fn test_invalid_base_url_is_validation_error() {
        let store = RemoteStore::new("not a url");
        assert!(store.url(&["config"]).unwrap_err().is_validation());
    }

    #[tokio::test]
    async fn test_truncated_error_body_is_transport_error() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 1024];
            let _ = socket.read(&mut request).await;
            let _ = socket
                .write_all(b"HTTP/1.1 500 Internal Server Error\r\ncontent-length: 64\r\n\r\n{\"error\"")
                .await;
        });

        let store = RemoteStore::new(format!("http://{}", addr));
        match store.get_config().await {
            Err(Error::Transport { operation, .. }) => {
                assert!(operation.starts_with("read 500 response from"), "{}", operation);
            }
            other => panic!("expected transport error, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_unreachable_service_is_transport_error() {
        let store = RemoteStore::new("http://127.0.0.1:9");
        match store.get_config().await {
            Err(Error::Transport { operation, .. }) => {
                assert_eq!(operation, "GET http://127.0.0.1:9/config");
            }
            other => panic!("expected transport error, got {:?}", other.map(|_| ())),
        }
    }
}
