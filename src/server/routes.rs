use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::error;

use crate::model::{Config, ConfigPatch, Diagram, DiagramFilter, DiagramIncludes, DiagramPatch, Validate};
use crate::server::AppState;
use crate::storage::records::{Patch, Record};
use crate::storage::DiagramStorage;
use crate::Error;

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Handler failure, rendered as `{error}` with the matching status.
#[derive(Debug)]
pub struct ApiError(Error);

pub type ApiResult<T> = std::result::Result<T, ApiError>;

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(Error::Validation(rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self(Error::Validation(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self.0 {
            Error::Validation(message) => (StatusCode::BAD_REQUEST, message),
            Error::NotFound(message) => (StatusCode::NOT_FOUND, message),
            other => {
                error!("Request failed: {}", other);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

/// A request body. A request without a JSON content type reads as `{}`.
fn read_body(body: Result<Json<Value>, JsonRejection>) -> ApiResult<Value> {
    match body {
        Ok(Json(value)) => Ok(value),
        Err(JsonRejection::MissingJsonContentType(_)) => Ok(Value::Object(Default::default())),
        Err(rejection) => Err(rejection.into()),
    }
}

/// The object stored under `key` in a request body.
fn unwrap_body<T: DeserializeOwned>(body: Value, key: &str, missing: &str) -> ApiResult<T> {
    match body.get(key) {
        Some(value @ Value::Object(_)) => serde_json::from_value(value.clone())
            .map_err(|e| Error::Validation(e.to_string()).into()),
        _ => Err(Error::Validation(missing.to_string()).into()),
    }
}

fn entity_body<T: DeserializeOwned>(body: Value, key: &str) -> ApiResult<T> {
    unwrap_body(body, key, &format!("Invalid or missing {} object", key))
}

fn attributes_body<T: DeserializeOwned>(body: Value) -> ApiResult<T> {
    unwrap_body(body, "attributes", "Invalid or missing attributes")
}

fn not_found(noun: &str) -> ApiError {
    let mut message = noun.to_string();
    if let Some(first) = message.get_mut(..1) {
        first.make_ascii_uppercase();
    }
    Error::NotFound(format!("{} not found", message)).into()
}

// ========== Health ==========

pub async fn health(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    state.store().run("ping", |s| s.ping()).await?;
    Ok(Json(serde_json::json!({
        "status": "healthy",
        "service": "chartstore",
        "version": env!("CARGO_PKG_VERSION"),
    })))
}

// ========== Config ==========

/// The singleton, or `null` before bootstrap.
pub async fn get_config(State(state): State<AppState>) -> ApiResult<Json<Option<Config>>> {
    Ok(Json(state.storage.get_config().await?))
}

pub async fn put_config(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<StatusCode> {
    let patch: ConfigPatch = serde_json::from_value(read_body(body)?)
        .map_err(|e| Error::Validation(e.to_string()))?;
    let default_diagram_id = patch
        .default_diagram_id
        .ok_or_else(|| Error::Validation("Missing defaultDiagramId".to_string()))?;
    state
        .store()
        .run("upsert_config", move |s| s.upsert_config(&default_diagram_id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// ========== Diagram filters ==========

pub async fn get_filter(
    State(state): State<AppState>,
    Path(diagram_id): Path<String>,
) -> ApiResult<Json<DiagramFilter>> {
    state
        .storage
        .get_diagram_filter(&diagram_id)
        .await?
        .map(Json)
        .ok_or_else(|| not_found("diagram filter"))
}

pub async fn put_filter(
    State(state): State<AppState>,
    Path(diagram_id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<StatusCode> {
    let mut filter: DiagramFilter = serde_json::from_value(read_body(body)?)
        .map_err(|e| Error::Validation(e.to_string()))?;
    filter.diagram_id = diagram_id.clone();
    state.storage.put_diagram_filter(&diagram_id, filter).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_filter(
    State(state): State<AppState>,
    Path(diagram_id): Path<String>,
) -> ApiResult<StatusCode> {
    state.storage.delete_diagram_filter(&diagram_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ========== Diagrams ==========

pub async fn create_diagram(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<StatusCode> {
    let diagram: Diagram = entity_body(read_body(body)?, "diagram")?;
    state.storage.add_diagram(diagram).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_diagrams(
    State(state): State<AppState>,
    includes: Result<Query<DiagramIncludes>, QueryRejection>,
) -> ApiResult<Json<Vec<Diagram>>> {
    let Query(includes) = includes?;
    Ok(Json(state.storage.list_diagrams(includes).await?))
}

pub async fn get_diagram(
    State(state): State<AppState>,
    Path(diagram_id): Path<String>,
    includes: Result<Query<DiagramIncludes>, QueryRejection>,
) -> ApiResult<Json<Diagram>> {
    let Query(includes) = includes?;
    state
        .storage
        .get_diagram(&diagram_id, includes)
        .await?
        .map(Json)
        .ok_or_else(|| not_found("diagram"))
}

/// Patch a diagram. A new id re-points the children collection by
/// collection, without a surrounding transaction.
pub async fn update_diagram(
    State(state): State<AppState>,
    Path(diagram_id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<StatusCode> {
    let patch: DiagramPatch = attributes_body(read_body(body)?)?;
    state.storage.update_diagram(&diagram_id, patch).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Delete a diagram and everything it owns in one transaction.
pub async fn delete_diagram(
    State(state): State<AppState>,
    Path(diagram_id): Path<String>,
) -> ApiResult<StatusCode> {
    state
        .store()
        .run("delete_diagram_cascade", move |s| s.delete_diagram_cascade(&diagram_id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// ========== Child collections ==========
//
// One generic handler set, instantiated per collection in `create_app`.

pub async fn create_record<R>(
    State(state): State<AppState>,
    Path(diagram_id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<StatusCode>
where
    R: Record + DeserializeOwned + Validate,
{
    let record: R = entity_body(read_body(body)?, R::BODY_KEY)?;
    record.validate()?;
    state
        .store()
        .run("add_record", move |s| s.add_record(&diagram_id, &record))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn put_record<R>(
    State(state): State<AppState>,
    Path(diagram_id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<StatusCode>
where
    R: Record + DeserializeOwned + Validate,
{
    let record: R = entity_body(read_body(body)?, R::BODY_KEY)?;
    record.validate()?;
    state
        .store()
        .run("put_record", move |s| s.put_record(&diagram_id, &record))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_record<R>(
    State(state): State<AppState>,
    Path((diagram_id, id)): Path<(String, String)>,
) -> ApiResult<Json<R>>
where
    R: Record + Serialize,
{
    state
        .store()
        .run("get_record", move |s| s.get_record::<R>(&diagram_id, &id))
        .await?
        .map(Json)
        .ok_or_else(|| not_found(R::NOUN))
}

pub async fn list_records<R>(
    State(state): State<AppState>,
    Path(diagram_id): Path<String>,
) -> ApiResult<Json<Vec<R>>>
where
    R: Record + Serialize,
{
    let records = state
        .store()
        .run("list_records", move |s| s.list_records::<R>(&diagram_id))
        .await?;
    Ok(Json(records))
}

pub async fn update_record<P>(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<StatusCode>
where
    P: Patch + DeserializeOwned,
{
    let patch: P = attributes_body(read_body(body)?)?;
    state
        .store()
        .run("update_record", move |s| s.update_record(&id, &patch))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_record<R: Record>(
    State(state): State<AppState>,
    Path((diagram_id, id)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    state
        .store()
        .run("delete_record", move |s| s.delete_record::<R>(&diagram_id, &id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_records<R: Record>(
    State(state): State<AppState>,
    Path(diagram_id): Path<String>,
) -> ApiResult<StatusCode> {
    state
        .store()
        .run("delete_records", move |s| s.delete_records::<R>(&diagram_id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_not_found_message_is_capitalized() {
        let ApiError(err) = not_found("custom type");
        assert_eq!(err.to_string(), "Not found: Custom type not found");
    }

    #[test]
    fn test_unwrap_body_requires_object() {
        let missing: ApiResult<Diagram> = entity_body(json!({"diagram": "d1"}), "diagram");
        match missing {
            Err(ApiError(Error::Validation(message))) => {
                assert_eq!(message, "Invalid or missing diagram object");
            }
            other => panic!("unexpected: {:?}", other.map(|_| ())),
        }

        let patch: DiagramPatch = attributes_body(json!({"attributes": {"name": "Renamed"}})).unwrap();
        assert_eq!(patch, DiagramPatch::rename("Renamed"));
    }

    #[test]
    fn test_internal_errors_are_masked() {
        let response = ApiError(Error::Task("boom".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let response = ApiError(Error::Validation("bad".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
