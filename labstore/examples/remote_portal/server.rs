// HTTP front for a MemoryRemote, standing in for the hosted document store.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use labstore::{BatchError, Document, MemoryRemote, Query, RecordKind, Rejection, RemoteError, RemoteStore};
use serde::{Deserialize, Serialize};

/// Error payload shared with the client.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    /// Patches persisted before a batch failed.
    pub applied: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AvailabilityRequest {
    pub available: bool,
}

pub fn create_router(store: MemoryRemote) -> Router {
    Router::new()
        .route("/admin/availability", post(availability_handler))
        .route("/:collection", post(add_handler))
        .route("/:collection/query", post(list_handler))
        .route("/:collection/batch", post(batch_handler))
        .route(
            "/:collection/:id",
            get(get_handler).patch(update_handler).delete(delete_handler),
        )
        .with_state(store)
}

fn parse_kind(collection: &str) -> Result<RecordKind, Response> {
    RecordKind::ALL
        .into_iter()
        .find(|kind| kind.collection() == collection)
        .ok_or_else(|| {
            error_response(
                StatusCode::NOT_FOUND,
                "unknown_collection",
                format!("no collection named {collection}"),
                None,
            )
        })
}

fn error_response(
    status: StatusCode,
    code: &str,
    message: String,
    applied: Option<usize>,
) -> Response {
    let body = ErrorBody {
        code: code.to_string(),
        message,
        applied,
    };
    (status, Json(body)).into_response()
}

fn remote_error(error: RemoteError, applied: Option<usize>) -> Response {
    let (status, code, message) = match error {
        RemoteError::Unavailable(reason) => (StatusCode::SERVICE_UNAVAILABLE, "unavailable", reason),
        RemoteError::NotFound { id, .. } => (StatusCode::NOT_FOUND, "not_found", id),
        RemoteError::Rejected(Rejection::DuplicateId(id)) => (StatusCode::CONFLICT, "duplicate_id", id),
        RemoteError::Rejected(Rejection::Invalid(reason)) => {
            (StatusCode::UNPROCESSABLE_ENTITY, "invalid", reason)
        }
        RemoteError::Rejected(Rejection::PermissionDenied(reason)) => {
            (StatusCode::FORBIDDEN, "permission_denied", reason)
        }
    };
    error_response(status, code, message, applied)
}

async fn availability_handler(
    State(store): State<MemoryRemote>,
    Json(request): Json<AvailabilityRequest>,
) -> StatusCode {
    store.set_available(request.available);
    StatusCode::NO_CONTENT
}

async fn add_handler(
    State(store): State<MemoryRemote>,
    Path(collection): Path<String>,
    Json(document): Json<Document>,
) -> Response {
    let kind = match parse_kind(&collection) {
        Ok(kind) => kind,
        Err(response) => return response,
    };
    match store.add(kind, document).await {
        Ok(()) => StatusCode::CREATED.into_response(),
        Err(e) => remote_error(e, None),
    }
}

async fn get_handler(
    State(store): State<MemoryRemote>,
    Path((collection, id)): Path<(String, String)>,
) -> Response {
    let kind = match parse_kind(&collection) {
        Ok(kind) => kind,
        Err(response) => return response,
    };
    match store.get(kind, &id).await {
        Ok(document) => Json(document).into_response(),
        Err(e) => remote_error(e, None),
    }
}

async fn update_handler(
    State(store): State<MemoryRemote>,
    Path((collection, id)): Path<(String, String)>,
    Json(patch): Json<Document>,
) -> Response {
    let kind = match parse_kind(&collection) {
        Ok(kind) => kind,
        Err(response) => return response,
    };
    match store.update(kind, &id, patch).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => remote_error(e, None),
    }
}

async fn delete_handler(
    State(store): State<MemoryRemote>,
    Path((collection, id)): Path<(String, String)>,
) -> Response {
    let kind = match parse_kind(&collection) {
        Ok(kind) => kind,
        Err(response) => return response,
    };
    match store.delete(kind, &id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => remote_error(e, None),
    }
}

async fn list_handler(
    State(store): State<MemoryRemote>,
    Path(collection): Path<String>,
    Json(query): Json<Query>,
) -> Response {
    let kind = match parse_kind(&collection) {
        Ok(kind) => kind,
        Err(response) => return response,
    };
    match store.list(kind, &query).await {
        Ok(documents) => Json(documents).into_response(),
        Err(e) => remote_error(e, None),
    }
}

async fn batch_handler(
    State(store): State<MemoryRemote>,
    Path(collection): Path<String>,
    Json(patches): Json<Vec<(String, Document)>>,
) -> Response {
    let kind = match parse_kind(&collection) {
        Ok(kind) => kind,
        Err(response) => return response,
    };
    match store.update_batch(kind, patches).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(BatchError { applied, error }) => remote_error(error, Some(applied)),
    }
}
