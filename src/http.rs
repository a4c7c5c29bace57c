//! JSON HTTP surface.
//!
//! Public routes cover certificate verification and event listings; admin
//! routes (certificate/event CRUD and the bulk operations) live under
//! `/api/admin` behind a static bearer token. All failures are converted to
//! structured JSON error bodies at this boundary; nothing propagates as an
//! unhandled error. Handlers return fresh records after every mutation so
//! clients re-render from stored state rather than an assumed one.

use crate::db::{self, Pool};
use crate::error::OpError;
use crate::model::{Certificate, CertificatePatch, EventInput, EventType, NewCertificate};
use crate::ops::{BatchGenerateRequest, EditBuffer, Orchestrator};
use axum::extract::{Path, Query, Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::error;

#[derive(Clone)]
pub struct AppState {
    pub pool: Pool,
    pub ops: Arc<Orchestrator>,
    pub admin_token: Arc<String>,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Op(#[from] OpError),
    #[error("missing or invalid admin token")]
    Unauthorized,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                self.to_string(),
            ),
            AppError::Op(OpError::NotFound(_)) => {
                (StatusCode::NOT_FOUND, "not_found", self.to_string())
            }
            AppError::Op(OpError::Validation(_)) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "validation_error",
                self.to_string(),
            ),
            AppError::Op(OpError::EmptyCsv) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "no_data",
                self.to_string(),
            ),
            AppError::Op(OpError::NoValidRows) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "no_valid_rows",
                self.to_string(),
            ),
            AppError::Op(OpError::Storage(err)) => {
                error!(?err, "storage failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "storage_error",
                    "internal storage error".to_string(),
                )
            }
        };
        let body = Json(json!({ "error": { "code": code, "message": message } }));
        (status, body).into_response()
    }
}

/// Assemble the full application router: public verification and event
/// listing routes plus the token-gated admin routes.
pub fn app(state: AppState) -> Router {
    let admin = Router::new()
        .route(
            "/api/admin/certificates",
            get(list_certificates).post(create_certificate),
        )
        .route(
            "/api/admin/certificates/:id",
            put(update_certificate).delete(delete_certificate),
        )
        .route("/api/admin/certificates/bulk-edit", post(commit_bulk_edit))
        .route("/api/admin/batches", get(list_batches))
        .route("/api/admin/batches/generate", post(generate_batch))
        .route("/api/admin/batches/import", post(import_csv))
        .route("/api/admin/batches/:id", delete(undo_batch))
        .route("/api/admin/events", post(create_event))
        .route(
            "/api/admin/events/:id",
            put(update_event).delete(delete_event),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_admin,
        ));

    Router::new()
        .route("/api/verify/:id", get(verify_certificate))
        .route("/api/events", get(list_events))
        .merge(admin)
        .with_state(state)
}

async fn require_admin(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let authorized = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .is_some_and(|token| token == state.admin_token.as_str());
    if !authorized {
        return Err(AppError::Unauthorized);
    }
    Ok(next.run(req).await)
}

/// Public lookup backing the verification page. The path segment arrives
/// URL-decoded and is matched exactly, case-sensitively.
async fn verify_certificate(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Certificate>, AppError> {
    let cert = db::get_certificate(&state.pool, &id)
        .await?
        .ok_or_else(|| OpError::not_found(format!("certificate {id}")))?;
    Ok(Json(cert))
}

#[derive(Debug, Deserialize)]
struct EventsQuery {
    #[serde(rename = "type")]
    event_type: Option<String>,
}

async fn list_events(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> Result<Response, AppError> {
    let filter = match query.event_type.as_deref() {
        None => None,
        Some(raw) => Some(EventType::parse(raw).ok_or_else(|| {
            OpError::validation("type must be 'featured' or 'past'")
        })?),
    };
    let events = db::list_events(&state.pool, filter).await?;
    Ok(Json(events).into_response())
}

async fn list_certificates(State(state): State<AppState>) -> Result<Response, AppError> {
    let certs = db::list_certificates(&state.pool).await?;
    Ok(Json(certs).into_response())
}

async fn create_certificate(
    State(state): State<AppState>,
    Json(input): Json<NewCertificate>,
) -> Result<Response, AppError> {
    let cert = state.ops.create_certificate(input).await?;
    Ok((StatusCode::CREATED, Json(cert)).into_response())
}

async fn update_certificate(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<CertificatePatch>,
) -> Result<Json<Certificate>, AppError> {
    let cert = state.ops.update_certificate(&id, patch).await?;
    Ok(Json(cert))
}

async fn delete_certificate(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    db::delete_certificate(&state.pool, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn commit_bulk_edit(
    State(state): State<AppState>,
    Json(edits): Json<HashMap<String, CertificatePatch>>,
) -> Result<Response, AppError> {
    let updated = state.ops.commit_edits(EditBuffer::from(edits)).await?;
    Ok(Json(json!({ "updated": updated })).into_response())
}

async fn list_batches(State(state): State<AppState>) -> Result<Response, AppError> {
    let batches = state.ops.ledger().list_recent().await?;
    Ok(Json(batches).into_response())
}

async fn generate_batch(
    State(state): State<AppState>,
    Json(req): Json<BatchGenerateRequest>,
) -> Result<Response, AppError> {
    let outcome = state.ops.batch_generate(&req).await?;
    Ok((StatusCode::CREATED, Json(outcome)).into_response())
}

#[derive(Debug, Deserialize)]
struct ImportQuery {
    filename: Option<String>,
}

/// Body is the raw CSV text; the upload's original filename rides along as a
/// query parameter for the ledger description.
async fn import_csv(
    State(state): State<AppState>,
    Query(query): Query<ImportQuery>,
    body: String,
) -> Result<Response, AppError> {
    let filename = query.filename.as_deref().unwrap_or("upload.csv");
    let outcome = state.ops.import_csv(&body, filename).await?;
    Ok((StatusCode::CREATED, Json(outcome)).into_response())
}

async fn undo_batch(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let deleted = state.ops.undo_batch(&id).await?;
    Ok(Json(json!({ "deleted": deleted })).into_response())
}

async fn create_event(
    State(state): State<AppState>,
    Json(input): Json<EventInput>,
) -> Result<Response, AppError> {
    if input.title.trim().is_empty() {
        return Err(OpError::validation("event title must be non-empty").into());
    }
    let id = db::insert_event(&state.pool, &input).await?;
    let event = db::get_event(&state.pool, &id)
        .await?
        .ok_or_else(|| OpError::not_found(format!("event {id}")))?;
    Ok((StatusCode::CREATED, Json(event)).into_response())
}

async fn update_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<EventInput>,
) -> Result<Response, AppError> {
    db::update_event(&state.pool, &id, &input).await?;
    let event = db::get_event(&state.pool, &id)
        .await?
        .ok_or_else(|| OpError::not_found(format!("event {id}")))?;
    Ok(Json(event).into_response())
}

async fn delete_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    db::delete_event(&state.pool, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}
