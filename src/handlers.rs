//! HTTP endpoints of the provider CRM.
//!
//! The CRM router is mounted twice, under `/crm` and `/api`, so the dashboard and
//! scripted clients share the same handlers. Every response is JSON.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{Method, StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::cors;
use tracing::instrument;

use crate::crm::types::{CrmCreateRequest, CrmEntry, CrmUpdateRequest, VerificationHistoryEntry};
use crate::crm::{CrmService, UpdateOutcome};
use crate::error::{CrmError, ErrorResponse};

type AppState = Arc<CrmService>;

#[derive(Debug, Serialize)]
struct EntriesResponse {
    entries: Vec<CrmEntry>,
    total: usize,
}

#[derive(Debug, Serialize)]
struct HistoryResponse {
    provider_id: String,
    history: Vec<VerificationHistoryEntry>,
}

/// Full router: CRM routes under `/crm` and `/api`, `/health`, and a JSON 404 fallback.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(get_health))
        .nest("/crm", crm_routes())
        .nest("/api", crm_routes())
        .fallback(not_found)
}

fn crm_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_entries).post(create_provider))
        .route("/leads", get(list_leads))
        .route("/stats", get(get_stats))
        .route(
            "/{provider_id}",
            get(get_provider)
                .put(update_provider)
                .delete(delete_provider),
        )
        .route("/{provider_id}/history", get(get_history))
        .route("/{provider_id}/verify", post(verify_provider))
}

/// Cross-origin policy for browser dashboards.
pub fn cors_layer() -> cors::CorsLayer {
    cors::CorsLayer::new()
        .allow_origin(cors::Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE])
}

/// `GET /health`
#[instrument(skip_all)]
pub async fn get_health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: "Not found".to_string(),
            message: None,
        }),
    )
}

/// `GET /crm`: every provider in the sbtc-appleseed entry format.
#[instrument(skip_all)]
pub async fn list_entries(State(crm): State<AppState>) -> Result<impl IntoResponse, CrmError> {
    let entries = crm.list_entries().await?;
    Ok(Json(EntriesResponse {
        total: entries.len(),
        entries,
    }))
}

/// `POST /crm`
#[instrument(skip_all)]
pub async fn create_provider(
    State(crm): State<AppState>,
    body: Result<Json<CrmCreateRequest>, JsonRejection>,
) -> Result<impl IntoResponse, CrmError> {
    let Json(body) = body?;
    let provider_id = crm.create(body).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({"success": true, "provider_id": provider_id})),
    ))
}

/// `GET /crm/leads`: providers in the dashboard's lead format.
#[instrument(skip_all)]
pub async fn list_leads(State(crm): State<AppState>) -> Result<impl IntoResponse, CrmError> {
    Ok(Json(crm.list_leads().await?))
}

/// `GET /crm/stats`
#[instrument(skip_all)]
pub async fn get_stats(State(crm): State<AppState>) -> Result<impl IntoResponse, CrmError> {
    Ok(Json(crm.stats().await?))
}

#[instrument(skip(crm))]
pub async fn get_provider(
    State(crm): State<AppState>,
    Path(provider_id): Path<String>,
) -> Result<impl IntoResponse, CrmError> {
    Ok(Json(crm.get(&provider_id).await?))
}

/// `PUT /crm/{provider_id}`: partial update; notes and sent totals accumulate.
#[instrument(skip(crm, body))]
pub async fn update_provider(
    State(crm): State<AppState>,
    Path(provider_id): Path<String>,
    body: Result<Json<CrmUpdateRequest>, JsonRejection>,
) -> Result<impl IntoResponse, CrmError> {
    let Json(body) = body?;
    let response = match crm.update(&provider_id, body).await? {
        UpdateOutcome::Updated => json!({"success": true, "provider_id": provider_id}),
        UpdateOutcome::NoChanges => json!({"success": true, "message": "No updates provided"}),
    };
    Ok(Json(response))
}

#[instrument(skip(crm))]
pub async fn delete_provider(
    State(crm): State<AppState>,
    Path(provider_id): Path<String>,
) -> Result<impl IntoResponse, CrmError> {
    crm.delete(&provider_id).await?;
    Ok(Json(json!({"success": true, "deleted": provider_id})))
}

#[instrument(skip(crm))]
pub async fn get_history(
    State(crm): State<AppState>,
    Path(provider_id): Path<String>,
) -> Result<impl IntoResponse, CrmError> {
    let history = crm.history(&provider_id).await?;
    Ok(Json(HistoryResponse {
        provider_id,
        history,
    }))
}

/// `POST /crm/{provider_id}/verify`: probes the provider's endpoint for x402 support.
#[instrument(skip(crm))]
pub async fn verify_provider(
    State(crm): State<AppState>,
    Path(provider_id): Path<String>,
) -> Result<impl IntoResponse, CrmError> {
    Ok(Json(crm.verify(&provider_id).await?))
}
