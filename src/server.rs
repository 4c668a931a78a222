//! HTTP surface over the report store

use crate::error::SummarizerError;
use crate::store::{ReportStore, StoredReport};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::error;

/// State shared by all handlers
#[derive(Clone)]
pub struct AppState {
    pub store: ReportStore,
}

#[derive(Debug, Deserialize)]
pub struct ReportIn {
    pub summary: String,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    time: String,
}

/// Latest report, with every field null when the table is empty
#[derive(Debug, Default, Serialize)]
struct LatestReport {
    id: Option<i64>,
    ts: Option<String>,
    summary: Option<String>,
}

impl From<Option<StoredReport>> for LatestReport {
    fn from(row: Option<StoredReport>) -> Self {
        match row {
            Some(r) => Self { id: Some(r.id), ts: Some(r.ts), summary: Some(r.summary) },
            None => Self::default(),
        }
    }
}

pub struct ApiError(SummarizerError);

impl From<SummarizerError> for ApiError {
    fn from(e: SummarizerError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        error!("Request failed: {}", self.0);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": self.0.to_string() })),
        )
            .into_response()
    }
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        time: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false),
    })
}

async fn add_report(
    State(state): State<AppState>,
    Json(item): Json<ReportIn>,
) -> Result<Json<StoredReport>, ApiError> {
    Ok(Json(state.store.insert(&item.summary).await?))
}

async fn latest_report(State(state): State<AppState>) -> Result<Json<LatestReport>, ApiError> {
    Ok(Json(state.store.latest().await?.into()))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/reports", post(add_report))
        .route("/latest-report", get(latest_report))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
