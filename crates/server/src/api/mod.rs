//! # HTTP API
//!
//! Routes, shared state and error mapping for the Methodica server.

pub mod analysis;
pub mod projects;

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use methodica_core::error::{AnalysisError, StoreError};
use methodica_core::state::DocumentManager;
use methodica_core::swarm::Orchestrator;
use serde::Serialize;
use std::sync::Arc;
use utoipa::{OpenApi, ToSchema};

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    /// Present only when the SQLite store opened
    pub documents: Option<Arc<DocumentManager>>,
}

/// Error payload returned by every failing endpoint
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub detail: String,
}

/// Errors a handler can return
#[derive(Debug)]
pub enum ApiError {
    Analysis(AnalysisError),
    Store(StoreError),
    BadRequest(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Analysis(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            Self::Analysis(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Store(StoreError::Disconnected) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Store(StoreError::BatchNotFound(_)) => StatusCode::NOT_FOUND,
            Self::Store(StoreError::Backend(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn detail(&self) -> String {
        match self {
            Self::Analysis(e) => e.to_string(),
            Self::Store(e) => e.to_string(),
            Self::BadRequest(msg) => msg.clone(),
        }
    }
}

impl From<AnalysisError> for ApiError {
    fn from(err: AnalysisError) -> Self {
        Self::Analysis(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = %status, "{}", self.detail());
        }
        (status, Json(ErrorBody { detail: self.detail() })).into_response()
    }
}

// === OpenAPI Definition ===

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Methodica API",
        version = "1.0.0",
        description = "Batch analysis of project documents by methodology agents"
    ),
    paths(
        analysis::health,
        analysis::run_analysis,
        analysis::list_agents,
        analysis::get_batch,
        analysis::list_batch_insights,
        projects::add_document
    ),
    components(
        schemas(
            ErrorBody,
            analysis::HealthResponse,
            analysis::RunAnalysisRequest,
            analysis::AnalysisResponse,
            analysis::InsightRecord,
            analysis::AgentInfo,
            analysis::BatchResponse,
            projects::AddDocumentRequest,
            projects::DocumentResponse
        )
    ),
    tags(
        (name = "analysis", description = "Analysis batches"),
        (name = "projects", description = "Project documents")
    )
)]
pub struct ApiDoc;

/// Serve the OpenAPI document
async fn serve_openapi() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(analysis::health))
        .route("/run-analysis", post(analysis::run_analysis))
        .route("/agents", get(analysis::list_agents))
        .route("/batches/:batch_id", get(analysis::get_batch))
        .route("/batches/:batch_id/insights", get(analysis::list_batch_insights))
        .route("/projects/:project_id/documents", post(projects::add_document))
        .route("/openapi.json", get(serve_openapi))
        .with_state(state)
}
