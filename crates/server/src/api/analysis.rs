//! # Analysis API
//!
//! Running batches, inspecting them, and the service health check.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use methodica_core::methodology::Methodology;
use methodica_core::state::{AnalysisBatch, Insight};
use methodica_core::swarm::AnalysisRequest;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{ApiError, AppState, ErrorBody};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub message: String,
    pub model: String,
    pub data_store_connected: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RunAnalysisRequest {
    pub project_id: String,
    pub user_id: String,
    pub agent_ids: Vec<String>,
}

/// An insight as returned to clients
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct InsightRecord {
    pub id: String,
    pub text: String,
    pub relevance: u8,
    /// Display label of the methodology
    pub methodology: String,
    #[serde(rename = "agentId")]
    pub agent_id: String,
    #[serde(rename = "agentName")]
    pub agent_name: String,
}

impl From<Insight> for InsightRecord {
    fn from(insight: Insight) -> Self {
        Self {
            id: insight.id,
            text: insight.text,
            relevance: insight.relevance,
            methodology: insight.methodology_label,
            agent_id: insight.agent_id,
            agent_name: insight.agent_name,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AnalysisResponse {
    pub batch_id: String,
    pub insights: Vec<InsightRecord>,
    pub summary: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AgentInfo {
    pub id: String,
    pub name: String,
    pub methodology: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BatchResponse {
    pub id: String,
    pub project_id: String,
    pub user_id: String,
    pub agent_ids: Vec<String>,
    /// pending | in_progress | completed | failed
    pub status: String,
    pub error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<AnalysisBatch> for BatchResponse {
    fn from(batch: AnalysisBatch) -> Self {
        Self {
            status: batch.status.as_str().to_string(),
            id: batch.id,
            project_id: batch.project_id,
            user_id: batch.user_id,
            agent_ids: batch.agent_ids,
            error: batch.error,
            created_at: batch.created_at.to_rfc3339(),
            updated_at: batch.updated_at.to_rfc3339(),
        }
    }
}

/// Service health and configuration
#[utoipa::path(
    get,
    path = "/",
    tag = "analysis",
    responses(
        (status = 200, description = "Service is up", body = HealthResponse)
    )
)]
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        message: "Methodica analysis service is running".to_string(),
        model: state.orchestrator.resolver().config().model.clone(),
        data_store_connected: state.orchestrator.store().is_connected(),
    })
}

/// Run a batch of methodology agents over a project
#[utoipa::path(
    post,
    path = "/run-analysis",
    tag = "analysis",
    request_body = RunAnalysisRequest,
    responses(
        (status = 200, description = "Batch completed", body = AnalysisResponse),
        (status = 400, description = "Malformed body, unknown or missing agents", body = ErrorBody),
        (status = 500, description = "Batch failed", body = ErrorBody)
    )
)]
pub async fn run_analysis(
    State(state): State<AppState>,
    payload: Result<Json<RunAnalysisRequest>, JsonRejection>,
) -> Result<Json<AnalysisResponse>, ApiError> {
    let Json(req) = payload?;
    let request = AnalysisRequest {
        project_id: req.project_id,
        user_id: req.user_id,
        agent_ids: req.agent_ids,
    };

    let outcome = state.orchestrator.run_analysis(&request).await?;

    Ok(Json(AnalysisResponse {
        batch_id: outcome.batch_id,
        insights: outcome.insights.into_iter().map(InsightRecord::from).collect(),
        summary: outcome.summary,
    }))
}

/// List the methodology catalog
#[utoipa::path(
    get,
    path = "/agents",
    tag = "analysis",
    responses(
        (status = 200, description = "Available agents", body = Vec<AgentInfo>)
    )
)]
pub async fn list_agents() -> Json<Vec<AgentInfo>> {
    Json(
        Methodology::all()
            .into_iter()
            .map(|m| AgentInfo {
                id: m.id().to_string(),
                name: m.display_name().to_string(),
                methodology: m.label().to_string(),
            })
            .collect(),
    )
}

/// Inspect a batch's durable status
#[utoipa::path(
    get,
    path = "/batches/{batch_id}",
    tag = "analysis",
    params(("batch_id" = String, Path, description = "Batch id")),
    responses(
        (status = 200, description = "Batch record", body = BatchResponse),
        (status = 404, description = "No such batch", body = ErrorBody),
        (status = 503, description = "Data store not connected", body = ErrorBody)
    )
)]
pub async fn get_batch(
    State(state): State<AppState>,
    Path(batch_id): Path<String>,
) -> Result<Json<BatchResponse>, ApiError> {
    let batch = state.orchestrator.store().load_batch(&batch_id).await?;
    Ok(Json(batch.into()))
}

/// Persisted insights of a batch
#[utoipa::path(
    get,
    path = "/batches/{batch_id}/insights",
    tag = "analysis",
    params(("batch_id" = String, Path, description = "Batch id")),
    responses(
        (status = 200, description = "Insights in agent order", body = Vec<InsightRecord>),
        (status = 404, description = "No such batch", body = ErrorBody),
        (status = 503, description = "Data store not connected", body = ErrorBody)
    )
)]
pub async fn list_batch_insights(
    State(state): State<AppState>,
    Path(batch_id): Path<String>,
) -> Result<Json<Vec<InsightRecord>>, ApiError> {
    let store = state.orchestrator.store();
    // 404 for unknown batches rather than an empty list
    store.load_batch(&batch_id).await?;
    let insights = store.list_insights(&batch_id).await?;
    Ok(Json(insights.into_iter().map(InsightRecord::from).collect()))
}
