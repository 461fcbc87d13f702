//! # Project API
//!
//! Ingests project documents that analysis batches read.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use methodica_core::error::StoreError;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{ApiError, AppState, ErrorBody};

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddDocumentRequest {
    pub name: String,
    pub content: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DocumentResponse {
    pub id: String,
    pub project_id: String,
    pub name: String,
}

/// Store a document under a project
#[utoipa::path(
    post,
    path = "/projects/{project_id}/documents",
    tag = "projects",
    params(("project_id" = String, Path, description = "Project id")),
    request_body = AddDocumentRequest,
    responses(
        (status = 201, description = "Document stored", body = DocumentResponse),
        (status = 400, description = "Malformed body, missing name or content", body = ErrorBody),
        (status = 503, description = "Data store not connected", body = ErrorBody)
    )
)]
pub async fn add_document(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    payload: Result<Json<AddDocumentRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<DocumentResponse>), ApiError> {
    let Json(req) = payload?;
    if req.name.trim().is_empty() || req.content.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "Document name and content are required".to_string(),
        ));
    }

    let documents = state.documents.as_ref().ok_or(StoreError::Disconnected)?;
    let document = documents
        .add(&project_id, req.name.trim(), &req.content)
        .map_err(StoreError::from)?;

    tracing::info!(project_id = %project_id, document_id = %document.id, "Stored project document");

    Ok((
        StatusCode::CREATED,
        Json(DocumentResponse {
            id: document.id,
            project_id,
            name: document.name,
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support;
    use axum::response::IntoResponse;
    use methodica_core::state::{AnalysisDb, StoreHandle};

    fn body(name: &str, content: &str) -> Result<Json<AddDocumentRequest>, JsonRejection> {
        Ok(Json(AddDocumentRequest {
            name: name.to_string(),
            content: content.to_string(),
        }))
    }

    #[tokio::test]
    async fn test_added_documents_feed_project_context() {
        let dir = tempfile::tempdir().unwrap();
        let db = AnalysisDb::open_at(dir.path().join("docs.db")).unwrap();
        let state = test_support::state(true, Some(&db));

        let (status, Json(doc)) = add_document(
            State(state.clone()),
            Path("project-1".into()),
            body("Interview 1", "Navigation menus confuse first-time users."),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(doc.name, "Interview 1");

        let store: &StoreHandle = state.orchestrator.store();
        let context = store.fetch_context("project-1").await;
        assert_eq!(context.documents.len(), 1);
        assert_eq!(context.documents[0].id, doc.id);
    }

    #[tokio::test]
    async fn test_rejects_blank_documents() {
        let err = add_document(
            State(test_support::state(true, None)),
            Path("project-1".into()),
            body("  ", "content"),
        )
        .await
        .unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_requires_connected_store() {
        let err = add_document(
            State(test_support::state(true, None)),
            Path("project-1".into()),
            body("Interview 1", "content"),
        )
        .await
        .unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
