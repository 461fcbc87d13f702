//! # Data Store
//!
//! The orchestrator's view of persistence. The store is resolved once at
//! start-up into a [`StoreHandle`]; every write the orchestrator makes goes
//! through the advisory methods on the handle, which report success as a
//! `bool` and cannot return an error.

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;

use super::batch::{AnalysisBatch, BatchManager, BatchStatus};
use super::db::AnalysisDb;
use super::documents::{DocumentManager, ProjectContext};
use super::insight::{Insight, InsightManager};
use crate::error::StoreError;

/// Durable record of batches and their insights
#[async_trait]
pub trait BatchStore: Send + Sync {
    async fn create_batch(&self, batch: &AnalysisBatch) -> Result<(), StoreError>;

    async fn update_status(
        &self,
        batch_id: &str,
        status: BatchStatus,
        error: Option<&str>,
    ) -> Result<(), StoreError>;

    async fn insert_insights(
        &self,
        project_id: &str,
        insights: &[Insight],
    ) -> Result<(), StoreError>;

    async fn load_batch(&self, batch_id: &str) -> Result<AnalysisBatch, StoreError>;

    async fn list_insights(&self, batch_id: &str) -> Result<Vec<Insight>, StoreError>;
}

/// Source of project material
#[async_trait]
pub trait ProjectDataSource: Send + Sync {
    async fn fetch(&self, project_id: &str) -> Result<ProjectContext, StoreError>;
}

/// A backend that is both a batch store and a project data source
pub trait DataStore: BatchStore + ProjectDataSource {}

impl<T: BatchStore + ProjectDataSource> DataStore for T {}

/// SQLite implementation of [`DataStore`]
pub struct SqliteStore {
    batches: BatchManager,
    insights: InsightManager,
    documents: Arc<DocumentManager>,
}

impl SqliteStore {
    pub fn new(db: &AnalysisDb) -> Self {
        Self {
            batches: BatchManager::new(db),
            insights: InsightManager::new(db),
            documents: Arc::new(DocumentManager::new(db)),
        }
    }

    /// Document manager, for ingesting project material
    pub fn documents(&self) -> Arc<DocumentManager> {
        Arc::clone(&self.documents)
    }
}

#[async_trait]
impl BatchStore for SqliteStore {
    async fn create_batch(&self, batch: &AnalysisBatch) -> Result<(), StoreError> {
        Ok(self.batches.create(batch)?)
    }

    async fn update_status(
        &self,
        batch_id: &str,
        status: BatchStatus,
        error: Option<&str>,
    ) -> Result<(), StoreError> {
        if self.batches.update_status(batch_id, status, error)? {
            Ok(())
        } else {
            Err(StoreError::BatchNotFound(batch_id.to_string()))
        }
    }

    async fn insert_insights(
        &self,
        project_id: &str,
        insights: &[Insight],
    ) -> Result<(), StoreError> {
        self.insights.insert_all(project_id, insights)?;
        Ok(())
    }

    async fn load_batch(&self, batch_id: &str) -> Result<AnalysisBatch, StoreError> {
        self.batches
            .load(batch_id)?
            .ok_or_else(|| StoreError::BatchNotFound(batch_id.to_string()))
    }

    async fn list_insights(&self, batch_id: &str) -> Result<Vec<Insight>, StoreError> {
        Ok(self.insights.list_for_batch(batch_id)?)
    }
}

#[async_trait]
impl ProjectDataSource for SqliteStore {
    async fn fetch(&self, project_id: &str) -> Result<ProjectContext, StoreError> {
        let documents = self.documents.list_for_project(project_id)?;
        if documents.is_empty() {
            tracing::warn!(project_id = %project_id, "No documents found for project");
        }
        Ok(ProjectContext { documents })
    }
}

/// Data store availability, decided once at start-up
#[derive(Clone)]
pub enum StoreHandle {
    Connected(Arc<dyn DataStore>),
    Disconnected,
}

impl std::fmt::Debug for StoreHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connected(_) => f.write_str("StoreHandle::Connected"),
            Self::Disconnected => f.write_str("StoreHandle::Disconnected"),
        }
    }
}

impl StoreHandle {
    pub fn connected(store: impl DataStore + 'static) -> Self {
        Self::Connected(Arc::new(store))
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected(_))
    }

    /// Run a store call whose failure must not affect control flow
    async fn advisory<'a, F, Fut>(&'a self, what: &str, op: F) -> bool
    where
        F: FnOnce(&'a dyn DataStore) -> Fut,
        Fut: Future<Output = Result<(), StoreError>> + 'a,
    {
        let store = match self {
            Self::Connected(store) => store.as_ref(),
            Self::Disconnected => {
                tracing::warn!("Data store not connected, skipping {}", what);
                return false;
            }
        };

        match op(store).await {
            Ok(()) => {
                tracing::debug!("Data store: {} succeeded", what);
                true
            }
            Err(e) => {
                tracing::error!("Data store: {} failed: {}", what, e);
                false
            }
        }
    }

    /// Record a newly created batch
    pub async fn record_batch(&self, batch: &AnalysisBatch) -> bool {
        self.advisory("record batch", |s| s.create_batch(batch)).await
    }

    /// Record the batch's current status and error
    pub async fn record_status(&self, batch: &AnalysisBatch) -> bool {
        self.advisory("update batch status", |s| {
            s.update_status(&batch.id, batch.status, batch.error.as_deref())
        })
        .await
    }

    /// Record all insights of a batch
    pub async fn record_insights(&self, project_id: &str, insights: &[Insight]) -> bool {
        self.advisory("store insights", |s| {
            s.insert_insights(project_id, insights)
        })
        .await
    }

    /// Fetch project context, substituting the placeholder on any failure
    pub async fn fetch_context(&self, project_id: &str) -> ProjectContext {
        match self {
            Self::Connected(store) => match store.fetch(project_id).await {
                Ok(context) => context,
                Err(e) => {
                    tracing::error!("Error fetching project data: {}", e);
                    ProjectContext::placeholder()
                }
            },
            Self::Disconnected => {
                tracing::warn!("Data store not connected, using placeholder project data");
                ProjectContext::placeholder()
            }
        }
    }

    /// Load a batch for inspection
    pub async fn load_batch(&self, batch_id: &str) -> Result<AnalysisBatch, StoreError> {
        match self {
            Self::Connected(store) => store.load_batch(batch_id).await,
            Self::Disconnected => Err(StoreError::Disconnected),
        }
    }

    /// Load a batch's persisted insights
    pub async fn list_insights(&self, batch_id: &str) -> Result<Vec<Insight>, StoreError> {
        match self {
            Self::Connected(store) => store.list_insights(batch_id).await,
            Self::Disconnected => Err(StoreError::Disconnected),
        }
    }
}
