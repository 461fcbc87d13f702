//! # Batch State
//!
//! Analysis batch records and their status state machine.
//!
//! ```text
//! pending → in_progress → completed
//!                       ↘ failed
//! ```

use super::db::AnalysisDb;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// Status of an analysis batch
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    fn from_str(s: &str) -> Self {
        match s {
            "pending" => Self::Pending,
            "in_progress" | "in-progress" => Self::InProgress,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            _ => Self::Pending,
        }
    }

    /// Completed and failed batches never change again
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether moving to `next` is a forward step
    pub fn can_transition_to(&self, next: BatchStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::InProgress)
                | (Self::InProgress, Self::Completed)
                | (Self::InProgress, Self::Failed)
        )
    }
}

/// One orchestration run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisBatch {
    /// Unique batch identifier
    pub id: String,
    pub project_id: String,
    pub user_id: String,
    /// Agent ids as submitted
    pub agent_ids: Vec<String>,
    pub status: BatchStatus,
    /// Error message, only when failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AnalysisBatch {
    /// Create a pending batch with a fresh id
    pub fn new(project_id: &str, user_id: &str, agent_ids: Vec<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            project_id: project_id.to_string(),
            user_id: user_id.to_string(),
            agent_ids,
            status: BatchStatus::Pending,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Move to `next`, rejecting anything but a forward step
    pub fn transition(&mut self, next: BatchStatus) -> Result<()> {
        if self.status.is_terminal() {
            anyhow::bail!("Batch {} is already {}", self.id, self.status.as_str());
        }
        if !self.status.can_transition_to(next) {
            anyhow::bail!(
                "Illegal batch transition {} -> {} for {}",
                self.status.as_str(),
                next.as_str(),
                self.id
            );
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Move to `failed`, recording `error`
    pub fn fail(&mut self, error: impl Into<String>) -> Result<()> {
        self.transition(BatchStatus::Failed)?;
        self.error = Some(error.into());
        Ok(())
    }
}

/// SQLite-backed batch manager
pub struct BatchManager {
    conn: Arc<Mutex<Connection>>,
}

impl BatchManager {
    /// Create from shared AnalysisDb connection
    pub fn new(db: &AnalysisDb) -> Self {
        Self {
            conn: db.connection(),
        }
    }

    /// Insert a new batch record
    pub fn create(&self, batch: &AnalysisBatch) -> Result<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        let agent_ids_json = serde_json::to_string(&batch.agent_ids)?;

        conn.execute(
            r#"
            INSERT INTO agent_batches
            (id, project_id, user_id, agent_ids_json, status, error, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                batch.id,
                batch.project_id,
                batch.user_id,
                agent_ids_json,
                batch.status.as_str(),
                batch.error,
                batch.created_at.to_rfc3339(),
                batch.updated_at.to_rfc3339(),
            ],
        )
        .context("Failed to create batch")?;

        Ok(())
    }

    /// Load a batch by ID
    pub fn load(&self, id: &str) -> Result<Option<AnalysisBatch>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        let mut stmt = conn.prepare(
            r#"
            SELECT id, project_id, user_id, agent_ids_json, status, error, created_at, updated_at
            FROM agent_batches WHERE id = ?1
            "#,
        )?;

        let mut rows = stmt.query_map(params![id], Self::row_to_batch)?;
        let batch = rows.next().transpose().context("Failed to load batch")?;

        Ok(batch)
    }

    /// Write a new status.
    ///
    /// Only non-terminal rows are updated, so a terminal status recorded once
    /// is never overwritten. Returns whether a row changed.
    pub fn update_status(
        &self,
        id: &str,
        status: BatchStatus,
        error: Option<&str>,
    ) -> Result<bool> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        let affected = conn
            .execute(
                r#"
                UPDATE agent_batches
                SET status = ?1, error = ?2, updated_at = ?3
                WHERE id = ?4 AND status NOT IN ('completed', 'failed')
                "#,
                params![status.as_str(), error, Utc::now().to_rfc3339(), id],
            )
            .context("Failed to update batch status")?;

        Ok(affected > 0)
    }

    /// Most recent batches for a project
    pub fn list_for_project(&self, project_id: &str, limit: usize) -> Result<Vec<AnalysisBatch>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        let mut stmt = conn.prepare(
            r#"
            SELECT id, project_id, user_id, agent_ids_json, status, error, created_at, updated_at
            FROM agent_batches
            WHERE project_id = ?1
            ORDER BY created_at DESC
            LIMIT ?2
            "#,
        )?;

        let batches = stmt
            .query_map(params![project_id, limit as i64], Self::row_to_batch)?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to list batches")?;

        Ok(batches)
    }

    fn row_to_batch(row: &rusqlite::Row) -> rusqlite::Result<AnalysisBatch> {
        let agent_ids_json: String = row.get(3)?;
        let created_at_str: String = row.get(6)?;
        let updated_at_str: String = row.get(7)?;

        Ok(AnalysisBatch {
            id: row.get(0)?,
            project_id: row.get(1)?,
            user_id: row.get(2)?,
            agent_ids: serde_json::from_str(&agent_ids_json).unwrap_or_default(),
            status: BatchStatus::from_str(&row.get::<_, String>(4)?),
            error: row.get(5)?,
            created_at: parse_timestamp(&created_at_str),
            updated_at: parse_timestamp(&updated_at_str),
        })
    }
}

pub(crate) fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_batch() -> AnalysisBatch {
        AnalysisBatch::new(
            "project-1",
            "user-1",
            vec!["grounded-theory".to_string(), "phenomenological".to_string()],
        )
    }

    #[test]
    fn test_forward_transitions_only() {
        use BatchStatus::*;
        assert!(Pending.can_transition_to(InProgress));
        assert!(InProgress.can_transition_to(Completed));
        assert!(InProgress.can_transition_to(Failed));

        assert!(!Pending.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(InProgress));
        assert!(!InProgress.can_transition_to(Pending));
    }

    #[test]
    fn test_terminal_batch_rejects_transition() {
        let mut batch = test_batch();
        batch.transition(BatchStatus::InProgress).unwrap();
        batch.fail("model unavailable").unwrap();

        assert_eq!(batch.status, BatchStatus::Failed);
        assert_eq!(batch.error.as_deref(), Some("model unavailable"));
        assert!(batch.transition(BatchStatus::Completed).is_err());
        assert_eq!(batch.status, BatchStatus::Failed);
    }

    #[test]
    fn test_batch_ids_are_unique() {
        assert_ne!(test_batch().id, test_batch().id);
    }

    #[test]
    fn test_batch_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let db = AnalysisDb::open_at(dir.path().join("batches.db")).unwrap();
        let manager = BatchManager::new(&db);

        let mut batch = test_batch();
        batch.transition(BatchStatus::InProgress).unwrap();
        manager.create(&batch).unwrap();

        let loaded = manager.load(&batch.id).unwrap().unwrap();
        assert_eq!(loaded.id, batch.id);
        assert_eq!(loaded.status, BatchStatus::InProgress);
        assert_eq!(loaded.agent_ids, batch.agent_ids);
        assert!(manager.load("missing").unwrap().is_none());
    }

    #[test]
    fn test_terminal_status_is_never_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let db = AnalysisDb::open_at(dir.path().join("batches.db")).unwrap();
        let manager = BatchManager::new(&db);

        let mut batch = test_batch();
        batch.transition(BatchStatus::InProgress).unwrap();
        manager.create(&batch).unwrap();

        assert!(manager
            .update_status(&batch.id, BatchStatus::Failed, Some("boom"))
            .unwrap());
        assert!(!manager
            .update_status(&batch.id, BatchStatus::Completed, None)
            .unwrap());

        let loaded = manager.load(&batch.id).unwrap().unwrap();
        assert_eq!(loaded.status, BatchStatus::Failed);
        assert_eq!(loaded.error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_list_for_project() {
        let dir = tempfile::tempdir().unwrap();
        let db = AnalysisDb::open_at(dir.path().join("batches.db")).unwrap();
        let manager = BatchManager::new(&db);

        manager.create(&test_batch()).unwrap();
        manager.create(&test_batch()).unwrap();
        manager
            .create(&AnalysisBatch::new("project-2", "user-1", vec![]))
            .unwrap();

        assert_eq!(manager.list_for_project("project-1", 10).unwrap().len(), 2);
        assert_eq!(manager.list_for_project("project-2", 10).unwrap().len(), 1);
    }
}
