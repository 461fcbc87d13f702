//! # Insight Storage
//!
//! Insights are written once per batch in a single transaction and never
//! updated afterwards.

use super::batch::parse_timestamp;
use super::db::AnalysisDb;
use crate::methodology::Methodology;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// One methodology's finding
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Insight {
    pub id: String,
    pub batch_id: String,
    pub agent_id: String,
    pub agent_name: String,
    pub methodology_label: String,
    pub text: String,
    /// 0-100
    pub relevance: u8,
    pub created_at: DateTime<Utc>,
}

impl Insight {
    /// Build an insight for `methodology` with a fresh id
    pub fn new(batch_id: &str, methodology: Methodology, text: String) -> Self {
        Self {
            id: format!("lg-{}", uuid::Uuid::new_v4()),
            batch_id: batch_id.to_string(),
            agent_id: methodology.id().to_string(),
            agent_name: methodology.display_name().to_string(),
            methodology_label: methodology.label().to_string(),
            text,
            relevance: methodology.relevance(),
            created_at: Utc::now(),
        }
    }
}

/// SQLite-backed insight manager
pub struct InsightManager {
    conn: Arc<Mutex<Connection>>,
}

impl InsightManager {
    /// Create from shared AnalysisDb connection
    pub fn new(db: &AnalysisDb) -> Self {
        Self {
            conn: db.connection(),
        }
    }

    /// Insert every insight of a batch, all or nothing
    pub fn insert_all(&self, project_id: &str, insights: &[Insight]) -> Result<usize> {
        if insights.is_empty() {
            return Ok(0);
        }

        let mut conn = self
            .conn
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO agent_insights
                (id, batch_id, project_id, text, relevance, methodology, agent_id, agent_name, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
            )?;

            for insight in insights {
                stmt.execute(params![
                    insight.id,
                    insight.batch_id,
                    project_id,
                    insight.text,
                    insight.relevance,
                    insight.methodology_label,
                    insight.agent_id,
                    insight.agent_name,
                    insight.created_at.to_rfc3339(),
                ])
                .with_context(|| format!("Failed to insert insight {}", insight.id))?;
            }
        }
        tx.commit().context("Failed to commit insights")?;

        tracing::info!("Stored {} insights", insights.len());
        Ok(insights.len())
    }

    /// Insights of a batch, in insertion order
    pub fn list_for_batch(&self, batch_id: &str) -> Result<Vec<Insight>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        let mut stmt = conn.prepare(
            r#"
            SELECT id, batch_id, text, relevance, methodology, agent_id, agent_name, created_at
            FROM agent_insights
            WHERE batch_id = ?1
            ORDER BY rowid
            "#,
        )?;

        let insights = stmt
            .query_map(params![batch_id], |row| {
                let created_at_str: String = row.get(7)?;
                Ok(Insight {
                    id: row.get(0)?,
                    batch_id: row.get(1)?,
                    text: row.get(2)?,
                    relevance: row.get(3)?,
                    methodology_label: row.get(4)?,
                    agent_id: row.get(5)?,
                    agent_name: row.get(6)?,
                    created_at: parse_timestamp(&created_at_str),
                })
            })?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to list insights")?;

        Ok(insights)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insight_provenance() {
        let insight = Insight::new("batch-1", Methodology::Phenomenological, "Onboarding is tense.".into());
        assert!(insight.id.starts_with("lg-"));
        assert_eq!(insight.agent_id, "phenomenological");
        assert_eq!(insight.agent_name, "Phenomenological Agent");
        assert_eq!(insight.methodology_label, "Phenomenological Analysis");
        assert_eq!(insight.relevance, 88);
    }

    #[test]
    fn test_insert_and_list() {
        let dir = tempfile::tempdir().unwrap();
        let db = AnalysisDb::open_at(dir.path().join("insights.db")).unwrap();
        let manager = InsightManager::new(&db);

        let insights = vec![
            Insight::new("batch-1", Methodology::GroundedTheory, "A.".into()),
            Insight::new("batch-1", Methodology::FeministTheory, "B.".into()),
        ];
        assert_eq!(manager.insert_all("project-1", &insights).unwrap(), 2);

        let loaded = manager.list_for_batch("batch-1").unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].agent_id, "grounded-theory");
        assert_eq!(loaded[1].text, "B.");
        assert!(manager.list_for_batch("batch-2").unwrap().is_empty());
    }

    #[test]
    fn test_insert_is_atomic() {
        let dir = tempfile::tempdir().unwrap();
        let db = AnalysisDb::open_at(dir.path().join("insights.db")).unwrap();
        let manager = InsightManager::new(&db);

        let first = Insight::new("batch-1", Methodology::GroundedTheory, "A.".into());
        // Duplicate primary key fails the second row
        let insights = vec![first.clone(), first];
        assert!(manager.insert_all("project-1", &insights).is_err());
        assert!(manager.list_for_batch("batch-1").unwrap().is_empty());
    }
}
