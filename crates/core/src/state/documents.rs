//! # Project Documents
//!
//! Source material an analysis batch runs against.

use super::db::AnalysisDb;
use anyhow::{Context, Result};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// A stored project document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProjectDocument {
    pub id: String,
    pub name: String,
    pub content: String,
}

/// Everything the agents see about a project
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProjectContext {
    pub documents: Vec<ProjectDocument>,
}

impl ProjectContext {
    /// Stand-in context used when no data source is reachable
    pub fn placeholder() -> Self {
        Self {
            documents: vec![
                ProjectDocument {
                    id: "doc1".to_string(),
                    name: "Document 1".to_string(),
                    content: "Sample content for testing".to_string(),
                },
                ProjectDocument {
                    id: "doc2".to_string(),
                    name: "Document 2".to_string(),
                    content: "More sample content for analysis".to_string(),
                },
            ],
        }
    }
}

/// SQLite-backed document manager
pub struct DocumentManager {
    conn: Arc<Mutex<Connection>>,
}

impl DocumentManager {
    /// Create from shared AnalysisDb connection
    pub fn new(db: &AnalysisDb) -> Self {
        Self {
            conn: db.connection(),
        }
    }

    /// Store a document under a project
    pub fn add(&self, project_id: &str, name: &str, content: &str) -> Result<ProjectDocument> {
        let document = ProjectDocument {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            content: content.to_string(),
        };

        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        conn.execute(
            "INSERT INTO documents (id, project_id, name, content) VALUES (?1, ?2, ?3, ?4)",
            params![document.id, project_id, document.name, document.content],
        )
        .context("Failed to store document")?;

        Ok(document)
    }

    /// All documents of a project, oldest first
    pub fn list_for_project(&self, project_id: &str) -> Result<Vec<ProjectDocument>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        let mut stmt = conn.prepare(
            "SELECT id, name, content FROM documents WHERE project_id = ?1 ORDER BY rowid",
        )?;

        let documents = stmt
            .query_map(params![project_id], |row| {
                Ok(ProjectDocument {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    content: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to list documents")?;

        Ok(documents)
    }
}
