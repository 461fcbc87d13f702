//! # Batch Events
//!
//! Lifecycle events emitted while a batch runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of batch event
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BatchEventKind {
    /// Batch accepted and marked in progress
    BatchStarted,
    /// Project context fetched (or substituted)
    ContextLoaded,
    /// Agent started working
    AgentStarted,
    /// Agent produced its insight
    AgentCompleted,
    /// Agent failed
    AgentFailed,
    /// An advisory write did not reach the data store
    PersistenceDegraded,
    /// Batch completed
    BatchCompleted,
    /// Batch failed
    BatchFailed,
}

/// An event in a batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchEvent {
    /// Unique event ID
    pub id: String,
    /// Timestamp
    pub timestamp: DateTime<Utc>,
    /// Kind of event
    pub kind: BatchEventKind,
    /// Batch this event belongs to
    pub batch_id: String,
    /// Agent that produced this event
    #[serde(default)]
    pub agent: Option<String>,
    /// Associated data (JSON)
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

impl BatchEvent {
    /// Create a new event
    pub fn new(kind: BatchEventKind, batch_id: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            kind,
            batch_id: batch_id.to_string(),
            agent: None,
            data: None,
        }
    }

    /// Attribute the event to an agent
    pub fn with_agent(mut self, agent: &str) -> Self {
        self.agent = Some(agent.to_string());
        self
    }

    /// Add data to the event
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Whether this event ends the batch
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.kind,
            BatchEventKind::BatchCompleted | BatchEventKind::BatchFailed
        )
    }
}
