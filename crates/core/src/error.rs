//! # Errors
//!
//! Typed failures surfaced by the analysis core.

/// Failures that abort an analysis run.
///
/// `InvalidAgent` and `NoValidAgents` are raised before a batch record exists.
/// Everything else is raised after the batch was created and is recorded on
/// the batch as `failed` before reaching the caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnalysisError {
    /// A requested agent id is not in the methodology catalog.
    #[error("Unknown agent: {0}")]
    InvalidAgent(String),

    /// The request named no agents at all.
    #[error("No valid agents specified")]
    NoValidAgents,

    /// The preferred model and every fallback failed to load.
    #[error("Failed to load any language model (preferred: {0}). Check model compatibility and system resources.")]
    ModelUnavailable(String),

    /// A generation call did not finish within the per-agent budget.
    #[error("Agent '{agent_id}' timed out after {secs}s")]
    AgentTimeout { agent_id: String, secs: u64 },

    /// The loaded model rejected or failed a generation call.
    #[error("Generation failed on model '{model_id}': {message}")]
    Generation { model_id: String, message: String },

    /// Anything else that went wrong mid-run.
    #[error("{0}")]
    Unhandled(String),
}

impl AnalysisError {
    /// Whether this error was caused by the request rather than the service.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidAgent(_) | Self::NoValidAgents)
    }
}

/// Failure to load a model into a generation capability.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("model '{0}' not found")]
    NotFound(String),

    #[error("model '{model_id}' cannot be served: {reason}")]
    Unsupported { model_id: String, reason: String },

    #[error("inference backend error: {0}")]
    Backend(String),
}

/// Failure of a data store or project data source call.
///
/// Never escapes the orchestrator; see [`crate::state::StoreHandle`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("data store is not connected")]
    Disconnected,

    #[error("batch not found: {0}")]
    BatchNotFound(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

impl From<anyhow::Error> for StoreError {
    fn from(err: anyhow::Error) -> Self {
        Self::Backend(format!("{err:#}"))
    }
}
