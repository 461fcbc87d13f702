//! # Swarm Orchestration
//!
//! Runs methodology agents over a project as one batch.
//!
//! ## Batch Flow
//!
//! ```text
//! validate → pending → in_progress → [agent graph per methodology] → summary → completed
//!                                  ↘ any failure → failed
//! ```

pub mod events;
pub mod graph;
pub mod orchestrator;
pub mod summary;

pub use events::{BatchEvent, BatchEventKind};
pub use graph::{AgentGraph, GraphNode, GraphOutput, PipelineStrategy};
pub use orchestrator::{
    validate_agents, AnalysisOutcome, AnalysisRequest, Orchestrator, OrchestratorConfig,
};
pub use summary::{Summarizer, TemplateSummarizer};
