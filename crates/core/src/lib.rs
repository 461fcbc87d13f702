//! # Methodica Core
//!
//! Business logic of the Methodica analysis service: the methodology catalog,
//! the model fallback chain, the per-agent graph and the batch orchestrator.
//!
//! ## Architecture
//!
//! - `methodology` - Catalog of analysis agents and their prompts
//! - `models/` - Text-generation capabilities and the fallback resolver
//! - `state/` - Batch, insight and document persistence (SQLite)
//! - `swarm/` - Agent graph and batch orchestration
//! - `config` - Service settings loaded from the environment
//!
//! ## Usage
//!
//! ```rust,ignore
//! use methodica_core::swarm::{AnalysisRequest, Orchestrator, OrchestratorConfig};
//!
//! let orchestrator = Orchestrator::new(OrchestratorConfig::default(), resolver, store);
//! let outcome = orchestrator.run_analysis(&AnalysisRequest {
//!     project_id: "project-1".into(),
//!     user_id: "user-1".into(),
//!     agent_ids: vec!["grounded-theory".into()],
//! }).await?;
//! ```

pub mod config;
pub mod error;
pub mod methodology;
pub mod models;
pub mod state;
pub mod swarm;

pub use error::{AnalysisError, ModelError, StoreError};
pub use methodology::Methodology;
