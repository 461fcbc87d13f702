//! # Batch Orchestrator
//!
//! Runs a set of methodologies against a project as one batch and drives the
//! batch status from `in_progress` to `completed` or `failed`.
//!
//! A batch is all-or-nothing: one failed agent fails the batch and no insights
//! are returned. Data store writes are advisory and never change the outcome.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};

use crate::error::AnalysisError;
use crate::methodology::Methodology;
use crate::models::ModelResolver;
use crate::state::{AnalysisBatch, BatchStatus, Insight, StoreHandle};

use super::events::{BatchEvent, BatchEventKind};
use super::graph::AgentGraph;
use super::summary::{Summarizer, TemplateSummarizer};

/// Configuration for the orchestrator
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Per-agent model overrides (falls back to the resolver's preferred model)
    pub per_agent_models: HashMap<Methodology, String>,
    /// Budget for one agent invocation, model loading included
    pub agent_timeout: Duration,
    /// Agents run at once; 1 runs them strictly in order
    pub max_concurrent_agents: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            per_agent_models: HashMap::new(),
            agent_timeout: Duration::from_secs(120),
            max_concurrent_agents: 1,
        }
    }
}

/// A request to analyse a project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub project_id: String,
    pub user_id: String,
    pub agent_ids: Vec<String>,
}

/// Result of a successful batch
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisOutcome {
    pub batch_id: String,
    pub insights: Vec<Insight>,
    pub summary: String,
}

/// Parse requested ids against the catalog.
///
/// Stops at the first unknown id. Duplicates are kept: each occurrence runs.
pub fn validate_agents(agent_ids: &[String]) -> Result<Vec<Methodology>, AnalysisError> {
    let agents = agent_ids
        .iter()
        .map(|id| id.parse::<Methodology>())
        .collect::<Result<Vec<_>, _>>()?;

    if agents.is_empty() {
        return Err(AnalysisError::NoValidAgents);
    }

    Ok(agents)
}

/// Everything one agent task needs, owned so it can move into a task
struct AgentJob {
    methodology: Methodology,
    model_id: String,
    prompt: String,
    batch_id: String,
    timeout: Duration,
}

/// The batch orchestrator
pub struct Orchestrator {
    config: OrchestratorConfig,
    resolver: Arc<ModelResolver>,
    store: StoreHandle,
    summarizer: Arc<dyn Summarizer>,
    event_tx: Option<mpsc::Sender<BatchEvent>>,
}

impl Orchestrator {
    /// Create an orchestrator over a resolver and a data store
    pub fn new(config: OrchestratorConfig, resolver: Arc<ModelResolver>, store: StoreHandle) -> Self {
        Self {
            config,
            resolver,
            store,
            summarizer: Arc::new(TemplateSummarizer),
            event_tx: None,
        }
    }

    /// Replace the summary reducer
    pub fn with_summarizer(mut self, summarizer: impl Summarizer + 'static) -> Self {
        self.summarizer = Arc::new(summarizer);
        self
    }

    /// Set event channel for streaming batch events
    pub fn with_event_channel(mut self, tx: mpsc::Sender<BatchEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    pub fn store(&self) -> &StoreHandle {
        &self.store
    }

    pub fn resolver(&self) -> &ModelResolver {
        &self.resolver
    }

    /// Model for a specific agent: per-agent override -> preferred
    fn model_for(&self, methodology: Methodology) -> String {
        self.config
            .per_agent_models
            .get(&methodology)
            .cloned()
            .unwrap_or_else(|| self.resolver.config().model.clone())
    }

    fn emit(&self, event: BatchEvent) {
        send_event(&self.event_tx, event);
    }

    /// Run one analysis batch.
    ///
    /// Validation failures return before any batch exists. Every later
    /// failure marks the batch `failed` (advisory write) and is returned.
    #[tracing::instrument(skip(self, request), fields(project_id = %request.project_id, agents = request.agent_ids.len()))]
    pub async fn run_analysis(
        &self,
        request: &AnalysisRequest,
    ) -> Result<AnalysisOutcome, AnalysisError> {
        let agents = validate_agents(&request.agent_ids)?;

        let mut batch = AnalysisBatch::new(
            &request.project_id,
            &request.user_id,
            request.agent_ids.clone(),
        );
        batch
            .transition(BatchStatus::InProgress)
            .map_err(|e| AnalysisError::Unhandled(e.to_string()))?;

        self.emit(BatchEvent::new(BatchEventKind::BatchStarted, &batch.id).with_data(
            serde_json::json!({ "project_id": batch.project_id, "agent_ids": batch.agent_ids }),
        ));

        if self.store.record_batch(&batch).await {
            tracing::info!(batch_id = %batch.id, "Recorded analysis batch");
        } else {
            self.degraded(&batch.id, "record batch");
        }

        match self.execute(&batch, &agents).await {
            Ok((insights, summary)) => {
                if !self.store.record_insights(&batch.project_id, &insights).await {
                    self.degraded(&batch.id, "store insights");
                }

                batch
                    .transition(BatchStatus::Completed)
                    .map_err(|e| AnalysisError::Unhandled(e.to_string()))?;
                if self.store.record_status(&batch).await {
                    tracing::info!(batch_id = %batch.id, "Updated batch status to completed");
                } else {
                    self.degraded(&batch.id, "update batch status");
                }

                self.emit(
                    BatchEvent::new(BatchEventKind::BatchCompleted, &batch.id)
                        .with_data(serde_json::json!({ "insights": insights.len() })),
                );

                Ok(AnalysisOutcome {
                    batch_id: batch.id,
                    insights,
                    summary,
                })
            }
            Err(err) => {
                tracing::error!(batch_id = %batch.id, error = %err, "Error in run_analysis");

                if let Err(e) = batch.fail(err.to_string()) {
                    tracing::error!(batch_id = %batch.id, "{}", e);
                } else if self.store.record_status(&batch).await {
                    tracing::info!(batch_id = %batch.id, "Updated batch status to failed");
                } else {
                    self.degraded(&batch.id, "update batch status");
                }

                self.emit(
                    BatchEvent::new(BatchEventKind::BatchFailed, &batch.id)
                        .with_data(serde_json::json!({ "error": err.to_string() })),
                );

                Err(err)
            }
        }
    }

    fn degraded(&self, batch_id: &str, what: &str) {
        self.emit(
            BatchEvent::new(BatchEventKind::PersistenceDegraded, batch_id)
                .with_data(serde_json::json!({ "operation": what })),
        );
    }

    /// Fetch context, run every agent, summarize
    async fn execute(
        &self,
        batch: &AnalysisBatch,
        agents: &[Methodology],
    ) -> Result<(Vec<Insight>, String), AnalysisError> {
        let context = self.store.fetch_context(&batch.project_id).await;
        self.emit(
            BatchEvent::new(BatchEventKind::ContextLoaded, &batch.id)
                .with_data(serde_json::json!({ "documents": context.documents.len() })),
        );

        let jobs: Vec<AgentJob> = agents
            .iter()
            .map(|&methodology| AgentJob {
                methodology,
                model_id: self.model_for(methodology),
                prompt: methodology.build_prompt(&context),
                batch_id: batch.id.clone(),
                timeout: self.config.agent_timeout,
            })
            .collect();

        let insights = if self.config.max_concurrent_agents > 1 && jobs.len() > 1 {
            self.run_parallel(jobs).await?
        } else {
            self.run_sequential(jobs).await?
        };

        let summary = self.summarizer.summarize(&insights);
        Ok((insights, summary))
    }

    /// Run agents one after another, stopping at the first failure.
    ///
    /// Each agent runs in its own task so a panicking model surfaces as an
    /// error and the batch still reaches `failed`.
    async fn run_sequential(&self, jobs: Vec<AgentJob>) -> Result<Vec<Insight>, AnalysisError> {
        let mut insights = Vec::with_capacity(jobs.len());
        for job in jobs {
            let resolver = Arc::clone(&self.resolver);
            let event_tx = self.event_tx.clone();
            let insight = tokio::spawn(run_agent(resolver, event_tx, job))
                .await
                .map_err(|e| AnalysisError::Unhandled(e.to_string()))??;
            insights.push(insight);
        }
        Ok(insights)
    }

    /// Run agents concurrently with a Semaphore limit.
    ///
    /// All tasks settle before the outcome is decided; results keep submission
    /// order and the first failure (in submission order) wins.
    async fn run_parallel(&self, jobs: Vec<AgentJob>) -> Result<Vec<Insight>, AnalysisError> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_agents));
        let mut handles = Vec::with_capacity(jobs.len());

        for job in jobs {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| AnalysisError::Unhandled(e.to_string()))?;
            let resolver = Arc::clone(&self.resolver);
            let event_tx = self.event_tx.clone();

            handles.push(tokio::spawn(async move {
                let _permit = permit; // Hold permit until task completes
                run_agent(resolver, event_tx, job).await
            }));
        }

        let mut insights = Vec::with_capacity(handles.len());
        let mut first_error = None;
        for handle in handles {
            match handle.await {
                Ok(Ok(insight)) => insights.push(insight),
                Ok(Err(e)) => {
                    first_error.get_or_insert(e);
                }
                Err(e) => {
                    first_error.get_or_insert(AnalysisError::Unhandled(e.to_string()));
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(insights),
        }
    }
}

/// Events never block the batch; a full channel drops the event
fn send_event(tx: &Option<mpsc::Sender<BatchEvent>>, event: BatchEvent) {
    if let Some(tx) = tx {
        if let Err(mpsc::error::TrySendError::Full(event)) = tx.try_send(event) {
            tracing::warn!(batch_id = %event.batch_id, kind = ?event.kind, "Event channel full, dropping event");
        }
    }
}

/// Resolve a model, run the agent graph, and build the insight
async fn run_agent(
    resolver: Arc<ModelResolver>,
    event_tx: Option<mpsc::Sender<BatchEvent>>,
    job: AgentJob,
) -> Result<Insight, AnalysisError> {
    let agent_id = job.methodology.id();
    send_event(
        &event_tx,
        BatchEvent::new(BatchEventKind::AgentStarted, &job.batch_id).with_agent(agent_id),
    );

    let work = async {
        let capability = resolver.resolve(&job.model_id).await?;
        AgentGraph::new(job.methodology.strategy())
            .run(capability.as_ref(), &job.prompt)
            .await
    };

    let result = match tokio::time::timeout(job.timeout, work).await {
        Ok(result) => result,
        Err(_) => Err(AnalysisError::AgentTimeout {
            agent_id: agent_id.to_string(),
            secs: job.timeout.as_secs(),
        }),
    };

    let output = match result {
        Ok(output) => output,
        Err(e) => {
            tracing::error!(agent = %agent_id, error = %e, "Agent failed");
            send_event(
                &event_tx,
                BatchEvent::new(BatchEventKind::AgentFailed, &job.batch_id)
                    .with_agent(agent_id)
                    .with_data(serde_json::json!({ "error": e.to_string() })),
            );
            return Err(e);
        }
    };

    if output.model_id != job.model_id {
        tracing::warn!(agent = %agent_id, requested = %job.model_id, used = %output.model_id, "Agent ran on fallback model");
    }

    let text = match output.generated_text.trim() {
        "" => format!(
            "{} produced no findings for this project.",
            job.methodology.display_name()
        ),
        text => text.to_string(),
    };
    let insight = Insight::new(&job.batch_id, job.methodology, text);

    send_event(
        &event_tx,
        BatchEvent::new(BatchEventKind::AgentCompleted, &job.batch_id)
            .with_agent(agent_id)
            .with_data(serde_json::json!({ "model": output.model_id, "insight_id": insight.id })),
    );

    Ok(insight)
}
