//! # Agent Graph
//!
//! Per-agent execution graph. Every strategy enters at [`GraphNode::Generate`]
//! and terminates at [`GraphNode::Finalize`].
//!
//! ```text
//! Direct:  generate → finalize
//! ```

use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;
use crate::models::TextGenerator;

/// Node in the agent graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GraphNode {
    /// Invoke the generation capability on the latest message
    Generate,
    /// Terminal pass-through
    Finalize,
}

/// Shape of the graph a methodology runs through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStrategy {
    /// Single generation, no branching
    Direct,
}

impl PipelineStrategy {
    /// Nodes visited, in order
    pub fn nodes(&self) -> &'static [GraphNode] {
        match self {
            Self::Direct => &[GraphNode::Generate, GraphNode::Finalize],
        }
    }
}

/// Author of a message in the graph history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Human,
    Ai,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn human(content: impl Into<String>) -> Self {
        Self {
            role: Role::Human,
            content: content.into(),
        }
    }

    pub fn ai(content: impl Into<String>) -> Self {
        Self {
            role: Role::Ai,
            content: content.into(),
        }
    }
}

/// State threaded through the graph
#[derive(Debug, Clone, Default)]
pub struct GraphState {
    /// Accumulated message history
    pub messages: Vec<Message>,
}

/// Output of one graph run
#[derive(Debug, Clone)]
pub struct GraphOutput {
    /// Text produced by the last generate node
    pub generated_text: String,
    /// Model that produced it
    pub model_id: String,
    /// Full message history
    pub messages: Vec<Message>,
}

/// The agent execution graph
#[derive(Debug, Clone)]
pub struct AgentGraph {
    strategy: PipelineStrategy,
}

impl AgentGraph {
    pub fn new(strategy: PipelineStrategy) -> Self {
        let nodes = strategy.nodes();
        debug_assert_eq!(nodes.first(), Some(&GraphNode::Generate));
        debug_assert_eq!(nodes.last(), Some(&GraphNode::Finalize));
        Self { strategy }
    }

    /// Run the graph on `input` with `capability`.
    ///
    /// Failures inside a node propagate unchanged. There is no retry and no
    /// partial output.
    pub async fn run(
        &self,
        capability: &dyn TextGenerator,
        input: &str,
    ) -> Result<GraphOutput, AnalysisError> {
        let nodes = self.strategy.nodes();
        let mut state = GraphState {
            messages: vec![Message::human(input)],
        };

        for node in nodes {
            state = match node {
                GraphNode::Generate => generate(capability, state).await?,
                GraphNode::Finalize => finalize(state),
            };
        }

        let generated_text = state
            .messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Ai)
            .map(|m| m.content.clone())
            .unwrap_or_default();

        Ok(GraphOutput {
            generated_text,
            model_id: capability.model_id().to_string(),
            messages: state.messages,
        })
    }
}

async fn generate(
    capability: &dyn TextGenerator,
    mut state: GraphState,
) -> Result<GraphState, AnalysisError> {
    let input = state
        .messages
        .last()
        .map(|m| m.content.as_str())
        .unwrap_or("No input provided");

    let response = capability
        .generate(input)
        .await
        .map_err(|e| AnalysisError::Generation {
            model_id: capability.model_id().to_string(),
            message: e.to_string(),
        })?;

    state.messages.push(Message::ai(response));
    Ok(state)
}

fn finalize(state: GraphState) -> GraphState {
    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModelError;
    use crate::models::GenerationParams;
    use async_trait::async_trait;

    struct Echo;

    #[async_trait]
    impl TextGenerator for Echo {
        fn model_id(&self) -> &str {
            "echo"
        }

        fn params(&self) -> GenerationParams {
            GenerationParams::FALLBACK
        }

        async fn generate(&self, prompt: &str) -> Result<String, ModelError> {
            Ok(format!("echo: {}", prompt))
        }
    }

    struct Broken;

    #[async_trait]
    impl TextGenerator for Broken {
        fn model_id(&self) -> &str {
            "broken"
        }

        fn params(&self) -> GenerationParams {
            GenerationParams::FALLBACK
        }

        async fn generate(&self, _prompt: &str) -> Result<String, ModelError> {
            Err(ModelError::Backend("out of memory".into()))
        }
    }

    #[test]
    fn test_direct_strategy_shape() {
        assert_eq!(
            PipelineStrategy::Direct.nodes(),
            &[GraphNode::Generate, GraphNode::Finalize]
        );
    }

    #[tokio::test]
    async fn test_generate_then_finalize() {
        let graph = AgentGraph::new(PipelineStrategy::Direct);
        let output = graph.run(&Echo, "interviews").await.unwrap();

        assert_eq!(output.generated_text, "echo: interviews");
        assert_eq!(output.model_id, "echo");
        assert_eq!(
            output.messages,
            vec![Message::human("interviews"), Message::ai("echo: interviews")]
        );
    }

    #[tokio::test]
    async fn test_generation_failure_propagates() {
        let graph = AgentGraph::new(PipelineStrategy::Direct);
        let err = graph.run(&Broken, "interviews").await.unwrap_err();

        match err {
            AnalysisError::Generation { model_id, message } => {
                assert_eq!(model_id, "broken");
                assert!(message.contains("out of memory"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
