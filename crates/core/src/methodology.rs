//! # Methodology Catalog
//!
//! The closed set of analytical lenses an analysis batch can run. Request ids
//! are parsed into [`Methodology`] once at the boundary; nothing past
//! validation handles raw id strings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::AnalysisError;
use crate::state::ProjectContext;
use crate::swarm::graph::PipelineStrategy;

/// Longest excerpt of a single document included in a prompt
const MAX_DOCUMENT_CHARS: usize = 1_500;

/// Total document excerpt budget of one prompt
const MAX_CONTEXT_CHARS: usize = 6_000;

/// An analysis methodology (agent)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Methodology {
    GroundedTheory,
    FeministTheory,
    BiasIdentification,
    CriticalAnalysis,
    Phenomenological,
}

impl Methodology {
    /// Every methodology, in catalog order
    pub fn all() -> Vec<Methodology> {
        vec![
            Methodology::GroundedTheory,
            Methodology::FeministTheory,
            Methodology::BiasIdentification,
            Methodology::CriticalAnalysis,
            Methodology::Phenomenological,
        ]
    }

    /// Stable agent id used on the wire and in storage
    pub fn id(&self) -> &'static str {
        match self {
            Self::GroundedTheory => "grounded-theory",
            Self::FeministTheory => "feminist-theory",
            Self::BiasIdentification => "bias-identification",
            Self::CriticalAnalysis => "critical-analysis",
            Self::Phenomenological => "phenomenological",
        }
    }

    /// Agent name shown to users
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::GroundedTheory => "Grounded Theory Agent",
            Self::FeministTheory => "Feminist Theory Agent",
            Self::BiasIdentification => "Bias Identification Agent",
            Self::CriticalAnalysis => "Critical Analysis Agent",
            Self::Phenomenological => "Phenomenological Agent",
        }
    }

    /// Methodology label attached to insights.
    ///
    /// Bias identification reports under the critical analysis umbrella.
    pub fn label(&self) -> &'static str {
        match self {
            Self::GroundedTheory => "Grounded Theory",
            Self::FeministTheory => "Feminist Theory",
            Self::BiasIdentification | Self::CriticalAnalysis => "Critical Analysis",
            Self::Phenomenological => "Phenomenological Analysis",
        }
    }

    /// Relevance score (0-100) assigned to this methodology's insights
    pub fn relevance(&self) -> u8 {
        match self {
            Self::GroundedTheory => 92,
            Self::FeministTheory => 85,
            Self::BiasIdentification => 78,
            Self::CriticalAnalysis => 82,
            Self::Phenomenological => 88,
        }
    }

    /// Analytical instructions prepended to the project material
    pub fn instructions(&self) -> &'static str {
        match self {
            Self::GroundedTheory => {
                "Apply grounded theory. Code the material openly, group codes into \
                 categories, and state the single most strongly supported emergent theme."
            }
            Self::FeministTheory => {
                "Apply a feminist theory lens. Identify how gender and power shape the \
                 experiences described, and state the most significant disparity."
            }
            Self::BiasIdentification => {
                "Identify bias. Look for exclusionary language, unstated assumptions, and \
                 barriers to particular groups, and state the most consequential one."
            }
            Self::CriticalAnalysis => {
                "Perform a critical analysis. Question the dominant narrative, surface what \
                 it leaves out, and state the most important omission."
            }
            Self::Phenomenological => {
                "Apply phenomenological analysis. Describe the lived experience of the \
                 participants and state the essential structure of that experience."
            }
        }
    }

    /// Execution graph shape for this methodology
    pub fn strategy(&self) -> PipelineStrategy {
        PipelineStrategy::Direct
    }

    /// Build the generation prompt for a project context
    pub fn build_prompt(&self, context: &ProjectContext) -> String {
        let mut prompt = format!("{}\n\n", self.instructions());

        if context.documents.is_empty() {
            prompt.push_str("No project documents are available.\n");
        } else {
            let mut budget = MAX_CONTEXT_CHARS;
            let mut omitted = 0;
            for doc in &context.documents {
                if budget == 0 {
                    omitted += 1;
                    continue;
                }
                let excerpt: String = doc
                    .content
                    .chars()
                    .take(MAX_DOCUMENT_CHARS.min(budget))
                    .collect();
                budget -= excerpt.chars().count();
                prompt.push_str(&format!("## {}\n{}\n\n", doc.name, excerpt.trim()));
            }
            if omitted > 0 {
                prompt.push_str(&format!("({} more documents omitted)\n\n", omitted));
            }
        }

        prompt.push_str("Finding:");
        prompt
    }
}

impl fmt::Display for Methodology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Methodology {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .into_iter()
            .find(|m| m.id() == s)
            .ok_or_else(|| AnalysisError::InvalidAgent(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ProjectDocument;

    #[test]
    fn test_parse_round_trips_every_id() {
        for m in Methodology::all() {
            assert_eq!(m.id().parse::<Methodology>().unwrap(), m);
        }
    }

    #[test]
    fn test_unknown_id_is_invalid_agent() {
        let err = "not-a-real-agent".parse::<Methodology>().unwrap_err();
        assert_eq!(err, AnalysisError::InvalidAgent("not-a-real-agent".into()));
    }

    #[test]
    fn test_serde_uses_agent_id() {
        let json = serde_json::to_string(&Methodology::BiasIdentification).unwrap();
        assert_eq!(json, "\"bias-identification\"");
    }

    #[test]
    fn test_bias_identification_reports_as_critical_analysis() {
        assert_eq!(Methodology::BiasIdentification.label(), "Critical Analysis");
        assert_eq!(Methodology::CriticalAnalysis.label(), "Critical Analysis");
    }

    #[test]
    fn test_prompt_includes_documents() {
        let context = ProjectContext {
            documents: vec![ProjectDocument {
                id: "doc1".into(),
                name: "Interview 1".into(),
                content: "The menu was hard to find on my phone.".into(),
            }],
        };
        let prompt = Methodology::GroundedTheory.build_prompt(&context);
        assert!(prompt.starts_with("Apply grounded theory"));
        assert!(prompt.contains("## Interview 1"));
        assert!(prompt.contains("hard to find"));
        assert!(prompt.ends_with("Finding:"));
    }

    #[test]
    fn test_prompt_truncates_long_documents() {
        let context = ProjectContext {
            documents: vec![ProjectDocument {
                id: "doc1".into(),
                name: "Transcript".into(),
                content: "x".repeat(MAX_DOCUMENT_CHARS * 2),
            }],
        };
        let prompt = Methodology::Phenomenological.build_prompt(&context);
        assert!(prompt.len() < MAX_DOCUMENT_CHARS + 500);
    }

    #[test]
    fn test_prompt_bounded_for_large_projects() {
        let context = ProjectContext {
            documents: (0..20)
                .map(|i| ProjectDocument {
                    id: format!("doc{}", i),
                    name: format!("Interview {}", i),
                    content: "y".repeat(MAX_DOCUMENT_CHARS),
                })
                .collect(),
        };
        let prompt = Methodology::CriticalAnalysis.build_prompt(&context);

        assert!(prompt.len() < MAX_CONTEXT_CHARS + 1_000);
        assert!(prompt.contains("## Interview 3"));
        assert!(!prompt.contains("## Interview 4\n"));
        assert!(prompt.contains("(16 more documents omitted)"));
        assert!(prompt.ends_with("Finding:"));
    }
}
