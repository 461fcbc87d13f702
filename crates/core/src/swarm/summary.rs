//! # Summary
//!
//! Reduces a batch's insights into one human-readable synthesis.

use crate::state::Insight;

/// Produces the batch summary from its insights
pub trait Summarizer: Send + Sync {
    fn summarize(&self, insights: &[Insight]) -> String;
}

/// Deterministic summarizer: leads with the most relevant findings
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateSummarizer;

impl Summarizer for TemplateSummarizer {
    fn summarize(&self, insights: &[Insight]) -> String {
        if insights.is_empty() {
            return "No insights were produced for this analysis.".to_string();
        }

        let mut ranked: Vec<&Insight> = insights.iter().collect();
        ranked.sort_by(|a, b| b.relevance.cmp(&a.relevance));

        let mut labels: Vec<&str> = Vec::new();
        for insight in &ranked {
            if !labels.contains(&insight.methodology_label.as_str()) {
                labels.push(&insight.methodology_label);
            }
        }

        let findings = ranked
            .iter()
            .map(|i| first_sentence(&i.text))
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        format!(
            "Analysis across {} ({} {}) reveals: {}",
            labels.join(", "),
            insights.len(),
            if insights.len() == 1 { "insight" } else { "insights" },
            findings
        )
    }
}

fn first_sentence(text: &str) -> String {
    let text = text.trim();
    match text.find(['.', '!', '?']) {
        Some(end) => text[..=end].to_string(),
        None if text.is_empty() => String::new(),
        None => format!("{}.", text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::methodology::Methodology;

    fn insight(m: Methodology, text: &str) -> Insight {
        Insight::new("batch-1", m, text.to_string())
    }

    #[test]
    fn test_summary_orders_by_relevance() {
        let insights = vec![
            insight(Methodology::BiasIdentification, "Jargon excludes novices. More detail."),
            insight(Methodology::GroundedTheory, "Navigation is hard on mobile"),
        ];
        let summary = TemplateSummarizer.summarize(&insights);

        assert!(summary.starts_with("Analysis across Grounded Theory, Critical Analysis (2 insights)"));
        assert!(summary.ends_with("Navigation is hard on mobile. Jargon excludes novices."));
    }

    #[test]
    fn test_summary_deduplicates_labels() {
        let insights = vec![
            insight(Methodology::BiasIdentification, "A."),
            insight(Methodology::CriticalAnalysis, "B."),
        ];
        let summary = TemplateSummarizer.summarize(&insights);
        assert_eq!(summary.matches("Critical Analysis").count(), 1);
    }

    #[test]
    fn test_empty_summary() {
        assert!(!TemplateSummarizer.summarize(&[]).is_empty());
    }
}
