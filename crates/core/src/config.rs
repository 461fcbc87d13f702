//! # Service Configuration
//!
//! Settings read once at start-up. Everything has a default so an empty
//! environment yields a working (if disconnected from any real model) service.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::methodology::Methodology;
use crate::models::inference::DEFAULT_INFERENCE_URL;
use crate::models::ModelConfig;
use crate::state::db::DEFAULT_DB_PATH;
use crate::swarm::OrchestratorConfig;

pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_CORS_ORIGIN: &str = "http://localhost:8080";

/// Service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Preferred model and fallback chain
    pub model: ModelConfig,
    /// Per-agent model overrides
    #[serde(default)]
    pub per_agent_models: HashMap<Methodology, String>,
    pub cors_origins: Vec<String>,
    pub inference_url: String,
    #[serde(skip_serializing)]
    pub inference_token: Option<String>,
    /// SQLite file; `None` runs without a data store
    pub database_path: Option<PathBuf>,
    pub agent_timeout_secs: u64,
    pub max_concurrent_agents: usize,
    pub port: u16,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            model: ModelConfig::default(),
            per_agent_models: HashMap::new(),
            cors_origins: vec![DEFAULT_CORS_ORIGIN.to_string()],
            inference_url: DEFAULT_INFERENCE_URL.to_string(),
            inference_token: None,
            database_path: Some(PathBuf::from(DEFAULT_DB_PATH)),
            agent_timeout_secs: 120,
            max_concurrent_agents: 1,
            port: DEFAULT_PORT,
        }
    }
}

impl ServiceConfig {
    /// Load from process environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = Self::default();

        if let Some(model) = var("LOCAL_LLM_MODEL") {
            config.model.model = model;
        }
        if let Some(fallbacks) = var("FALLBACK_MODELS") {
            config.model = config.model.with_fallbacks(split_list(&fallbacks));
        }
        if let Some(models) = var("AGENT_MODELS") {
            config.per_agent_models = parse_agent_models(&models)?;
        }
        if let Some(origins) = var("CORS_ORIGINS") {
            config.cors_origins = split_list(&origins);
        }
        if let Some(url) = var("INFERENCE_URL") {
            config.inference_url = url;
        }
        config.inference_token = var("INFERENCE_TOKEN");
        if let Some(path) = var("DATABASE_PATH") {
            config.database_path = if path.eq_ignore_ascii_case("none") {
                None
            } else {
                Some(PathBuf::from(path))
            };
        }
        if let Some(secs) = var("AGENT_TIMEOUT_SECS") {
            config.agent_timeout_secs = parse_number("AGENT_TIMEOUT_SECS", &secs)?;
        }
        if let Some(n) = var("MAX_CONCURRENT_AGENTS") {
            config.max_concurrent_agents = parse_number("MAX_CONCURRENT_AGENTS", &n)?;
        }
        if let Some(port) = var("PORT") {
            config.port = parse_number("PORT", &port)?;
        }

        if config.max_concurrent_agents == 0 {
            anyhow::bail!("MAX_CONCURRENT_AGENTS must be at least 1");
        }

        Ok(config)
    }

    /// Orchestrator settings derived from this config
    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            per_agent_models: self.per_agent_models.clone(),
            agent_timeout: Duration::from_secs(self.agent_timeout_secs),
            max_concurrent_agents: self.max_concurrent_agents,
        }
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn parse_number<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .parse()
        .with_context(|| format!("Invalid value for {}: {:?}", key, value))
}

/// Parse `agent-id=model,agent-id=model`
fn parse_agent_models(value: &str) -> Result<HashMap<Methodology, String>> {
    split_list(value)
        .into_iter()
        .map(|pair| -> Result<(Methodology, String)> {
            let (agent, model) = pair
                .split_once('=')
                .with_context(|| format!("Expected agent=model, got {:?}", pair))?;
            let methodology = agent.trim().parse::<Methodology>()?;
            Ok((methodology, model.trim().to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_empty_environment_uses_defaults() {
        let config = ServiceConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.model.model, "google/flan-t5-large");
        assert_eq!(config.model.fallbacks.len(), 3);
        assert_eq!(config.cors_origins, vec!["http://localhost:8080"]);
        assert_eq!(config.port, 8000);
        assert_eq!(config.database_path, Some(PathBuf::from(DEFAULT_DB_PATH)));
        assert_eq!(config.orchestrator_config().agent_timeout, Duration::from_secs(120));
    }

    #[test]
    fn test_overrides() {
        let config = ServiceConfig::from_lookup(lookup(&[
            ("LOCAL_LLM_MODEL", "google/flan-t5-small"),
            ("FALLBACK_MODELS", " distilgpt2 , ,gpt2"),
            ("CORS_ORIGINS", "http://a.test,http://b.test"),
            ("DATABASE_PATH", "none"),
            ("MAX_CONCURRENT_AGENTS", "4"),
            ("AGENT_MODELS", "phenomenological=google/flan-t5-base"),
        ]))
        .unwrap();

        assert_eq!(config.model.model, "google/flan-t5-small");
        assert_eq!(config.model.fallbacks.to_vec(), vec!["distilgpt2", "gpt2"]);
        assert_eq!(config.cors_origins.len(), 2);
        assert!(config.database_path.is_none());
        assert_eq!(config.max_concurrent_agents, 4);
        assert_eq!(
            config.per_agent_models.get(&Methodology::Phenomenological).map(String::as_str),
            Some("google/flan-t5-base")
        );
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(ServiceConfig::from_lookup(lookup(&[("PORT", "eighty")])).is_err());
        assert!(ServiceConfig::from_lookup(lookup(&[("MAX_CONCURRENT_AGENTS", "0")])).is_err());
        assert!(ServiceConfig::from_lookup(lookup(&[("AGENT_MODELS", "bogus=gpt2")])).is_err());
        assert!(ServiceConfig::from_lookup(lookup(&[("AGENT_MODELS", "grounded-theory")])).is_err());
    }

    #[test]
    fn test_serialized_config_hides_token() {
        let config = ServiceConfig::from_lookup(lookup(&[
            ("INFERENCE_TOKEN", "hf_secret"),
            ("AGENT_MODELS", "phenomenological=distilgpt2"),
        ]))
        .unwrap();

        let json = serde_json::to_value(&config).unwrap();
        assert!(json.get("inference_token").is_none());
        assert_eq!(json["per_agent_models"]["phenomenological"], "distilgpt2");
        assert_eq!(json["model"]["fallbacks"].as_array().map(Vec::len), Some(3));

        let parsed: ServiceConfig = serde_json::from_value(json).unwrap();
        assert!(parsed.inference_token.is_none());
        assert_eq!(parsed.model.fallbacks, config.model.fallbacks);
    }
}
