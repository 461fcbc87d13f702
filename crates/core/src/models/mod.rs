//! # Methodica Models
//!
//! Text-generation capabilities and the model fallback chain.
//!
//! A [`ModelLoader`] turns a model id plus [`GenerationParams`] into a
//! [`GenerationCapability`]. The [`ModelResolver`] walks the preferred model and
//! then the configured fallbacks until one loads.
//!
//! ## Example
//! ```rust,ignore
//! use methodica_core::models::{InferenceLoader, ModelConfig, ModelResolver};
//!
//! let loader = InferenceLoader::new("https://api-inference.huggingface.co", None)?;
//! let resolver = ModelResolver::new(Arc::new(loader), ModelConfig::default());
//! let capability = resolver.resolve("google/flan-t5-large").await?;
//! let text = capability.generate("Summarize the interviews").await?;
//! ```

pub mod inference;
pub mod resolver;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::ModelError;

pub use inference::InferenceLoader;
pub use resolver::ModelResolver;

/// Default preferred model
pub const DEFAULT_MODEL: &str = "google/flan-t5-large";

/// Default fallback chain, tried in order
pub const DEFAULT_FALLBACK_MODELS: [&str; 3] = [
    "google/flan-t5-base",
    "facebook/bart-large-cnn",
    "distilgpt2",
];

/// Sampling parameters bound to a loaded model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub max_new_tokens: u32,
    pub do_sample: bool,
    pub temperature: f32,
}

impl GenerationParams {
    /// Parameters for the preferred model
    pub const PREFERRED: Self = Self {
        max_new_tokens: 256,
        do_sample: true,
        temperature: 0.7,
    };

    /// Parameters for fallback models (smaller models, smaller outputs)
    pub const FALLBACK: Self = Self {
        max_new_tokens: 128,
        do_sample: true,
        temperature: 0.7,
    };
}

/// A loaded text-in/text-out model.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Id of the backing model
    fn model_id(&self) -> &str;

    /// Parameters this capability was loaded with
    fn params(&self) -> GenerationParams;

    /// Generate a completion for `prompt`
    async fn generate(&self, prompt: &str) -> Result<String, ModelError>;
}

/// Owned handle to a loaded model. Not shared across agent invocations.
pub type GenerationCapability = Box<dyn TextGenerator>;

/// Constructs generation capabilities.
///
/// Implementations must fail (rather than return a degraded capability) when
/// the model does not exist or cannot be served.
#[async_trait]
pub trait ModelLoader: Send + Sync {
    async fn load(
        &self,
        model_id: &str,
        params: GenerationParams,
    ) -> Result<GenerationCapability, ModelError>;
}

/// Model selection for the resolver
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Preferred model id
    pub model: String,
    /// Ordered fallbacks, read-only once the service starts
    pub fallbacks: Arc<[String]>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            fallbacks: DEFAULT_FALLBACK_MODELS
                .iter()
                .map(|m| m.to_string())
                .collect(),
        }
    }
}

impl ModelConfig {
    /// Create a config with the default fallback chain
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Self::default()
        }
    }

    /// Replace the fallback chain
    pub fn with_fallbacks<I, S>(mut self, fallbacks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fallbacks = fallbacks.into_iter().map(Into::into).collect();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_config_default() {
        let config = ModelConfig::default();
        assert_eq!(config.model, "google/flan-t5-large");
        assert_eq!(
            config.fallbacks.as_ref(),
            ["google/flan-t5-base", "facebook/bart-large-cnn", "distilgpt2"]
        );
    }

    #[test]
    fn test_generation_params() {
        assert_eq!(GenerationParams::PREFERRED.max_new_tokens, 256);
        assert_eq!(GenerationParams::FALLBACK.max_new_tokens, 128);
        assert!(GenerationParams::FALLBACK.do_sample);
        assert_eq!(GenerationParams::FALLBACK.temperature, 0.7);
    }

    #[test]
    fn test_with_fallbacks_replaces_chain() {
        let config = ModelConfig::new("big").with_fallbacks(["small"]);
        assert_eq!(config.model, "big");
        assert_eq!(config.fallbacks.len(), 1);
    }

    #[test]
    fn test_model_config_serialization() {
        let config = ModelConfig::new("google/flan-t5-small").with_fallbacks(["distilgpt2"]);
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"fallbacks\":[\"distilgpt2\"]"));

        let parsed: ModelConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.model, "google/flan-t5-small");
        assert_eq!(parsed.fallbacks.as_ref(), ["distilgpt2"]);
    }
}
