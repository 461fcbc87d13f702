//! # Model Resolver
//!
//! Resolves a preferred model id into a generation capability, walking the
//! fixed fallback chain when the preferred model cannot be loaded.

use std::sync::Arc;

use super::{GenerationCapability, GenerationParams, ModelConfig, ModelLoader};
use crate::error::AnalysisError;

/// Resolves generation capabilities with deterministic fallback
pub struct ModelResolver {
    loader: Arc<dyn ModelLoader>,
    config: ModelConfig,
}

impl ModelResolver {
    pub fn new(loader: Arc<dyn ModelLoader>, config: ModelConfig) -> Self {
        Self { loader, config }
    }

    /// Model configuration in use
    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Load `preferred`, or the first fallback that loads.
    ///
    /// Fails with [`AnalysisError::ModelUnavailable`] once every candidate
    /// has failed. No attempt is retried.
    pub async fn resolve(&self, preferred: &str) -> Result<GenerationCapability, AnalysisError> {
        tracing::info!(model = %preferred, "Attempting to load model");
        match self.loader.load(preferred, GenerationParams::PREFERRED).await {
            Ok(capability) => {
                tracing::debug!(model = %preferred, "Model loaded");
                return Ok(capability);
            }
            Err(e) => {
                tracing::error!(model = %preferred, error = %e, "Error loading model");
            }
        }

        for fallback in self.config.fallbacks.iter() {
            if fallback == preferred {
                continue;
            }

            tracing::warn!(model = %fallback, "Attempting to load fallback model");
            match self.loader.load(fallback, GenerationParams::FALLBACK).await {
                Ok(capability) => {
                    tracing::info!(model = %fallback, preferred = %preferred, "Fallback model loaded");
                    return Ok(capability);
                }
                Err(e) => {
                    tracing::error!(model = %fallback, error = %e, "Error loading fallback model");
                }
            }
        }

        Err(AnalysisError::ModelUnavailable(preferred.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModelError;
    use crate::models::TextGenerator;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::Mutex;

    struct StubModel {
        id: String,
        params: GenerationParams,
    }

    #[async_trait]
    impl TextGenerator for StubModel {
        fn model_id(&self) -> &str {
            &self.id
        }

        fn params(&self) -> GenerationParams {
            self.params
        }

        async fn generate(&self, prompt: &str) -> Result<String, ModelError> {
            Ok(format!("{}: {}", self.id, prompt))
        }
    }

    /// Loads only the models in `available`, recording every attempt
    struct RecordingLoader {
        available: HashSet<String>,
        attempts: Mutex<Vec<(String, u32)>>,
    }

    impl RecordingLoader {
        fn new(available: &[&str]) -> Self {
            Self {
                available: available.iter().map(|s| s.to_string()).collect(),
                attempts: Mutex::new(Vec::new()),
            }
        }

        fn attempts(&self) -> Vec<(String, u32)> {
            self.attempts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ModelLoader for RecordingLoader {
        async fn load(
            &self,
            model_id: &str,
            params: GenerationParams,
        ) -> Result<GenerationCapability, ModelError> {
            self.attempts
                .lock()
                .unwrap()
                .push((model_id.to_string(), params.max_new_tokens));
            if self.available.contains(model_id) {
                Ok(Box::new(StubModel {
                    id: model_id.to_string(),
                    params,
                }))
            } else {
                Err(ModelError::NotFound(model_id.to_string()))
            }
        }
    }

    fn resolver(loader: Arc<RecordingLoader>) -> ModelResolver {
        ModelResolver::new(loader, ModelConfig::default())
    }

    #[tokio::test]
    async fn test_preferred_model_loads_with_full_params() {
        let loader = Arc::new(RecordingLoader::new(&["google/flan-t5-large"]));
        let capability = resolver(loader.clone()).resolve("google/flan-t5-large")
            .await
            .unwrap();

        assert_eq!(capability.model_id(), "google/flan-t5-large");
        assert_eq!(capability.params(), GenerationParams::PREFERRED);
        assert_eq!(loader.attempts().len(), 1);
    }

    #[tokio::test]
    async fn test_fallbacks_tried_in_order() {
        let loader = Arc::new(RecordingLoader::new(&["distilgpt2", "facebook/bart-large-cnn"]));
        let capability = resolver(loader.clone())
            .resolve("google/flan-t5-large")
            .await
            .unwrap();

        // bart comes before distilgpt2 in the chain
        assert_eq!(capability.model_id(), "facebook/bart-large-cnn");
        assert_eq!(capability.params(), GenerationParams::FALLBACK);
        assert_eq!(
            loader.attempts(),
            vec![
                ("google/flan-t5-large".to_string(), 256),
                ("google/flan-t5-base".to_string(), 128),
                ("facebook/bart-large-cnn".to_string(), 128),
            ]
        );
    }

    #[tokio::test]
    async fn test_exhausted_chain_is_model_unavailable() {
        let loader = Arc::new(RecordingLoader::new(&[]));
        let err = resolver(loader.clone())
            .resolve("google/flan-t5-large")
            .await
            .err()
            .unwrap();

        assert_eq!(
            err,
            AnalysisError::ModelUnavailable("google/flan-t5-large".to_string())
        );
        assert_eq!(loader.attempts().len(), 4);
    }

    #[tokio::test]
    async fn test_preferred_in_fallback_list_not_retried() {
        let loader = Arc::new(RecordingLoader::new(&[]));
        let _ = resolver(loader.clone()).resolve("distilgpt2").await;

        let attempted: Vec<String> = loader.attempts().into_iter().map(|(m, _)| m).collect();
        assert_eq!(
            attempted,
            vec!["distilgpt2", "google/flan-t5-base", "facebook/bart-large-cnn"]
        );
    }
}
