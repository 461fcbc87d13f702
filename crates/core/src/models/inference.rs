//! # Inference Backend
//!
//! HTTP text-generation backend speaking the Hugging Face inference API.
//! A model "loads" when the status endpoint reports it can be served.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{GenerationCapability, GenerationParams, ModelLoader, TextGenerator};
use crate::error::ModelError;

/// Default inference endpoint
pub const DEFAULT_INFERENCE_URL: &str = "https://api-inference.huggingface.co";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(90);

/// Loads models served behind an inference endpoint
#[derive(Clone)]
pub struct InferenceLoader {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelStatus {
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    inputs: &'a str,
    parameters: GenerateParameters,
}

#[derive(Serialize)]
struct GenerateParameters {
    max_new_tokens: u32,
    do_sample: bool,
    temperature: f32,
    return_full_text: bool,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GenerateResponse {
    Generated(Vec<GeneratedText>),
    Failed { error: String },
}

#[derive(Debug, Deserialize)]
struct GeneratedText {
    generated_text: String,
}

impl InferenceLoader {
    /// Create a loader for `base_url`, authenticating with `token` if given
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Result<Self, ModelError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ModelError::Backend(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        })
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Ask the backend whether `model_id` can be served
    async fn check_status(&self, model_id: &str) -> Result<(), ModelError> {
        let url = format!("{}/status/{}", self.base_url, model_id);
        let response = self
            .authorized(self.client.get(&url))
            .send()
            .await
            .map_err(|e| ModelError::Backend(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => return Err(ModelError::NotFound(model_id.to_string())),
            s if !s.is_success() => {
                return Err(ModelError::Backend(format!(
                    "status check for '{}' returned {}",
                    model_id, s
                )))
            }
            _ => {}
        }

        let status: ModelStatus = response
            .json()
            .await
            .map_err(|e| ModelError::Backend(e.to_string()))?;

        if let Some(error) = status.error {
            return Err(ModelError::Unsupported {
                model_id: model_id.to_string(),
                reason: error,
            });
        }

        match status.state.as_deref() {
            Some("TooBig") => Err(ModelError::Unsupported {
                model_id: model_id.to_string(),
                reason: "model is too large for the inference backend".to_string(),
            }),
            Some("error") => Err(ModelError::Unsupported {
                model_id: model_id.to_string(),
                reason: "backend reported the model in an error state".to_string(),
            }),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl ModelLoader for InferenceLoader {
    async fn load(
        &self,
        model_id: &str,
        params: GenerationParams,
    ) -> Result<GenerationCapability, ModelError> {
        self.check_status(model_id).await?;

        Ok(Box::new(InferenceModel {
            loader: self.clone(),
            model_id: model_id.to_string(),
            params,
        }))
    }
}

/// A model served by [`InferenceLoader`]
pub struct InferenceModel {
    loader: InferenceLoader,
    model_id: String,
    params: GenerationParams,
}

#[async_trait]
impl TextGenerator for InferenceModel {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn params(&self) -> GenerationParams {
        self.params
    }

    async fn generate(&self, prompt: &str) -> Result<String, ModelError> {
        let url = format!("{}/models/{}", self.loader.base_url, self.model_id);
        let body = GenerateRequest {
            inputs: prompt,
            parameters: GenerateParameters {
                max_new_tokens: self.params.max_new_tokens,
                do_sample: self.params.do_sample,
                temperature: self.params.temperature,
                return_full_text: false,
            },
        };

        let response = self
            .loader
            .authorized(self.loader.client.post(&url))
            .json(&body)
            .send()
            .await
            .map_err(|e| ModelError::Backend(e.to_string()))?;

        let status = response.status();
        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ModelError::Backend(format!("{} ({})", e, status)))?;

        parse_generation(&self.model_id, parsed)
    }
}

fn parse_generation(model_id: &str, response: GenerateResponse) -> Result<String, ModelError> {
    match response {
        GenerateResponse::Generated(mut outputs) if !outputs.is_empty() => {
            Ok(outputs.swap_remove(0).generated_text)
        }
        GenerateResponse::Generated(_) => Err(ModelError::Backend(format!(
            "model '{}' returned no generations",
            model_id
        ))),
        GenerateResponse::Failed { error } => Err(ModelError::Backend(error)),
    }
}
