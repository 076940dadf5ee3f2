use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use crate::error::{AdvisorError, Result};
use crate::models::{GenerateRequest, GenerateResponse};

const PROVIDER: &str = "gemini";

/// Capability to run one generative-model call
///
/// A single attempt per call. Model fallback lives in the callers.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn generate(&self, req: &GenerateRequest) -> Result<GenerateResponse>;
}

pub struct GeminiTransport {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GeminiTransport {
    pub fn new(api_key: String, base_url: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.base_url, model)
    }
}

#[async_trait]
impl Transport for GeminiTransport {
    async fn generate(&self, req: &GenerateRequest) -> Result<GenerateResponse> {
        tracing::debug!("Calling Gemini model {}", req.model);

        let response = self
            .client
            .post(self.endpoint(&req.model))
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(req)
            .send()
            .await
            .map_err(|e| {
                AdvisorError::upstream(PROVIDER, format!("Failed to send request to Gemini API: {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AdvisorError::upstream(
                PROVIDER,
                format!("Gemini API error {}: {}", status.as_u16(), body),
            ));
        }

        response.json().await.map_err(|e| {
            AdvisorError::upstream(PROVIDER, format!("Failed to parse Gemini API response: {e}"))
        })
    }
}

/// Canned-response transport shared by the classifier, extractor and advice tests
#[cfg(test)]
pub(crate) struct MockTransport {
    responses: std::sync::Mutex<Vec<Result<GenerateResponse>>>,
    pub(crate) seen: std::sync::Mutex<Vec<GenerateRequest>>,
}

#[cfg(test)]
impl MockTransport {
    /// Responses are served in the order given
    pub(crate) fn new(responses: Vec<Result<GenerateResponse>>) -> Self {
        MockTransport {
            responses: std::sync::Mutex::new(responses),
            seen: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn texts(texts: &[&str]) -> Self {
        Self::new(
            texts
                .iter()
                .map(|t| Ok(GenerateResponse::from_text(*t)))
                .collect(),
        )
    }

    pub(crate) fn models_called(&self) -> Vec<String> {
        self.seen
            .lock()
            .expect("Mock transport mutex should not be poisoned")
            .iter()
            .map(|r| r.model.clone())
            .collect()
    }
}

#[cfg(test)]
#[async_trait]
impl Transport for MockTransport {
    async fn generate(&self, req: &GenerateRequest) -> Result<GenerateResponse> {
        self.seen
            .lock()
            .expect("Mock transport mutex should not be poisoned")
            .push(req.clone());
        let mut responses = self
            .responses
            .lock()
            .expect("Mock transport mutex should not be poisoned");
        if responses.is_empty() {
            Err(AdvisorError::Internal("No more mock responses".to_string()))
        } else {
            responses.remove(0)
        }
    }
}
