//! Google Gemini `generateContent` client

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::DEFAULT_BASE_URL;
use crate::error::ServiceError;
use crate::provider::{CompletionRequest, CompletionService, SpeakerRole};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: GeminiError,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    message: String,
}

#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl GeminiClient {
    pub fn new(api_key: &str, model: &str) -> Self {
        Self::with_base_url(api_key, model, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(api_key: &str, model: &str, base_url: &str) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }

    pub fn list_models() -> Vec<String> {
        vec![
            "gemini-1.5-flash".to_string(),
            "gemini-1.5-pro".to_string(),
            "gemini-2.0-flash".to_string(),
            "gemini-2.5-flash".to_string(),
            "gemini-2.5-pro".to_string(),
        ]
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, model)
    }

    fn translate_request(request: &CompletionRequest) -> GeminiRequest {
        let mut contents: Vec<GeminiContent> = request
            .history
            .iter()
            .map(|turn| GeminiContent {
                role: Some(turn.role.as_str().to_string()),
                parts: vec![GeminiPart { text: turn.text.clone() }],
            })
            .collect();

        contents.push(GeminiContent {
            role: Some(SpeakerRole::User.as_str().to_string()),
            parts: vec![GeminiPart { text: request.prompt.clone() }],
        });

        GeminiRequest { contents }
    }

    fn extract_text(response: GeminiResponse) -> Result<String, ServiceError> {
        let candidate = response
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| ServiceError::malformed("No candidates in response"))?;

        let content = candidate
            .content
            .ok_or_else(|| ServiceError::malformed("Candidate has no content"))?;

        Ok(content
            .parts
            .into_iter()
            .map(|part| part.text)
            .collect::<Vec<_>>()
            .join(""))
    }

    fn classify_status(status: reqwest::StatusCode, body: &str) -> ServiceError {
        let message = serde_json::from_str::<GeminiErrorResponse>(body)
            .map(|e| e.error.message)
            .unwrap_or_else(|_| body.to_string());

        match status.as_u16() {
            400 => ServiceError::invalid_request(format!("Invalid request: {}", message)),
            401 | 403 => ServiceError::auth(format!("Authentication failed: {}", message)),
            429 => ServiceError::quota(format!("Quota exceeded: {}", message)),
            500..=599 => ServiceError::server(format!("Server error {}: {}", status, message)),
            _ => ServiceError::unknown(format!("HTTP {}: {}", status, message)),
        }
    }
}

#[async_trait]
impl CompletionService for GeminiClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ServiceError> {
        let model = if request.model.is_empty() {
            self.model.as_str()
        } else {
            request.model.as_str()
        };
        let body = Self::translate_request(request);

        let response = self
            .client
            .post(self.endpoint(model))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ServiceError::network(format!("Request timeout: {}", e))
                } else if e.is_connect() {
                    ServiceError::network(format!("Connection failed: {}", e))
                } else {
                    ServiceError::unknown(format!("Request failed: {}", e))
                }
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ServiceError::network(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(Self::classify_status(status, &text));
        }

        let gemini_response: GeminiResponse = serde_json::from_str(&text)
            .map_err(|e| ServiceError::malformed(format!("Failed to parse response: {}", e)))?;

        Self::extract_text(gemini_response)
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}
