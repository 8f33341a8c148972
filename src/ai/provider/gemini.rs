//! Gemini API Provider
//!
//! Primary provider using Gemini's `generateContent` endpoint.
//! Structured requests set `responseMimeType = application/json`.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{
    GenerationProvider, ProviderConfig, ProviderResult, body_preview, build_http_client,
    validate_endpoint,
};
use crate::types::{FailureClassifier, ProviderFailure, Result};

const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-2.5-flash";
const PROVIDER_NAME: &str = "gemini";

/// Gemini provider with secure API key handling
pub struct GeminiProvider {
    /// API key stored securely - never exposed in logs or debug output
    api_key: Option<SecretString>,
    api_base: String,
    model: String,
    temperature: f32,
    client: reqwest::Client,
}

impl std::fmt::Debug for GeminiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiProvider")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .finish()
    }
}

impl GeminiProvider {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let temperature = config.temperature();
        let api_base = config
            .api_base
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        let api_base = validate_endpoint(&api_base, PROVIDER_NAME)?;

        Ok(Self {
            api_key: config.api_key.map(SecretString::from),
            api_base,
            model: config.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            temperature,
            client: build_http_client(config.timeout_secs)?,
        })
    }

    fn build_request(&self, prompt: &str, want_structured: bool) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
                response_mime_type: want_structured.then(|| "application/json".to_string()),
            },
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.api_base, self.model)
    }
}

#[async_trait]
impl GenerationProvider for GeminiProvider {
    async fn generate(&self, prompt: &str, want_structured: bool) -> ProviderResult<String> {
        let Some(api_key) = &self.api_key else {
            return Err(ProviderFailure::auth_missing(PROVIDER_NAME));
        };

        info!(
            "Generating with Gemini (model: {}, structured: {})",
            self.model, want_structured
        );

        let request = self.build_request(prompt, want_structured);

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| FailureClassifier::classify_transport(&e, PROVIDER_NAME))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FailureClassifier::classify_http_status(
                status.as_u16(),
                &format!("Gemini API error ({}): {}", status, body_preview(&body)),
                PROVIDER_NAME,
            ));
        }

        let body: GenerateContentResponse = response.json().await.map_err(|e| {
            ProviderFailure::malformed(
                format!("Failed to parse Gemini response: {}", e),
                PROVIDER_NAME,
            )
        })?;

        debug!("Received response from Gemini");
        body.into_text().ok_or_else(|| {
            ProviderFailure::malformed("No text in Gemini response", PROVIDER_NAME)
        })
    }

    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn has_credentials(&self) -> bool {
        self.api_key.is_some()
    }
}

// Request/Response types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<RequestContent>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct RequestContent {
    parts: Vec<RequestPart>,
}

#[derive(Debug, Serialize)]
struct RequestPart {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

impl GenerateContentResponse {
    /// Text of the first part of the first candidate
    fn into_text(self) -> Option<String> {
        self.candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .next()?
            .text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::provider::ProviderKind;
    use crate::types::FailureKind;
    use mockito::{Matcher, Server};

    fn config_for(server: &Server) -> ProviderConfig {
        ProviderConfig::for_kind(ProviderKind::Gemini)
            .with_api_key("test-gemini-key")
            .with_api_base(server.url())
    }

    #[test]
    fn test_structured_request_sets_mime_type() {
        let provider = GeminiProvider::new(
            ProviderConfig::for_kind(ProviderKind::Gemini).with_api_key("k"),
        )
        .unwrap();

        let structured = serde_json::to_value(provider.build_request("hi", true)).unwrap();
        assert_eq!(
            structured["generationConfig"]["responseMimeType"],
            "application/json"
        );
        assert_eq!(structured["contents"][0]["parts"][0]["text"], "hi");

        let free_form = serde_json::to_value(provider.build_request("hi", false)).unwrap();
        assert!(free_form["generationConfig"].get("responseMimeType").is_none());
    }

    #[test]
    fn test_debug_redacts_key() {
        let provider = GeminiProvider::new(
            ProviderConfig::for_kind(ProviderKind::Gemini).with_api_key("super-secret"),
        )
        .unwrap();
        assert!(!format!("{:?}", provider).contains("super-secret"));
    }

    #[tokio::test]
    async fn test_missing_key_fails_without_request() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let config = ProviderConfig::for_kind(ProviderKind::Gemini).with_api_base(server.url());
        let provider = GeminiProvider::new(config).unwrap();
        assert!(!provider.has_credentials());

        let failure = provider.generate("prompt", true).await.unwrap_err();
        assert_eq!(failure.kind, FailureKind::AuthMissing);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_generate_returns_first_candidate_text() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/models/gemini-2.5-flash:generateContent")
            .match_header("x-goog-api-key", "test-gemini-key")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                serde_json::json!({
                    "candidates": [{
                        "content": {"parts": [{"text": "{\"problems\": []}"}]}
                    }]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let provider = GeminiProvider::new(config_for(&server)).unwrap();
        let text = provider.generate("prompt", true).await.unwrap();

        assert_eq!(text, "{\"problems\": []}");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_status_429_is_rate_limited() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", Matcher::Any)
            .with_status(429)
            .with_body("quota exhausted")
            .create_async()
            .await;

        let provider = GeminiProvider::new(config_for(&server)).unwrap();
        let failure = provider.generate("prompt", true).await.unwrap_err();

        assert_eq!(failure.kind, FailureKind::RateLimited);
        assert_eq!(failure.status, Some(429));
    }

    #[tokio::test]
    async fn test_server_error_is_not_available() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", Matcher::Any)
            .with_status(503)
            .create_async()
            .await;

        let provider = GeminiProvider::new(config_for(&server)).unwrap();
        let failure = provider.generate("prompt", true).await.unwrap_err();
        assert_eq!(failure.kind, FailureKind::NotAvailable);
    }

    #[tokio::test]
    async fn test_empty_candidates_is_malformed() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"candidates": []}"#)
            .create_async()
            .await;

        let provider = GeminiProvider::new(config_for(&server)).unwrap();
        let failure = provider.generate("prompt", true).await.unwrap_err();
        assert_eq!(failure.kind, FailureKind::Malformed);
    }
}
