//! Groq API Provider
//!
//! Secondary provider using Groq's OpenAI-compatible Chat Completions API.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{
    GenerationProvider, ProviderConfig, ProviderResult, body_preview, build_http_client,
    validate_endpoint,
};
use crate::types::{FailureClassifier, ProviderFailure, Result};

const DEFAULT_API_BASE: &str = "https://api.groq.com/openai/v1";
const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";
const PROVIDER_NAME: &str = "groq";

const SYSTEM_PROMPT: &str = "You are a DSA expert. Return valid JSON only.";

/// Groq provider with secure API key handling
pub struct GroqProvider {
    /// API key stored securely - never exposed in logs or debug output
    api_key: Option<SecretString>,
    api_base: String,
    model: String,
    temperature: f32,
    client: reqwest::Client,
}

impl std::fmt::Debug for GroqProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroqProvider")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .finish()
    }
}

impl GroqProvider {
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

    fn build_request(&self, prompt: &str, want_structured: bool) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt.to_string(),
                },
            ],
            temperature: self.temperature,
            response_format: want_structured.then(|| ResponseFormat {
                format_type: "json_object".to_string(),
            }),
        }
    }
}

#[async_trait]
impl GenerationProvider for GroqProvider {
    async fn generate(&self, prompt: &str, want_structured: bool) -> ProviderResult<String> {
        let Some(api_key) = &self.api_key else {
            return Err(ProviderFailure::auth_missing(PROVIDER_NAME));
        };

        info!(
            "Generating with Groq (model: {}, structured: {})",
            self.model, want_structured
        );

        let request = self.build_request(prompt, want_structured);
        let url = format!("{}/chat/completions", self.api_base);

        let response = self
            .client
            .post(&url)
            .header(
                "Authorization",
                format!("Bearer {}", api_key.expose_secret()),
            )
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| FailureClassifier::classify_transport(&e, PROVIDER_NAME))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FailureClassifier::classify_http_status(
                status.as_u16(),
                &format!("Groq API error ({}): {}", status, body_preview(&body)),
                PROVIDER_NAME,
            ));
        }

        let body: ChatCompletionResponse = response.json().await.map_err(|e| {
            ProviderFailure::malformed(
                format!("Failed to parse Groq response: {}", e),
                PROVIDER_NAME,
            )
        })?;

        debug!("Received response from Groq");
        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ProviderFailure::malformed("No content in Groq response", PROVIDER_NAME))
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
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::provider::ProviderKind;
    use crate::types::FailureKind;
    use mockito::{Matcher, Server};

    fn provider_for(server: &Server) -> GroqProvider {
        GroqProvider::new(
            ProviderConfig::for_kind(ProviderKind::Groq)
                .with_api_key("gsk_test")
                .with_api_base(server.url()),
        )
        .unwrap()
    }

    #[test]
    fn test_request_envelope() {
        let provider =
            GroqProvider::new(ProviderConfig::for_kind(ProviderKind::Groq).with_api_key("k"))
                .unwrap();

        let request = serde_json::to_value(provider.build_request("make problems", true)).unwrap();
        assert_eq!(request["model"], DEFAULT_MODEL);
        assert_eq!(request["messages"][0]["role"], "system");
        assert_eq!(request["messages"][1]["content"], "make problems");
        assert_eq!(request["response_format"]["type"], "json_object");

        let free_form = serde_json::to_value(provider.build_request("x", false)).unwrap();
        assert!(free_form.get("response_format").is_none());
    }

    #[tokio::test]
    async fn test_generate_sends_bearer_token() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer gsk_test")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                serde_json::json!({
                    "choices": [{"message": {"content": "[{\"title\": \"Two Sum\"}]"}}]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let text = provider_for(&server).generate("prompt", true).await.unwrap();
        assert_eq!(text, "[{\"title\": \"Two Sum\"}]");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_missing_key_fails_without_request() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let provider = GroqProvider::new(
            ProviderConfig::for_kind(ProviderKind::Groq).with_api_base(server.url()),
        )
        .unwrap();
        assert!(!provider.has_credentials());

        let failure = provider.generate("prompt", true).await.unwrap_err();
        assert_eq!(failure.kind, FailureKind::AuthMissing);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_status_429_is_rate_limited() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(429)
            .with_body(r#"{"error": "rate limit reached"}"#)
            .create_async()
            .await;

        let failure = provider_for(&server)
            .generate("prompt", true)
            .await
            .unwrap_err();
        assert_eq!(failure.kind, FailureKind::RateLimited);
        assert_eq!(failure.status, Some(429));
        assert!(failure.is_retryable());
    }

    #[tokio::test]
    async fn test_unauthorized_is_not_available() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", Matcher::Any)
            .with_status(401)
            .with_body(r#"{"error": "invalid api key"}"#)
            .create_async()
            .await;

        let failure = provider_for(&server)
            .generate("prompt", true)
            .await
            .unwrap_err();
        assert_eq!(failure.kind, FailureKind::NotAvailable);
        assert!(failure.message.contains("invalid api key"));
    }

    #[tokio::test]
    async fn test_null_content_is_malformed() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices": [{"message": {"content": null}}]}"#)
            .create_async()
            .await;

        let failure = provider_for(&server)
            .generate("prompt", true)
            .await
            .unwrap_err();
        assert_eq!(failure.kind, FailureKind::Malformed);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transport() {
        // Nothing listens on port 9 locally
        let provider = GroqProvider::new(
            ProviderConfig::for_kind(ProviderKind::Groq)
                .with_api_key("gsk_test")
                .with_api_base("http://127.0.0.1:9"),
        )
        .unwrap();

        let failure = provider.generate("prompt", true).await.unwrap_err();
        assert_eq!(failure.kind, FailureKind::Transport);
    }
}
