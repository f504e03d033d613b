/// Generator backed by an OpenAI-compatible `/chat/completions` endpoint.
///
/// One request per call, no retries. The HTTP client carries the configured
/// timeout; the orchestrator adds its own deadline on top.
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{GenerationError, Generator};
use crate::config::Config;

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

pub struct OpenAiGenerator {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl OpenAiGenerator {
    pub fn new(
        api_base: &str,
        api_key: String,
        model: String,
        max_tokens: u32,
        timeout: Duration,
    ) -> Result<Self, GenerationError> {
        if api_key.trim().is_empty() || model.trim().is_empty() {
            return Err(GenerationError::NotConfigured);
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("regrag/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| GenerationError::Http(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", api_base.trim_end_matches('/')),
            api_key,
            model,
            max_tokens,
        })
    }

    /// Build from config. `None` when generation is disabled or no API key is
    /// set in the configured environment variable.
    pub fn from_config(config: &Config) -> Option<Self> {
        let generation = &config.generation;
        if !generation.enabled {
            return None;
        }
        let Some(api_key) = config.generation_api_key() else {
            debug!(
                "{} not set, answers will be retrieval-only",
                generation.api_key_env
            );
            return None;
        };

        match Self::new(
            &generation.api_base,
            api_key,
            generation.model.clone(),
            generation.max_tokens,
            Duration::from_secs(generation.timeout_secs),
        ) {
            Ok(generator) => Some(generator),
            Err(e) => {
                warn!("Generator unavailable: {e}");
                None
            }
        }
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Generator for OpenAiGenerator {
    async fn generate(
        &self,
        system: &str,
        prompt: &str,
        temperature: f32,
    ) -> Result<String, GenerationError> {
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            max_tokens: self.max_tokens,
            temperature,
        };

        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| GenerationError::Http(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(GenerationError::Http(format!("status {status}")));
        }

        let body: ChatResponse = resp
            .json()
            .await
            .map_err(|e| GenerationError::BadResponse(e.to_string()))?;

        let text = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .unwrap_or_default();
        if text.is_empty() {
            return Err(GenerationError::BadResponse("empty completion".to_string()));
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_base() {
        let g = OpenAiGenerator::new(
            "http://localhost:8080/v1/",
            "k".into(),
            "m".into(),
            10,
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(g.endpoint(), "http://localhost:8080/v1/chat/completions");
    }

    #[test]
    fn test_disabled_generation_gives_none() {
        let mut config = Config::default();
        config.generation.enabled = false;
        assert!(OpenAiGenerator::from_config(&config).is_none());
    }

    #[test]
    fn test_missing_key_gives_none() {
        let mut config = Config::default();
        config.generation.api_key_env = "REGRAG_TEST_UNSET_KEY_VAR".to_string();
        assert!(OpenAiGenerator::from_config(&config).is_none());
    }

    #[test]
    fn test_blank_key_or_model_is_not_configured() {
        let blank_key =
            OpenAiGenerator::new("http://x", " ".into(), "m".into(), 10, Duration::from_secs(1));
        assert_eq!(blank_key.err(), Some(GenerationError::NotConfigured));

        let blank_model =
            OpenAiGenerator::new("http://x", "k".into(), String::new(), 10, Duration::from_secs(1));
        assert_eq!(blank_model.err(), Some(GenerationError::NotConfigured));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_http_error() {
        let g = OpenAiGenerator::new(
            "http://127.0.0.1:9",
            "k".into(),
            "m".into(),
            10,
            Duration::from_secs(2),
        )
        .unwrap();
        let err = g.generate("s", "p", 0.3).await.unwrap_err();
        assert!(matches!(err, GenerationError::Http(_)));
    }

    #[test]
    fn test_response_parsing() {
        let body: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"role":"assistant","content":" hi "}}]}"#)
                .unwrap();
        assert_eq!(body.choices[0].message.content.as_deref(), Some(" hi "));
    }
}
