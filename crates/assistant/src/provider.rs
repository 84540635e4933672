//! Text-generation providers.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use vidfx_common::config::AssistantConfig;
use vidfx_common::error::{VidfxError, VidfxResult};
use vidfx_settings::{BRIGHTNESS, CONTRAST, PLAYBACK_SPEED, SATURATION, VOLUME};

use crate::suggestion::{parse_suggestion, Suggestion};

/// A backend that answers a settings request with (ideally) a JSON object.
#[async_trait::async_trait]
pub trait SuggestionProvider: Send + Sync {
    /// Provider name for logs.
    fn name(&self) -> &str;

    /// Raw model output for `request`.
    async fn complete(&self, request: &str) -> VidfxResult<String>;
}

/// Ask `provider` for settings matching `request`.
pub async fn suggest(provider: &dyn SuggestionProvider, request: &str) -> VidfxResult<Suggestion> {
    let request = request.trim();
    if request.is_empty() {
        return Err(VidfxError::suggestion("Describe the edit you want"));
    }
    tracing::info!(provider = provider.name(), "Requesting settings suggestion");
    let text = provider.complete(request).await?;
    tracing::debug!(response = %text, "Suggestion response received");
    parse_suggestion(&text)
}

/// Instructions describing the settings object the model must return.
pub fn system_prompt() -> String {
    format!(
        "You adjust video effect settings. Reply with a single JSON object and nothing else, \
         using exactly these fields:\n\
         - brightness: number, percent, {} to {} (100 = unchanged)\n\
         - contrast: number, percent, {} to {} (100 = unchanged)\n\
         - saturation: number, percent, {} to {} (100 = unchanged)\n\
         - playbackSpeed: number, multiplier, {} to {} (1 = normal)\n\
         - volume: number, percent, {} to {}\n\
         - flipHorizontal: boolean\n\
         - enableRotatingLines: boolean\n\
         - enablePixelNoise: boolean\n\
         - audioPreservesPitch: boolean (keep the original pitch when the speed changes)\n\
         Use the neutral value for anything the request does not mention.",
        BRIGHTNESS.min,
        BRIGHTNESS.max,
        CONTRAST.min,
        CONTRAST.max,
        SATURATION.min,
        SATURATION.max,
        PLAYBACK_SPEED.min,
        PLAYBACK_SPEED.max,
        VOLUME.min,
        VOLUME.max,
    )
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI-compatible `/chat/completions` client.
#[derive(Debug, Clone)]
pub struct ChatCompletionsProvider {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl ChatCompletionsProvider {
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> VidfxResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| VidfxError::suggestion(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            model: model.into(),
            api_key,
        })
    }

    /// Build from configuration, reading the API key from the configured
    /// environment variable.
    pub fn from_config(config: &AssistantConfig) -> VidfxResult<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty());
        if api_key.is_none() {
            return Err(VidfxError::config(format!(
                "Set {} to use the assistant",
                config.api_key_env
            )));
        }
        Self::new(
            config.endpoint.clone(),
            config.model.clone(),
            api_key,
            Duration::from_secs(config.timeout_secs.max(1)),
        )
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait::async_trait]
impl SuggestionProvider for ChatCompletionsProvider {
    fn name(&self) -> &str {
        "chat-completions"
    }

    async fn complete(&self, request: &str) -> VidfxResult<String> {
        let prompt = system_prompt();
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &prompt,
                },
                ChatMessage {
                    role: "user",
                    content: request,
                },
            ],
            temperature: 0.2,
        };

        let mut http = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            http = http.bearer_auth(key);
        }
        let response = http
            .send()
            .await
            .map_err(|e| VidfxError::suggestion(format!("Request failed: {e}")))?;
        if !response.status().is_success() {
            return Err(VidfxError::suggestion(format!(
                "Request failed with status: {}",
                response.status()
            )));
        }
        let reply: ChatResponse = response
            .json()
            .await
            .map_err(|e| VidfxError::suggestion(format!("Malformed response: {e}")))?;

        reply
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| VidfxError::suggestion("Response contained no text"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Canned(&'static str);

    #[async_trait::async_trait]
    impl SuggestionProvider for Canned {
        fn name(&self) -> &str {
            "canned"
        }

        async fn complete(&self, _request: &str) -> VidfxResult<String> {
            Ok(self.0.to_string())
        }
    }

    #[tokio::test]
    async fn test_suggest_parses_provider_output() {
        let provider = Canned("```json\n{\"brightness\": 150, \"flipHorizontal\": true}\n```");
        let suggestion = suggest(&provider, "brighter and mirrored").await.unwrap();
        assert_eq!(suggestion.settings.brightness, 150.0);
        assert!(suggestion.settings.flip_horizontal);
        // Fields the model left out fall back to defaults and are reported.
        assert!(suggestion.warning.is_some());
    }

    #[tokio::test]
    async fn test_suggest_rejects_empty_request() {
        let err = suggest(&Canned("{}"), "   ").await.unwrap_err();
        assert!(matches!(err, VidfxError::Suggestion { .. }));
    }

    #[tokio::test]
    async fn test_malformed_output_fails_only_the_suggestion() {
        let err = suggest(&Canned("no json here"), "anything").await.unwrap_err();
        assert!(err.to_string().contains("not valid JSON"));
    }

    #[test]
    fn test_system_prompt_names_every_field() {
        let prompt = system_prompt();
        for key in vidfx_settings::field_keys() {
            assert!(prompt.contains(key), "missing {key}");
        }
        assert!(prompt.contains("0.5 to 2"));
    }

    #[test]
    fn test_from_config_requires_api_key() {
        let config = AssistantConfig {
            api_key_env: "VIDFX_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
            ..AssistantConfig::default()
        };
        let err = ChatCompletionsProvider::from_config(&config).unwrap_err();
        assert!(err.to_string().contains("VIDFX_TEST_KEY_THAT_IS_NEVER_SET"));
    }
}
