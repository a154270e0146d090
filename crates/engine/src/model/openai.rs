use crate::config::ModelConfig;
use crate::error::ModelError;
use crate::model::provider::{ModelProvider, ModelRequest, ModelResponse, TokenUsage};
use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
        ChatCompletionRequestUserMessage, ChatCompletionResponseFormat,
        ChatCompletionResponseFormatType, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use tracing::debug;

/// Chat-completion client for OpenAI and compatible endpoints. Performs a
/// single attempt per call so the retry machine above it stays in charge
/// of scheduling.
pub struct OpenAIProvider {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAIProvider {
    pub fn new(api_key: String, settings: &ModelConfig) -> Self {
        let mut config = OpenAIConfig::new().with_api_key(api_key);
        if let Some(base_url) = &settings.base_url {
            config = config.with_api_base(base_url);
        }
        Self {
            client: Client::with_config(config),
            model: settings.model.clone(),
        }
    }

    fn classify(error: String) -> ModelError {
        let lower = error.to_ascii_lowercase();
        if lower.contains("rate") {
            ModelError::RateLimited
        } else if lower.contains("timed out") || lower.contains("timeout") {
            ModelError::Network(error)
        } else if lower.contains("connect") || lower.contains("network") || lower.contains("dns") {
            ModelError::Network(error)
        } else {
            ModelError::Endpoint(error)
        }
    }
}

#[async_trait]
impl ModelProvider for OpenAIProvider {
    async fn complete(&self, request: ModelRequest) -> Result<ModelResponse, ModelError> {
        debug!(model = %self.model, "sending chat completion request");

        let system_message = ChatCompletionRequestSystemMessage {
            content: request.system_prompt,
            ..Default::default()
        };
        let user_message = ChatCompletionRequestUserMessage {
            content: async_openai::types::ChatCompletionRequestUserMessageContent::Text(
                request.user_prompt,
            ),
            ..Default::default()
        };

        let api_request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(vec![
                ChatCompletionRequestMessage::System(system_message),
                ChatCompletionRequestMessage::User(user_message),
            ])
            .temperature(request.temperature)
            .max_tokens(request.max_tokens)
            .response_format(ChatCompletionResponseFormat {
                r#type: ChatCompletionResponseFormatType::JsonObject,
            })
            .build()
            .map_err(|e| ModelError::Endpoint(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(api_request)
            .await
            .map_err(|e| Self::classify(e.to_string()))?;

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| ModelError::UnusableResponse("no content in response".to_string()))?;

        let usage = response
            .usage
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            })
            .unwrap_or_default();

        debug!(total_tokens = usage.total_tokens, "chat completion received");

        Ok(ModelResponse {
            content,
            model: response.model,
            usage,
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_estimate_tracks_text_length() {
        let provider = OpenAIProvider::new("test-key".to_string(), &ModelConfig::default());
        let text = "subprocess.run(command, shell=True)";
        let estimated = provider.estimate_tokens(text);
        assert!(estimated > 0);
        assert!(estimated < text.len());
    }

    #[test]
    fn error_classification_separates_transport_failures() {
        assert!(matches!(
            OpenAIProvider::classify("429: rate limit exceeded".to_string()),
            ModelError::RateLimited
        ));
        assert!(matches!(
            OpenAIProvider::classify("connection refused".to_string()),
            ModelError::Network(_)
        ));
        assert!(matches!(
            OpenAIProvider::classify("invalid model identifier".to_string()),
            ModelError::Endpoint(_)
        ));
    }
}
