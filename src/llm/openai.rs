//! OpenAI-compatible provider
//!
//! Talks to any `/chat/completions` endpoint that accepts function tools.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::core::{AutohealError, Config, Message, Result, ToolCall, ToolDefinition};
use crate::llm::traits::{GenerateOptions, LLMProvider, LLMResponse, TokenUsage};

/// Client for OpenAI-compatible chat completion APIs
#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    api_base: String,
    api_key: String,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [ToolDefinition]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    model: String,
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireToolCall>,
}

#[derive(Debug, Deserialize)]
struct WireToolCall {
    function: WireFunction,
}

#[derive(Debug, Deserialize)]
struct WireFunction {
    name: String,
    /// JSON-encoded arguments
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

impl OpenAiClient {
    /// Create a client from configuration; fails when no API key is configured
    pub fn from_config(config: &Config) -> Result<Self> {
        let api_key = config
            .llm
            .api_key
            .clone()
            .ok_or_else(|| AutohealError::config("OPENAI_API_KEY is required for the openai provider"))?;

        Self::new(&config.llm.api_base, api_key, config.llm.timeout_secs)
    }

    /// Create a client for an explicit endpoint
    pub fn new(api_base: &str, api_key: impl Into<String>, timeout_secs: u64) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(AutohealError::config("API key must not be empty"));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| AutohealError::config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Tool calls are folded into text; observations are fed back as user turns
    fn to_wire_message(msg: &Message) -> WireMessage {
        let mut content = msg.content.clone();
        if let Some(calls) = &msg.tool_calls {
            for call in calls {
                if !content.is_empty() {
                    content.push('\n');
                }
                content.push_str(&format!("[called {} with {}]", call.name, call.arguments));
            }
        }
        WireMessage {
            role: msg.role.clone(),
            content,
        }
    }

    fn to_llm_response(response: CompletionResponse) -> Result<LLMResponse> {
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AutohealError::llm("Completion response contained no choices"))?;

        let mut tool_calls = Vec::with_capacity(choice.message.tool_calls.len());
        for call in choice.message.tool_calls {
            let arguments = if call.function.arguments.trim().is_empty() {
                serde_json::Value::Object(Default::default())
            } else {
                serde_json::from_str(&call.function.arguments).map_err(|e| {
                    AutohealError::llm(format!(
                        "Invalid arguments for tool '{}': {}",
                        call.function.name, e
                    ))
                })?
            };
            tool_calls.push(ToolCall::new(call.function.name, arguments));
        }

        Ok(LLMResponse {
            content: choice.message.content.unwrap_or_default(),
            tool_calls,
            usage: response.usage.map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
            model: response.model,
        })
    }

    async fn complete(&self, request: &CompletionRequest<'_>) -> Result<LLMResponse> {
        debug!(model = request.model, "openai completion request");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();

            if status.as_u16() == 401 {
                return Err(AutohealError::config(format!(
                    "API key rejected by {}",
                    self.api_base
                )));
            }
            if status.as_u16() == 404 {
                return Err(AutohealError::ModelNotFound(request.model.to_string()));
            }

            return Err(AutohealError::llm(format!(
                "Completion API error ({}): {}",
                status, error_text
            )));
        }

        let parsed: CompletionResponse = response.json().await?;
        Self::to_llm_response(parsed)
    }

    fn request<'a>(
        model: &'a str,
        messages: &[Message],
        tools: Option<&'a [ToolDefinition]>,
        options: Option<GenerateOptions>,
    ) -> CompletionRequest<'a> {
        let options = options.unwrap_or_default();
        CompletionRequest {
            model,
            messages: messages.iter().map(Self::to_wire_message).collect(),
            tools,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            stop: options.stop,
        }
    }
}

#[async_trait]
impl LLMProvider for OpenAiClient {
    async fn chat(
        &self,
        model: &str,
        messages: &[Message],
        options: Option<GenerateOptions>,
    ) -> Result<LLMResponse> {
        self.complete(&Self::request(model, messages, None, options))
            .await
    }

    async fn chat_with_tools(
        &self,
        model: &str,
        messages: &[Message],
        tools: &[ToolDefinition],
        options: Option<GenerateOptions>,
    ) -> Result<LLMResponse> {
        self.complete(&Self::request(model, messages, Some(tools), options))
            .await
    }

    async fn is_model_available(&self, model: &str) -> Result<bool> {
        Ok(self.list_models().await?.iter().any(|m| m == model))
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        let response = self
            .client
            .get(format!("{}/models", self.api_base))
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AutohealError::llm("Failed to list models"));
        }

        let models: ModelsResponse = response.json().await?;
        Ok(models.data.into_iter().map(|m| m.id).collect())
    }

    fn name(&self) -> &str {
        "openai"
    }
}
