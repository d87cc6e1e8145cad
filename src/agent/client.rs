//! OpenAI-compatible chat completions client
//!
//! The one concrete `LlmProvider` the crate ships. Deliberately small: auth
//! header, one POST per completion, status mapping, cancellation via select.

use async_trait::async_trait;
use reqwest::{header, Client};
use secrecy::ExposeSecret;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::agent::types::{ChatCompletionRequest, ChatCompletionResponse};
use crate::config::LlmConfig;
use crate::core::provider::{CompletionRequest, LlmProvider, LlmResponse};
use crate::error::{Error, Result};

/// HTTP client for any OpenAI-compatible chat completions endpoint
#[derive(Clone)]
pub struct OpenAiCompatClient {
    /// HTTP client with default headers baked in
    client: Client,
    /// Base URL, e.g. `https://api.openai.com/v1`
    base_url: String,
    /// Model passed on every request
    model: String,
}

impl OpenAiCompatClient {
    /// Create a new client from provider settings
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .as_ref()
            .ok_or_else(|| Error::Config("LLM API key missing".to_string()))?;

        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_str(&format!("Bearer {}", api_key.expose_secret()))
                .map_err(|e| Error::Config(format!("Invalid API key format: {}", e)))?,
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(OpenAiCompatClient {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }

    /// Get the configured model
    pub fn model(&self) -> &str {
        &self.model
    }

    async fn send_request(&self, request: ChatCompletionRequest) -> Result<ChatCompletionResponse> {
        let url = format!("{}/chat/completions", self.base_url);

        debug!(model = %request.model, messages = request.messages.len(), "sending completion request");

        let response = self.client.post(&url).json(&request).send().await?;
        let status = response.status();

        if status.is_success() {
            let body = response.json::<ChatCompletionResponse>().await?;
            if let Some(ref usage) = body.usage {
                info!(model = %body.model, tokens = usage.total_tokens, "completion received");
            }
            Ok(body)
        } else {
            let error_text = response.text().await.unwrap_or_default();
            if status.as_u16() == 429 {
                warn!("rate limit exceeded: {}", error_text);
                Err(Error::RateLimit(error_text))
            } else if status.as_u16() == 401 {
                Err(Error::Unauthorized("Invalid API key".to_string()))
            } else {
                Err(Error::Provider(format!(
                    "API error ({}): {}",
                    status, error_text
                )))
            }
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatClient {
    fn id(&self) -> &str {
        "openai_compat"
    }

    async fn complete(
        &self,
        request: CompletionRequest,
        cancel: &CancellationToken,
    ) -> Result<LlmResponse> {
        let body = ChatCompletionRequest {
            model: self.model.clone(),
            messages: request.messages,
            max_tokens: request.options.max_tokens,
            temperature: request.options.temperature,
            top_p: request.options.top_p,
            tools: if request.tools.is_empty() {
                None
            } else {
                Some(request.tools)
            },
        };

        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            response = self.send_request(body) => response?,
        };

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::Provider("completion had no choices".to_string()))?;

        Ok(LlmResponse {
            content: choice.message.content,
            tool_calls: choice.message.tool_calls,
            finish_reason: choice.finish_reason,
            usage: response.usage,
        })
    }
}
