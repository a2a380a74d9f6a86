//! # OpenAI API client
//!
//! Thin wrapper around [async-openai] for streamed chat completion, plus token masking for
//! safe logging. The call returns a stream of content deltas; callers accumulate them.

use async_openai::{types::CreateChatCompletionRequestArgs, Client};
use futures::stream::BoxStream;
use futures::StreamExt;
use std::sync::Arc;

pub use async_openai::types::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
};

/// Stream of content deltas (the text added by each streamed chunk).
pub type DeltaStream = BoxStream<'static, anyhow::Result<String>>;

/// Masks an API key/token for safe logging: shows first 7 chars + "***" + last 4 chars.
/// If length <= 11, returns "***" to avoid leaking any part of the key.
pub fn mask_token(token: &str) -> String {
    let len = token.len();
    if len <= 11 {
        "***".to_string()
    } else {
        let head_len = 7.min(len);
        let tail_len = 4.min(len.saturating_sub(head_len));
        let head = &token[..head_len];
        let tail = if tail_len > 0 {
            &token[len - tail_len..]
        } else {
            ""
        };
        format!("{}***{}", head, tail)
    }
}

/// OpenAI chat client over a shared async-openai client.
#[derive(Clone)]
pub struct OpenAIClient {
    client: Arc<Client<async_openai::config::OpenAIConfig>>,
    masked_key: String,
}

impl OpenAIClient {
    /// Builds a client using the given API key and default API base URL.
    pub fn new(api_key: String) -> Self {
        let masked_key = mask_token(&api_key);
        let config = async_openai::config::OpenAIConfig::new().with_api_key(api_key);
        Self {
            client: Arc::new(Client::with_config(config)),
            masked_key,
        }
    }

    /// Builds a client with a custom base URL (e.g. for proxies or compatible endpoints).
    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        let masked_key = mask_token(&api_key);
        let config = async_openai::config::OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(base_url);
        Self {
            client: Arc::new(Client::with_config(config)),
            masked_key,
        }
    }

    /// Starts a streamed chat completion and returns its content deltas in arrival order.
    ///
    /// Chunks without content (role-only or finish markers) are skipped. A transport error
    /// ends the stream with `Err`.
    pub async fn chat_completion_stream(
        &self,
        model: &str,
        messages: Vec<ChatCompletionRequestMessage>,
    ) -> anyhow::Result<DeltaStream> {
        tracing::info!(
            model = %model,
            message_count = messages.len(),
            api_key = %self.masked_key,
            "OpenAI chat_completion_stream request"
        );

        let request = CreateChatCompletionRequestArgs::default()
            .model(model)
            .messages(messages)
            .stream(true)
            .build()?;

        let stream = self.client.chat().create_stream(request).await?;

        let deltas = stream.filter_map(|result| async move {
            match result {
                Ok(chunk) => {
                    if let Some(ref u) = chunk.usage {
                        tracing::info!(
                            prompt_tokens = u.prompt_tokens,
                            completion_tokens = u.completion_tokens,
                            total_tokens = u.total_tokens,
                            "OpenAI chat_completion_stream usage"
                        );
                    }
                    chunk
                        .choices
                        .first()
                        .and_then(|choice| choice.delta.content.clone())
                        .filter(|content| !content.is_empty())
                        .map(Ok)
                }
                Err(e) => Some(Err(anyhow::anyhow!("Stream error: {}", e))),
            }
        });

        Ok(deltas.boxed())
    }
}
