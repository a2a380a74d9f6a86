//! OpenAI implementation of [`ChatBackend`]: rebuilds the message list from the in-memory
//! conversation tree and streams the cumulative answer.

use async_trait::async_trait;
use futures::StreamExt;
use openai_client::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs, DeltaStream,
    OpenAIClient,
};
use prompt::{ChatMessage, MessageRole};
use std::sync::Arc;
use tracing::{info, instrument};

use crate::conversation_tree::{ConversationTree, PendingTurn};
use crate::{AskChunk, AskStream, BackendError, ChatBackend};

/// Converts a single [`ChatMessage`] into OpenAI API message format.
fn chat_message_to_openai(msg: &ChatMessage) -> anyhow::Result<ChatCompletionRequestMessage> {
    let content = msg.content.clone();
    let openai_msg: ChatCompletionRequestMessage = match msg.role {
        MessageRole::System => ChatCompletionRequestSystemMessageArgs::default()
            .content(content)
            .build()?
            .into(),
        MessageRole::User => ChatCompletionRequestUserMessageArgs::default()
            .content(content)
            .build()?
            .into(),
        MessageRole::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
            .content(content)
            .build()?
            .into(),
    };
    Ok(openai_msg)
}

/// ChatGPT backend over the chat-completions API. One instance is shared by all users.
#[derive(Clone)]
pub struct OpenAIChatBackend {
    client: OpenAIClient,
    model: String,
    system_prompt: Option<String>,
    tree: Arc<ConversationTree>,
}

impl OpenAIChatBackend {
    pub fn new(api_key: String) -> Self {
        Self::from_client(OpenAIClient::new(api_key))
    }

    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        Self::from_client(OpenAIClient::with_base_url(api_key, base_url))
    }

    fn from_client(client: OpenAIClient) -> Self {
        Self {
            client,
            model: "gpt-3.5-turbo".to_string(),
            system_prompt: None,
            tree: Arc::new(ConversationTree::new()),
        }
    }

    pub fn with_model(mut self, model: String) -> Self {
        self.model = model;
        self
    }

    pub fn with_system_prompt_opt(mut self, prompt: Option<String>) -> Self {
        self.system_prompt = prompt;
        self
    }

    fn request_messages(&self, turn: &PendingTurn) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(turn.history.len() + 2);
        if let Some(ref system) = self.system_prompt {
            messages.push(ChatMessage::system(system.clone()));
        }
        messages.extend(turn.history.iter().cloned());
        messages.push(ChatMessage::user(turn.prompt.clone()));
        messages
    }
}

#[async_trait]
impl ChatBackend for OpenAIChatBackend {
    #[instrument(skip(self, prompt))]
    async fn ask(
        &self,
        prompt: &str,
        conversation_id: Option<&str>,
        parent_id: Option<&str>,
    ) -> Result<AskStream, BackendError> {
        let turn = self.tree.begin_turn(prompt, conversation_id, parent_id);
        let messages = self.request_messages(&turn);
        info!(
            conversation_id = %turn.conversation_id,
            history_len = turn.history.len(),
            "Ask ChatGPT"
        );

        let openai_messages = messages
            .iter()
            .map(chat_message_to_openai)
            .collect::<anyhow::Result<Vec<_>>>()
            .map_err(|e| BackendError::InvalidRequest(e.to_string()))?;

        let deltas = self
            .client
            .chat_completion_stream(&self.model, openai_messages)
            .await?;

        Ok(accumulate_answer(deltas, turn, self.tree.clone()))
    }

    async fn reset_chat(&self, conversation_id: Option<&str>) -> Result<(), BackendError> {
        if let Some(id) = conversation_id {
            let existed = self.tree.reset(id);
            info!(conversation_id = %id, existed = existed, "Reset chat");
        }
        Ok(())
    }
}

struct AccumulateState {
    deltas: DeltaStream,
    answer: String,
    turn: PendingTurn,
    tree: Arc<ConversationTree>,
    done: bool,
}

/// Turns content deltas into cumulative [`AskChunk`]s. The turn is committed to the tree only
/// when the delta stream ends cleanly with a non-empty answer.
pub(crate) fn accumulate_answer(
    deltas: DeltaStream,
    turn: PendingTurn,
    tree: Arc<ConversationTree>,
) -> AskStream {
    let state = AccumulateState {
        deltas,
        answer: String::new(),
        turn,
        tree,
        done: false,
    };

    futures::stream::unfold(state, |mut st| async move {
        if st.done {
            return None;
        }
        match st.deltas.next().await {
            Some(Ok(delta)) => {
                st.answer.push_str(&delta);
                let chunk = AskChunk {
                    message: st.answer.clone(),
                    conversation_id: st.turn.conversation_id.clone(),
                    parent_id: st.turn.assistant_node_id.clone(),
                };
                Some((Ok(chunk), st))
            }
            Some(Err(e)) => {
                st.done = true;
                Some((Err(BackendError::Transient(e.to_string())), st))
            }
            None => {
                if !st.answer.is_empty() {
                    st.tree.commit(&st.turn, &st.answer);
                }
                None
            }
        }
    })
    .boxed()
}
