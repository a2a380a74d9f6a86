//! Handlers for logging and the username allowlist.

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use crate::core::{Handler, HandlerResponse, Message, Result};

/// Logs each update in before() and the response in after(); always continues.
pub struct LoggingHandler;

#[async_trait]
impl Handler for LoggingHandler {
    #[instrument(skip(self, message))]
    async fn before(&self, message: &Message) -> Result<bool> {
        info!(
            user_id = message.user.id,
            username = %message.user.display_name(),
            message_type = %message.message_type,
            message_content = %message.content,
            "Received message"
        );
        Ok(true)
    }

    #[instrument(skip(self, message, response))]
    async fn after(&self, message: &Message, response: &HandlerResponse) -> Result<()> {
        debug!(
            message_id = ?message.id,
            response = ?response,
            "Processed message"
        );
        Ok(())
    }
}

/// Stops the chain silently unless the sender's username is allowlisted.
/// An empty allowlist lets everyone through.
pub struct AuthHandler {
    allowed_usernames: Vec<String>,
}

impl AuthHandler {
    pub fn new(allowed_usernames: Vec<String>) -> Self {
        Self { allowed_usernames }
    }

    pub fn is_allowed(&self, username: Option<&str>) -> bool {
        if self.allowed_usernames.is_empty() {
            return true;
        }
        match username {
            Some(name) => self.allowed_usernames.iter().any(|a| a == name),
            None => false,
        }
    }
}

#[async_trait]
impl Handler for AuthHandler {
    #[instrument(skip(self, message))]
    async fn before(&self, message: &Message) -> Result<bool> {
        let allowed = self.is_allowed(message.user.username.as_deref());
        if !allowed {
            warn!(
                user_id = message.user.id,
                username = %message.user.display_name(),
                "Unauthorized access attempt"
            );
        }
        Ok(allowed)
    }
}
