//! In-memory [`ConversationStore`], selected with `STORE_TYPE=memory` and used by tests.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::error::StorageError;
use crate::models::{DialogMessage, DialogRecord, NewUser, UserRecord, UserValue};
use crate::store::ConversationStore;

#[derive(Default)]
struct Tables {
    users: HashMap<i64, UserRecord>,
    dialogs: HashMap<String, DialogRecord>,
}

impl Tables {
    fn user(&self, user_id: i64) -> Result<&UserRecord, StorageError> {
        self.users
            .get(&user_id)
            .ok_or_else(|| StorageError::user_not_found(user_id))
    }

    fn resolve_dialog_id(
        &self,
        user_id: i64,
        dialog_id: Option<&str>,
    ) -> Result<String, StorageError> {
        let user = self.user(user_id)?;
        match dialog_id {
            Some(id) => Ok(id.to_string()),
            None => user.current_dialog_id.clone().ok_or_else(|| {
                StorageError::NotFound(format!("current dialog of user {}", user_id))
            }),
        }
    }

    fn dialog_mut(
        &mut self,
        user_id: i64,
        dialog_id: &str,
    ) -> Result<&mut DialogRecord, StorageError> {
        self.dialogs
            .get_mut(dialog_id)
            .filter(|d| d.user_id == user_id)
            .ok_or_else(|| StorageError::dialog_not_found(dialog_id))
    }
}

/// Keeps users and dialogs in process memory; everything is lost on restart.
#[derive(Default)]
pub struct InMemoryConversationStore {
    tables: RwLock<Tables>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn user_exists(&self, user_id: i64) -> Result<bool, StorageError> {
        Ok(self.tables.read().await.users.contains_key(&user_id))
    }

    async fn add_new_user(&self, user: NewUser) -> Result<(), StorageError> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&user.user_id) {
            debug!(user_id = user.user_id, "Adding new user");
            tables
                .users
                .insert(user.user_id, user.into_record(Utc::now()));
        }
        Ok(())
    }

    async fn get_user(&self, user_id: i64) -> Result<UserRecord, StorageError> {
        self.tables.read().await.user(user_id).cloned()
    }

    async fn set_user_attribute(&self, user_id: i64, value: UserValue) -> Result<(), StorageError> {
        let mut tables = self.tables.write().await;
        let user = tables
            .users
            .get_mut(&user_id)
            .ok_or_else(|| StorageError::user_not_found(user_id))?;
        user.apply(value);
        Ok(())
    }

    async fn start_new_dialog(&self, user_id: i64) -> Result<String, StorageError> {
        let mut tables = self.tables.write().await;
        let chat_mode = tables.user(user_id)?.current_chat_mode.clone();

        let dialog = DialogRecord {
            id: Uuid::new_v4().to_string(),
            user_id,
            conversation_id: None,
            chat_mode,
            start_time: Utc::now(),
            messages: Vec::new(),
        };
        let id = dialog.id.clone();
        tables.dialogs.insert(id.clone(), dialog);
        if let Some(user) = tables.users.get_mut(&user_id) {
            user.current_dialog_id = Some(id.clone());
        }
        debug!(user_id = user_id, dialog_id = %id, "Started new dialog");
        Ok(id)
    }

    async fn get_dialog(
        &self,
        user_id: i64,
        dialog_id: Option<&str>,
    ) -> Result<DialogRecord, StorageError> {
        let tables = self.tables.read().await;
        let id = tables.resolve_dialog_id(user_id, dialog_id)?;
        tables
            .dialogs
            .get(&id)
            .filter(|d| d.user_id == user_id)
            .cloned()
            .ok_or_else(|| StorageError::dialog_not_found(&id))
    }

    async fn set_dialog_messages(
        &self,
        user_id: i64,
        dialog_id: Option<&str>,
        messages: Vec<DialogMessage>,
        conversation_id: Option<String>,
    ) -> Result<(), StorageError> {
        let mut tables = self.tables.write().await;
        let id = tables.resolve_dialog_id(user_id, dialog_id)?;
        let dialog = tables.dialog_mut(user_id, &id)?;
        dialog.messages = messages;
        dialog.conversation_id = conversation_id;
        Ok(())
    }
}
