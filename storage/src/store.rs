//! The [`ConversationStore`] trait: user and dialog persistence used by the dialog controller.

use async_trait::async_trait;

use crate::error::StorageError;
use crate::models::{
    DialogAttribute, DialogMessage, DialogRecord, NewUser, UserAttribute, UserRecord, UserValue,
};

/// Persists users and dialogs. Shared across turns behind `Arc<dyn ConversationStore>`.
///
/// Dialog operations take an optional dialog id and default to the user's current dialog.
/// Absent users or dialogs yield [`StorageError::NotFound`].
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn user_exists(&self, user_id: i64) -> Result<bool, StorageError>;

    /// Inserts the user unless already present (no-op then).
    async fn add_new_user(&self, user: NewUser) -> Result<(), StorageError>;

    async fn get_user(&self, user_id: i64) -> Result<UserRecord, StorageError>;

    async fn get_user_attribute(
        &self,
        user_id: i64,
        attribute: UserAttribute,
    ) -> Result<UserValue, StorageError> {
        Ok(self.get_user(user_id).await?.attribute(attribute))
    }

    async fn set_user_attribute(&self, user_id: i64, value: UserValue) -> Result<(), StorageError>;

    /// Creates a dialog with the user's current chat mode and makes it current. Returns its id.
    async fn start_new_dialog(&self, user_id: i64) -> Result<String, StorageError>;

    async fn get_dialog(
        &self,
        user_id: i64,
        dialog_id: Option<&str>,
    ) -> Result<DialogRecord, StorageError>;

    async fn get_dialog_messages(
        &self,
        user_id: i64,
        dialog_id: Option<&str>,
    ) -> Result<Vec<DialogMessage>, StorageError> {
        Ok(self.get_dialog(user_id, dialog_id).await?.messages)
    }

    async fn get_dialog_attribute(
        &self,
        user_id: i64,
        dialog_id: Option<&str>,
        attribute: DialogAttribute,
    ) -> Result<Option<String>, StorageError> {
        Ok(self.get_dialog(user_id, dialog_id).await?.attribute(attribute))
    }

    /// Replaces the dialog's messages and conversation id.
    async fn set_dialog_messages(
        &self,
        user_id: i64,
        dialog_id: Option<&str>,
        messages: Vec<DialogMessage>,
        conversation_id: Option<String>,
    ) -> Result<(), StorageError>;
}
