//! SQLite-backed [`ConversationStore`].
//!
//! Tables: `users` (one row per platform user) and `dialogs` (messages kept as a JSON array
//! in a TEXT column).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::StorageError;
use crate::models::{DialogMessage, DialogRecord, NewUser, UserRecord, UserValue};
use crate::sqlite_pool::SqlitePoolManager;
use crate::store::ConversationStore;

#[derive(sqlx::FromRow)]
struct DialogRow {
    id: String,
    user_id: i64,
    conversation_id: Option<String>,
    chat_mode: String,
    start_time: DateTime<Utc>,
    messages: String,
}

impl DialogRow {
    fn into_record(self) -> Result<DialogRecord, StorageError> {
        let messages: Vec<DialogMessage> = serde_json::from_str(&self.messages)?;
        Ok(DialogRecord {
            id: self.id,
            user_id: self.user_id,
            conversation_id: self.conversation_id,
            chat_mode: self.chat_mode,
            start_time: self.start_time,
            messages,
        })
    }
}

#[derive(Clone)]
pub struct SqliteConversationStore {
    pool_manager: SqlitePoolManager,
}

impl SqliteConversationStore {
    pub async fn new(database_url: &str) -> Result<Self, StorageError> {
        let pool_manager = SqlitePoolManager::new(database_url).await?;
        let store = Self { pool_manager };
        store.init().await?;
        Ok(store)
    }

    async fn init(&self) -> Result<(), sqlx::Error> {
        info!("Creating database tables if not exist");

        let pool = self.pool_manager.pool();

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                user_id INTEGER PRIMARY KEY,
                chat_id INTEGER NOT NULL,
                username TEXT,
                first_name TEXT,
                last_name TEXT,
                last_interaction TEXT NOT NULL,
                first_seen TEXT NOT NULL,
                current_dialog_id TEXT,
                current_chat_mode TEXT NOT NULL,
                n_used_tokens INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS dialogs (
                id TEXT PRIMARY KEY,
                user_id INTEGER NOT NULL,
                conversation_id TEXT,
                chat_mode TEXT NOT NULL,
                start_time TEXT NOT NULL,
                messages TEXT NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_dialogs_user_id ON dialogs(user_id)")
            .execute(pool)
            .await?;

        info!("Database tables created successfully");
        Ok(())
    }

    async fn resolve_dialog_id(
        &self,
        user_id: i64,
        dialog_id: Option<&str>,
    ) -> Result<String, StorageError> {
        if let Some(id) = dialog_id {
            return Ok(id.to_string());
        }
        match self.get_user(user_id).await?.current_dialog_id {
            Some(id) => Ok(id),
            None => Err(StorageError::NotFound(format!(
                "current dialog of user {}",
                user_id
            ))),
        }
    }
}

#[async_trait]
impl ConversationStore for SqliteConversationStore {
    async fn user_exists(&self, user_id: i64) -> Result<bool, StorageError> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT user_id FROM users WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(self.pool_manager.pool())
            .await?;
        Ok(row.is_some())
    }

    async fn add_new_user(&self, user: NewUser) -> Result<(), StorageError> {
        let record = user.into_record(Utc::now());

        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO users (user_id, chat_id, username, first_name, last_name, last_interaction, first_seen, current_dialog_id, current_chat_mode, n_used_tokens)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.user_id)
        .bind(record.chat_id)
        .bind(&record.username)
        .bind(&record.first_name)
        .bind(&record.last_name)
        .bind(record.last_interaction)
        .bind(record.first_seen)
        .bind(&record.current_dialog_id)
        .bind(&record.current_chat_mode)
        .bind(record.n_used_tokens)
        .execute(self.pool_manager.pool())
        .await?;

        if result.rows_affected() > 0 {
            debug!(user_id = record.user_id, "Added new user");
        }
        Ok(())
    }

    async fn get_user(&self, user_id: i64) -> Result<UserRecord, StorageError> {
        sqlx::query_as::<_, UserRecord>("SELECT * FROM users WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(self.pool_manager.pool())
            .await?
            .ok_or_else(|| StorageError::user_not_found(user_id))
    }

    async fn set_user_attribute(&self, user_id: i64, value: UserValue) -> Result<(), StorageError> {
        let sql = format!(
            "UPDATE users SET {} = ? WHERE user_id = ?",
            value.attribute().column()
        );
        let query = sqlx::query(&sql);
        let query = match value {
            UserValue::LastInteraction(t) => query.bind(t),
            UserValue::CurrentDialogId(id) => query.bind(id),
            UserValue::CurrentChatMode(mode) => query.bind(mode),
            UserValue::UsedTokens(n) => query.bind(n),
        };

        let result = query
            .bind(user_id)
            .execute(self.pool_manager.pool())
            .await?;
        if result.rows_affected() == 0 {
            return Err(StorageError::user_not_found(user_id));
        }
        Ok(())
    }

    async fn start_new_dialog(&self, user_id: i64) -> Result<String, StorageError> {
        let mut tx = self.pool_manager.pool().begin().await?;

        let mode: Option<(String,)> =
            sqlx::query_as("SELECT current_chat_mode FROM users WHERE user_id = ?")
                .bind(user_id)
                .fetch_optional(&mut *tx)
                .await?;
        let (chat_mode,) = mode.ok_or_else(|| StorageError::user_not_found(user_id))?;

        let dialog_id = Uuid::new_v4().to_string();
        sqlx::query(
            r#"
            INSERT INTO dialogs (id, user_id, conversation_id, chat_mode, start_time, messages)
            VALUES (?, ?, NULL, ?, ?, '[]')
            "#,
        )
        .bind(&dialog_id)
        .bind(user_id)
        .bind(&chat_mode)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE users SET current_dialog_id = ? WHERE user_id = ?")
            .bind(&dialog_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        debug!(user_id = user_id, dialog_id = %dialog_id, chat_mode = %chat_mode, "Started new dialog");
        Ok(dialog_id)
    }

    async fn get_dialog(
        &self,
        user_id: i64,
        dialog_id: Option<&str>,
    ) -> Result<DialogRecord, StorageError> {
        let id = self.resolve_dialog_id(user_id, dialog_id).await?;
        let row = sqlx::query_as::<_, DialogRow>(
            "SELECT * FROM dialogs WHERE id = ? AND user_id = ?",
        )
        .bind(&id)
        .bind(user_id)
        .fetch_optional(self.pool_manager.pool())
        .await?
        .ok_or_else(|| StorageError::dialog_not_found(&id))?;
        row.into_record()
    }

    async fn set_dialog_messages(
        &self,
        user_id: i64,
        dialog_id: Option<&str>,
        messages: Vec<DialogMessage>,
        conversation_id: Option<String>,
    ) -> Result<(), StorageError> {
        let id = self.resolve_dialog_id(user_id, dialog_id).await?;
        let encoded = serde_json::to_string(&messages)?;

        let result = sqlx::query(
            "UPDATE dialogs SET messages = ?, conversation_id = ? WHERE id = ? AND user_id = ?",
        )
        .bind(encoded)
        .bind(conversation_id)
        .bind(&id)
        .bind(user_id)
        .execute(self.pool_manager.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::dialog_not_found(&id));
        }
        debug!(user_id = user_id, dialog_id = %id, n_messages = messages.len(), "Saved dialog messages");
        Ok(())
    }
}
