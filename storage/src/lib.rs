//! Storage crate: persistence of users and their dialogs.
//!
//! ## Modules
//!
//! - [`error`] – Storage error types
//! - [`models`] – UserRecord, DialogRecord, DialogMessage and typed attributes
//! - [`store`] – ConversationStore trait
//! - [`sqlite_store`] – SqliteConversationStore (sqlx)
//! - [`memory_store`] – InMemoryConversationStore
//! - [`sqlite_pool`] – SqlitePoolManager

mod error;
mod memory_store;
mod models;
mod sqlite_pool;
mod sqlite_store;
mod store;

pub use error::StorageError;
pub use memory_store::InMemoryConversationStore;
pub use models::{
    DialogAttribute, DialogMessage, DialogRecord, NewUser, UserAttribute, UserRecord, UserValue,
    DEFAULT_CHAT_MODE_KEY,
};
pub use sqlite_pool::SqlitePoolManager;
pub use sqlite_store::SqliteConversationStore;
pub use store::ConversationStore;
