//! Persisted records: users, dialogs and dialog messages.

mod dialog;
mod user;

pub use dialog::{DialogAttribute, DialogMessage, DialogRecord};
pub use user::{NewUser, UserAttribute, UserRecord, UserValue, DEFAULT_CHAT_MODE_KEY};
