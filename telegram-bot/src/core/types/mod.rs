//! Core types: identities, message, handler response, and Handler trait.

mod handler;
mod identity;
mod message;
mod response;

pub use handler::{Handler, ToCoreMessage, ToCoreUser};
pub use identity::{Chat, User};
pub use message::{Message, MessageDirection};
pub use response::HandlerResponse;
