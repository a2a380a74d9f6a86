//! Framework handlers: logging and username allowlist.

mod logging_auth;

pub use logging_auth::{AuthHandler, LoggingHandler};
