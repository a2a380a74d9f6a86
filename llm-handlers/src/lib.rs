//! # ChatGPT dialog handlers
//!
//! - [`DialogHandler`] – commands, text turns, chat mode selection (implements `Handler`)
//! - [`ResponseDriver`] – one backend turn, with shrink-and-retry when not streaming
//! - [`StreamRenderer`] – incremental rendering of a streamed answer into one edited message

mod dialog_handler;
mod error;
pub mod replies;
mod response_driver;
mod stream_renderer;

pub use dialog_handler::{DialogHandler, DialogSettings};
pub use error::TurnError;
pub use response_driver::{ResponseDriver, StreamedTurn, TurnOutcome};
pub use stream_renderer::{
    RenderedAnswer, StreamRenderer, FINAL_EDIT_MAX_WAIT, PLACEHOLDER_SUFFIX,
};
