//! Dispatcher runner: converts teloxide updates (messages, edited messages, inline keyboard
//! presses) to core::Message and passes them to the HandlerChain, one task per update.

use crate::chain::HandlerChain;
use crate::core::{Message as CoreMessage, ToCoreMessage};
use anyhow::Result;
use teloxide::{dispatching::UpdateFilterExt, dptree, prelude::*, types::Update};
use tracing::{error, info, instrument, warn};

use super::adapters::{TelegramCallbackWrapper, TelegramMessageWrapper};

/// Runs the chain for one update in its own task so the dispatcher keeps polling.
fn spawn_chain(chain: HandlerChain, core_msg: CoreMessage) {
    tokio::spawn(async move {
        info!(
            user_id = core_msg.user.id,
            chat_id = core_msg.chat.id,
            message_id = %core_msg.id,
            message_type = %core_msg.message_type,
            "step: processing update (handler chain started)"
        );
        if let Err(e) = chain.handle(&core_msg).await {
            error!(error = %e, user_id = core_msg.user.id, "Handler chain failed");
        }
    });
}

async fn on_message(msg: Message, chain: HandlerChain) -> ResponseResult<()> {
    if msg.text().is_none() {
        info!(chat_id = msg.chat.id.0, "Ignoring non-text message");
        return Ok(());
    }
    spawn_chain(chain, TelegramMessageWrapper(&msg).to_core());
    Ok(())
}

async fn on_edited_message(msg: Message, chain: HandlerChain) -> ResponseResult<()> {
    spawn_chain(chain, TelegramMessageWrapper(&msg).to_core_edited());
    Ok(())
}

async fn on_callback_query(
    bot: Bot,
    q: CallbackQuery,
    chain: HandlerChain,
) -> ResponseResult<()> {
    if let Err(e) = bot.answer_callback_query(q.id.clone()).await {
        warn!(error = %e, "Failed to answer callback query");
    }
    if q.message.is_none() {
        warn!(user_id = q.from.id.0, "Callback query without message, ignored");
        return Ok(());
    }
    spawn_chain(chain, TelegramCallbackWrapper(&q).to_core());
    Ok(())
}

/// Starts long polling with the given teloxide Bot and HandlerChain; returns on Ctrl-C.
#[instrument(skip(bot, handler_chain))]
pub async fn run_dispatcher(bot: teloxide::Bot, handler_chain: HandlerChain) -> Result<()> {
    if let Ok(me) = bot.get_me().await {
        if let Some(username) = &me.user.username {
            info!(username = %username, "Bot identity resolved");
        }
    }

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(on_message))
        .branch(Update::filter_edited_message().endpoint(on_edited_message))
        .branch(Update::filter_callback_query().endpoint(on_callback_query));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![handler_chain])
        .default_handler(|upd| async move {
            tracing::debug!(update_id = ?upd.id, "Unhandled update");
        })
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    info!("Dispatcher stopped");
    Ok(())
}
