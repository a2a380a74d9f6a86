//! DialogHandler end to end over the in-memory store, a recording bot and a scripted backend.

mod common;

use chrono::{Duration as ChronoDuration, Utc};
use common::{callback, edited_message, text_message, BotCall, MockBot, ScriptedBackend};
use llm_handlers::replies::{
    chat_mode_set, dialog_too_long, greeting, EDITING_NOT_SUPPORTED, NEW_DIALOG,
    NEW_DIALOG_TIMEOUT, NO_MESSAGE_TO_RETRY, SELECT_CHAT_MODE,
};
use llm_handlers::{DialogHandler, DialogSettings};
use prompt::{chat_modes, find_chat_mode};
use std::sync::Arc;
use storage::{ConversationStore, DialogMessage, InMemoryConversationStore, UserValue};
use telegram_bot::{Handler, HandlerResponse, TextFormat};

const USER: i64 = 42;

struct Fixture {
    handler: DialogHandler,
    bot: Arc<MockBot>,
    store: Arc<InMemoryConversationStore>,
    backend: Arc<ScriptedBackend>,
}

fn fixture(backend: ScriptedBackend, use_streaming: bool) -> Fixture {
    fixture_with_bot(backend, use_streaming, MockBot::new())
}

fn fixture_with_bot(backend: ScriptedBackend, use_streaming: bool, bot: MockBot) -> Fixture {
    let bot = Arc::new(bot);
    let store = Arc::new(InMemoryConversationStore::new());
    let backend = Arc::new(backend);
    let settings = DialogSettings {
        use_streaming,
        ..DialogSettings::default()
    };
    let handler = DialogHandler::new(bot.clone(), store.clone(), backend.clone(), settings);
    Fixture {
        handler,
        bot,
        store,
        backend,
    }
}

/// **Test: /start registers the user, opens a dialog and greets in Markdown.**
#[tokio::test]
async fn test_start_registers_and_greets() {
    let f = fixture(ScriptedBackend::answering(&["unused"]), false);

    let response = f.handler.handle(&text_message(USER, "/start")).await.unwrap();

    assert_eq!(response, HandlerResponse::Reply(greeting()));
    assert!(f.store.user_exists(USER).await.unwrap());
    let user = f.store.get_user(USER).await.unwrap();
    assert!(user.current_dialog_id.is_some());
    assert_eq!(user.current_chat_mode, "normal");
    assert!(matches!(
        f.bot.calls().last(),
        Some(BotCall::Reply { format: TextFormat::Markdown, .. })
    ));
    assert!(f.backend.calls().is_empty());
}

/// **Test: A text turn is answered, persisted, and threads the next turn.**
///
/// **Setup:** Non-streaming backend.
///
/// **Action:** Two text messages.
///
/// **Expected:** Each answer replied and stored with the returned parent id; the second ask
/// continues conversation `conv-1` from `node-1`.
#[tokio::test]
async fn test_text_turn_persists_and_continues() {
    let f = fixture(ScriptedBackend::answering(&["Hi", "Hi there "]), false);

    let response = f.handler.handle(&text_message(USER, "hello")).await.unwrap();
    assert_eq!(response, HandlerResponse::Reply("Hi there".to_string()));
    assert_eq!(f.bot.sent_texts(), vec!["Hi there".to_string()]);

    let dialog = f.store.get_dialog(USER, None).await.unwrap();
    assert_eq!(dialog.conversation_id.as_deref(), Some("conv-1"));
    assert_eq!(dialog.messages.len(), 1);
    assert_eq!(dialog.messages[0].user, "hello");
    assert_eq!(dialog.messages[0].bot, "Hi there");
    assert_eq!(dialog.messages[0].parent_id.as_deref(), Some("node-1"));

    f.handler.handle(&text_message(USER, "more")).await.unwrap();

    let calls = f.backend.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].conversation_id, None);
    assert_eq!(calls[1].conversation_id.as_deref(), Some("conv-1"));
    assert_eq!(calls[1].parent_id.as_deref(), Some("node-1"));

    let dialog = f.store.get_dialog(USER, None).await.unwrap();
    assert_eq!(dialog.messages.len(), 2);
    assert_eq!(dialog.messages[1].parent_id.as_deref(), Some("node-2"));
}

/// **Test: A streamed turn ends with the final Markdown edit and is persisted.**
#[tokio::test]
async fn test_streaming_turn() {
    let f = fixture(ScriptedBackend::answering(&["He", "Hello"]), true);

    let response = f.handler.handle(&text_message(USER, "hi")).await.unwrap();

    assert_eq!(response, HandlerResponse::Reply("Hello".to_string()));
    let (_, text, format) = f.bot.edits().pop().unwrap();
    assert_eq!(text, "Hello");
    assert_eq!(format, TextFormat::Markdown);
    assert!(f.bot.calls().contains(&BotCall::Typing));

    let dialog = f.store.get_dialog(USER, None).await.unwrap();
    assert_eq!(dialog.messages.len(), 1);
    assert_eq!(dialog.messages[0].bot, "Hello");
}

/// **Test: A streamed turn whose final edit is rate-limited is still persisted.**
///
/// **Setup:** Streaming on; bot rate-limits every Markdown edit; paused clock.
///
/// **Action:** One text message.
///
/// **Expected:** `Reply("Hello")`; no failure notice; the answer is stored.
#[tokio::test(start_paused = true)]
async fn test_streaming_turn_persisted_when_final_edit_rate_limited() {
    let f = fixture_with_bot(
        ScriptedBackend::answering(&["He", "Hello"]),
        true,
        MockBot::new().with_rate_limited_markdown_edits(usize::MAX),
    );

    let response = f.handler.handle(&text_message(USER, "hi")).await.unwrap();

    assert_eq!(response, HandlerResponse::Reply("Hello".to_string()));
    assert!(f
        .bot
        .sent_texts()
        .iter()
        .all(|t| !t.starts_with("Something went wrong")));
    let dialog = f.store.get_dialog(USER, None).await.unwrap();
    assert_eq!(dialog.messages.len(), 1);
    assert_eq!(dialog.messages[0].bot, "Hello");
    assert_eq!(dialog.messages[0].parent_id.as_deref(), Some("node-1"));
}

/// **Test: Per-user locks are released once the user's updates are handled.**
///
/// **Setup:** Two users.
///
/// **Action:** One text message from each, handled concurrently.
///
/// **Expected:** Both answered; no lock entry remains afterwards.
#[tokio::test]
async fn test_user_locks_released_after_handling() {
    let f = fixture(ScriptedBackend::answering(&["ok"]), false);

    let first = text_message(USER, "hello");
    let second = text_message(USER + 1, "hello");
    let (a, b) = tokio::join!(f.handler.handle(&first), f.handler.handle(&second));

    assert_eq!(a.unwrap(), HandlerResponse::Reply("ok".to_string()));
    assert_eq!(b.unwrap(), HandlerResponse::Reply("ok".to_string()));
    assert_eq!(f.handler.users_in_flight(), 0);
}

/// **Test: Backend failure sends one notice and stores nothing.**
#[tokio::test]
async fn test_backend_failure_notice() {
    let f = fixture(ScriptedBackend::answering(&["x"]).failing_first(1), false);

    let response = f.handler.handle(&text_message(USER, "hello")).await.unwrap();

    let HandlerResponse::Reply(text) = response else {
        panic!("expected a reply");
    };
    assert!(text.starts_with("Something went wrong during completion. Reason:"));
    assert_eq!(f.bot.sent_texts(), vec![text]);
    assert!(f.store.get_dialog(USER, None).await.unwrap().messages.is_empty());
}

/// **Test: Shrink-and-retry is reported before the answer; the full history is kept.**
#[tokio::test]
async fn test_dialog_too_long_note() {
    let f = fixture(ScriptedBackend::answering(&["answer"]).failing_first(1), false);
    f.handler.handle(&text_message(USER, "/start")).await.unwrap();
    let history = vec![
        DialogMessage::new("q0", "a0", Some("p0".to_string())),
        DialogMessage::new("q1", "a1", Some("p1".to_string())),
    ];
    f.store
        .set_dialog_messages(USER, None, history, Some("conv-7".to_string()))
        .await
        .unwrap();

    f.handler.handle(&text_message(USER, "q2")).await.unwrap();

    let sent = f.bot.sent_texts();
    assert_eq!(&sent[sent.len() - 2..], &[dialog_too_long(1), "answer".to_string()]);
    let dialog = f.store.get_dialog(USER, None).await.unwrap();
    assert_eq!(dialog.messages.len(), 3);
    assert_eq!(dialog.conversation_id.as_deref(), Some("conv-7"));
    assert!(f
        .backend
        .calls()
        .iter()
        .all(|c| c.parent_id.as_deref() == Some("p1")));
}

/// **Test: Long answers are split into several messages.**
#[tokio::test]
async fn test_long_answer_split() {
    let long = "y".repeat(5000);
    let f = fixture(ScriptedBackend::answering(&[long.as_str()]), false);

    f.handler.handle(&text_message(USER, "essay")).await.unwrap();

    let sent = f.bot.sent_texts();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].chars().count(), 4096);
    assert_eq!(sent[1].chars().count(), 904);
}

/// **Test: /retry with an empty dialog only says there is nothing to retry.**
#[tokio::test]
async fn test_retry_without_messages() {
    let f = fixture(ScriptedBackend::answering(&["x"]), false);

    let response = f.handler.handle(&text_message(USER, "/retry")).await.unwrap();

    assert_eq!(response, HandlerResponse::Reply(NO_MESSAGE_TO_RETRY.to_string()));
    assert!(f.backend.calls().is_empty());
}

/// **Test: /retry replaces the last exchange and keeps the conversation id.**
#[tokio::test]
async fn test_retry_regenerates_last_answer() {
    let f = fixture(ScriptedBackend::answering(&["answer"]), false);
    f.handler.handle(&text_message(USER, "question")).await.unwrap();

    f.handler.handle(&text_message(USER, "/retry")).await.unwrap();

    let calls = f.backend.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[1].prompt, "question");
    assert_eq!(calls[1].conversation_id.as_deref(), Some("conv-1"));
    assert_eq!(calls[1].parent_id, None);

    let dialog = f.store.get_dialog(USER, None).await.unwrap();
    assert_eq!(dialog.messages.len(), 1);
    assert_eq!(dialog.messages[0].user, "question");
    assert_eq!(dialog.messages[0].parent_id.as_deref(), Some("node-2"));
    assert_eq!(dialog.conversation_id.as_deref(), Some("conv-1"));
}

/// **Test: /new resets the backend conversation and opens an empty dialog.**
#[tokio::test]
async fn test_new_dialog() {
    let f = fixture(ScriptedBackend::answering(&["answer"]), false);
    f.handler.handle(&text_message(USER, "question")).await.unwrap();
    let old = f.store.get_dialog(USER, None).await.unwrap();

    f.handler.handle(&text_message(USER, "/new")).await.unwrap();

    assert!(f.backend.resets().contains(&Some("conv-1".to_string())));
    let new = f.store.get_dialog(USER, None).await.unwrap();
    assert_ne!(new.id, old.id);
    assert!(new.messages.is_empty());
    assert_eq!(new.conversation_id, None);

    let welcome = find_chat_mode("normal").unwrap().welcome_message;
    let sent = f.bot.sent_texts();
    assert_eq!(
        &sent[sent.len() - 2..],
        &[NEW_DIALOG.to_string(), welcome.to_string()]
    );
}

/// **Test: /mode shows one button per chat mode.**
#[tokio::test]
async fn test_mode_keyboard() {
    let f = fixture(ScriptedBackend::answering(&["x"]), false);

    let response = f.handler.handle(&text_message(USER, "/mode")).await.unwrap();

    assert_eq!(response, HandlerResponse::Stop);
    let Some(BotCall::Keyboard { text, rows }) = f.bot.calls().pop() else {
        panic!("expected a keyboard");
    };
    assert_eq!(text, SELECT_CHAT_MODE);
    assert_eq!(rows.len(), chat_modes().len());
    for (row, mode) in rows.iter().zip(chat_modes()) {
        assert_eq!(row.len(), 1);
        assert_eq!(row[0].label, mode.name);
        assert_eq!(row[0].callback_data, format!("set_chat_mode|{}", mode.key));
    }
}

/// **Test: Pressing a chat mode button switches persona and edits the keyboard message twice.**
#[tokio::test]
async fn test_chat_mode_callback() {
    let f = fixture(ScriptedBackend::answering(&["ok"]), false);
    let assistant = find_chat_mode("assistant").unwrap();

    f.handler
        .handle(&callback(USER, "55", "set_chat_mode|assistant"))
        .await
        .unwrap();

    let user = f.store.get_user(USER).await.unwrap();
    assert_eq!(user.current_chat_mode, "assistant");
    assert_eq!(
        f.bot.edits(),
        vec![
            ("55".to_string(), chat_mode_set(assistant.name), TextFormat::Markdown),
            (
                "55".to_string(),
                assistant.welcome_message.to_string(),
                TextFormat::Markdown
            ),
        ]
    );

    f.handler.handle(&text_message(USER, "hi")).await.unwrap();
    let prompt = &f.backend.calls()[0].prompt;
    assert!(prompt.starts_with(assistant.prompt_start));
    assert!(prompt.ends_with("User: hi\nChatGPT: "));
}

/// **Test: An unknown chat mode key is reported and changes nothing.**
#[tokio::test]
async fn test_unknown_chat_mode_callback() {
    let f = fixture(ScriptedBackend::answering(&["x"]), false);

    f.handler
        .handle(&callback(USER, "55", "set_chat_mode|pirate"))
        .await
        .unwrap();

    assert_eq!(
        f.bot.sent_texts(),
        vec!["Chat mode pirate is not supported".to_string()]
    );
    assert!(f.bot.edits().is_empty());
    assert!(!f.store.user_exists(USER).await.unwrap());
}

/// **Test: Edited messages get a notice and no turn.**
#[tokio::test]
async fn test_edited_message_notice() {
    let f = fixture(ScriptedBackend::answering(&["x"]), false);

    let response = f.handler.handle(&edited_message(USER, "fixed")).await.unwrap();

    assert_eq!(response, HandlerResponse::Reply(EDITING_NOT_SUPPORTED.to_string()));
    assert!(f.backend.calls().is_empty());
}

/// **Test: Idle longer than the timeout starts a new dialog before the turn.**
#[tokio::test]
async fn test_new_dialog_timeout() {
    let f = fixture(ScriptedBackend::answering(&["answer"]), false);
    f.handler.handle(&text_message(USER, "first")).await.unwrap();
    let old = f.store.get_dialog(USER, None).await.unwrap();
    f.store
        .set_user_attribute(
            USER,
            UserValue::LastInteraction(Utc::now() - ChronoDuration::hours(1)),
        )
        .await
        .unwrap();

    f.handler.handle(&text_message(USER, "second")).await.unwrap();

    assert!(f.bot.sent_texts().contains(&NEW_DIALOG_TIMEOUT.to_string()));
    let new = f.store.get_dialog(USER, None).await.unwrap();
    assert_ne!(new.id, old.id);
    assert_eq!(new.messages.len(), 1);
    assert_eq!(f.backend.calls()[1].conversation_id, None);
}

/// **Test: Unknown commands fall through untouched.**
#[tokio::test]
async fn test_unknown_command_ignored() {
    let f = fixture(ScriptedBackend::answering(&["x"]), false);

    let response = f.handler.handle(&text_message(USER, "/weather")).await.unwrap();

    assert_eq!(response, HandlerResponse::Continue);
    assert!(f.bot.calls().is_empty());
    assert!(f.backend.calls().is_empty());
}

/// **Test: Rejected Markdown replies are resent as plain text.**
#[tokio::test]
async fn test_markdown_fallback_on_help() {
    let f = fixture_with_bot(
        ScriptedBackend::answering(&["x"]),
        false,
        MockBot::rejecting_markdown(),
    );

    f.handler.handle(&text_message(USER, "/help")).await.unwrap();

    assert!(matches!(
        f.bot.calls().last(),
        Some(BotCall::Reply { format: TextFormat::Plain, .. })
    ));
}
