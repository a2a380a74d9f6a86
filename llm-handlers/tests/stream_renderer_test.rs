//! StreamRenderer: placeholder, periodic edits, final Markdown edit, failures.

mod common;

use common::{text_message, BotCall, MockBot, ScriptedBackend};
use llm_client::{BackendError, ChatBackend};
use llm_handlers::{ResponseDriver, StreamRenderer, TurnError, PLACEHOLDER_SUFFIX};
use std::sync::Arc;
use std::time::Duration;
use telegram_bot::TextFormat;

fn renderer(bot: Arc<MockBot>) -> StreamRenderer {
    StreamRenderer::new(
        bot,
        text_message(7, "hi"),
        Duration::from_millis(500),
        Duration::from_secs(4),
    )
}

/// **Test: A slow stream is shown as one reply that is edited in place.**
///
/// **Setup:** Chunks "a", "ab", "abc" arriving 600ms apart; edit interval 500ms; paused clock.
///
/// **Action:** `render`.
///
/// **Expected:** One placeholder reply "a…", at least one intermediate plain edit, and a final
/// Markdown edit with "abc" on the same message.
#[tokio::test(start_paused = true)]
async fn test_streamed_answer_is_edited_in_place() {
    let bot = Arc::new(MockBot::new());
    let backend = ScriptedBackend::answering(&["a", "ab", "abc"])
        .with_chunk_delay(Duration::from_millis(600));
    let stream = backend.ask("hi", None, None).await.unwrap();

    let rendered = renderer(bot.clone()).render(stream).await.unwrap();

    assert_eq!(rendered.answer, "abc");
    assert_eq!(rendered.conversation_id, "conv-1");
    assert_eq!(rendered.parent_id, "node-1");

    let replies: Vec<_> = bot
        .calls()
        .into_iter()
        .filter(|c| matches!(c, BotCall::Reply { .. }))
        .collect();
    assert_eq!(replies.len(), 1);
    assert_eq!(
        replies[0],
        BotCall::Reply {
            id: rendered.message_id.clone(),
            text: format!("a{}", PLACEHOLDER_SUFFIX),
            format: TextFormat::Plain,
        }
    );

    let edits = bot.edits();
    assert!(edits.len() >= 2, "expected intermediate and final edits: {:?}", edits);
    assert!(edits.iter().all(|(id, _, _)| *id == rendered.message_id));
    assert!(edits[..edits.len() - 1]
        .iter()
        .all(|(_, _, format)| *format == TextFormat::Plain));
    assert_eq!(
        edits.last().unwrap(),
        &(rendered.message_id.clone(), "abc".to_string(), TextFormat::Markdown)
    );
}

/// **Test: A fast stream only produces the placeholder and the final edit.**
///
/// **Setup:** Chunks without delay.
///
/// **Action:** `render`.
///
/// **Expected:** Exactly one edit, the final Markdown one.
#[tokio::test]
async fn test_fast_stream_single_final_edit() {
    let bot = Arc::new(MockBot::new());
    let backend = ScriptedBackend::answering(&["Hel", "Hello"]);
    let stream = backend.ask("hi", None, None).await.unwrap();

    let rendered = renderer(bot.clone()).render(stream).await.unwrap();

    assert_eq!(rendered.answer, "Hello");
    assert_eq!(bot.sent_texts(), vec![format!("Hel{}", PLACEHOLDER_SUFFIX)]);
    assert_eq!(
        bot.edits(),
        vec![(rendered.message_id, "Hello".to_string(), TextFormat::Markdown)]
    );
}

/// **Test: Rejected Markdown falls back to a plain final edit.**
///
/// **Setup:** Bot rejects Markdown.
///
/// **Action:** `render`.
///
/// **Expected:** Success; last edit is plain "x*y".
#[tokio::test]
async fn test_final_edit_plain_fallback() {
    let bot = Arc::new(MockBot::rejecting_markdown());
    let backend = ScriptedBackend::answering(&["x*y"]);
    let stream = backend.ask("hi", None, None).await.unwrap();

    let rendered = renderer(bot.clone()).render(stream).await.unwrap();

    assert_eq!(
        bot.edits().last().unwrap(),
        &(rendered.message_id, "x*y".to_string(), TextFormat::Plain)
    );
}

/// **Test: Nothing is sent when the stream yields no chunk.**
///
/// **Setup:** Empty stream.
///
/// **Action:** `render`.
///
/// **Expected:** `Backend(EmptyResponse)`; no reply, no edit.
#[tokio::test]
async fn test_zero_chunks_sends_nothing() {
    let bot = Arc::new(MockBot::new());
    let backend = ScriptedBackend::answering(&[]);
    let stream = backend.ask("hi", None, None).await.unwrap();

    let err = renderer(bot.clone()).render(stream).await.unwrap_err();

    assert!(matches!(err, TurnError::Backend(BackendError::EmptyResponse)));
    assert!(bot.sent_texts().is_empty());
    assert!(bot.edits().is_empty());
}

/// **Test: An error before the first chunk leaves no placeholder behind.**
///
/// **Setup:** Stream whose first item is an error.
///
/// **Action:** `render`.
///
/// **Expected:** `Backend(Transient)`; no reply.
#[tokio::test]
async fn test_error_before_first_chunk() {
    let bot = Arc::new(MockBot::new());
    let backend = ScriptedBackend::answering(&["a"]).with_error_after(0);
    let stream = backend.ask("hi", None, None).await.unwrap();

    let err = renderer(bot.clone()).render(stream).await.unwrap_err();

    assert!(matches!(err, TurnError::Backend(BackendError::Transient(_))));
    assert!(bot.sent_texts().is_empty());
}

/// **Test: An error mid-stream stops rendering without a final edit.**
///
/// **Setup:** One chunk, then an error.
///
/// **Action:** `render`.
///
/// **Expected:** Placeholder was sent; error returned; no Markdown edit.
#[tokio::test]
async fn test_error_after_first_chunk() {
    let bot = Arc::new(MockBot::new());
    let backend = ScriptedBackend::answering(&["part", "partial"]).with_error_after(1);
    let stream = backend.ask("hi", None, None).await.unwrap();

    let err = renderer(bot.clone()).render(stream).await.unwrap_err();

    assert!(matches!(err, TurnError::Backend(_)));
    assert_eq!(bot.sent_texts(), vec![format!("part{}", PLACEHOLDER_SUFFIX)]);
    assert!(bot
        .edits()
        .iter()
        .all(|(_, _, format)| *format != TextFormat::Markdown));
}

/// **Test: Streaming turns never retry.**
///
/// **Setup:** Backend fails once.
///
/// **Action:** `send_turn_streaming`.
///
/// **Expected:** `Backend` error after one call.
#[tokio::test]
async fn test_streaming_turn_no_retry() {
    let bot = Arc::new(MockBot::new());
    let backend = Arc::new(ScriptedBackend::answering(&["x"]).failing_first(1));
    let driver = ResponseDriver::new(backend.clone());

    let err = driver
        .send_turn_streaming("hi", Vec::new(), "normal", None, None, &renderer(bot))
        .await
        .unwrap_err();

    assert!(matches!(err, TurnError::Backend(BackendError::Transient(_))));
    assert_eq!(backend.calls().len(), 1);
}

/// **Test: A rate-limited final edit is waited out and retried once.**
///
/// **Setup:** Bot rate-limits the first Markdown edit (retry after 3s); paused clock.
///
/// **Action:** `render`.
///
/// **Expected:** `Ok` with "Hello"; the retry lands as a Markdown edit after the wait.
#[tokio::test(start_paused = true)]
async fn test_rate_limited_final_edit_is_retried() {
    let bot = Arc::new(MockBot::new().with_rate_limited_markdown_edits(1));
    let backend = ScriptedBackend::answering(&["Hel", "Hello"]);
    let stream = backend.ask("hi", None, None).await.unwrap();
    let started = tokio::time::Instant::now();

    let rendered = renderer(bot.clone()).render(stream).await.unwrap();

    assert_eq!(rendered.answer, "Hello");
    assert!(started.elapsed() >= Duration::from_secs(3));
    assert_eq!(
        bot.edits(),
        vec![(rendered.message_id, "Hello".to_string(), TextFormat::Markdown)]
    );
}

/// **Test: A final edit that stays rate-limited does not fail the turn.**
///
/// **Setup:** Bot rate-limits every Markdown edit.
///
/// **Action:** `render`.
///
/// **Expected:** `Ok` with "Hello"; no Markdown edit recorded; the placeholder stays.
#[tokio::test(start_paused = true)]
async fn test_final_edit_rate_limit_is_not_a_turn_error() {
    let bot = Arc::new(MockBot::new().with_rate_limited_markdown_edits(usize::MAX));
    let backend = ScriptedBackend::answering(&["Hel", "Hello"]);
    let stream = backend.ask("hi", None, None).await.unwrap();

    let rendered = renderer(bot.clone()).render(stream).await.unwrap();

    assert_eq!(rendered.answer, "Hello");
    assert_eq!(rendered.conversation_id, "conv-1");
    assert!(bot.edits().is_empty());
    assert_eq!(bot.sent_texts(), vec![format!("Hel{}", PLACEHOLDER_SUFFIX)]);
}

/// **Test: The typing action repeats while streaming and stops with the turn.**
///
/// **Setup:** Three chunks 5s apart; typing interval 4s; paused clock.
///
/// **Action:** `render`, then let 20s pass.
///
/// **Expected:** Typing at 4s, 8s and 12s; no call of any kind after `render` returned.
#[tokio::test(start_paused = true)]
async fn test_typing_repeats_and_stops_after_render() {
    let bot = Arc::new(MockBot::new());
    let backend = ScriptedBackend::answering(&["a", "ab", "abc"])
        .with_chunk_delay(Duration::from_secs(5));
    let stream = backend.ask("hi", None, None).await.unwrap();

    let rendered = renderer(bot.clone()).render(stream).await.unwrap();
    assert_eq!(rendered.answer, "abc");
    assert_eq!(bot.typing_count(), 3);

    let calls_at_return = bot.calls().len();
    tokio::time::sleep(Duration::from_secs(20)).await;
    assert_eq!(bot.calls().len(), calls_at_return);
}

/// **Test: The typing action stops when the stream fails mid-answer.**
///
/// **Setup:** One chunk after 5s, an error after 10s; typing interval 4s.
///
/// **Action:** `render`, then let 20s pass.
///
/// **Expected:** Error; typing at 4s and 8s only; nothing sent afterwards.
#[tokio::test(start_paused = true)]
async fn test_typing_stops_after_mid_stream_error() {
    let bot = Arc::new(MockBot::new());
    let backend = ScriptedBackend::answering(&["part", "partial"])
        .with_error_after(1)
        .with_chunk_delay(Duration::from_secs(5));
    let stream = backend.ask("hi", None, None).await.unwrap();

    let err = renderer(bot.clone()).render(stream).await.unwrap_err();
    assert!(matches!(err, TurnError::Backend(BackendError::Transient(_))));
    assert_eq!(bot.typing_count(), 2);

    let calls_at_return = bot.calls().len();
    tokio::time::sleep(Duration::from_secs(20)).await;
    assert_eq!(bot.calls().len(), calls_at_return);
}

/// **Test: The typing action stops when the stream fails before any chunk.**
///
/// **Setup:** Error after 9s, no chunk; typing interval 4s.
///
/// **Action:** `render`, then let 20s pass.
///
/// **Expected:** Error; typing at 4s and 8s; no reply; nothing sent afterwards.
#[tokio::test(start_paused = true)]
async fn test_typing_stops_after_error_before_first_chunk() {
    let bot = Arc::new(MockBot::new());
    let backend = ScriptedBackend::answering(&["a"])
        .with_error_after(0)
        .with_chunk_delay(Duration::from_secs(9));
    let stream = backend.ask("hi", None, None).await.unwrap();

    let err = renderer(bot.clone()).render(stream).await.unwrap_err();
    assert!(matches!(err, TurnError::Backend(BackendError::Transient(_))));
    assert_eq!(bot.typing_count(), 2);
    assert!(bot.sent_texts().is_empty());

    let calls_at_return = bot.calls().len();
    tokio::time::sleep(Duration::from_secs(20)).await;
    assert_eq!(bot.calls().len(), calls_at_return);
}

/// **Test: A failed stream edit is dropped and the next tick edits again.**
///
/// **Setup:** Chunks "a", "ab", "abc" 600ms apart; edit interval 500ms; the first plain edit
/// fails.
///
/// **Action:** `render`.
///
/// **Expected:** `Ok`; a later plain edit with "ab" is recorded; final Markdown edit "abc".
#[tokio::test(start_paused = true)]
async fn test_failed_stream_edit_is_superseded() {
    let bot = Arc::new(MockBot::new().with_failing_plain_edits(1));
    let backend = ScriptedBackend::answering(&["a", "ab", "abc"])
        .with_chunk_delay(Duration::from_millis(600));
    let stream = backend.ask("hi", None, None).await.unwrap();

    let rendered = renderer(bot.clone()).render(stream).await.unwrap();

    assert_eq!(rendered.answer, "abc");
    let edits = bot.edits();
    assert!(edits.contains(&(rendered.message_id.clone(), "ab".to_string(), TextFormat::Plain)));
    assert_eq!(
        edits.last().unwrap(),
        &(rendered.message_id.clone(), "abc".to_string(), TextFormat::Markdown)
    );
}
