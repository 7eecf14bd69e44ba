//! Conversation-memory tests: message streams, compaction, per-chat
//! settings, and the chat loop's text/summary/structured paths.

mod common;

use common::{test_pool, KeywordEmbedder, ScriptedCompleter};
use recall::config::Config;
use recall::models::{ChatMode, ChatRole};
use recall::{chat, context, memory, settings, summary, Error};

const CHAT: i64 = 42;

async fn seed_dialogue(pool: &sqlx::SqlitePool, mode: ChatMode, turns: usize) {
    for i in 0..turns {
        let (role, content) = if i % 2 == 0 {
            (ChatRole::User, format!("question {i}"))
        } else {
            (ChatRole::Assistant, format!("answer {i}"))
        };
        memory::append_message(pool, CHAT, mode, role, &content)
            .await
            .unwrap();
    }
}

// ─── Message streams ────────────────────────────────────────────────

#[tokio::test]
async fn tail_returns_recent_dialogue_in_order() {
    let pool = test_pool().await;
    seed_dialogue(&pool, ChatMode::Text, 6).await;

    let tail = memory::tail_messages(&pool, CHAT, ChatMode::Text, 4).await.unwrap();
    assert_eq!(tail.len(), 4);
    assert_eq!(tail[0].content, "question 2");
    assert_eq!(tail[3].content, "answer 5");
    assert_eq!(tail[0].role, ChatRole::User);
}

#[tokio::test]
async fn streams_are_partitioned_by_mode() {
    let pool = test_pool().await;
    seed_dialogue(&pool, ChatMode::Text, 4).await;
    seed_dialogue(&pool, ChatMode::Summary, 2).await;

    assert_eq!(memory::count_messages(&pool, CHAT, ChatMode::Text).await.unwrap(), 4);
    assert_eq!(memory::count_messages(&pool, CHAT, ChatMode::Summary).await.unwrap(), 2);
    assert_eq!(memory::count_messages(&pool, CHAT, ChatMode::Rag).await.unwrap(), 0);
}

#[tokio::test]
async fn empty_content_is_never_persisted() {
    let pool = test_pool().await;
    memory::append_message(&pool, CHAT, ChatMode::Text, ChatRole::User, "   ")
        .await
        .unwrap();
    assert_eq!(memory::count_messages(&pool, CHAT, ChatMode::Text).await.unwrap(), 0);
}

#[tokio::test]
async fn clear_wipes_one_mode_or_all() {
    let pool = test_pool().await;
    seed_dialogue(&pool, ChatMode::Text, 4).await;
    seed_dialogue(&pool, ChatMode::Summary, 4).await;

    memory::clear_messages(&pool, CHAT, Some(ChatMode::Text)).await.unwrap();
    assert_eq!(memory::count_messages(&pool, CHAT, ChatMode::Text).await.unwrap(), 0);
    assert_eq!(memory::count_messages(&pool, CHAT, ChatMode::Summary).await.unwrap(), 4);

    memory::clear_messages(&pool, CHAT, None).await.unwrap();
    assert_eq!(memory::count_messages(&pool, CHAT, ChatMode::Summary).await.unwrap(), 0);
}

// ─── Compaction ─────────────────────────────────────────────────────

#[tokio::test]
async fn compaction_folds_old_messages_and_keeps_the_tail() {
    let pool = test_pool().await;
    let cfg = Config::default();
    let completer = ScriptedCompleter::new(&["- user asked questions 0..3"]);
    seed_dialogue(&pool, ChatMode::Summary, 12).await;

    let compacted =
        summary::maybe_compact(&pool, &completer, &cfg.memory, CHAT, ChatMode::Summary, 0.0)
            .await
            .unwrap();
    assert!(compacted);

    // 12 unfolded, keep_tail 8: the oldest 4 were folded and deleted.
    assert_eq!(memory::count_messages(&pool, CHAT, ChatMode::Summary).await.unwrap(), 8);
    let tail = memory::tail_messages(&pool, CHAT, ChatMode::Summary, 20).await.unwrap();
    assert_eq!(tail[0].content, "question 4");

    let current = summary::get_summary(&pool, CHAT, ChatMode::Summary).await.unwrap();
    assert_eq!(current.summary, "- user asked questions 0..3");
    assert!(current.last_message_id > 0);

    // The fold request carried the old summary slot and the dialogue.
    let fold_call = completer.call(0);
    assert_eq!(fold_call[0].role, ChatRole::System);
    let payload = &fold_call[1].content;
    assert!(payload.contains("Current summary"));
    assert!(payload.contains("USER: question 0"));
    assert!(payload.contains("ASSISTANT: answer 3"));
    assert!(!payload.contains("question 4"), "tail must not be folded");
}

#[tokio::test]
async fn compaction_is_idempotent_without_new_messages() {
    let pool = test_pool().await;
    let cfg = Config::default();
    let completer = ScriptedCompleter::new(&["- summary"]);
    seed_dialogue(&pool, ChatMode::Summary, 12).await;

    assert!(summary::maybe_compact(&pool, &completer, &cfg.memory, CHAT, ChatMode::Summary, 0.0)
        .await
        .unwrap());
    // Only the 8-message tail is unfolded now: below the trigger.
    assert!(!summary::maybe_compact(&pool, &completer, &cfg.memory, CHAT, ChatMode::Summary, 0.0)
        .await
        .unwrap());
    assert_eq!(completer.call_count(), 1);
    assert_eq!(memory::count_messages(&pool, CHAT, ChatMode::Summary).await.unwrap(), 8);
}

#[tokio::test]
async fn compaction_not_triggered_below_threshold() {
    let pool = test_pool().await;
    let cfg = Config::default();
    let completer = ScriptedCompleter::new(&[]);
    seed_dialogue(&pool, ChatMode::Summary, 9).await;

    let compacted =
        summary::maybe_compact(&pool, &completer, &cfg.memory, CHAT, ChatMode::Summary, 0.0)
            .await
            .unwrap();
    assert!(!compacted);
    assert_eq!(completer.call_count(), 0);
    assert_eq!(memory::count_messages(&pool, CHAT, ChatMode::Summary).await.unwrap(), 9);
}

#[tokio::test]
async fn empty_fold_result_abandons_compaction() {
    let pool = test_pool().await;
    let cfg = Config::default();
    let completer = ScriptedCompleter::new(&["   "]);
    seed_dialogue(&pool, ChatMode::Summary, 12).await;

    let compacted =
        summary::maybe_compact(&pool, &completer, &cfg.memory, CHAT, ChatMode::Summary, 0.0)
            .await
            .unwrap();

    // Nothing was deleted and no summary was written.
    assert!(!compacted);
    assert_eq!(memory::count_messages(&pool, CHAT, ChatMode::Summary).await.unwrap(), 12);
    let current = summary::get_summary(&pool, CHAT, ChatMode::Summary).await.unwrap();
    assert!(current.summary.is_empty());
    assert_eq!(current.last_message_id, 0);
}

// ─── Settings ───────────────────────────────────────────────────────

#[tokio::test]
async fn settings_updates_preserve_other_fields() {
    let pool = test_pool().await;

    settings::set_temperature(&pool, CHAT, 0.2).await.unwrap();
    settings::set_model(&pool, CHAT, Some("small-model")).await.unwrap();
    settings::set_memory_enabled(&pool, CHAT, false).await.unwrap();

    let s = settings::get_settings(&pool, CHAT).await.unwrap();
    assert_eq!(s.temperature, Some(0.2));
    assert_eq!(s.model.as_deref(), Some("small-model"));
    assert_eq!(s.memory_enabled, Some(false));

    // Updating one field leaves the others alone.
    settings::set_temperature(&pool, CHAT, 0.9).await.unwrap();
    let s = settings::get_settings(&pool, CHAT).await.unwrap();
    assert_eq!(s.temperature, Some(0.9));
    assert_eq!(s.model.as_deref(), Some("small-model"));
    assert_eq!(s.memory_enabled, Some(false));
}

#[tokio::test]
async fn unknown_chat_has_default_settings() {
    let pool = test_pool().await;
    let s = settings::get_settings(&pool, 999).await.unwrap();
    assert!(s.temperature.is_none());
    assert!(s.memory_enabled.is_none());
    assert!(s.model.is_none());
}

// ─── Chat loop ──────────────────────────────────────────────────────

#[tokio::test]
async fn text_turns_accumulate_history() {
    let pool = test_pool().await;
    let cfg = Config::default();
    let completer = ScriptedCompleter::new(&["hi there", "still here"]);

    let first = chat::answer(&pool, &cfg, &KeywordEmbedder, &completer, CHAT, ChatMode::Text, "hello")
        .await
        .unwrap();
    assert_eq!(first.text, "hi there");

    chat::answer(&pool, &cfg, &KeywordEmbedder, &completer, CHAT, ChatMode::Text, "are you there?")
        .await
        .unwrap();

    // The second call saw the first exchange in its context.
    let second_call = completer.call(1);
    let contents: Vec<&str> = second_call.iter().map(|t| t.content.as_str()).collect();
    assert!(contents.contains(&"hello"));
    assert!(contents.contains(&"hi there"));
    assert_eq!(second_call.last().unwrap().content, "are you there?");
    assert_eq!(memory::count_messages(&pool, CHAT, ChatMode::Text).await.unwrap(), 4);
}

#[tokio::test]
async fn disabled_memory_skips_history_and_persistence() {
    let pool = test_pool().await;
    let cfg = Config::default();
    let completer = ScriptedCompleter::new(&["reply"]);
    settings::set_memory_enabled(&pool, CHAT, false).await.unwrap();

    chat::answer(&pool, &cfg, &KeywordEmbedder, &completer, CHAT, ChatMode::Text, "hello")
        .await
        .unwrap();

    assert_eq!(memory::count_messages(&pool, CHAT, ChatMode::Text).await.unwrap(), 0);
    // Context was just the system prompt plus the new turn.
    assert_eq!(completer.call(0).len(), 2);
}

#[tokio::test]
async fn summary_turn_includes_the_running_summary() {
    let pool = test_pool().await;
    let cfg = Config::default();
    let completer = ScriptedCompleter::new(&["the reply"]);
    summary::set_summary(&pool, CHAT, ChatMode::Summary, "- the user prefers tea", 0)
        .await
        .unwrap();

    let answer = chat::answer(
        &pool,
        &cfg,
        &KeywordEmbedder,
        &completer,
        CHAT,
        ChatMode::Summary,
        "what do I prefer?",
    )
    .await
    .unwrap();

    assert_eq!(answer.text, "the reply");
    assert!(!answer.compacted);
    let call = completer.call(0);
    assert!(call
        .iter()
        .any(|t| t.role == ChatRole::System && t.content.contains("the user prefers tea")));
}

#[tokio::test]
async fn summary_turn_compacts_after_enough_messages() {
    let pool = test_pool().await;
    let cfg = Config::default();
    let completer = ScriptedCompleter::new(&["the reply", "- folded history"]);
    seed_dialogue(&pool, ChatMode::Summary, 12).await;

    let answer = chat::answer(
        &pool,
        &cfg,
        &KeywordEmbedder,
        &completer,
        CHAT,
        ChatMode::Summary,
        "one more question",
    )
    .await
    .unwrap();

    // 12 seeded plus this exchange: 14 unfolded, 6 folded, tail of 8.
    assert!(answer.compacted);
    assert_eq!(completer.call_count(), 2);
    assert_eq!(memory::count_messages(&pool, CHAT, ChatMode::Summary).await.unwrap(), 8);
    let current = summary::get_summary(&pool, CHAT, ChatMode::Summary).await.unwrap();
    assert_eq!(current.summary, "- folded history");
}

#[tokio::test]
async fn structured_turn_repairs_invalid_json_once() {
    let pool = test_pool().await;
    let cfg = Config::default();
    let completer = ScriptedCompleter::new(&[
        "here you go, definitely json",
        r#"{"answer": "42", "confidence": 0.9, "notes": ""}"#,
    ]);

    let answer = chat::answer(
        &pool,
        &cfg,
        &KeywordEmbedder,
        &completer,
        CHAT,
        ChatMode::Structured,
        "the question",
    )
    .await
    .unwrap();

    assert_eq!(completer.call_count(), 2);
    let value: serde_json::Value = serde_json::from_str(&answer.text).unwrap();
    assert_eq!(value["answer"], "42");
}

#[tokio::test]
async fn structured_turn_fails_after_failed_repair() {
    let pool = test_pool().await;
    let cfg = Config::default();
    let completer = ScriptedCompleter::new(&["not json", "still not json"]);

    let err = chat::answer(
        &pool,
        &cfg,
        &KeywordEmbedder,
        &completer,
        CHAT,
        ChatMode::Structured,
        "the question",
    )
    .await
    .unwrap_err();

    assert!(matches!(err, Error::StructuredOutput(_)));
    assert_eq!(completer.call_count(), 2);
}

#[tokio::test]
async fn empty_reply_surfaces_as_typed_error() {
    let pool = test_pool().await;
    let cfg = Config::default();
    let completer = ScriptedCompleter::new(&[""]);

    let err = chat::answer(&pool, &cfg, &KeywordEmbedder, &completer, CHAT, ChatMode::Text, "hello")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::EmptyGeneration));
    // Nothing was persisted for the failed turn.
    assert_eq!(memory::count_messages(&pool, CHAT, ChatMode::Text).await.unwrap(), 0);
}

#[tokio::test]
async fn context_builder_shapes_match_the_memory_layout() {
    let tail = vec![recall::models::ChatTurn::user("q")];
    let with = context::build_context_with_summary("sys", Some("- fact"), tail.clone());
    assert_eq!(with.len(), 3);
    let without = context::build_context_with_summary("sys", None, tail);
    assert_eq!(without.len(), 2);
}
