//! Conversation-memory compaction.
//!
//! Keeps an unbounded dialogue usable within a bounded context: once
//! enough unfolded messages accumulate, the older ones are folded into a
//! running natural-language summary and deleted, leaving a fixed-size
//! live tail. The summary row's `last_message_id` is the high-water mark;
//! it only ever moves forward, and each compaction re-derives the whole
//! summary from the old summary plus the newly folded turns.

use sqlx::{Row, SqlitePool};
use tracing::{debug, info};

use chrono::{SecondsFormat, Utc};

use crate::completion::CompletionProvider;
use crate::config::MemoryConfig;
use crate::error::Result;
use crate::memory;
use crate::models::{ChatMode, ChatRole, ChatTurn, ConversationSummary};

/// Instruction for the folding call: keep facts, drop prose, invent
/// nothing.
const FOLD_SYSTEM_PROMPT: &str = "\
You compress a dialogue history so the conversation can continue later.

Keep only what is useful:
- facts, numbers, agreements
- requirements, constraints, settings
- what was already tried and what failed
- the current goal and open questions

Format: short bullet points. No filler. Do not add anything that was not \
in the dialogue.";

pub async fn get_summary(
    pool: &SqlitePool,
    chat_id: i64,
    mode: ChatMode,
) -> Result<ConversationSummary> {
    let row = sqlx::query(
        "SELECT summary, last_message_id, updated_at FROM chat_summaries WHERE chat_id = ? AND mode = ?",
    )
    .bind(chat_id)
    .bind(mode.as_str())
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(ConversationSummary::default());
    };

    let summary: String = row.get("summary");
    Ok(ConversationSummary {
        summary: summary.trim().to_string(),
        last_message_id: row.get("last_message_id"),
        updated_at: row.get("updated_at"),
    })
}

/// Write the summary and its high-water mark as a single upsert.
pub async fn set_summary(
    pool: &SqlitePool,
    chat_id: i64,
    mode: ChatMode,
    summary: &str,
    last_message_id: i64,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO chat_summaries(chat_id, mode, summary, last_message_id, updated_at)
        VALUES(?, ?, ?, ?, ?)
        ON CONFLICT(chat_id, mode) DO UPDATE SET
          summary = excluded.summary,
          last_message_id = excluded.last_message_id,
          updated_at = excluded.updated_at
        "#,
    )
    .bind(chat_id)
    .bind(mode.as_str())
    .bind(summary.trim())
    .bind(last_message_id)
    .bind(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true))
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn clear_summary(pool: &SqlitePool, chat_id: i64, mode: ChatMode) -> Result<()> {
    sqlx::query("DELETE FROM chat_summaries WHERE chat_id = ? AND mode = ?")
        .bind(chat_id)
        .bind(mode.as_str())
        .execute(pool)
        .await?;
    Ok(())
}

/// Fold older messages into the running summary if enough have
/// accumulated. Returns `true` only when a compaction was committed.
///
/// Trigger: the unfolded count must reach `compress_every` **and** exceed
/// `keep_tail`, so a compaction can never fold away the entire live tail.
/// An empty folding result abandons the whole attempt with no state
/// change. Calling this again with no new messages is always a no-op.
pub async fn maybe_compact(
    pool: &SqlitePool,
    completer: &dyn CompletionProvider,
    config: &MemoryConfig,
    chat_id: i64,
    mode: ChatMode,
    temperature: f64,
) -> Result<bool> {
    let current = get_summary(pool, chat_id, mode).await?;
    let new_msgs = memory::messages_after(pool, chat_id, mode, current.last_message_id).await?;

    if new_msgs.len() < config.compress_every || new_msgs.len() <= config.keep_tail {
        debug!(
            chat_id,
            mode = %mode,
            unfolded = new_msgs.len(),
            "compaction trigger not met"
        );
        return Ok(false);
    }

    // Fold everything except the keep_tail newest messages.
    let cutoff = new_msgs.len() - config.keep_tail;
    let folded = &new_msgs[..cutoff];
    let last_folded_id = folded[folded.len() - 1].0;

    let mut lines = Vec::with_capacity(folded.len());
    for (_, role, content) in folded {
        match role {
            ChatRole::User => lines.push(format!("USER: {content}")),
            _ => lines.push(format!("ASSISTANT: {content}")),
        }
    }
    let dialogue = lines.join("\n");

    let existing = if current.summary.is_empty() {
        "(empty)"
    } else {
        current.summary.as_str()
    };
    let payload = format!(
        "Current summary (may be empty):\n{existing}\n\n\
         New messages to fold into the summary:\n{dialogue}\n\n\
         Produce the updated summary."
    );

    let new_summary = completer
        .complete(
            &[
                ChatTurn::system(FOLD_SYSTEM_PROMPT),
                ChatTurn::user(payload),
            ],
            temperature,
            None,
        )
        .await?;
    let new_summary = new_summary.trim();

    if new_summary.is_empty() {
        info!(chat_id, mode = %mode, "empty folding result, compaction abandoned");
        return Ok(false);
    }

    set_summary(pool, chat_id, mode, new_summary, last_folded_id).await?;
    let deleted = memory::delete_upto(pool, chat_id, mode, last_folded_id).await?;

    info!(
        chat_id,
        mode = %mode,
        folded = folded.len(),
        deleted,
        high_water_mark = last_folded_id,
        "conversation history compacted"
    );
    Ok(true)
}
