//! Append-only per-chat, per-mode message log.
//!
//! Each (chat_id, mode) pair is an independent stream; the rowid is the
//! strictly increasing sequence used both for ordered retrieval and as
//! the compaction high-water mark.

use chrono::{SecondsFormat, Utc};
use sqlx::{Row, SqlitePool};

use crate::error::Result;
use crate::models::{ChatMode, ChatRole, ChatTurn};

/// Append one turn. Content that trims to empty is skipped silently.
pub async fn append_message(
    pool: &SqlitePool,
    chat_id: i64,
    mode: ChatMode,
    role: ChatRole,
    content: &str,
) -> Result<()> {
    let content = content.trim();
    if content.is_empty() {
        return Ok(());
    }

    sqlx::query(
        "INSERT INTO messages(chat_id, mode, role, content, created_at) VALUES(?, ?, ?, ?, ?)",
    )
    .bind(chat_id)
    .bind(mode.as_str())
    .bind(role.as_str())
    .bind(content)
    .bind(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true))
    .execute(pool)
    .await?;

    Ok(())
}

/// The most recent `limit` turns, oldest first. Rows with unknown roles
/// or empty content are skipped.
pub async fn tail_messages(
    pool: &SqlitePool,
    chat_id: i64,
    mode: ChatMode,
    limit: usize,
) -> Result<Vec<ChatTurn>> {
    let rows = sqlx::query(
        r#"
        SELECT role, content
        FROM messages
        WHERE chat_id = ? AND mode = ?
        ORDER BY id DESC
        LIMIT ?
        "#,
    )
    .bind(chat_id)
    .bind(mode.as_str())
    .bind(limit as i64)
    .fetch_all(pool)
    .await?;

    let mut turns = Vec::with_capacity(rows.len());
    for row in rows.iter().rev() {
        let role: String = row.get("role");
        let content: String = row.get("content");
        let content = content.trim();
        match ChatRole::parse(&role) {
            Some(role @ (ChatRole::User | ChatRole::Assistant)) if !content.is_empty() => {
                turns.push(ChatTurn::new(role, content));
            }
            _ => {}
        }
    }
    Ok(turns)
}

/// Every unfolded message strictly after `after_id`, ascending. Only
/// non-empty user/assistant rows are returned.
pub async fn messages_after(
    pool: &SqlitePool,
    chat_id: i64,
    mode: ChatMode,
    after_id: i64,
) -> Result<Vec<(i64, ChatRole, String)>> {
    let rows = sqlx::query(
        r#"
        SELECT id, role, content
        FROM messages
        WHERE chat_id = ? AND mode = ? AND id > ?
        ORDER BY id ASC
        "#,
    )
    .bind(chat_id)
    .bind(mode.as_str())
    .bind(after_id)
    .fetch_all(pool)
    .await?;

    let mut out = Vec::with_capacity(rows.len());
    for row in &rows {
        let id: i64 = row.get("id");
        let role: String = row.get("role");
        let content: String = row.get("content");
        let content = content.trim();
        match ChatRole::parse(&role) {
            Some(role @ (ChatRole::User | ChatRole::Assistant)) if !content.is_empty() => {
                out.push((id, role, content.to_string()));
            }
            _ => {}
        }
    }
    Ok(out)
}

pub async fn count_messages(pool: &SqlitePool, chat_id: i64, mode: ChatMode) -> Result<i64> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE chat_id = ? AND mode = ?")
            .bind(chat_id)
            .bind(mode.as_str())
            .fetch_one(pool)
            .await?;
    Ok(count)
}

/// Delete folded messages up to and including the high-water mark.
pub async fn delete_upto(
    pool: &SqlitePool,
    chat_id: i64,
    mode: ChatMode,
    upto_id: i64,
) -> Result<u64> {
    let result = sqlx::query("DELETE FROM messages WHERE chat_id = ? AND mode = ? AND id <= ?")
        .bind(chat_id)
        .bind(mode.as_str())
        .bind(upto_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// Clear a chat's messages: one mode's stream, or every mode.
pub async fn clear_messages(
    pool: &SqlitePool,
    chat_id: i64,
    mode: Option<ChatMode>,
) -> Result<u64> {
    let result = match mode {
        Some(mode) => {
            sqlx::query("DELETE FROM messages WHERE chat_id = ? AND mode = ?")
                .bind(chat_id)
                .bind(mode.as_str())
                .execute(pool)
                .await?
        }
        None => {
            sqlx::query("DELETE FROM messages WHERE chat_id = ?")
                .bind(chat_id)
                .execute(pool)
                .await?
        }
    };
    Ok(result.rows_affected())
}
