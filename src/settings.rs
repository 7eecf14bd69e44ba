//! Per-chat settings: temperature, memory toggle, model override.
//!
//! Each setter upserts only its own column so settings written at
//! different times never clobber each other.

use chrono::{SecondsFormat, Utc};
use sqlx::{Row, SqlitePool};

use crate::error::Result;
use crate::models::ChatSettings;

pub async fn get_settings(pool: &SqlitePool, chat_id: i64) -> Result<ChatSettings> {
    let row = sqlx::query(
        "SELECT temperature, memory_enabled, model FROM chat_settings WHERE chat_id = ?",
    )
    .bind(chat_id)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(ChatSettings::default());
    };

    let memory_enabled: Option<i64> = row.get("memory_enabled");
    let model: Option<String> = row.get("model");

    Ok(ChatSettings {
        temperature: row.get("temperature"),
        memory_enabled: memory_enabled.map(|v| v != 0),
        model: model.filter(|m| !m.trim().is_empty()),
    })
}

pub async fn set_temperature(pool: &SqlitePool, chat_id: i64, temperature: f64) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO chat_settings(chat_id, temperature, updated_at)
        VALUES(?, ?, ?)
        ON CONFLICT(chat_id) DO UPDATE SET
          temperature = excluded.temperature,
          updated_at = excluded.updated_at
        "#,
    )
    .bind(chat_id)
    .bind(temperature)
    .bind(now())
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn set_memory_enabled(pool: &SqlitePool, chat_id: i64, enabled: bool) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO chat_settings(chat_id, memory_enabled, updated_at)
        VALUES(?, ?, ?)
        ON CONFLICT(chat_id) DO UPDATE SET
          memory_enabled = excluded.memory_enabled,
          updated_at = excluded.updated_at
        "#,
    )
    .bind(chat_id)
    .bind(enabled as i64)
    .bind(now())
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn set_model(pool: &SqlitePool, chat_id: i64, model: Option<&str>) -> Result<()> {
    let model = model.map(str::trim).filter(|m| !m.is_empty());
    sqlx::query(
        r#"
        INSERT INTO chat_settings(chat_id, model, updated_at)
        VALUES(?, ?, ?)
        ON CONFLICT(chat_id) DO UPDATE SET
          model = excluded.model,
          updated_at = excluded.updated_at
        "#,
    )
    .bind(chat_id)
    .bind(model)
    .bind(now())
    .execute(pool)
    .await?;
    Ok(())
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}
