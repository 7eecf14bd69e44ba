use anyhow::Result;
use sqlx::SqlitePool;

/// Create all tables and indexes. Idempotent: safe to run on every start.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    // Document chunks with their serialized embeddings. One row per
    // (document, chunk position, embedding model).
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS doc_chunks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            doc_name TEXT NOT NULL,
            chunk_index INTEGER NOT NULL,
            text TEXT NOT NULL,
            start_offset INTEGER NOT NULL,
            end_offset INTEGER NOT NULL,
            embedding_json TEXT NOT NULL,
            embedding_dim INTEGER NOT NULL,
            model TEXT NOT NULL,
            created_at TEXT NOT NULL,
            UNIQUE(doc_name, chunk_index, model)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_doc_chunks_doc_name_model ON doc_chunks(doc_name, model)",
    )
    .execute(pool)
    .await?;

    // Append-only per-chat, per-mode message log. `id` doubles as the
    // compaction high-water mark.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS messages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            chat_id INTEGER NOT NULL,
            mode TEXT NOT NULL,
            role TEXT NOT NULL,
            content TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_messages_chat_id_mode_id ON messages(chat_id, mode, id)",
    )
    .execute(pool)
    .await?;

    // At most one running summary per (chat, mode).
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chat_summaries (
            chat_id INTEGER NOT NULL,
            mode TEXT NOT NULL,
            summary TEXT NOT NULL,
            last_message_id INTEGER NOT NULL DEFAULT 0,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (chat_id, mode)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chat_settings (
            chat_id INTEGER PRIMARY KEY,
            temperature REAL,
            memory_enabled INTEGER,
            model TEXT,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
