//! Persistent chunk store over the `doc_chunks` table.
//!
//! Rows are keyed by (doc_name, chunk_index, model); inserts use
//! `INSERT OR REPLACE` so re-running ingestion for the same document/model
//! pair is idempotent. The store only executes what it is told — the
//! delete-then-reinsert vs reject-if-exists decision belongs to callers
//! (see `ingest`).

use chrono::{SecondsFormat, Utc};
use sqlx::{Row, SqlitePool};

use crate::error::{Error, Result};
use crate::models::{ChunkPiece, StoredVector};

fn utc_now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Persist a batch of chunks with their vectors. Requires a 1:1 alignment
/// between `chunks` and `vectors`; every vector must match the length of
/// the first one in the batch. Both checks run before any row of the batch
/// is written. Returns (rows saved, embedding dimensionality).
pub async fn upsert_chunks(
    pool: &SqlitePool,
    doc_name: &str,
    model: &str,
    chunks: &[ChunkPiece],
    vectors: &[Vec<f32>],
) -> Result<(usize, usize)> {
    if chunks.len() != vectors.len() {
        return Err(Error::BatchMismatch {
            expected: chunks.len(),
            got: vectors.len(),
        });
    }

    if vectors.is_empty() {
        return Ok((0, 0));
    }

    let dim = vectors[0].len();
    for vector in vectors {
        if vector.len() != dim {
            return Err(Error::DimensionMismatch {
                doc_name: doc_name.to_string(),
                expected: dim,
                got: vector.len(),
            });
        }
    }

    let created_at = utc_now_iso();
    let mut saved = 0usize;

    for (chunk, vector) in chunks.iter().zip(vectors.iter()) {
        let embedding_json = serde_json::to_string(vector)?;

        sqlx::query(
            r#"
            INSERT OR REPLACE INTO doc_chunks
            (doc_name, chunk_index, text, start_offset, end_offset,
             embedding_json, embedding_dim, model, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(doc_name)
        .bind(chunk.chunk_index)
        .bind(&chunk.text)
        .bind(chunk.start_offset as i64)
        .bind(chunk.end_offset as i64)
        .bind(embedding_json)
        .bind(dim as i64)
        .bind(model)
        .bind(&created_at)
        .execute(pool)
        .await?;

        saved += 1;
    }

    Ok((saved, dim))
}

/// Delete every chunk of a document under the given model. Returns the
/// number of rows removed.
pub async fn delete_document(pool: &SqlitePool, doc_name: &str, model: &str) -> Result<u64> {
    let result = sqlx::query("DELETE FROM doc_chunks WHERE doc_name = ? AND model = ?")
        .bind(doc_name)
        .bind(model)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

pub async fn document_exists(pool: &SqlitePool, doc_name: &str, model: &str) -> Result<bool> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM doc_chunks WHERE doc_name = ? AND model = ?")
            .bind(doc_name)
            .bind(model)
            .fetch_one(pool)
            .await?;
    Ok(count > 0)
}

pub async fn has_embeddings(pool: &SqlitePool, model: &str) -> Result<bool> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM doc_chunks WHERE model = ?")
        .bind(model)
        .fetch_one(pool)
        .await?;
    Ok(count > 0)
}

/// Names of all indexed documents under a model, alphabetical.
pub async fn list_documents(pool: &SqlitePool, model: &str) -> Result<Vec<String>> {
    let rows = sqlx::query(
        "SELECT DISTINCT doc_name FROM doc_chunks WHERE model = ? ORDER BY doc_name",
    )
    .bind(model)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(|r| r.get("doc_name")).collect())
}

/// Load every stored vector for a model, in insertion order. The scan
/// order is what makes similarity ties deterministic downstream.
pub async fn all_vectors(pool: &SqlitePool, model: &str) -> Result<Vec<StoredVector>> {
    let rows = sqlx::query(
        r#"
        SELECT doc_name, chunk_index, text, embedding_json
        FROM doc_chunks
        WHERE model = ?
        ORDER BY id ASC
        "#,
    )
    .bind(model)
    .fetch_all(pool)
    .await?;

    let mut out = Vec::with_capacity(rows.len());
    for row in &rows {
        let embedding_json: String = row.get("embedding_json");
        let embedding: Vec<f32> = serde_json::from_str(&embedding_json)?;
        out.push(StoredVector {
            doc_name: row.get("doc_name"),
            chunk_index: row.get("chunk_index"),
            text: row.get("text"),
            embedding,
        });
    }

    Ok(out)
}

/// Remove every stored chunk for every model. Returns rows removed.
pub async fn clear_all(pool: &SqlitePool) -> Result<u64> {
    let result = sqlx::query("DELETE FROM doc_chunks").execute(pool).await?;
    Ok(result.rows_affected())
}
