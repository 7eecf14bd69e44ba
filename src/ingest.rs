//! Ingestion pipeline orchestration.
//!
//! Normalize → chunk → batch-embed → store, with the fail-fast checks in
//! that order: size bounds are enforced before any provider call is made,
//! and a misaligned embedding batch aborts before anything from that
//! batch is written. A failed batch never touches chunks already
//! committed for the document.

use globset::{Glob, GlobSet, GlobSetBuilder};
use sqlx::SqlitePool;
use std::path::Path;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::chunk::{normalize_text, split_into_chunks};
use crate::config::Config;
use crate::embedding::EmbeddingProvider;
use crate::error::{Error, Result};
use crate::store;

/// Upper bound on raw document size, checked before normalization.
pub const MAX_DOCUMENT_CHARS: usize = 10 * 1024 * 1024;

const PREVIEW_CHARS: usize = 200;

/// Outcome of ingesting one document.
#[derive(Debug, Clone)]
pub struct IngestReport {
    pub doc_name: String,
    pub text_length: usize,
    pub chunk_count: usize,
    pub embedding_dim: usize,
    pub first_chunk_preview: String,
}

/// Outcome of ingesting a path (file or directory).
#[derive(Debug, Default)]
pub struct PathReport {
    pub ingested: Vec<IngestReport>,
    pub failed: usize,
}

/// Chunk, embed, and store one document under the provider's model.
///
/// With `replace` set, existing chunks for (doc_name, model) are deleted
/// first; otherwise an already-indexed document is a typed error and
/// nothing is touched.
pub async fn ingest_document(
    pool: &SqlitePool,
    embedder: &dyn EmbeddingProvider,
    config: &Config,
    doc_name: &str,
    content: &str,
    replace: bool,
) -> Result<IngestReport> {
    let model = embedder.model_name();

    let raw_len = content.chars().count();
    if raw_len > MAX_DOCUMENT_CHARS {
        return Err(Error::DocumentTooLarge {
            len: raw_len,
            max: MAX_DOCUMENT_CHARS,
        });
    }

    if store::document_exists(pool, doc_name, model).await? {
        if !replace {
            return Err(Error::AlreadyIndexed {
                doc_name: doc_name.to_string(),
                model: model.to_string(),
            });
        }
        let deleted = store::delete_document(pool, doc_name, model).await?;
        info!(doc_name, model, deleted, "removed existing chunks before re-ingestion");
    }

    let normalized = normalize_text(content);
    let text_length = normalized.chars().count();

    let chunks = split_into_chunks(
        &normalized,
        config.chunking.chunk_size,
        config.chunking.overlap,
    )?;
    if chunks.is_empty() {
        return Err(Error::EmptyDocument {
            doc_name: doc_name.to_string(),
        });
    }

    let mut embedding_dim = embedder.dims().unwrap_or(0);
    for batch in chunks.chunks(config.embedding.batch_size) {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        let vectors = embedder.embed(&texts).await?;

        if vectors.len() != batch.len() {
            return Err(Error::BatchMismatch {
                expected: batch.len(),
                got: vectors.len(),
            });
        }

        // Dimensionality is fixed by the provider's declared dims, or by
        // the first batch, and must hold across the whole document.
        if embedding_dim != 0 {
            if let Some(v) = vectors.iter().find(|v| v.len() != embedding_dim) {
                return Err(Error::DimensionMismatch {
                    doc_name: doc_name.to_string(),
                    expected: embedding_dim,
                    got: v.len(),
                });
            }
        }

        let (_, dim) = store::upsert_chunks(pool, doc_name, model, batch, &vectors).await?;
        if embedding_dim == 0 {
            embedding_dim = dim;
        }
    }

    let first_chunk_preview = preview(&chunks[0].text);
    info!(
        doc_name,
        model,
        chunks = chunks.len(),
        embedding_dim,
        "document ingested"
    );

    Ok(IngestReport {
        doc_name: doc_name.to_string(),
        text_length,
        chunk_count: chunks.len(),
        embedding_dim,
        first_chunk_preview,
    })
}

fn preview(text: &str) -> String {
    let mut p: String = text.chars().take(PREVIEW_CHARS).collect();
    if text.chars().count() > PREVIEW_CHARS {
        p.push_str("...");
    }
    p
}

fn doc_globs() -> GlobSet {
    let mut builder = GlobSetBuilder::new();
    for pattern in ["**/*.md", "**/*.txt"] {
        // Static patterns, cannot fail to compile.
        if let Ok(glob) = Glob::new(pattern) {
            builder.add(glob);
        }
    }
    builder.build().unwrap_or_else(|_| GlobSet::empty())
}

/// Ingest a single file, or every `*.md` / `*.txt` under a directory.
///
/// Per-file failures are logged and counted; documents already committed
/// stay committed.
pub async fn ingest_path(
    pool: &SqlitePool,
    embedder: &dyn EmbeddingProvider,
    config: &Config,
    path: &Path,
    name_override: Option<&str>,
    replace: bool,
) -> Result<PathReport> {
    let mut report = PathReport::default();

    if path.is_file() {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;
        let doc_name = name_override
            .map(str::to_string)
            .unwrap_or_else(|| file_doc_name(path));
        report
            .ingested
            .push(ingest_document(pool, embedder, config, &doc_name, &content, replace).await?);
        return Ok(report);
    }

    let globs = doc_globs();
    for entry in WalkDir::new(path).into_iter().flatten() {
        let file = entry.path();
        if !file.is_file() || !globs.is_match(file.strip_prefix(path).unwrap_or(file)) {
            continue;
        }

        let doc_name = file
            .strip_prefix(path)
            .unwrap_or(file)
            .to_string_lossy()
            .to_string();

        let content = match std::fs::read_to_string(file) {
            Ok(content) => content,
            Err(e) => {
                warn!(path = %file.display(), error = %e, "failed to read file, skipping");
                report.failed += 1;
                continue;
            }
        };

        match ingest_document(pool, embedder, config, &doc_name, &content, replace).await {
            Ok(r) => report.ingested.push(r),
            Err(e) => {
                warn!(doc_name = %doc_name, error = %e, "failed to ingest document");
                report.failed += 1;
            }
        }
    }

    Ok(report)
}

fn file_doc_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}
