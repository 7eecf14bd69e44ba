//! Shared fakes for integration tests: a deterministic keyword embedder
//! and a scripted completion provider that records every call.

#![allow(dead_code)]

use async_trait::async_trait;
use sqlx::SqlitePool;
use std::collections::VecDeque;
use std::sync::Mutex;

use recall::completion::CompletionProvider;
use recall::embedding::EmbeddingProvider;
use recall::error::Result;
use recall::models::ChatTurn;
use recall::{db, migrate};

/// Fresh in-memory database with the full schema applied.
pub async fn test_pool() -> SqlitePool {
    let pool = db::connect_in_memory().await.unwrap();
    migrate::run_migrations(&pool).await.unwrap();
    pool
}

/// Deterministic 3-dimensional embedder: counts of "fox" and
/// "heliotrope" plus a constant component, so similarity between a query
/// and a chunk is a pure function of keyword overlap.
pub struct KeywordEmbedder;

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    fn model_name(&self) -> &str {
        "keyword-embed-3"
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|t| {
                vec![
                    t.matches("fox").count() as f32,
                    t.matches("heliotrope").count() as f32,
                    1.0,
                ]
            })
            .collect())
    }
}

/// A completion provider that replays a fixed script of replies and
/// records every call it receives.
pub struct ScriptedCompleter {
    replies: Mutex<VecDeque<String>>,
    calls: Mutex<Vec<Vec<ChatTurn>>>,
}

impl ScriptedCompleter {
    pub fn new(replies: &[&str]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// The message list of call number `n` (0-based).
    pub fn call(&self, n: usize) -> Vec<ChatTurn> {
        self.calls.lock().unwrap()[n].clone()
    }
}

#[async_trait]
impl CompletionProvider for ScriptedCompleter {
    async fn complete(
        &self,
        messages: &[ChatTurn],
        _temperature: f64,
        _model: Option<&str>,
    ) -> Result<String> {
        self.calls.lock().unwrap().push(messages.to_vec());
        Ok(self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| "ok".to_string()))
    }
}

/// A document with one highly distinctive region, sized so the default
/// chunking config (1000/150) produces six chunks with the marker text
/// confined to chunk index 2.
pub fn marker_document() -> String {
    let filler = "The quick brown fox jumps over the lazy dog near the quiet river bank. ";
    let marker = "heliotrope blossoms heliotrope gardens heliotrope fields bloom bright. ";

    let mut doc = String::new();
    while doc.len() < 2000 {
        doc.push_str(filler);
    }
    for _ in 0..4 {
        doc.push_str(marker);
    }
    while doc.len() < 5000 {
        doc.push_str(filler);
    }
    doc.trim().to_string()
}
