//! Conversation orchestration: one entry point per user turn.
//!
//! [`answer`] dispatches on [`ChatMode`], builds the mode's context from
//! the memory store, calls the completion provider, persists both turns,
//! and (for summary mode) runs compaction afterwards. Compaction failures
//! are logged and swallowed: the user already has their answer, the fold
//! can happen on the next turn.

use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::completion::CompletionProvider;
use crate::config::Config;
use crate::context;
use crate::embedding::{self, EmbeddingProvider};
use crate::error::{Error, Result};
use crate::memory;
use crate::models::{ChatMode, ChatRole, ChatTurn, ScoredChunk};
use crate::search;
use crate::settings;
use crate::store;
use crate::structured;
use crate::summary;

const TEXT_SYSTEM_PROMPT: &str =
    "You are a concise, helpful assistant. Answer in the language the user writes in.";

const RAG_SYSTEM_PROMPT: &str = "\
You answer questions using the document fragments provided in the user \
message. Rely on the fragments first; if they do not contain the answer, \
say so plainly instead of guessing.";

const STRUCTURED_SYSTEM_PROMPT: &str = "\
You reply with a single JSON object and nothing else: no prose, no code \
fences, no comments. Shape:
{
  \"answer\": \"<direct answer to the question>\",
  \"confidence\": <number between 0.0 and 1.0>,
  \"notes\": \"<caveats or an empty string>\"
}";

/// How a RAG turn found its passages, surfaced so callers can show the
/// retrieval path to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retrieval {
    /// Not a RAG turn, or retrieval was skipped.
    None,
    /// Passages cleared the configured similarity threshold.
    Threshold,
    /// Nothing cleared the threshold; a wider re-query with the looser
    /// fallback cutoff supplied the passages.
    Fallback,
    /// Both passes came back empty; the reply is a notice, not a
    /// completion.
    Empty,
}

/// Result of one user turn.
#[derive(Debug)]
pub struct ChatAnswer {
    pub text: String,
    pub sources: Vec<ScoredChunk>,
    pub retrieval: Retrieval,
    pub compacted: bool,
}

impl ChatAnswer {
    fn plain(text: String) -> Self {
        Self {
            text,
            sources: Vec::new(),
            retrieval: Retrieval::None,
            compacted: false,
        }
    }
}

/// Handle one user turn in the given chat and mode.
pub async fn answer(
    pool: &SqlitePool,
    config: &Config,
    embedder: &dyn EmbeddingProvider,
    completer: &dyn CompletionProvider,
    chat_id: i64,
    mode: ChatMode,
    text: &str,
) -> Result<ChatAnswer> {
    let overrides = settings::get_settings(pool, chat_id).await?;
    let temperature = overrides
        .temperature
        .unwrap_or(config.completion.temperature);
    let model = overrides.model.as_deref();
    let memory_enabled = overrides.memory_enabled.unwrap_or(true);

    let mut result = match mode {
        ChatMode::Text => {
            let history = if memory_enabled {
                memory::tail_messages(pool, chat_id, mode, config.memory.history_limit).await?
            } else {
                Vec::new()
            };
            let mut messages = context::build_context(TEXT_SYSTEM_PROMPT, history);
            messages.push(ChatTurn::user(text));
            let reply = complete_nonempty(completer, &messages, temperature, model).await?;
            ChatAnswer::plain(reply)
        }
        ChatMode::Rag => {
            answer_rag(
                pool,
                config,
                embedder,
                completer,
                chat_id,
                text,
                temperature,
                model,
                memory_enabled,
            )
            .await?
        }
        ChatMode::Summary => {
            let current = summary::get_summary(pool, chat_id, mode).await?;
            let tail =
                memory::tail_messages(pool, chat_id, mode, config.memory.tail_in_context).await?;
            let mut messages = context::build_context_with_summary(
                TEXT_SYSTEM_PROMPT,
                Some(&current.summary),
                tail,
            );
            messages.push(ChatTurn::user(text));
            let reply = complete_nonempty(completer, &messages, temperature, model).await?;
            ChatAnswer::plain(reply)
        }
        ChatMode::Structured => {
            let messages = vec![
                ChatTurn::system(STRUCTURED_SYSTEM_PROMPT),
                ChatTurn::user(text),
            ];
            let raw = complete_nonempty(completer, &messages, temperature, model).await?;
            let value =
                structured::parse_or_repair(completer, STRUCTURED_SYSTEM_PROMPT, &raw, temperature, model)
                    .await?;
            ChatAnswer::plain(serde_json::to_string_pretty(&value)?)
        }
    };

    if memory_enabled {
        memory::append_message(pool, chat_id, mode, ChatRole::User, text).await?;
        memory::append_message(pool, chat_id, mode, ChatRole::Assistant, &result.text).await?;
    }

    // Compaction runs after the answer is already in hand; a failed fold
    // must not turn a successful turn into an error.
    if mode.uses_summary() && memory_enabled {
        match summary::maybe_compact(pool, completer, &config.memory, chat_id, mode, 0.0).await {
            Ok(compacted) => result.compacted = compacted,
            Err(e) => warn!(chat_id, error = %e, "history compaction failed, continuing"),
        }
    }

    Ok(result)
}

async fn answer_rag(
    pool: &SqlitePool,
    config: &Config,
    embedder: &dyn EmbeddingProvider,
    completer: &dyn CompletionProvider,
    chat_id: i64,
    text: &str,
    temperature: f64,
    model: Option<&str>,
    memory_enabled: bool,
) -> Result<ChatAnswer> {
    // Nothing indexed at all: say so without spending an embedding call.
    if !store::has_embeddings(pool, embedder.model_name()).await? {
        return Ok(ChatAnswer {
            text: "No documents are indexed yet, so there is nothing to search. \
                   Ingest a document first."
                .to_string(),
            sources: Vec::new(),
            retrieval: Retrieval::Empty,
            compacted: false,
        });
    }

    let query = embedding::embed_query(embedder, text).await?;
    let retrieval_cfg = &config.retrieval;

    let mut retrieval = Retrieval::Threshold;
    let mut chunks = search::search_chunks(
        pool,
        &query,
        embedder.model_name(),
        retrieval_cfg.top_k,
        retrieval_cfg.min_similarity,
        true,
    )
    .await?;

    if chunks.is_empty() {
        info!(
            chat_id,
            min_similarity = retrieval_cfg.min_similarity as f64,
            "nothing cleared the similarity threshold, widening the search"
        );
        retrieval = Retrieval::Fallback;
        chunks = search::search_chunks(
            pool,
            &query,
            embedder.model_name(),
            retrieval_cfg.top_k * 2,
            retrieval_cfg.min_similarity,
            false,
        )
        .await?;
        chunks.retain(|c| c.similarity > retrieval_cfg.fallback_min_similarity);
    }

    if chunks.is_empty() {
        let docs = store::list_documents(pool, embedder.model_name()).await?;
        return Ok(ChatAnswer {
            text: format!(
                "No relevant passages were found for this question. Indexed documents: {}.",
                docs.join(", ")
            ),
            sources: Vec::new(),
            retrieval: Retrieval::Empty,
            compacted: false,
        });
    }

    let mut fragments = String::new();
    for (i, chunk) in chunks.iter().enumerate() {
        fragments.push_str(&format!(
            "[Fragment {} (doc={}, chunk={}, score={:.3})]:\n{}\n\n",
            i + 1,
            chunk.doc_name,
            chunk.chunk_index,
            chunk.similarity,
            chunk.text
        ));
    }
    let question = format!(
        "Document fragments:\n\n{fragments}Question: {text}\n\n\
         Answer using the fragments above."
    );

    let history = if memory_enabled {
        memory::tail_messages(pool, chat_id, ChatMode::Rag, config.memory.history_limit).await?
    } else {
        Vec::new()
    };
    let mut messages = context::build_context(RAG_SYSTEM_PROMPT, history);
    messages.push(ChatTurn::user(question));

    let reply = complete_nonempty(completer, &messages, temperature, model).await?;
    Ok(ChatAnswer {
        text: reply,
        sources: chunks,
        retrieval,
        compacted: false,
    })
}

async fn complete_nonempty(
    completer: &dyn CompletionProvider,
    messages: &[ChatTurn],
    temperature: f64,
    model: Option<&str>,
) -> Result<String> {
    let reply = completer.complete(messages, temperature, model).await?;
    let reply = reply.trim();
    if reply.is_empty() {
        return Err(Error::EmptyGeneration);
    }
    Ok(reply.to_string())
}
