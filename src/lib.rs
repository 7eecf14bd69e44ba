//! # Recall
//!
//! A local-first retrieval and conversational-memory engine.
//!
//! Recall ingests plain-text documents into a SQLite store as normalized,
//! overlapping chunks with embedding vectors, answers questions over them
//! via cosine-ranked retrieval, and keeps per-chat conversation history
//! that is periodically folded into a running summary so a dialogue never
//! outgrows its context window.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌──────────────┐   ┌──────────┐
//! │ Documents │──▶│   Pipeline   │──▶│  SQLite   │
//! │ .md/.txt  │   │ Chunk+Embed  │   │ doc_chunks│
//! └───────────┘   └──────────────┘   └────┬─────┘
//!                                         │
//!                 ┌──────────────┐        │
//!  user turn ────▶│  Chat loop   │◀───────┘  cosine top-K
//!                 │ text/rag/    │
//!                 │ summary/     │───▶ completion provider
//!                 │ structured   │
//!                 └──────┬───────┘
//!                        ▼
//!                  messages + chat_summaries (compaction)
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! recall init                          # create database
//! recall ingest ./docs                 # chunk + embed documents
//! recall search "deployment window"    # ranked retrieval only
//! recall ask --mode rag "when is the deployment window?"
//! recall ask --mode summary "and what did we decide yesterday?"
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`chunk`] | Normalization and word-boundary chunking |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`completion`] | Chat-completion provider abstraction |
//! | [`ingest`] | Document ingestion pipeline |
//! | [`store`] | Chunk/vector persistence |
//! | [`search`] | Cosine ranking over stored vectors |
//! | [`memory`] | Per-chat, per-mode message log |
//! | [`summary`] | History compaction |
//! | [`settings`] | Per-chat overrides |
//! | [`context`] | Prompt context assembly |
//! | [`structured`] | Strict-JSON reply parsing |
//! | [`chat`] | Per-turn orchestration |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod chat;
pub mod chunk;
pub mod completion;
pub mod config;
pub mod context;
pub mod db;
pub mod embedding;
pub mod error;
pub mod ingest;
pub mod memory;
pub mod migrate;
pub mod models;
pub mod search;
pub mod settings;
pub mod store;
pub mod structured;
pub mod summary;

pub use error::{Error, Result};
