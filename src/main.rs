//! # Recall CLI (`recall`)
//!
//! The `recall` binary is the interface to the retrieval and memory
//! engine: database initialization, document ingestion, retrieval, and
//! the four conversation modes.
//!
//! ## Usage
//!
//! ```bash
//! recall --config ./config/recall.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `recall init` | Create the SQLite database and run schema migrations |
//! | `recall ingest <path>` | Chunk, embed, and store a file or directory |
//! | `recall docs` | List indexed documents |
//! | `recall forget <doc>` | Delete one document's chunks |
//! | `recall search "<query>"` | Ranked retrieval without a completion call |
//! | `recall ask "<text>"` | One conversation turn (text/rag/summary/structured) |
//! | `recall history` | Show a chat's live message tail |
//! | `recall summary` | Show or clear a chat's running summary |
//! | `recall compact` | Force a compaction attempt |
//! | `recall clear` | Delete a chat's messages (and summary) |
//! | `recall settings` | Show or change per-chat overrides |
//! | `recall completions <shell>` | Generate shell completions |

use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use recall::models::{ChatMode, ChatRole};
use recall::{chat, completion, config, db, embedding, ingest, memory, migrate};
use recall::{search, settings, store, summary};

/// Recall — local-first retrieval with compacted conversational memory.
#[derive(Parser)]
#[command(
    name = "recall",
    about = "Recall — a local-first retrieval and conversational-memory engine",
    version,
    long_about = "Recall ingests plain-text documents into SQLite as overlapping embedded \
    chunks, answers questions over them with cosine-ranked retrieval, and keeps per-chat \
    conversation history that is periodically folded into a running summary."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/recall.toml")]
    config: PathBuf,

    /// Chat identifier. Each chat keeps its own history, summary, and
    /// settings, partitioned further by mode.
    #[arg(long, global = true, default_value_t = 0)]
    chat: i64,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables. Running
    /// it multiple times is safe.
    Init,

    /// Chunk, embed, and store a file or directory.
    ///
    /// A single file is ingested under its file name (or `--name`); a
    /// directory is walked for `*.md` and `*.txt` files, each ingested
    /// under its relative path. Re-ingesting an indexed document is an
    /// error unless `--replace` is passed.
    Ingest {
        /// File or directory to ingest.
        path: PathBuf,

        /// Document name override (single-file ingestion only).
        #[arg(long)]
        name: Option<String>,

        /// Replace existing chunks for already-indexed documents.
        #[arg(long)]
        replace: bool,
    },

    /// List indexed documents for the configured embedding model.
    Docs,

    /// Delete one document's chunks, or the whole chunk store.
    Forget {
        /// Document name as shown by `recall docs`.
        #[arg(required_unless_present = "all", conflicts_with = "all")]
        doc_name: Option<String>,

        /// Delete every document for every model.
        #[arg(long)]
        all: bool,
    },

    /// Ranked retrieval without a completion call.
    ///
    /// Prints the top-scoring chunks with their similarity scores.
    Search {
        /// The query text.
        query: String,

        /// Maximum number of results (defaults to `retrieval.top_k`).
        #[arg(long)]
        top_k: Option<usize>,

        /// Similarity cutoff override (defaults to
        /// `retrieval.min_similarity`).
        #[arg(long)]
        min_similarity: Option<f32>,

        /// Ignore the similarity threshold and return the best matches
        /// regardless of score.
        #[arg(long)]
        no_threshold: bool,
    },

    /// One conversation turn.
    Ask {
        /// The user message.
        text: String,

        /// Conversation mode.
        #[arg(long, value_enum, default_value_t = ChatMode::Text)]
        mode: ChatMode,
    },

    /// Show a chat's live message tail, oldest first.
    History {
        /// Conversation mode whose stream to show.
        #[arg(long, value_enum, default_value_t = ChatMode::Text)]
        mode: ChatMode,

        /// Maximum number of messages.
        #[arg(long, default_value_t = 30)]
        limit: usize,
    },

    /// Show or clear a chat's running summary.
    Summary {
        /// Conversation mode whose summary to show.
        #[arg(long, value_enum, default_value_t = ChatMode::Summary)]
        mode: ChatMode,

        /// Delete the summary instead of showing it.
        #[arg(long)]
        clear: bool,
    },

    /// Force a compaction attempt for a chat.
    ///
    /// Folds older messages into the running summary if the trigger
    /// conditions are met; otherwise reports that nothing was done.
    Compact {
        /// Conversation mode whose stream to compact.
        #[arg(long, value_enum, default_value_t = ChatMode::Summary)]
        mode: ChatMode,
    },

    /// Delete a chat's messages and, for the affected modes, summaries.
    Clear {
        /// Limit the wipe to one mode's stream. Without this, every
        /// mode's messages and summaries for the chat are deleted.
        #[arg(long, value_enum)]
        mode: Option<ChatMode>,
    },

    /// Show or change per-chat overrides.
    ///
    /// Without flags, prints the current settings. Each flag updates only
    /// its own field.
    Settings {
        /// Sampling temperature override.
        #[arg(long)]
        temperature: Option<f64>,

        /// Enable or disable history persistence for this chat.
        #[arg(long)]
        memory: Option<bool>,

        /// Completion model override. Pass an empty string to clear it.
        #[arg(long)]
        model: Option<String>,
    },

    /// Generate shell completions.
    Completions {
        /// Target shell.
        shell: clap_complete::Shell,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    if let Commands::Completions { shell } = &cli.command {
        clap_complete::generate(
            *shell,
            &mut Cli::command(),
            "recall",
            &mut std::io::stdout(),
        );
        return Ok(());
    }

    let cfg = config::load_config(&cli.config)?;
    let pool = db::connect(&cfg.db).await?;
    migrate::run_migrations(&pool).await?;
    let chat_id = cli.chat;

    match cli.command {
        Commands::Init => {
            println!("Database initialized successfully.");
        }
        Commands::Ingest {
            path,
            name,
            replace,
        } => {
            let embedder = embedding::create_provider(&cfg.embedding)?;
            let report =
                ingest::ingest_path(&pool, embedder.as_ref(), &cfg, &path, name.as_deref(), replace)
                    .await?;
            for r in &report.ingested {
                println!(
                    "{}: {} chars, {} chunks, dim {}",
                    r.doc_name, r.text_length, r.chunk_count, r.embedding_dim
                );
            }
            println!(
                "Ingested {} document(s), {} failed.",
                report.ingested.len(),
                report.failed
            );
        }
        Commands::Docs => {
            let embedder = embedding::create_provider(&cfg.embedding)?;
            let docs = store::list_documents(&pool, embedder.model_name()).await?;
            if docs.is_empty() {
                println!("No documents indexed for model '{}'.", embedder.model_name());
            } else {
                for doc in docs {
                    println!("{doc}");
                }
            }
        }
        Commands::Forget { doc_name, all } => {
            if all {
                let deleted = store::clear_all(&pool).await?;
                println!("Deleted {deleted} chunk(s) across all documents.");
            } else if let Some(doc_name) = doc_name {
                let embedder = embedding::create_provider(&cfg.embedding)?;
                let deleted =
                    store::delete_document(&pool, &doc_name, embedder.model_name()).await?;
                println!("Deleted {deleted} chunk(s) of '{doc_name}'.");
            }
        }
        Commands::Search {
            query,
            top_k,
            min_similarity,
            no_threshold,
        } => {
            let embedder = embedding::create_provider(&cfg.embedding)?;
            let vector = embedding::embed_query(embedder.as_ref(), &query).await?;
            let results = search::search_chunks(
                &pool,
                &vector,
                embedder.model_name(),
                top_k.unwrap_or(cfg.retrieval.top_k),
                min_similarity.unwrap_or(cfg.retrieval.min_similarity),
                !no_threshold,
            )
            .await?;
            if results.is_empty() {
                println!("No matching chunks.");
            }
            for (i, r) in results.iter().enumerate() {
                println!(
                    "{}. [{:.3}] {} #{}\n{}\n",
                    i + 1,
                    r.similarity,
                    r.doc_name,
                    r.chunk_index,
                    r.text
                );
            }
        }
        Commands::Ask { text, mode } => {
            let embedder = embedding::create_provider(&cfg.embedding)?;
            let completer = completion::create_provider(&cfg.completion)?;
            let reply = chat::answer(
                &pool,
                &cfg,
                embedder.as_ref(),
                completer.as_ref(),
                chat_id,
                mode,
                &text,
            )
            .await?;
            println!("{}", reply.text);
            if !reply.sources.is_empty() {
                println!();
                for s in &reply.sources {
                    println!("  source: {} #{} ({:.3})", s.doc_name, s.chunk_index, s.similarity);
                }
            }
            if reply.compacted {
                println!("\n(history compacted)");
            }
        }
        Commands::History { mode, limit } => {
            let turns = memory::tail_messages(&pool, chat_id, mode, limit).await?;
            if turns.is_empty() {
                println!("No messages in chat {chat_id} ({mode}).");
            }
            for turn in turns {
                let who = match turn.role {
                    ChatRole::User => "you",
                    ChatRole::Assistant => "recall",
                    ChatRole::System => "system",
                };
                println!("{who}: {}", turn.content);
            }
        }
        Commands::Summary { mode, clear } => {
            if clear {
                summary::clear_summary(&pool, chat_id, mode).await?;
                println!("Summary cleared for chat {chat_id} ({mode}).");
            } else {
                let current = summary::get_summary(&pool, chat_id, mode).await?;
                if current.summary.is_empty() {
                    println!("No summary for chat {chat_id} ({mode}).");
                } else {
                    println!("{}", current.summary);
                    println!("\n(folded through message {})", current.last_message_id);
                }
            }
        }
        Commands::Compact { mode } => {
            let completer = completion::create_provider(&cfg.completion)?;
            let compacted = summary::maybe_compact(
                &pool,
                completer.as_ref(),
                &cfg.memory,
                chat_id,
                mode,
                0.0,
            )
            .await?;
            if compacted {
                println!("History compacted for chat {chat_id} ({mode}).");
            } else {
                println!("Nothing to compact for chat {chat_id} ({mode}).");
            }
        }
        Commands::Clear { mode } => {
            let deleted = memory::clear_messages(&pool, chat_id, mode).await?;
            match mode {
                Some(mode) => {
                    summary::clear_summary(&pool, chat_id, mode).await?;
                    println!("Deleted {deleted} message(s) in chat {chat_id} ({mode}).");
                }
                None => {
                    for mode in [
                        ChatMode::Text,
                        ChatMode::Rag,
                        ChatMode::Summary,
                        ChatMode::Structured,
                    ] {
                        summary::clear_summary(&pool, chat_id, mode).await?;
                    }
                    println!("Deleted {deleted} message(s) in chat {chat_id} (all modes).");
                }
            }
        }
        Commands::Settings {
            temperature,
            memory,
            model,
        } => {
            let mut changed = false;
            if let Some(t) = temperature {
                settings::set_temperature(&pool, chat_id, t).await?;
                changed = true;
            }
            if let Some(enabled) = memory {
                settings::set_memory_enabled(&pool, chat_id, enabled).await?;
                changed = true;
            }
            if let Some(m) = model {
                settings::set_model(&pool, chat_id, Some(&m)).await?;
                changed = true;
            }
            let current = settings::get_settings(&pool, chat_id).await?;
            if changed {
                println!("Settings updated for chat {chat_id}.");
            }
            println!(
                "temperature: {}",
                current
                    .temperature
                    .map(|t| t.to_string())
                    .unwrap_or_else(|| format!("{} (default)", cfg.completion.temperature))
            );
            println!(
                "memory: {}",
                current
                    .memory_enabled
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| "true (default)".to_string())
            );
            println!(
                "model: {}",
                current.model.unwrap_or_else(|| "(default)".to_string())
            );
        }
        Commands::Completions { .. } => unreachable!(),
    }

    Ok(())
}
