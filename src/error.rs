//! Error taxonomy for the retrieval and memory core.
//!
//! Every fallible operation in the library returns [`Error`]. Errors are
//! recovered at the boundary of the operation that caused them (ingestion,
//! search, compaction) and rendered as recoverable messages by the CLI; a
//! failed batch never invalidates chunks already committed for a document.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Input exceeds the ingestion size bound. Raised before any chunk is
    /// produced or any provider call is made.
    #[error("document too large: {len} characters (limit {max})")]
    DocumentTooLarge { len: usize, max: usize },

    /// The chunker's safety ceiling was hit. This is a safety valve against
    /// unbounded memory growth on pathological inputs, not a tuning knob.
    #[error("too many chunks: exceeded ceiling of {max}")]
    TooManyChunks { max: usize },

    /// Nothing left to index once the text was normalized.
    #[error("document '{doc_name}' is empty after normalization")]
    EmptyDocument { doc_name: String },

    /// The document is already indexed under this model and the caller did
    /// not ask for replacement.
    #[error("document '{doc_name}' is already indexed under model '{model}'; re-ingest with replace to rebuild")]
    AlreadyIndexed { doc_name: String, model: String },

    /// The embedding provider returned a different number of vectors than
    /// texts submitted. The whole batch is aborted.
    #[error("embedding batch mismatch: submitted {expected} texts, received {got} vectors")]
    BatchMismatch { expected: usize, got: usize },

    /// A vector's length disagrees with the batch's established
    /// dimensionality. Never silently coerced.
    #[error("embedding dimension mismatch for document '{doc_name}': expected {expected}, got {got}")]
    DimensionMismatch {
        doc_name: String,
        expected: usize,
        got: usize,
    },

    /// The text-generation provider returned empty content where an answer
    /// was required. Non-fatal: callers treat it as "no result".
    #[error("provider returned an empty answer")]
    EmptyGeneration,

    /// Structured output still failed to parse after the single repair
    /// attempt.
    #[error("structured output invalid after repair: {0}")]
    StructuredOutput(String),

    /// Non-success HTTP status from an embedding or completion provider.
    #[error("{provider} API error {status}: {body}")]
    Provider {
        provider: String,
        status: u16,
        body: String,
    },

    /// Provider is not configured.
    #[error("{0} provider is disabled")]
    ProviderDisabled(&'static str),

    /// Timeout or connection failure. Not retried internally; retry policy
    /// belongs to the caller.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error("invalid embedding payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Config(String),
}
