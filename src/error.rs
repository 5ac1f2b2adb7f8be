//! Typed error taxonomy for the ETL and aggregation core.
//!
//! Every stage returns a `CoreError` variant rather than a bare string, so
//! callers (the ingest CLI, the aggregation engine's API boundary) can match
//! on kind and map to exit codes / HTTP status classes without parsing text.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    /// Header mismatch, unknown schema version, or incompatible contract hash.
    /// Fatal to the batch; ledger is marked failed at stage = "loading".
    #[error("contract error: {message}")]
    Contract { message: String },

    /// Row-level invariant violation. Never fatal to the batch; the row is
    /// counted and skipped.
    #[error("validation error on row {row_index}: {message}")]
    Validation { row_index: usize, message: String },

    /// A classifier produced an unexpected value. Non-fatal; a fallback is
    /// substituted and the occurrence is logged by the caller.
    #[error("classifier '{rule}' failed: {message}")]
    Classifier { rule: String, message: String },

    /// Row hash collided with another row already staged in the same batch.
    /// Suppressed by the dedup stage before promotion ever runs.
    #[error("duplicate row_hash {row_hash} within batch {batch_id}")]
    DuplicateRowHash { batch_id: String, row_hash: String },

    /// Database/transaction failure during promotion. Fatal; the promoter
    /// rolls back and the ledger is marked failed with staging rows retained.
    #[error("promotion failed at stage '{stage}': {source}")]
    Promotion {
        stage: &'static str,
        #[source]
        source: sqlx::Error,
    },

    /// Bad group_by/metric token or filter value at the aggregation API
    /// boundary. Maps to a 400-class response.
    #[error("invalid query parameter '{field}': {message}")]
    QueryValidation { field: String, message: String },

    /// Database failure while executing a (static, allow-listed) aggregation
    /// query. Maps to a 500-class response. Logs the query's fingerprint,
    /// never the row-level driver message, since the SQL itself is static.
    #[error("query execution failed (fingerprint {query_fingerprint}): {source}")]
    QueryExecution {
        query_fingerprint: String,
        #[source]
        source: sqlx::Error,
    },

    /// A query exceeded its wall-clock budget. Kept distinct from
    /// `QueryExecution` so callers can retry or back off differently.
    #[error("query timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    /// Wraps file IO failures surfaced while reading CSV sources.
    #[error("io error reading '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Wraps malformed CSV structure (not a row-level validation issue --
    /// this is a parse failure at the `csv` crate level).
    #[error("csv parse error: {0}")]
    Csv(#[from] csv::Error),
}

impl CoreError {
    pub fn contract(message: impl Into<String>) -> Self {
        CoreError::Contract {
            message: message.into(),
        }
    }

    /// Maps to the ingest CLI exit codes documented in the external
    /// interfaces section: 0 success, 1 io/parse, 2 contract, 3 validation
    /// (hard), 4 promotion conflict.
    pub fn exit_code(&self) -> i32 {
        match self {
            CoreError::Io { .. } | CoreError::Csv(_) => 1,
            CoreError::Contract { .. } => 2,
            CoreError::Validation { .. } => 3,
            CoreError::Promotion { .. } => 4,
            _ => 1,
        }
    }
}

/// `CacheMiss` is deliberately not a variant of `CoreError` -- it's a normal,
/// expected outcome of a cache lookup, not a failure. See `cache.rs`.
pub type CoreResult<T> = Result<T, CoreError>;
