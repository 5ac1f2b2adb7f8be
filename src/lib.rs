//! Analytics backend core for Singapore private-condo transactions: the
//! ETL ingestion pipeline (schema contract -> rule registry -> staging ->
//! dedup/outlier -> promote -> snapshot refresh) plus the aggregation query
//! engine that serves the promoted table.
//!
//! HTTP framing, auth, the AI-context assembler, and the upcoming-launch /
//! GLS scrapers are external collaborators and live outside this crate;
//! this library exposes the primitives they'd consume (`promote`,
//! `aggregate`, the contract/rule registry) without implementing them.

pub mod aggregate;
pub mod config;
pub mod contract;
pub mod db;
pub mod dedup;
pub mod error;
pub mod fingerprint;
pub mod loader;
pub mod models;
pub mod promote;
pub mod rules;
pub mod run_context;
pub mod snapshot;
pub mod state;

pub use config::Config;
pub use error::{CoreError, CoreResult};
pub use state::AppState;
