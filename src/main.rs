//! `condo-ingest`: the ETL pipeline's command-line front door.
//!
//! One invocation carries one `RunContext` through whichever stages its
//! `--mode` calls for: `plan` validates and reports without touching the
//! database, `stage-only` loads and dedups/marks outliers but stops short
//! of promotion, `promote` promotes an already-staged batch, and `full`
//! (the default) runs the whole pipeline end to end. Exit codes follow
//! `CoreError::exit_code`: 0 success, 1 io/parse, 2 contract, 3 validation,
//! 4 promotion conflict.

use clap::{Parser, ValueEnum};
use condo_analytics_core::config::Config;
use condo_analytics_core::db::DatasetLock;
use condo_analytics_core::run_context::{BatchStatus, RunContext, RunMode, TriggeredBy};
use condo_analytics_core::state::AppState;
use condo_analytics_core::{dedup, loader, promote, snapshot};
use condo_analytics_core::CoreError;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "condo-ingest")]
#[command(about = "Loads condo transaction CSVs through the staging/dedup/promote pipeline")]
struct Cli {
    /// One or more CSV source files to ingest in this run.
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// How far through the pipeline this run should go.
    #[arg(long, value_enum, default_value_t = RunModeArg::Full)]
    mode: RunModeArg,

    /// What initiated this run, recorded on the batch ledger for audit.
    #[arg(long, value_enum, default_value_t = TriggeredByArg::Manual)]
    triggered_by: TriggeredByArg,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum RunModeArg {
    Plan,
    StageOnly,
    Promote,
    Full,
}

impl From<RunModeArg> for RunMode {
    fn from(arg: RunModeArg) -> Self {
        match arg {
            RunModeArg::Plan => RunMode::Plan,
            RunModeArg::StageOnly => RunMode::StageOnly,
            RunModeArg::Promote => RunMode::Promote,
            RunModeArg::Full => RunMode::Full,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum TriggeredByArg {
    Manual,
    Cron,
    GithubAction,
}

impl From<TriggeredByArg> for TriggeredBy {
    fn from(arg: TriggeredByArg) -> Self {
        match arg {
            TriggeredByArg::Manual => TriggeredBy::Manual,
            TriggeredByArg::Cron => TriggeredBy::Cron,
            TriggeredByArg::GithubAction => TriggeredBy::GithubAction,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let config = match Config::from_env() {
        Ok(c) => c,
        Err(err) => {
            tracing::error!(%err, "configuration error");
            return ExitCode::from(1);
        }
    };

    match run(cli, config).await {
        Ok(()) => ExitCode::from(0),
        Err(err) => {
            tracing::error!(%err, "ingest run failed");
            ExitCode::from(err.exit_code() as u8)
        }
    }
}

/// This crate ingests a single dataset (Singapore private-condo resale and
/// new-sale transactions); the advisory lock key is a constant rather than
/// a per-invocation argument because there's only ever the one dataset to
/// serialize against.
const DATASET_LOCK_KEY: &str = "condo_transactions";

async fn run(cli: Cli, config: Config) -> Result<(), CoreError> {
    let iqr_multiplier = config.iqr_multiplier;
    let state = AppState::bootstrap(config)
        .await
        .map_err(|source| CoreError::Promotion {
            stage: "bootstrap",
            source: sqlx::Error::Protocol(source.to_string()),
        })?;

    let run_mode: RunMode = cli.mode.into();
    let triggered_by: TriggeredBy = cli.triggered_by.into();
    let mut run_ctx = RunContext::new(run_mode, triggered_by);
    run_ctx.schema_version = condo_analytics_core::contract::CURRENT_SCHEMA_VERSION.to_string();
    run_ctx.rules_version = state.registry.get_version().to_string();
    run_ctx.contract_hash = state.contract.contract_hash();

    // Ensures at most one ingest run is mutating `transactions_staging` /
    // `transactions` for this dataset at a time; a second concurrent
    // invocation blocks here rather than racing this one through
    // dedup/promote. Held for the lifetime of the pipeline, released
    // explicitly once it finishes (success or failure).
    let lock = DatasetLock::acquire(&state.pool, DATASET_LOCK_KEY)
        .await
        .map_err(|source| CoreError::Promotion { stage: "advisory_lock", source })?;

    let outcome = execute_pipeline(&state, &mut run_ctx, &cli.files, iqr_multiplier).await;

    if let Err(unlock_err) = lock.release().await {
        tracing::error!(%unlock_err, "failed to release dataset advisory lock");
    }

    match &outcome {
        Ok(()) => run_ctx.complete(),
        Err(err) => {
            let stage = current_stage(&run_ctx);
            run_ctx.fail(stage, err.to_string());
        }
    }

    if let Err(persist_err) = run_ctx.persist(&state.pool).await {
        tracing::error!(%persist_err, "failed to persist batch ledger");
    }

    println!("{}", run_ctx.summary());

    let (reconciled, unaccounted, message) = run_ctx.reconciliation_check();
    if reconciled == Some(false) {
        tracing::warn!(unaccounted, %message, "row reconciliation mismatch");
    }

    outcome
}

fn current_stage(run_ctx: &RunContext) -> &'static str {
    match run_ctx.status {
        BatchStatus::Staging => "loading",
        BatchStatus::Validating => "validating",
        BatchStatus::Promoting => "promoting",
        _ => "unknown",
    }
}

async fn execute_pipeline(
    state: &AppState,
    run_ctx: &mut RunContext,
    files: &[PathBuf],
    iqr_multiplier: f64,
) -> Result<(), CoreError> {
    let pool = &state.pool;

    for file in files {
        loader::load_file(pool, &state.contract, &state.registry, run_ctx, file).await?;
    }
    run_ctx.recompute_batch_fingerprint();

    if !run_ctx.validation_passed {
        tracing::warn!(
            issues = run_ctx.validation_issues.len(),
            "batch has validation issues; rejected rows were not staged"
        );
    }

    if matches!(run_ctx.run_mode, RunMode::Plan) {
        return Ok(());
    }

    run_ctx.mark_stage(BatchStatus::Validating);
    dedup::run(pool, run_ctx, iqr_multiplier)
        .await
        .map_err(|source| CoreError::Promotion { stage: "dedup", source })?;

    if matches!(run_ctx.run_mode, RunMode::StageOnly) {
        return Ok(());
    }

    run_ctx.mark_stage(BatchStatus::Promoting);
    promote::run(pool, run_ctx)
        .await
        .map_err(|source| CoreError::Promotion { stage: "promote", source })?;

    snapshot::refresh_all(pool, run_ctx.batch_id)
        .await
        .map_err(|source| CoreError::Promotion { stage: "snapshot", source })?;

    // Promotion changed what `transactions` contains; any cached aggregate
    // result computed before this point may now be stale.
    state.cache.flush();

    Ok(())
}
