//! `condo-aggregate`: a command-line front end onto the aggregation query
//! engine, for ad-hoc queries and for wiring into schedulers/dashboards that
//! shell out rather than linking the crate directly.
//!
//! Filters and group-by/metric tokens are passed as repeated `--param
//! key=value` flags, which are forwarded verbatim (aliases and all) through
//! the same `EndpointContract::normalize` path an HTTP handler would use --
//! this binary exercises the identical contract and cache, it just skips the
//! web framework.

use clap::Parser;
use condo_analytics_core::aggregate::{aggregate, dashboard};
use condo_analytics_core::config::Config;
use condo_analytics_core::state::AppState;
use std::collections::BTreeMap;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "condo-aggregate")]
#[command(about = "Runs one aggregation or dashboard query against the promoted transactions table")]
struct Cli {
    /// Query the dashboard contract instead of the aggregate contract.
    #[arg(long)]
    dashboard: bool,

    /// Repeatable `key=value` query parameter, e.g. `--param group_by=region`.
    #[arg(long = "param", value_parser = parse_key_value)]
    params: Vec<(String, String)>,

    /// Pretty-print the JSON response.
    #[arg(long)]
    pretty: bool,
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("'{raw}' is not in key=value form"))?;
    Ok((key.to_string(), value.to_string()))
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

    let state = match AppState::bootstrap(config).await {
        Ok(s) => s,
        Err(err) => {
            tracing::error!(%err, "failed to bootstrap application state");
            return ExitCode::from(1);
        }
    };

    let raw_params: BTreeMap<String, String> = cli.params.into_iter().collect();

    let result = if cli.dashboard {
        dashboard(&state, &raw_params).await
    } else {
        aggregate(&state, &raw_params).await
    };

    match result {
        Ok(response) => {
            let rendered = if cli.pretty {
                serde_json::to_string_pretty(&response)
            } else {
                serde_json::to_string(&response)
            }
            .expect("AggregateResponse always serializes");
            println!("{rendered}");
            ExitCode::from(0)
        }
        Err(err) => {
            tracing::error!(%err, "aggregate query failed");
            ExitCode::from(err.exit_code() as u8)
        }
    }
}
