//! Command-line front end for the insight features.
//!
//! Usage:
//!   hrms-insight cost workforce.json
//!   hrms-insight schema-gap policy.json --schema prisma/schema.prisma
//!   cat forecast.json | hrms-insight forecast -
//!   hrms-insight check

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::info;

use hrms_insight::config::RuntimeConfig;
use hrms_insight::features::{
    CostOptimization, DemandForecast, Feature, MetricsCorrelation, ScheduleOptimization, SchemaGap,
};
use hrms_insight::{Config, Orchestrator, telemetry};

#[derive(Parser)]
#[command(name = "hrms-insight")]
#[command(about = "AI-assisted workforce analytics with heuristic fallbacks", long_about = None)]
struct Cli {
    /// Never call a model; use the heuristic rules only
    #[arg(long, global = true)]
    heuristic_only: bool,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether a policy can run on the current data schema
    SchemaGap {
        /// JSON input file, or - for stdin
        input: PathBuf,
        /// Schema document to digest instead of the one in the input
        #[arg(long)]
        schema: Option<PathBuf>,
    },
    /// Recommend workforce cost optimizations
    Cost { input: PathBuf },
    /// Build an optimized shift schedule
    Schedule { input: PathBuf },
    /// Correlate business metrics with staffing needs
    Metrics { input: PathBuf },
    /// Forecast daily staffing demand
    Forecast { input: PathBuf },
    /// Validate configuration and report model availability
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG may come from .env
    hrms_insight::config::load_env_file();
    telemetry::init_tracing(&RuntimeConfig::load_from_env());

    if let Commands::Check = cli.command {
        return check(cli.pretty);
    }

    let config = Config::load().context("failed to load configuration")?;
    let orchestrator = if cli.heuristic_only {
        Orchestrator::heuristic_only(&config)?
    } else {
        Orchestrator::from_config(&config)?
    };
    info!(
        available = orchestrator.is_available(),
        candidates = ?orchestrator.invoker().candidates(),
        "orchestrator ready"
    );

    match cli.command {
        Commands::SchemaGap { input, schema } => {
            let mut input: <SchemaGap as Feature>::Input = read_input(&input)?;
            if let Some(path) = schema {
                input.schema_text = Some(
                    std::fs::read_to_string(&path)
                        .with_context(|| format!("failed to read schema {}", path.display()))?,
                );
            }
            analyze::<SchemaGap>(&orchestrator, &input, cli.pretty).await
        }
        Commands::Cost { input } => {
            analyze::<CostOptimization>(&orchestrator, &read_input(&input)?, cli.pretty).await
        }
        Commands::Schedule { input } => {
            analyze::<ScheduleOptimization>(&orchestrator, &read_input(&input)?, cli.pretty).await
        }
        Commands::Metrics { input } => {
            analyze::<MetricsCorrelation>(&orchestrator, &read_input(&input)?, cli.pretty).await
        }
        Commands::Forecast { input } => {
            analyze::<DemandForecast>(&orchestrator, &read_input(&input)?, cli.pretty).await
        }
        Commands::Check => Ok(()),
    }
}

async fn analyze<F: Feature>(orchestrator: &Orchestrator, input: &F::Input, pretty: bool) -> Result<()> {
    let analysis = orchestrator.run::<F>(input).await;
    print_json(&analysis, pretty)
}

fn check(pretty: bool) -> Result<()> {
    let report = match Config::load() {
        Ok(config) => {
            let available = Orchestrator::from_config(&config)
                .map(|o| o.is_available())
                .unwrap_or(false);
            json!({
                "valid": true,
                "available": available,
                "candidates": config.generation.candidates,
                "baseUrl": config.runtime.base_url,
                "callTimeoutMs": config.generation.call_timeout_ms,
                "deadlineMs": config.generation.deadline_ms,
                "transientRetries": config.generation.transient_retries,
            })
        }
        Err(e) => json!({
            "valid": false,
            "available": false,
            "error": e.to_string(),
        }),
    };
    print_json(&report, pretty)
}

fn read_input<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read stdin")?;
        buf
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?
    };
    serde_json::from_str(&raw).with_context(|| format!("invalid input JSON in {}", path.display()))
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let out = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", out);
    Ok(())
}
