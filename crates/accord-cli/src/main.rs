//! Accord CLI
//!
//! Generate negotiation guidance from the command line.
//!
//! ## Usage
//!
//! ```bash
//! # Generate guidance for a context file
//! accord guidance --context sla.yaml
//!
//! # Prefer OpenAI and use a config file
//! accord guidance --context sla.json --prefer openai --config accord.yaml
//!
//! # Check a context file without calling any provider
//! accord validate --context sla.yaml
//!
//! # Show provider registration and circuit state
//! accord health
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use accord_core::{InputValidator, NegotiationContext, ProviderId};
use accord_runtime::{GuidanceOrchestrator, HealthSnapshot, RuntimeConfig};

#[derive(Parser, Debug)]
#[command(name = "accord")]
#[command(about = "Resilient negotiation guidance across model providers")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate guidance for a negotiation context
    Guidance {
        /// Context file (.json, .yaml or .yml)
        #[arg(short, long)]
        context: PathBuf,

        /// Prompt to send instead of the built one
        #[arg(short, long)]
        prompt: Option<String>,

        /// Provider to try first (gemini, openai, fallback)
        #[arg(long)]
        prefer: Option<ProviderId>,

        /// Runtime config file (YAML)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "pretty")]
        format: OutputFormat,
    },

    /// Validate a context file without calling any provider
    Validate {
        /// Context file (.json, .yaml or .yml)
        #[arg(short, long)]
        context: PathBuf,
    },

    /// Show registered providers and circuit state
    Health {
        /// Runtime config file (YAML)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    Json,
    Yaml,
    Pretty,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthReport {
    registered: Vec<ProviderId>,
    providers: HealthSnapshot,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Guidance {
            context,
            prompt,
            prefer,
            config,
            format,
        } => run_guidance(&context, prompt.as_deref(), prefer, config.as_deref(), format).await,
        Commands::Validate { context } => run_validate(&context),
        Commands::Health { config } => run_health(config.as_deref()),
    }
}

async fn run_guidance(
    context_path: &Path,
    prompt: Option<&str>,
    prefer: Option<ProviderId>,
    config_path: Option<&Path>,
    format: OutputFormat,
) -> Result<()> {
    let context = load_context(context_path)?;
    let orchestrator = build_orchestrator(config_path)?;

    let guidance = orchestrator
        .generate_guidance(context, prompt, prefer)
        .await
        .context("Invalid negotiation context")?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&guidance)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(&guidance)?),
        OutputFormat::Pretty => {
            println!("Summary: {}", guidance.summary);
            println!("Fallback: {}", guidance.fallback_recommendation);
            println!("Talking points:");
            for point in &guidance.talking_points {
                println!("  - {}", point);
            }
            if !guidance.risk_callouts.is_empty() {
                println!("Risks:");
                for risk in &guidance.risk_callouts {
                    println!("  - {}", risk);
                }
            }
            println!(
                "Model: {} (confidence {:.2}, {} ms{})",
                guidance.model,
                guidance.confidence,
                guidance.latency_ms,
                if guidance.cached { ", cached" } else { "" }
            );
        }
    }

    Ok(())
}

fn run_validate(context_path: &Path) -> Result<()> {
    let context = load_context(context_path)?;
    println!(
        "✓ {} is valid (topic: {}, contract: {})",
        context_path.display(),
        context.topic,
        context.contract_id
    );
    Ok(())
}

fn run_health(config_path: Option<&Path>) -> Result<()> {
    let orchestrator = build_orchestrator(config_path)?;
    let report = HealthReport {
        registered: orchestrator.registered_providers(),
        providers: orchestrator.snapshot(),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn build_orchestrator(config_path: Option<&Path>) -> Result<GuidanceOrchestrator> {
    let config = RuntimeConfig::load(config_path).context("Failed to load runtime config")?;
    let orchestrator =
        GuidanceOrchestrator::from_config(config).context("Failed to build orchestrator")?;

    if orchestrator.registered_providers().is_empty() {
        tracing::warn!("No providers registered; guidance will use the deterministic fallback");
    }
    Ok(orchestrator)
}

/// Read and validate a context file, choosing the parser by extension.
fn load_context(path: &Path) -> Result<NegotiationContext> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read context file: {}", path.display()))?;
    parse_context(&raw, path)
}

fn parse_context(raw: &str, path: &Path) -> Result<NegotiationContext> {
    let validator = InputValidator::new();
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    let context = if is_json {
        let value: serde_json::Value = serde_json::from_str(raw)
            .with_context(|| format!("Failed to parse JSON: {}", path.display()))?;
        validator.validate_json(&value)
    } else {
        validator.validate_yaml(raw)
    };

    context.with_context(|| format!("Invalid negotiation context: {}", path.display()))
}
