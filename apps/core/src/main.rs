// NIXIN command-line entry point

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;

use nixin_core::brain::{BackendKind, ModelHub};
use nixin_core::config::AppConfig;
use nixin_core::evaluation::run_evaluation;
use nixin_core::memory::MemoryStore;
use nixin_core::preflight::run_preflight;
use nixin_core::telemetry::init_tracing;
use nixin_core::Assistant;

/// NIXIN - intent detection, entity extraction and interaction memory
#[derive(Parser, Debug)]
#[command(name = "nixin", version)]
#[command(about = "Classify requests, extract entities and plan actions")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Handle one utterance and store it in memory
    Analyze {
        text: String,
        /// rule_based, embedding, zero_shot or cloud
        #[arg(long, default_value = "rule_based")]
        backend: BackendKind,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Run every backend on the same utterance
    Compare {
        text: String,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Show the most recent interactions
    Memory {
        #[arg(long, default_value_t = 20)]
        limit: usize,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Check directories, database, models and credentials
    Check {
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Score every backend on the labelled utterance set
    Evaluate {
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let config = AppConfig::from_env().context("Invalid configuration")?;
    init_tracing(config.log_format)?;
    config
        .paths
        .init()
        .context("Failed to create data directories")?;

    match cli.command {
        Command::Analyze { text, backend, json } => {
            let hub = load_models(&config, backend).await;
            let assistant = Assistant::from_config(&config, &hub).await?;
            let reply = assistant.handle(&text, backend).await?;

            if json {
                print_json(&reply)?;
            } else {
                println!("Intent:     {}", reply.detection.summary());
                if let Some(reason) = &reply.detection.fallback_reason {
                    println!("Fallback:   {}", reason);
                }
                for entity in reply.entities.iter() {
                    println!("Entity:     {:?} \"{}\" @{}", entity.kind, entity.value, entity.offset);
                }
                println!("Action:     {}", reply.plan.action);
                println!("Reasoning:  {}", reply.plan.reasoning);
                println!("{}", reply.plan.response);
            }
        }
        Command::Compare { text, json } => {
            let hub = ModelHub::load(
                config.models_dir(),
                config.embeddings_enabled,
                config.zero_shot_enabled,
            )
            .await;
            let assistant = Assistant::from_config(&config, &hub).await?;
            let comparison = assistant.compare(&text).await;

            if json {
                print_json(&comparison)?;
            } else {
                for result in &comparison.results {
                    println!(
                        "{:<22} {:<18} {:>5.1}%  {}ms{}",
                        result.requested_backend.display_name(),
                        result.intent,
                        result.confidence * 100.0,
                        result.latency_ms,
                        if result.degraded { "  (fallback: rules)" } else { "" }
                    );
                }
            }
        }
        Command::Memory { limit, json } => {
            let store = MemoryStore::open(&config.db_path).await?;
            let records = store.recent(limit).await?;

            if json {
                print_json(&records)?;
            } else if records.is_empty() {
                println!("Memory is empty");
            } else {
                for record in &records {
                    println!(
                        "{}  {:<16} {:<24} {}",
                        record.timestamp.format("%Y-%m-%d %H:%M:%S"),
                        record.detection.intent,
                        record.action_taken,
                        record.utterance
                    );
                }
            }
        }
        Command::Check { json } => {
            let hub = ModelHub::load(
                config.models_dir(),
                config.embeddings_enabled,
                config.zero_shot_enabled,
            )
            .await;
            let report = run_preflight(&config, &hub).await;

            if json {
                print_json(&report)?;
            } else {
                for check in &report.checks {
                    let mark = if check.passed { "ok  " } else { "FAIL" };
                    println!("[{}] {:<18} {}", mark, check.name, check.message);
                }
                println!("{}", report.summary);
            }
            if !report.ready_to_start {
                anyhow::bail!("preflight failed");
            }
        }
        Command::Evaluate { json } => {
            let hub = ModelHub::load(
                config.models_dir(),
                config.embeddings_enabled,
                config.zero_shot_enabled,
            )
            .await;
            let assistant = Assistant::from_config(&config, &hub).await?;
            let report = run_evaluation(assistant.dispatcher()).await;

            if json {
                print_json(&report)?;
            } else {
                for score in &report.backends {
                    println!(
                        "{:<22} {:>5.1}% ({}/{}) degraded={} {}",
                        score.backend.display_name(),
                        score.accuracy * 100.0,
                        score.correct,
                        score.total,
                        score.degraded,
                        if score.passed { "PASS" } else { "FAIL" }
                    );
                    for failure in &score.failures {
                        println!(
                            "    expected {:<16} got {:<16} | {}",
                            failure.expected, failure.detected, failure.text
                        );
                    }
                }
            }
        }
    }

    Ok(())
}

/// Loads only the local model the requested backend needs.
async fn load_models(config: &AppConfig, backend: BackendKind) -> ModelHub {
    let embeddings = config.embeddings_enabled;
    match backend {
        // recall still benefits from embeddings
        BackendKind::ZeroShot => {
            ModelHub::load(config.models_dir(), embeddings, config.zero_shot_enabled).await
        }
        _ => ModelHub::load(config.models_dir(), embeddings, false).await,
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
