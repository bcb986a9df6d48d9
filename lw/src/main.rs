//! LiveWeight - live scale weight synchronizer
//!
//! CLI entry point: runs a synchronizer against a simulated scale.

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use tokio::sync::watch;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info};

use liveweight::cli::{Cli, Command, get_log_path};
use liveweight::config::Config;
use liveweight::domain::{RecordId, WeighingRecord, WorkflowState};
use liveweight::{InMemoryBackend, LiveValueSynchronizer, ScaleSimulator, SharedRecord, WIDGET_NAME};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    let log_path = get_log_path();
    if let Some(log_dir) = log_path.parent() {
        fs::create_dir_all(log_dir).context("Failed to create log directory")?;
    }

    // Priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level).map(|s| s.to_uppercase()) {
        Some(s) => match s.as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(&log_path).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Simulate {
            record,
            state,
            plate,
            seconds,
            save_after,
            complete_after,
        } => {
            let opts = SimulateOptions {
                record,
                state,
                plate,
                seconds,
                save_after,
                complete_after,
            };
            cmd_simulate(&config, opts).await
        }
        Command::Config => cmd_config(&config),
    }
}

struct SimulateOptions {
    record: Option<RecordId>,
    state: WorkflowState,
    plate: String,
    seconds: u64,
    save_after: Option<u64>,
    complete_after: Option<u64>,
}

/// Id given to a record saved during the simulation
const SAVED_RECORD_ID: RecordId = RecordId(1);

async fn cmd_simulate(config: &Config, opts: SimulateOptions) -> Result<()> {
    debug!(record = ?opts.record, state = %opts.state, seconds = opts.seconds, "cmd_simulate: called");
    let backend = Arc::new(InMemoryBackend::new(config.backend.clone()));

    let record = match opts.record {
        Some(id) => {
            let record = WeighingRecord::persisted(id, opts.state).with_plate(opts.plate.clone());
            backend.insert(record.clone()).await;
            record
        }
        None => WeighingRecord {
            workflow_state: opts.state,
            ..WeighingRecord::unsaved().with_plate(opts.plate.clone())
        },
    };
    let binding = SharedRecord::new(record.clone());

    let mut sync = LiveValueSynchronizer::new(
        Arc::new(binding.clone()),
        backend.clone(),
        &config.sync,
        &config.backend,
    )
    .await;
    let mut updates = sync.subscribe();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let simulator = tokio::spawn(ScaleSimulator::new(config.simulator.clone()).run(backend.clone(), shutdown_rx));

    println!(
        "{} {} attached to {} ({})",
        "▶".green(),
        WIDGET_NAME.bold(),
        record.identity().to_string().cyan(),
        record.workflow_state
    );
    sync.attach();

    let start = Instant::now();
    let deadline = start + Duration::from_secs(opts.seconds);
    let save_at = opts.save_after.map(|s| start + Duration::from_secs(s));
    let complete_at = opts.complete_after.map(|s| start + Duration::from_secs(s));
    let mut saved = false;
    let mut completed = false;
    let mut status = tokio::time::interval(config.sync.interval());

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = updates.borrow_and_update().clone();
                println!(
                    "{} {} kg  {}",
                    "⚖".cyan(),
                    format!("{:>10.2}", state.last_known_weight).bold(),
                    state.last_update_timestamp.unwrap_or_default().dimmed()
                );
            }
            _ = sleep_until(save_at.unwrap_or(deadline)), if save_at.is_some() && !saved => {
                saved = true;
                let mut record = binding.get().await;
                record.identifier = Some(SAVED_RECORD_ID);
                backend.insert(record.clone()).await;
                binding.replace(record).await;
                println!("{} record saved as {}", "✓".green(), SAVED_RECORD_ID.to_string().cyan());
            }
            _ = sleep_until(complete_at.unwrap_or(deadline)), if complete_at.is_some() && !completed => {
                completed = true;
                let record = binding.get().await;
                if let Some(id) = record.identifier {
                    backend.set_state(id, WorkflowState::Completed).await;
                }
                binding.modify(|r| r.workflow_state = WorkflowState::Completed).await;
                println!("{} record moved to {}", "✓".green(), WorkflowState::Completed.to_string().yellow());
            }
            _ = status.tick() => {
                if sync.is_halted() {
                    println!("{} workflow finished, polling stopped", "■".yellow());
                    break;
                }
            }
            _ = sleep_until(deadline) => {
                debug!("cmd_simulate: deadline reached");
                break;
            }
            _ = tokio::signal::ctrl_c() => {
                debug!("cmd_simulate: ctrl_c received");
                break;
            }
        }
    }

    sync.detach();
    let _ = shutdown_tx.send(true);
    let stats = simulator.await.context("Simulator task failed")?;

    let final_state = sync.state();
    println!(
        "{} last weight {:.2} kg, {} scale readings, {} write-backs",
        "■".dimmed(),
        final_state.last_known_weight,
        stats.readings,
        binding.write_count()
    );
    Ok(())
}

fn cmd_config(config: &Config) -> Result<()> {
    let yaml = serde_yaml::to_string(config).context("Failed to serialize configuration")?;
    print!("{}", yaml);
    Ok(())
}
