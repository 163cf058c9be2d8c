//! mrbuild command line.
//!
//! Loads configuration, builds the application context, and runs each
//! given shell command as a task on the worker pool.

use std::path::PathBuf;
use std::process::ExitStatus;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::Value;
use tokio::process::Command;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mrbuild::config::{load_config, AppConfig};
use mrbuild::lifecycle::signals::shutdown_signal;
use mrbuild::{AppContext, Fields, Reporter, Severity};

#[derive(Parser)]
#[command(name = "mrbuild")]
#[command(about = "Run build steps in parallel with structured logging", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Minimum log level (trace, debug, info, warn, error, fatal).
    #[arg(long)]
    log_level: Option<String>,

    /// Log format: "json" or "text".
    #[arg(long)]
    log_format: Option<String>,

    /// Force coloured text output.
    #[arg(long)]
    colour: bool,

    /// Append logs to this file instead of the console.
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Number of concurrent workers.
    #[arg(short, long)]
    workers: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run each command as a build step
    Run {
        #[arg(required = true)]
        steps: Vec<String>,
    },
    /// Print the effective configuration
    Config,
}

#[derive(Debug, thiserror::Error)]
enum StepError {
    #[error("step exited with {0}")]
    Failed(ExitStatus),
}

impl Cli {
    fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(level) = &self.log_level {
            config.log.level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.log.format = format.clone();
        }
        if self.colour {
            config.log.colour = true;
        }
        if let Some(file) = &self.log_file {
            config.log.file = Some(file.clone());
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Until the context exists, problems go to stderr through a plain subscriber.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mrbuild=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path).inspect_err(|e| {
            tracing::error!(path = %path.display(), error = %e, "Failed to load configuration");
        })?,
        None => AppConfig::default(),
    };
    cli.apply_overrides(&mut config);

    match cli.command {
        Commands::Config => {
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
        Commands::Run { steps } => run(&config, steps).await,
    }
}

async fn run(config: &AppConfig, steps: Vec<String>) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = AppContext::bootstrap(config)?;
    let failures = Arc::new(AtomicUsize::new(0));

    for step in steps {
        let reporter = ctx.reporter().clone();
        let failures = Arc::clone(&failures);
        ctx.submit_async(async move {
            if !run_step(&step, &reporter).await {
                failures.fetch_add(1, Ordering::SeqCst);
            }
        })?;
    }

    tokio::select! {
        _ = ctx.shutdown() => {}
        _ = shutdown_signal() => {
            ctx.sink().warn("Interrupted, waiting for running steps");
            ctx.abort().await;
        }
    }

    let failed = failures.load(Ordering::SeqCst);
    if failed > 0 {
        return Err(format!("{} step(s) failed", failed).into());
    }
    ctx.sink().info("All steps finished");
    Ok(())
}

async fn run_step(step: &str, reporter: &Reporter) -> bool {
    let (shell, flag) = if cfg!(windows) { ("cmd", "/C") } else { ("sh", "-c") };
    let fields = Fields::from([("step".to_string(), Value::from(step))]);

    tracing::info!(step, "Running step");
    match Command::new(shell).arg(flag).arg(step).status().await {
        Ok(status) if status.success() => {
            tracing::info!(step, "Step finished");
            true
        }
        Ok(status) => {
            let err = StepError::Failed(status);
            reporter.report_with_fields(Some(&err), Severity::Error, "Step failed", fields);
            false
        }
        Err(e) => {
            reporter.report_with_fields(Some(&e), Severity::Error, "Unable to start step", fields);
            false
        }
    }
}
