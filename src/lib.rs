pub mod bootstrap;
pub mod cli;
pub mod dataset;
pub mod error;
pub mod executor;
pub mod fallback;
pub mod manifest;
pub mod orchestrator;
pub mod runner;
pub mod sync;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{FmtSubscriber, filter::LevelFilter};

pub use error::AerieError;

use crate::executor::CommandExecutor;
use crate::orchestrator::{Orchestrator, RunReport};

pub fn init_logging(log_level: cli::LogLevel) -> Result<()> {
    let filter = match log_level {
        cli::LogLevel::Trace => LevelFilter::TRACE,
        cli::LogLevel::Debug => LevelFilter::DEBUG,
        cli::LogLevel::Info => LevelFilter::INFO,
        cli::LogLevel::Warn => LevelFilter::WARN,
        cli::LogLevel::Error => LevelFilter::ERROR,
    };

    tracing::subscriber::set_global_default(
        FmtSubscriber::builder().with_max_level(filter).finish(),
    )
    .context("failed to set global default tracing subscriber")
}

/// Loads and validates the manifest, then runs the full orchestration.
///
/// Returns the run report on `Done(success)`; any error corresponds to
/// `Done(failure)` and carries the diagnostic text of the step that failed.
pub fn run_provision(opts: &cli::ProvisionArgs, executor: Arc<dyn CommandExecutor>) -> Result<RunReport> {
    let manifest = manifest::load_manifest(opts.common.file.as_path())
        .with_context(|| format!("failed to load manifest from {}", opts.common.file))?;
    manifest.validate().context("manifest validation failed")?;

    let orchestrator = Orchestrator::new(&manifest, executor, opts.dry_run);
    let report = orchestrator.run()?;

    info!(
        "provisioned dataset `{}` ({} sample(s)) via {}",
        report.dataset.name,
        report.dataset.samples(),
        report.provenance
    );
    Ok(report)
}

pub fn run_validate(opts: &cli::ValidateArgs) -> Result<()> {
    let manifest = manifest::load_manifest(opts.common.file.as_path())?;
    manifest.validate().context("manifest validation failed")?;
    info!("validation successful:\n{:#?}", manifest);
    Ok(())
}
