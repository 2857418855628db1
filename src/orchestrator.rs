//! Acquisition orchestration.
//!
//! [`Orchestrator`] drives one provisioning run through an explicit state
//! machine:
//!
//! `Idle → Bootstrapping → TryingStrategies → Fallback → Syncing → Done`
//!
//! Strategies are attempted strictly one at a time in ascending priority
//! order; the first success short-circuits the rest. Exhausting the list
//! transitions to the offline fallback, so a run can only fail outright
//! when the fallback itself cannot be written or the config document cannot
//! be synchronized. The orchestrator is stateless between runs.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::bootstrap::LibraryBootstrapper;
use crate::dataset::DatasetInfo;
use crate::error::AerieError;
use crate::executor::CommandExecutor;
use crate::fallback::FallbackGenerator;
use crate::manifest::Manifest;
use crate::runner::{StrategyAttempt, StrategyRunner};
use crate::sync::{AiPatch, ConfigSynchronizer};

/// Which path produced the provisioned dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provenance {
    /// A configured strategy, by name
    Strategy(String),
    /// The offline synthetic fallback
    Fallback,
}

impl std::fmt::Display for Provenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Strategy(name) => write!(f, "strategy `{}`", name),
            Self::Fallback => f.write_str("offline fallback"),
        }
    }
}

/// Final outcome of a successful run.
#[derive(Debug)]
pub struct RunReport {
    pub provenance: Provenance,
    pub dataset: DatasetInfo,
    /// Every strategy attempt made, in execution order
    pub attempts: Vec<StrategyAttempt>,
}

/// Run phases. Each `run()` invocation starts fresh from `Idle`.
enum Phase {
    Idle,
    Bootstrapping,
    TryingStrategies,
    Fallback,
    Syncing {
        provenance: Provenance,
        dataset: DatasetInfo,
        /// True when the dataset record still has to be written (real
        /// strategies; the fallback generator writes its own)
        record_pending: bool,
    },
    Done(RunReport),
}

/// Top-level controller sequencing bootstrap, strategies, fallback and
/// config sync.
pub struct Orchestrator<'a> {
    manifest: &'a Manifest,
    executor: Arc<dyn CommandExecutor>,
    dry_run: bool,
}

impl<'a> Orchestrator<'a> {
    pub fn new(manifest: &'a Manifest, executor: Arc<dyn CommandExecutor>, dry_run: bool) -> Self {
        Self {
            manifest,
            executor,
            dry_run,
        }
    }

    /// Runs the full orchestration and returns the outcome.
    ///
    /// Only [`AerieError::FallbackWrite`], [`AerieError::ConfigSync`] and
    /// dataset-record I/O failures surface as errors; every strategy- or
    /// bootstrap-level failure is recovered locally and the run continues.
    pub fn run(&self) -> Result<RunReport, AerieError> {
        let mut attempts: Vec<StrategyAttempt> = Vec::new();
        let mut phase = Phase::Idle;

        loop {
            phase = match phase {
                Phase::Idle => Phase::Bootstrapping,

                Phase::Bootstrapping => {
                    self.run_bootstrap();
                    Phase::TryingStrategies
                }

                Phase::TryingStrategies => self.try_strategies(&mut attempts),

                Phase::Fallback => {
                    info!("all {} strategy(ies) failed, generating offline fallback", attempts.len());
                    let generator = FallbackGenerator::new(&self.manifest.fallback);
                    let dataset = if self.dry_run {
                        info!("dry run: would generate fallback dataset in {}", self.manifest.dataset_dir);
                        generator.dataset_info()
                    } else {
                        generator.generate(&self.manifest.dataset_dir)?
                    };
                    Phase::Syncing {
                        provenance: Provenance::Fallback,
                        dataset,
                        record_pending: false,
                    }
                }

                Phase::Syncing {
                    provenance,
                    dataset,
                    record_pending,
                } => {
                    self.sync(&dataset, record_pending)?;
                    Phase::Done(RunReport {
                        provenance,
                        dataset,
                        attempts: std::mem::take(&mut attempts),
                    })
                }

                Phase::Done(report) => return Ok(report),
            };
        }
    }

    /// Best-effort library bootstrap. Failure is logged and ignored: the
    /// fallback path needs no library, so it must not gate the run.
    fn run_bootstrap(&self) {
        let Some(spec) = &self.manifest.bootstrap else {
            return;
        };
        let bootstrapper = LibraryBootstrapper::new(self.executor.clone());
        let result = bootstrapper.ensure(spec);
        if !result.success() {
            warn!(
                library = %spec.library,
                "library bootstrap failed, proceeding anyway: {}",
                result.stderr.trim_end()
            );
        }
    }

    /// Attempts strategies in ascending priority order, stopping at the
    /// first success.
    fn try_strategies(&self, attempts: &mut Vec<StrategyAttempt>) -> Phase {
        let ordered = self.manifest.ordered_strategies();
        let runner = StrategyRunner::new(
            self.executor.clone(),
            Duration::from_secs(self.manifest.timeout_secs),
        );

        for (index, strategy) in ordered.iter().enumerate() {
            info!(
                "trying strategy {}/{}: {} (priority {})",
                index + 1,
                ordered.len(),
                strategy.name,
                strategy.priority
            );
            let attempt = runner.run(strategy);
            info!(strategy = %strategy.name, outcome = %attempt.outcome, "strategy attempt finished");

            let succeeded = attempt.succeeded();
            attempts.push(attempt);
            if succeeded {
                return Phase::Syncing {
                    provenance: Provenance::Strategy(strategy.name.clone()),
                    dataset: strategy.dataset.to_info(),
                    record_pending: true,
                };
            }
        }

        Phase::Fallback
    }

    /// Writes the dataset record when still pending and patches the config
    /// document.
    fn sync(&self, dataset: &DatasetInfo, record_pending: bool) -> Result<(), AerieError> {
        if self.dry_run {
            info!("dry run: would sync config document {}", self.manifest.config_path);
            return Ok(());
        }

        if record_pending {
            std::fs::create_dir_all(&self.manifest.dataset_dir)
                .map_err(|e| AerieError::io(self.manifest.dataset_dir.to_string(), e))?;
            dataset.write(&self.manifest.dataset_dir)?;
        }

        let patch = AiPatch {
            model_path: self.manifest.model_path.clone(),
            classes: dataset.classes.clone(),
            confidence_threshold: self.manifest.confidence_threshold,
            dataset_dir: self.manifest.dataset_dir.to_string(),
        };
        ConfigSynchronizer::apply(&self.manifest.config_path, &patch)
    }
}
