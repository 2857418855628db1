//! Strategy execution.
//!
//! [`StrategyRunner`] runs one acquisition strategy as an isolated child
//! process and normalizes everything that can go wrong into a
//! [`StrategyAttempt`]. It performs no retries of its own; trying the next
//! strategy is the orchestrator's job.

use std::sync::Arc;
use std::time::Duration;

use strum::Display;
use tracing::{debug, warn};

use crate::executor::{CommandExecutor, CommandSpec, ExecutionResult};
use crate::manifest::StrategySpec;

/// How an attempt at a single strategy ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum AttemptOutcome {
    /// The strategy's invocable could not be located; nothing was spawned.
    NotFound,
    /// The invocable ran past its allotted time and was killed.
    Timeout,
    /// The invocable ran and signaled failure, or could not be spawned.
    ExecutionFailed,
    /// The invocable terminated with a success status.
    Succeeded,
}

/// Outcome of one strategy attempt.
#[derive(Debug)]
pub struct StrategyAttempt {
    /// Name of the attempted strategy
    pub strategy: String,
    pub outcome: AttemptOutcome,
    /// Captured process outcome; synthetic for `NotFound` and spawn failures
    pub result: ExecutionResult,
}

impl StrategyAttempt {
    pub fn succeeded(&self) -> bool {
        self.outcome == AttemptOutcome::Succeeded
    }
}

/// Runs acquisition strategies through an injected executor.
pub struct StrategyRunner {
    executor: Arc<dyn CommandExecutor>,
    timeout: Duration,
}

impl StrategyRunner {
    pub fn new(executor: Arc<dyn CommandExecutor>, timeout: Duration) -> Self {
        Self { executor, timeout }
    }

    /// Attempts a single strategy.
    ///
    /// Never propagates a fault from the invocable: spawn failures, non-zero
    /// exits, and timeouts all come back as a failed [`StrategyAttempt`]
    /// with diagnostic text in `result.stderr`.
    pub fn run(&self, strategy: &StrategySpec) -> StrategyAttempt {
        if !strategy.invocable.exists() {
            debug!(
                strategy = %strategy.name,
                invocable = %strategy.invocable,
                "invocable not found, skipping without spawning"
            );
            return StrategyAttempt {
                strategy: strategy.name.clone(),
                outcome: AttemptOutcome::NotFound,
                result: ExecutionResult::fault(format!(
                    "invocable not found: {}",
                    strategy.invocable
                )),
            };
        }

        let spec = CommandSpec::new(strategy.invocable.as_str(), strategy.args.clone())
            .with_timeout(Some(self.timeout));

        match self.executor.execute(&spec) {
            Ok(result) => {
                let outcome = if result.timed_out {
                    AttemptOutcome::Timeout
                } else if result.success() {
                    AttemptOutcome::Succeeded
                } else {
                    AttemptOutcome::ExecutionFailed
                };
                StrategyAttempt {
                    strategy: strategy.name.clone(),
                    outcome,
                    result,
                }
            }
            Err(e) => {
                // Executor-level faults (unresolvable command, spawn or wait
                // failure, reader panic) must not crash the run.
                warn!(strategy = %strategy.name, "strategy execution fault: {:#}", e);
                StrategyAttempt {
                    strategy: strategy.name.clone(),
                    outcome: AttemptOutcome::ExecutionFailed,
                    result: ExecutionResult::fault(format!("{:#}", e)),
                }
            }
        }
    }
}
