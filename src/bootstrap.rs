//! Library bootstrap.
//!
//! Some acquisition strategies need an external library (e.g. the
//! `ultralytics` toolkit) available on the appliance before they can run.
//! [`LibraryBootstrapper`] probes for it and installs it when missing.
//! Bootstrap failure is never fatal: the fallback path needs no library,
//! so the orchestrator proceeds either way.

use std::sync::Arc;

use tracing::{debug, info};

use crate::executor::{CommandExecutor, CommandSpec, ExecutionResult};
use crate::manifest::BootstrapSpec;

/// Ensures an external library dependency is installed.
pub struct LibraryBootstrapper {
    executor: Arc<dyn CommandExecutor>,
}

impl LibraryBootstrapper {
    pub fn new(executor: Arc<dyn CommandExecutor>) -> Self {
        Self { executor }
    }

    /// Ensures the named library is importable, installing it when missing.
    ///
    /// Already-importable libraries short-circuit to an immediate success
    /// with no side effect. Otherwise a single installer invocation with a
    /// pinned minimum version constraint is attempted and its result
    /// returned as-is. Executor faults are normalized into a failed result,
    /// never propagated.
    pub fn ensure(&self, spec: &BootstrapSpec) -> ExecutionResult {
        let probe = CommandSpec::new(
            spec.python.clone(),
            vec!["-c".to_string(), format!("import {}", spec.library)],
        );
        match self.executor.execute(&probe) {
            Ok(result) if result.success() => {
                debug!(library = %spec.library, "library already importable, skipping install");
                return result;
            }
            Ok(_) => {
                debug!(library = %spec.library, "library not importable, installing");
            }
            Err(e) => {
                debug!(library = %spec.library, "import probe failed ({:#}), installing", e);
            }
        }

        info!(
            library = %spec.library,
            min_version = %spec.min_version,
            "installing library"
        );
        let install = CommandSpec::new(
            spec.pip.clone(),
            vec![
                "install".to_string(),
                format!("{}>={}", spec.library, spec.min_version),
            ],
        );
        match self.executor.execute(&install) {
            Ok(result) => result,
            Err(e) => ExecutionResult::fault(format!("{:#}", e)),
        }
    }
}
