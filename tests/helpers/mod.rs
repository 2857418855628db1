//! Shared test helpers: scripted executors and manifest builders.

use std::sync::{Arc, Mutex};

use aerie_provision::executor::{CommandExecutor, CommandSpec, ExecutionResult};
use aerie_provision::manifest::{DatasetDecl, FallbackSpec, Manifest, StrategySpec};
use camino::{Utf8Path, Utf8PathBuf};

/// Scripted outcome for one command.
#[derive(Clone, Copy, Debug)]
#[allow(dead_code)]
pub enum Outcome {
    /// Zero exit status
    Succeed,
    /// Non-zero exit status
    Fail,
    /// Killed after exceeding its timeout
    Timeout,
    /// Executor-level fault (`execute` returns `Err`)
    Fault,
}

#[allow(dead_code)]
pub type Calls = Arc<Mutex<Vec<CommandSpec>>>;

/// Executor returning scripted results without spawning processes.
///
/// Rules match on substrings of the command (or any argument); the first
/// matching rule wins, otherwise the default outcome applies. Every call
/// is recorded for ordering assertions.
#[allow(dead_code)]
pub struct ScriptedExecutor {
    rules: Vec<(String, Outcome)>,
    default: Outcome,
    pub calls: Calls,
}

#[allow(dead_code)]
impl ScriptedExecutor {
    pub fn new(default: Outcome) -> Self {
        Self {
            rules: Vec::new(),
            default,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn rule(mut self, needle: impl Into<String>, outcome: Outcome) -> Self {
        self.rules.push((needle.into(), outcome));
        self
    }

    pub fn recorded(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }

    /// Commands recorded so far, without their arguments.
    pub fn recorded_commands(&self) -> Vec<String> {
        self.recorded().into_iter().map(|spec| spec.command).collect()
    }
}

#[allow(dead_code)]
fn exit_status(code: i32) -> std::process::ExitStatus {
    use std::os::unix::process::ExitStatusExt;
    std::process::ExitStatus::from_raw(code << 8)
}

impl CommandExecutor for ScriptedExecutor {
    fn execute(&self, spec: &CommandSpec) -> anyhow::Result<ExecutionResult> {
        self.calls.lock().unwrap().push(spec.clone());

        let outcome = self
            .rules
            .iter()
            .find(|(needle, _)| {
                spec.command.contains(needle) || spec.args.iter().any(|a| a.contains(needle))
            })
            .map(|(_, outcome)| *outcome)
            .unwrap_or(self.default);

        match outcome {
            Outcome::Succeed => Ok(ExecutionResult {
                status: Some(exit_status(0)),
                stdout: "ok\n".to_string(),
                ..ExecutionResult::default()
            }),
            Outcome::Fail => Ok(ExecutionResult {
                status: Some(exit_status(1)),
                stderr: "scripted failure\n".to_string(),
                ..ExecutionResult::default()
            }),
            Outcome::Timeout => Ok(ExecutionResult {
                timed_out: true,
                stderr: "scripted timeout\n".to_string(),
                ..ExecutionResult::default()
            }),
            Outcome::Fault => anyhow::bail!("{}: scripted executor fault", spec.command),
        }
    }
}

/// Creates an empty invocable file so the runner resolves it.
#[allow(dead_code)]
pub fn touch_script(path: &Utf8Path) {
    std::fs::create_dir_all(path.parent().expect("script path has a parent"))
        .expect("create script dir");
    std::fs::write(path, "#!/bin/sh\nexit 0\n").expect("write script");
}

#[allow(dead_code)]
pub fn dataset_decl(name: &str, samples: u64) -> DatasetDecl {
    DatasetDecl {
        name: name.to_string(),
        description: String::new(),
        source: String::new(),
        classes: vec!["bird".to_string()],
        samples,
        format: "yolo".to_string(),
        license: String::new(),
    }
}

#[allow(dead_code)]
pub fn strategy_spec(
    name: &str,
    priority: u32,
    invocable: Utf8PathBuf,
    dataset: DatasetDecl,
) -> StrategySpec {
    StrategySpec {
        name: name.to_string(),
        priority,
        invocable,
        args: Vec::new(),
        dataset,
    }
}

/// Builds a manifest rooted in a temp directory with the given strategies.
#[allow(dead_code)]
pub fn manifest(root: &Utf8Path, strategies: Vec<StrategySpec>) -> Manifest {
    Manifest {
        dataset_dir: root.join("dataset"),
        config_path: root.join("config/aerie.yaml"),
        timeout_secs: 30,
        bootstrap: None,
        model_path: "models/aerie-raptor.pt".to_string(),
        confidence_threshold: 0.45,
        strategies,
        fallback: FallbackSpec::default(),
    }
}

/// Returns the temp dir root as a `Utf8Path`.
#[allow(dead_code)]
pub fn utf8_root(dir: &tempfile::TempDir) -> Utf8PathBuf {
    Utf8Path::from_path(dir.path())
        .expect("tempdir should be valid UTF-8")
        .to_path_buf()
}
