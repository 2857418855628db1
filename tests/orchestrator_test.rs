mod helpers;

use std::fs;
use std::sync::Arc;

use aerie_provision::dataset::DatasetInfo;
use aerie_provision::error::AerieError;
use aerie_provision::executor::CommandExecutor;
use aerie_provision::manifest::BootstrapSpec;
use aerie_provision::orchestrator::{Orchestrator, Provenance};
use aerie_provision::runner::AttemptOutcome;
use helpers::{
    Outcome, ScriptedExecutor, dataset_decl, manifest, strategy_spec, touch_script, utf8_root,
};
use serde_yaml::Value;

#[test]
fn strategies_run_in_ascending_priority_order() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = utf8_root(&dir);

    // Declared out of order on purpose
    let mut strategies = Vec::new();
    for (name, priority) in [("third", 3), ("first", 1), ("second", 2)] {
        let script = root.join(format!("scripts/{}.sh", name));
        touch_script(&script);
        strategies.push(strategy_spec(name, priority, script, dataset_decl("AirBirds", 120)));
    }
    let manifest = manifest(&root, strategies);

    let executor = Arc::new(ScriptedExecutor::new(Outcome::Fail));
    let report = Orchestrator::new(&manifest, executor.clone(), false)
        .run()
        .expect("run should succeed via fallback");

    let commands = executor.recorded_commands();
    assert_eq!(commands.len(), 3);
    assert!(commands[0].ends_with("first.sh"));
    assert!(commands[1].ends_with("second.sh"));
    assert!(commands[2].ends_with("third.sh"));
    assert_eq!(report.provenance, Provenance::Fallback);
}

#[test]
fn first_success_short_circuits_later_strategies() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = utf8_root(&dir);

    let mut strategies = Vec::new();
    for (name, priority) in [("first", 1), ("second", 2), ("third", 3)] {
        let script = root.join(format!("scripts/{}.sh", name));
        touch_script(&script);
        strategies.push(strategy_spec(name, priority, script, dataset_decl("AirBirds", 120)));
    }
    let manifest = manifest(&root, strategies);

    let executor = Arc::new(ScriptedExecutor::new(Outcome::Succeed));
    let report = Orchestrator::new(&manifest, executor.clone(), false)
        .run()
        .expect("run should succeed");

    assert_eq!(executor.recorded().len(), 1);
    assert_eq!(report.provenance, Provenance::Strategy("first".to_string()));
}

#[test]
fn equal_priority_keeps_declaration_order() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = utf8_root(&dir);

    let mut strategies = Vec::new();
    for name in ["declared-first", "declared-second"] {
        let script = root.join(format!("scripts/{}.sh", name));
        touch_script(&script);
        strategies.push(strategy_spec(name, 1, script, dataset_decl("AirBirds", 120)));
    }
    let manifest = manifest(&root, strategies);

    let executor = Arc::new(ScriptedExecutor::new(Outcome::Succeed));
    let report = Orchestrator::new(&manifest, executor.clone(), false)
        .run()
        .expect("run should succeed");

    assert_eq!(report.provenance, Provenance::Strategy("declared-first".to_string()));
}

/// Spec scenario: strategy 1 missing, strategy 2 fails, strategy 3 succeeds.
#[test]
fn mixed_failures_end_with_third_strategy() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = utf8_root(&dir);

    let missing = root.join("scripts/missing.sh");
    let failing = root.join("scripts/failing.sh");
    let working = root.join("scripts/working.sh");
    touch_script(&failing);
    touch_script(&working);

    let strategies = vec![
        strategy_spec("kaggle", 1, missing, dataset_decl("AirBirds", 120)),
        strategy_spec("mirror", 2, failing, dataset_decl("AirBirds", 120)),
        strategy_spec("archive", 3, working, dataset_decl("AirBirds", 120)),
    ];
    let manifest = manifest(&root, strategies);

    let executor = Arc::new(
        ScriptedExecutor::new(Outcome::Succeed).rule("failing.sh", Outcome::Fail),
    );
    let report = Orchestrator::new(&manifest, executor.clone(), false)
        .run()
        .expect("run should succeed");

    assert_eq!(report.provenance, Provenance::Strategy("archive".to_string()));
    assert_eq!(report.dataset.name, "AirBirds");
    assert_eq!(report.dataset.samples(), 120);

    // Missing invocable was skipped without spawning
    let commands = executor.recorded_commands();
    assert_eq!(commands.len(), 2);
    assert!(commands.iter().all(|c| !c.ends_with("missing.sh")));

    // Attempt log reflects the taxonomy
    assert_eq!(report.attempts.len(), 3);
    assert_eq!(report.attempts[0].outcome, AttemptOutcome::NotFound);
    assert_eq!(report.attempts[1].outcome, AttemptOutcome::ExecutionFailed);
    assert_eq!(report.attempts[2].outcome, AttemptOutcome::Succeeded);

    // Config document reflects the acquisition
    let config: Value =
        serde_yaml::from_str(&fs::read_to_string(&manifest.config_path).expect("read config"))
            .expect("parse config");
    assert_eq!(config["ai"]["model_path"], Value::from("models/aerie-raptor.pt"));

    // Fallback was never invoked
    assert!(!manifest.dataset_dir.join("images").exists());
    let info = DatasetInfo::load(&manifest.dataset_dir).expect("dataset info");
    assert_eq!(info.name, "AirBirds");
}

#[test]
fn exhausted_strategies_reach_fallback_exactly_once() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = utf8_root(&dir);

    let mut strategies = Vec::new();
    for (name, priority) in [("a", 1), ("b", 2), ("c", 3)] {
        let script = root.join(format!("scripts/{}.sh", name));
        touch_script(&script);
        strategies.push(strategy_spec(name, priority, script, dataset_decl("AirBirds", 120)));
    }
    let manifest = manifest(&root, strategies);

    let executor = Arc::new(ScriptedExecutor::new(Outcome::Fail));
    let report = Orchestrator::new(&manifest, executor.clone(), false)
        .run()
        .expect("run should succeed via fallback");

    assert_eq!(report.provenance, Provenance::Fallback);
    assert_eq!(report.dataset.name, "AirBirds-sample");
    assert_eq!(report.dataset.samples(), 5);

    let info = DatasetInfo::load(&manifest.dataset_dir).expect("dataset info");
    assert_eq!(info.name, "AirBirds-sample");
    assert_eq!(info.samples(), 5);

    // Placeholder samples on disk
    let images: Vec<_> = fs::read_dir(manifest.dataset_dir.join("images/train"))
        .expect("images dir")
        .collect();
    assert_eq!(images.len(), 5);

    // Config synced with the sample dataset recorded
    let config: Value =
        serde_yaml::from_str(&fs::read_to_string(&manifest.config_path).expect("read config"))
            .expect("parse config");
    assert_eq!(config["ai"]["classes"][0], Value::from("bird"));
}

#[test]
fn executor_fault_is_contained_and_run_continues() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = utf8_root(&dir);

    let faulty = root.join("scripts/faulty.sh");
    let working = root.join("scripts/working.sh");
    touch_script(&faulty);
    touch_script(&working);

    let strategies = vec![
        strategy_spec("faulty", 1, faulty, dataset_decl("AirBirds", 120)),
        strategy_spec("working", 2, working, dataset_decl("AirBirds", 120)),
    ];
    let manifest = manifest(&root, strategies);

    let executor = Arc::new(
        ScriptedExecutor::new(Outcome::Succeed).rule("faulty.sh", Outcome::Fault),
    );
    let report = Orchestrator::new(&manifest, executor.clone(), false)
        .run()
        .expect("fault must not crash the orchestration");

    assert_eq!(report.provenance, Provenance::Strategy("working".to_string()));
    assert_eq!(report.attempts[0].outcome, AttemptOutcome::ExecutionFailed);
    assert!(report.attempts[0].result.stderr.contains("scripted executor fault"));
}

#[test]
fn timed_out_strategy_feeds_the_fallback_path() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = utf8_root(&dir);

    let slow = root.join("scripts/slow.sh");
    touch_script(&slow);
    let manifest = manifest(&root, vec![strategy_spec(
        "slow",
        1,
        slow,
        dataset_decl("AirBirds", 120),
    )]);

    let executor = Arc::new(ScriptedExecutor::new(Outcome::Timeout));
    let report = Orchestrator::new(&manifest, executor, false)
        .run()
        .expect("run should succeed via fallback");

    assert_eq!(report.attempts[0].outcome, AttemptOutcome::Timeout);
    assert_eq!(report.provenance, Provenance::Fallback);
}

#[test]
fn bootstrap_failure_does_not_block_the_run() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = utf8_root(&dir);

    let script = root.join("scripts/download.sh");
    touch_script(&script);
    let mut manifest = manifest(&root, vec![strategy_spec(
        "download",
        1,
        script,
        dataset_decl("AirBirds", 120),
    )]);
    manifest.bootstrap = Some(BootstrapSpec {
        library: "ultralytics".to_string(),
        min_version: "8.0.0".to_string(),
        python: "python3".to_string(),
        pip: "pip3".to_string(),
    });

    // Both the import probe and the install fail; the strategy still runs.
    let executor = Arc::new(
        ScriptedExecutor::new(Outcome::Succeed)
            .rule("python3", Outcome::Fail)
            .rule("pip3", Outcome::Fail),
    );
    let report = Orchestrator::new(&manifest, executor.clone(), false)
        .run()
        .expect("bootstrap failure must be non-fatal");

    assert_eq!(report.provenance, Provenance::Strategy("download".to_string()));
    let commands = executor.recorded_commands();
    assert_eq!(commands.len(), 3);
    assert_eq!(commands[0], "python3");
    assert_eq!(commands[1], "pip3");
    assert!(commands[2].ends_with("download.sh"));
}

#[test]
fn repeated_runs_are_idempotent() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = utf8_root(&dir);

    let script = root.join("scripts/download.sh");
    touch_script(&script);
    let manifest = manifest(&root, vec![strategy_spec(
        "download",
        1,
        script,
        dataset_decl("AirBirds", 120),
    )]);

    let executor: Arc<dyn CommandExecutor> = Arc::new(ScriptedExecutor::new(Outcome::Succeed));
    Orchestrator::new(&manifest, executor.clone(), false)
        .run()
        .expect("first run");
    let first = fs::read_to_string(&manifest.config_path).expect("read config");

    Orchestrator::new(&manifest, executor, false)
        .run()
        .expect("second run");
    let second = fs::read_to_string(&manifest.config_path).expect("read config");

    assert_eq!(first, second);
}

#[test]
fn config_sync_failure_fails_the_run_and_preserves_the_document() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = utf8_root(&dir);

    let script = root.join("scripts/download.sh");
    touch_script(&script);
    let manifest = manifest(&root, vec![strategy_spec(
        "download",
        1,
        script,
        dataset_decl("AirBirds", 120),
    )]);

    // Seed a document whose root is not a mapping; the merge must refuse it.
    fs::create_dir_all(manifest.config_path.parent().unwrap()).expect("config dir");
    fs::write(&manifest.config_path, "- not\n- a\n- mapping\n").expect("seed config");

    let executor = Arc::new(ScriptedExecutor::new(Outcome::Succeed));
    let err = Orchestrator::new(&manifest, executor, false)
        .run()
        .expect_err("run should fail on config sync");

    assert!(matches!(err, AerieError::ConfigSync(_)));
    let text = fs::read_to_string(&manifest.config_path).expect("read config");
    assert_eq!(text, "- not\n- a\n- mapping\n");
}

#[test]
fn dry_run_touches_nothing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = utf8_root(&dir);

    // No scripts exist, so every strategy is NotFound and the fallback
    // would be reached; in dry-run mode nothing may be written.
    let manifest = manifest(&root, vec![strategy_spec(
        "download",
        1,
        root.join("scripts/download.sh"),
        dataset_decl("AirBirds", 120),
    )]);

    let executor = Arc::new(ScriptedExecutor::new(Outcome::Succeed));
    let report = Orchestrator::new(&manifest, executor, true)
        .run()
        .expect("dry run should succeed");

    assert_eq!(report.provenance, Provenance::Fallback);
    assert!(!manifest.dataset_dir.exists());
    assert!(!manifest.config_path.exists());
}
