//! Test: End-to-end runs, re-runs and build failures

use crate::helpers::*;
use provision::stages::artifact::data_separator;
use provision::{CommandOutput, PipelineResult};

#[tokio::test]
async fn test_fresh_machine_provisions_in_order() {
    let machine = FakeMachine::new();

    let outcome = machine.run().await;

    assert_succeeded(&outcome);
    assert_eq!(
        outcome.completed_steps(),
        vec![
            "check-inputs",
            "detect-package-manager",
            "ensure-runtime",
            "build-environment",
            "upgrade-pip",
            "install-build-deps",
            "convert-icon",
            "package-app",
            "verify-artifact",
        ]
    );

    let venv_python = machine.venv_interpreter();
    let calls: Vec<(String, String)> = machine
        .runner
        .calls()
        .iter()
        .map(|c| (c.program_name(), c.args.first().cloned().unwrap_or_default()))
        .collect();
    let expected: Vec<(String, String)> = [
        ("winget", "--version"),
        ("winget", "install"),
        ("python", "--version"),
        ("python", "-m"),
        ("python", "-m"),
        ("python", "-m"),
        ("python", "-c"),
        ("python", "-m"),
    ]
    .iter()
    .map(|(p, a)| (exe_name(p), a.to_string()))
    .collect();
    assert_eq!(calls, expected);

    // Everything after the environment runs inside it
    let in_env = machine.runner.calls().iter().skip(4).all(|c| c.program == venv_python);
    assert!(in_env);

    assert!(machine.artifact().is_file());
    match &outcome.result {
        PipelineResult::Succeeded { artifact } => {
            assert_eq!(artifact.as_deref(), Some(machine.artifact().as_path()));
        }
        other => panic!("expected success, got {:?}", other),
    }
}

#[tokio::test]
async fn test_packager_arguments() {
    let machine = FakeMachine::new().with_runtime();

    let outcome = machine.run().await;
    assert_succeeded(&outcome);

    let package = machine
        .runner
        .calls()
        .into_iter()
        .find(|c| c.args.iter().any(|a| a == "PyInstaller"))
        .expect("packager was run");
    let args = package.args;
    for flag in ["--noconfirm", "--clean", "--onefile", "--windowed"] {
        assert!(args.contains(&flag.to_string()), "missing {}", flag);
    }
    let pair = |flag: &str| {
        let i = args.iter().position(|a| a == flag).unwrap();
        args[i + 1].clone()
    };
    assert_eq!(pair("--name"), "FiveM MLO Cleaner");
    assert_eq!(pair("--icon"), "icon.ico");
    assert_eq!(pair("--add-data"), format!("icon.png{}.", data_separator()));
    assert_eq!(pair("--distpath"), "dist");
    assert_eq!(args.last().unwrap(), "mlo_cleaner_gui_dark_multi.py");

    assert!(machine.runner.ran("-m pip install pyinstaller pillow"));
    assert!(machine.runner.ran("-m pip install --upgrade pip"));
    assert!(machine.runner.ran("icon.png icon.ico"));
}

#[tokio::test]
async fn test_one_folder_build_is_verified_inside_app_dir() {
    let machine = FakeMachine::new().with_runtime();
    let mut config = machine.config();
    config.build.one_file = false;

    let outcome = machine.run_config(&config).await;

    assert_succeeded(&outcome);
    assert!(!machine.runner.ran("--onefile"));
    let artifact = machine
        .project
        .join("dist")
        .join("FiveM MLO Cleaner")
        .join(exe_name("FiveM MLO Cleaner"));
    assert!(artifact.is_file());
    match &outcome.result {
        PipelineResult::Succeeded { artifact: reported } => {
            assert_eq!(reported.as_deref(), Some(artifact.as_path()));
        }
        other => panic!("expected success, got {:?}", other),
    }
}

#[tokio::test]
async fn test_rerun_converges() {
    let machine = FakeMachine::new();

    let first = machine.run().await;
    assert_succeeded(&first);
    let stale = machine.project.join(".venv").join("stale.txt");
    std::fs::write(&stale, "left over").unwrap();

    let second = machine.run().await;

    assert_succeeded(&second);
    assert!(!second.remediation_started(), "runtime is found on re-run");
    assert_eq!(machine.runner.calls_to("winget").len(), 3, "one install in total");
    assert!(!stale.exists(), "environment is rebuilt from scratch");
    assert!(machine.artifact().is_file());
    assert_ne!(
        first.pipeline.state.execution_id,
        second.pipeline.state.execution_id
    );
}

#[tokio::test]
async fn test_build_failure_keeps_earlier_outputs() {
    let machine = FakeMachine::new().with_runtime();
    machine.runner.fail_when(
        "PyInstaller",
        CommandOutput::failure(1, "ModuleNotFoundError: No module named 'tkinter'"),
    );

    let outcome = machine.run().await;

    assert_failed_at(&outcome, "package-app", "exit code 1");
    assert_eq!(outcome.skipped_steps(), vec!["verify-artifact"]);
    // No rollback
    assert!(machine.venv_interpreter().is_file());
    assert!(outcome.completed_steps().contains(&"convert-icon".to_string()));
    match &outcome.result {
        PipelineResult::Failed { error, .. } => {
            assert!(error.output().unwrap().contains("tkinter"));
        }
        other => panic!("expected failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_dependency_install_failure_stops_the_run() {
    let machine = FakeMachine::new().with_runtime();
    machine.runner.fail_when(
        "install pyinstaller",
        CommandOutput::failure(1, "Could not find a version that satisfies the requirement"),
    );

    let outcome = machine.run().await;

    assert_failed_at(&outcome, "install-build-deps", "install-build-deps");
    assert!(!machine.runner.ran("PyInstaller"));
}

#[tokio::test]
async fn test_missing_artifact_fails_verification() {
    let machine = FakeMachine::new().with_runtime();
    machine
        .runner
        .fail_when("PyInstaller", CommandOutput::success("nothing written"));

    let outcome = machine.run().await;

    assert_failed_at(&outcome, "verify-artifact", "FiveM MLO Cleaner");
}
