//! Test: Recreate and reuse handling of an existing environment

use crate::helpers::*;
use provision::core::config::EnvironmentMode;
use provision::stages::environment::interpreter_path;
use provision::CommandOutput;

fn venv_calls(machine: &FakeMachine) -> usize {
    machine
        .runner
        .calls()
        .iter()
        .filter(|c| c.args.len() > 1 && c.args[1] == "venv")
        .count()
}

#[tokio::test]
async fn test_reuse_keeps_working_environment() {
    let machine = FakeMachine::new().with_runtime();
    assert_succeeded(&machine.run().await);
    let marker = machine.project.join(".venv").join("marker");
    std::fs::write(&marker, "keep").unwrap();

    let mut pipeline = machine.config().to_pipeline();
    pipeline.set_environment_mode(EnvironmentMode::Reuse);
    let outcome = machine.run_pipeline(pipeline).await;

    assert_succeeded(&outcome);
    assert!(marker.exists());
    assert_eq!(venv_calls(&machine), 1);
    assert!(outcome.step_detail("build-environment").starts_with("reused"));
}

#[tokio::test]
async fn test_reuse_rebuilds_environment_without_interpreter() {
    let machine = FakeMachine::new().with_runtime();
    std::fs::create_dir_all(machine.project.join(".venv")).unwrap();

    let mut config = machine.config();
    config.environment.mode = EnvironmentMode::Reuse;
    let outcome = machine.run_config(&config).await;

    assert_succeeded(&outcome);
    assert_eq!(venv_calls(&machine), 1);
    assert!(outcome.step_detail("build-environment").starts_with("created"));
}

#[tokio::test]
async fn test_reuse_rebuilds_broken_interpreter() {
    let machine = FakeMachine::new().with_runtime();
    write_executable(&machine.venv_interpreter());
    machine.runner.fail_when(
        &format!("{} --version", machine.venv_interpreter().display()),
        CommandOutput::failure(101, "No Python at 'C:\\old\\python.exe'"),
    );

    let mut config = machine.config();
    config.environment.mode = EnvironmentMode::Reuse;
    let outcome = machine.run_config(&config).await;

    assert_succeeded(&outcome);
    assert_eq!(venv_calls(&machine), 1);
}

#[tokio::test]
async fn test_recreate_removes_existing_environment() {
    let machine = FakeMachine::new().with_runtime();
    let stale = machine.project.join(".venv").join("lib").join("stale.py");
    std::fs::create_dir_all(stale.parent().unwrap()).unwrap();
    std::fs::write(&stale, "").unwrap();

    let outcome = machine.run().await;

    assert_succeeded(&outcome);
    assert!(!stale.exists());
    assert!(machine.venv_interpreter().is_file());
}

#[tokio::test]
async fn test_environment_creation_failure_is_fatal() {
    let machine = FakeMachine::new().with_runtime();
    machine
        .runner
        .fail_when("-m venv", CommandOutput::failure(1, "ensurepip is not available"));

    let outcome = machine.run().await;

    assert_failed_at(&outcome, "build-environment", "exit code 1");
    assert!(!machine.runner.ran("pip install"));
}

#[tokio::test]
async fn test_custom_environment_dir_stays_in_project() {
    let machine = FakeMachine::new().with_runtime();
    let mut config = machine.config();
    config.environment.dir = "build/env".to_string();

    let outcome = machine.run_config(&config).await;

    assert_succeeded(&outcome);
    assert!(interpreter_path(&machine.project.join("build").join("env")).is_file());
    assert!(!machine.project.join(".venv").exists());
}
