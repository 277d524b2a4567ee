//! Test: Input validation happens before anything else

use crate::helpers::*;

#[tokio::test]
async fn test_missing_entry_script_stops_before_probing() {
    let machine = FakeMachine::new().with_runtime();
    std::fs::remove_file(machine.project.join("mlo_cleaner_gui_dark_multi.py")).unwrap();

    let outcome = machine.run().await;

    assert_failed_at(&outcome, "check-inputs", "mlo_cleaner_gui_dark_multi.py");
    assert!(machine.runner.calls().is_empty(), "no process may run");
}

#[tokio::test]
async fn test_missing_icon_stops_before_probing() {
    let machine = FakeMachine::new().with_runtime();
    std::fs::remove_file(machine.project.join("icon.png")).unwrap();

    let outcome = machine.run().await;

    assert_failed_at(&outcome, "check-inputs", "icon.png");
    assert!(machine.runner.calls().is_empty());
    assert!(!machine.project.join(".venv").exists());
}

#[tokio::test]
async fn test_inputs_are_resolved_against_project_dir() {
    let machine = FakeMachine::new().with_runtime();
    std::fs::create_dir_all(machine.project.join("assets")).unwrap();
    std::fs::rename(
        machine.project.join("icon.png"),
        machine.project.join("assets").join("app.png"),
    )
    .unwrap();

    let mut config = machine.config();
    config.app.icon_source = "assets/app.png".to_string();
    config.app.data_files.clear();

    let outcome = machine.run_config(&config).await;

    assert_succeeded(&outcome);
    assert!(machine.runner.ran("assets/app.png assets/app.ico"));
}
