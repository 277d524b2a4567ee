//! Test: Stub executables are never selected, even when first on PATH

use crate::helpers::*;
use provision::execution::ExecutionEvent;

#[tokio::test]
async fn test_stub_before_real_runtime_is_skipped() {
    let machine = FakeMachine::new().with_runtime();

    let outcome = machine.run().await;

    assert_succeeded(&outcome);
    assert!(!machine.runner.executed(&machine.stub_path()));
    assert!(machine.runner.executed(&machine.runtime_path()));
    assert!(!outcome.remediation_started());

    let probed = outcome.events.iter().find_map(|e| match e {
        ExecutionEvent::ToolProbed {
            tool,
            found,
            rejected,
            ..
        } if tool == "python" => Some((found.clone(), *rejected)),
        _ => None,
    });
    assert_eq!(probed, Some((Some(machine.runtime_path()), 1)));
}

#[tokio::test]
async fn test_only_stub_means_runtime_is_missing() {
    let machine = FakeMachine::new();

    let outcome = machine.run().await;

    assert_succeeded(&outcome);
    assert!(outcome.remediation_started());
    assert_eq!(machine.runner.calls_to("winget").len(), 2, "verify + install");
    assert!(!machine.runner.executed(&machine.stub_path()));
}

#[tokio::test]
async fn test_stub_rule_is_case_insensitive() {
    let machine = FakeMachine::new().with_runtime();
    let mut config = machine.config();
    config.runtime.stub_components = vec!["windowsapps".to_string()];

    let outcome = machine.run_config(&config).await;

    assert_succeeded(&outcome);
    assert!(!machine.runner.executed(&machine.stub_path()));
}

#[tokio::test]
async fn test_prefix_rule_rejects_whole_directory() {
    let machine = FakeMachine::new().with_runtime();
    let mut config = machine.config();
    config.runtime.stub_components.clear();
    config.runtime.stub_prefixes = vec![machine.stubs.to_string_lossy().to_string()];

    let outcome = machine.run_config(&config).await;

    assert_succeeded(&outcome);
    assert!(!machine.runner.executed(&machine.stub_path()));
}
