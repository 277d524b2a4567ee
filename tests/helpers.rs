//! Test utility functions for provision
#![allow(dead_code)]

use provision::core::config::ProvisionConfig;
use provision::core::{ExecutionStatus, Pipeline, PipelineResult, StepState};
use provision::execution::{ExecutionEvent, ProvisionEngine};
use provision::probe::ToolProber;
use provision::runner::{CommandOutput, Invocation, ProcessRunner, RunnerError};
use provision::stages::environment::interpreter_path;

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// File name of the executable `name` on this platform
pub fn exe_name(name: &str) -> String {
    if cfg!(windows) {
        format!("{}.exe", name)
    } else {
        name.to_string()
    }
}

/// Write an executable placeholder at `path`
pub fn write_executable(path: &Path) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, "#!/bin/sh\n").unwrap();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }
}

/// Write an executable placeholder for the tool `name` into `dir`
pub fn fake_tool(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(exe_name(name));
    write_executable(&path);
    path
}

/// Scripted stand-in for the machine's processes
///
/// Answers `--version` for every tool, and simulates the side effects of the
/// package manager install, `-m venv` and the packager on disk.
pub struct FakeRunner {
    calls: Mutex<Vec<Invocation>>,
    /// Where an install drops the runtime executable
    install_target: Mutex<Option<(PathBuf, String)>>,
    install_response: Mutex<CommandOutput>,
    /// Invocations whose display contains the needle get this output
    failures: Mutex<Vec<(String, CommandOutput)>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            install_target: Mutex::new(None),
            install_response: Mutex::new(CommandOutput::success("Successfully installed")),
            failures: Mutex::new(Vec::new()),
        }
    }

    /// Running the installer makes `tool` appear in `dir`
    pub fn install_creates(&self, dir: &Path, tool: &str) {
        *self.install_target.lock().unwrap() = Some((dir.to_path_buf(), tool.to_string()));
    }

    /// Running the installer changes nothing on disk
    pub fn install_creates_nothing(&self) {
        *self.install_target.lock().unwrap() = None;
    }

    pub fn install_responds(&self, output: CommandOutput) {
        *self.install_response.lock().unwrap() = output;
    }

    pub fn fail_when(&self, needle: &str, output: CommandOutput) {
        self.failures
            .lock()
            .unwrap()
            .push((needle.to_string(), output));
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls to the executable named `name`, in order
    pub fn calls_to(&self, name: &str) -> Vec<Invocation> {
        self.calls()
            .into_iter()
            .filter(|c| c.program_name() == exe_name(name))
            .collect()
    }

    /// Whether any call's display contains `needle`
    pub fn ran(&self, needle: &str) -> bool {
        self.calls().iter().any(|c| c.to_string().contains(needle))
    }

    /// Whether `path` was ever executed
    pub fn executed(&self, path: &Path) -> bool {
        self.calls().iter().any(|c| c.program == path)
    }

    fn respond(&self, invocation: &Invocation) -> CommandOutput {
        let display = invocation.to_string();
        let scripted = self
            .failures
            .lock()
            .unwrap()
            .iter()
            .find(|(needle, _)| display.contains(needle.as_str()))
            .map(|(_, output)| output.clone());
        if let Some(output) = scripted {
            return output;
        }

        let args: Vec<&str> = invocation.args.iter().map(String::as_str).collect();
        let cwd = invocation.cwd.clone().unwrap_or_default();

        match args.as_slice() {
            ["--version"] => {
                CommandOutput::success(format!("{} 1.0.0\n", invocation.program_name()))
            }
            ["install", ..] => {
                if let Some((dir, tool)) = self.install_target.lock().unwrap().as_ref() {
                    fake_tool(dir, tool);
                }
                self.install_response.lock().unwrap().clone()
            }
            ["-m", "venv", root] => {
                write_executable(&interpreter_path(Path::new(root)));
                CommandOutput::success("")
            }
            ["-m", "PyInstaller", ..] => {
                let value_of = |flag: &str| {
                    args.iter()
                        .position(|a| *a == flag)
                        .and_then(|i| args.get(i + 1))
                        .map(|v| v.to_string())
                };
                let dist = cwd.join(value_of("--distpath").unwrap_or_else(|| "dist".into()));
                let name = value_of("--name").unwrap_or_else(|| "app".into());
                // One-folder builds get a directory named after the app
                let out_dir = if args.contains(&"--onefile") {
                    dist
                } else {
                    dist.join(&name)
                };
                std::fs::create_dir_all(&out_dir).unwrap();
                std::fs::write(out_dir.join(exe_name(&name)), "artifact").unwrap();
                CommandOutput::success("Building EXE completed successfully.")
            }
            _ => CommandOutput::success(""),
        }
    }
}

#[async_trait]
impl ProcessRunner for FakeRunner {
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput, RunnerError> {
        self.calls.lock().unwrap().push(invocation.clone());
        Ok(self.respond(invocation))
    }
}

/// A scratch machine: a project directory, a PATH and a fake runner
///
/// Layout under a temporary root:
/// `project/` with the input files, `bin/` holding the package manager, and
/// `WindowsApps/` holding a stub `python` that sits first on the search path.
pub struct FakeMachine {
    _root: TempDir,
    pub project: PathBuf,
    pub bin: PathBuf,
    pub stubs: PathBuf,
    pub search_path: Vec<PathBuf>,
    pub runner: Arc<FakeRunner>,
}

impl FakeMachine {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let project = root.path().join("project");
        let bin = root.path().join("bin");
        let stubs = root.path().join("WindowsApps");

        std::fs::create_dir_all(&project).unwrap();
        std::fs::write(project.join("mlo_cleaner_gui_dark_multi.py"), "print('hi')\n").unwrap();
        std::fs::write(project.join("icon.png"), [0x89, b'P', b'N', b'G']).unwrap();

        fake_tool(&bin, "winget");
        fake_tool(&stubs, "python");

        let runner = Arc::new(FakeRunner::new());
        runner.install_creates(&bin, "python");

        Self {
            search_path: vec![stubs.clone(), bin.clone()],
            _root: root,
            project,
            bin,
            stubs,
            runner,
        }
    }

    /// The runtime is already installed
    pub fn with_runtime(self) -> Self {
        fake_tool(&self.bin, "python");
        self
    }

    /// Default configuration without machine-specific extra locations
    pub fn config(&self) -> ProvisionConfig {
        let mut config = ProvisionConfig::default();
        config.runtime.extra_locations.clear();
        config
    }

    pub fn engine(&self) -> ProvisionEngine<Arc<FakeRunner>> {
        ProvisionEngine::with_prober(
            self.runner.clone(),
            ToolProber::with_search_path(self.search_path.clone(), &self.project),
            &self.project,
        )
    }

    /// Run the stock pipeline
    pub async fn run(&self) -> RunOutcome {
        self.run_pipeline(self.config().to_pipeline()).await
    }

    pub async fn run_config(&self, config: &ProvisionConfig) -> RunOutcome {
        self.run_pipeline(config.to_pipeline()).await
    }

    pub async fn run_pipeline(&self, mut pipeline: Pipeline) -> RunOutcome {
        let engine = self.engine();
        let events = Arc::new(Mutex::new(Vec::new()));
        let recorded = events.clone();
        engine.add_event_handler(move |event| recorded.lock().unwrap().push(event));

        let result = engine.execute(&mut pipeline).await;
        let events = events.lock().unwrap().clone();
        RunOutcome {
            pipeline,
            result,
            events,
        }
    }

    pub fn venv_interpreter(&self) -> PathBuf {
        interpreter_path(&self.project.join(".venv"))
    }

    /// The runtime the package manager installs, once present
    pub fn runtime_path(&self) -> PathBuf {
        self.bin.join(exe_name("python"))
    }

    pub fn stub_path(&self) -> PathBuf {
        self.stubs.join(exe_name("python"))
    }

    pub fn winget_path(&self) -> PathBuf {
        self.bin.join(exe_name("winget"))
    }

    /// One-file build output
    pub fn artifact(&self) -> PathBuf {
        self.project.join("dist").join(exe_name("FiveM MLO Cleaner"))
    }
}

/// Everything a scenario may want to assert on
pub struct RunOutcome {
    pub pipeline: Pipeline,
    pub result: PipelineResult,
    pub events: Vec<ExecutionEvent>,
}

impl RunOutcome {
    pub fn exit_code(&self) -> i32 {
        self.result.exit_code()
    }

    pub fn step_state(&self, step_id: &str) -> &StepState {
        &self
            .pipeline
            .step(step_id)
            .unwrap_or_else(|| panic!("Step '{}' not found", step_id))
            .state
    }

    /// Completed steps, in order
    pub fn completed_steps(&self) -> Vec<String> {
        self.pipeline
            .steps
            .iter()
            .filter(|s| matches!(s.state, StepState::Completed { .. }))
            .map(|s| s.id.clone())
            .collect()
    }

    pub fn skipped_steps(&self) -> Vec<String> {
        self.pipeline
            .steps
            .iter()
            .filter(|s| matches!(s.state, StepState::Skipped { .. }))
            .map(|s| s.id.clone())
            .collect()
    }

    pub fn step_detail(&self, step_id: &str) -> String {
        match self.step_state(step_id) {
            StepState::Completed { detail, .. } => detail.clone(),
            other => panic!("Step '{}' is not completed: {:?}", step_id, other),
        }
    }

    pub fn remediation_started(&self) -> bool {
        self.events
            .iter()
            .any(|e| matches!(e, ExecutionEvent::RemediationStarted { .. }))
    }
}

/// Assert the run succeeded with exit code 0
pub fn assert_succeeded(outcome: &RunOutcome) {
    assert!(
        outcome.result.is_success(),
        "Run should succeed, but failed: {:?}",
        outcome.result
    );
    assert_eq!(outcome.exit_code(), 0);
    assert_eq!(outcome.pipeline.state.status, ExecutionStatus::Completed);
}

/// Assert the run failed at `step_id` with exit code 1 and an error mentioning `expected`
pub fn assert_failed_at(outcome: &RunOutcome, step_id: &str, expected: &str) {
    assert_eq!(outcome.exit_code(), 1, "Run should fail: {:?}", outcome.result);
    assert_eq!(outcome.result.failed_step(), Some(step_id));
    assert_eq!(outcome.pipeline.state.status, ExecutionStatus::Failed);

    match outcome.step_state(step_id) {
        StepState::Failed { error, .. } => assert!(
            error.contains(expected),
            "Step '{}' error:\n{}\n\ndoes not contain:\n{}",
            step_id,
            error,
            expected
        ),
        other => panic!("Step '{}' should have failed, but was {:?}", step_id, other),
    }

    // Nothing after the failing step ran
    let index = outcome
        .pipeline
        .steps
        .iter()
        .position(|s| s.id == step_id)
        .unwrap();
    for step in &outcome.pipeline.steps[index + 1..] {
        assert!(
            matches!(step.state, StepState::Skipped { .. }),
            "Step '{}' should be skipped, but was {:?}",
            step.id,
            step.state
        );
    }
}
