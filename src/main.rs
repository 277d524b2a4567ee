use anyhow::{Context, Result};
use indicatif::ProgressBar;
use provision::cli::commands::{HistoryCommand, ProbeCommand, RunCommand, ValidateCommand};
use provision::cli::output::*;
use provision::cli::{Cli, Command};
use provision::core::config::{ConfigSource, ProvisionConfig};
use provision::core::{PipelineResult, StepAction};
use provision::execution::{ExecutionEvent, ProvisionEngine};
use provision::persistence::{create_summary, ExecutionSummary, InMemoryPersistence, PersistenceBackend};
use provision::probe::ToolProber;
use provision::runner::SystemRunner;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Lines of subprocess output shown after a failure
const OUTPUT_TAIL_LINES: usize = 20;

#[tokio::main]
async fn main() {
    let cli = Cli::from_args();

    if let Err(e) = init_logging(cli.verbose) {
        eprintln!("[ERROR] {:#}", e);
        std::process::exit(1);
    }

    let code = match dispatch(&cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", style("[ERROR]").red().bold(), e);
            1
        }
    };
    std::process::exit(code);
}

fn init_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")
}

async fn dispatch(cli: &Cli) -> Result<i32> {
    let project_dir = resolve_project_dir(cli.project_dir.as_deref())?;
    let config_path = cli.config.as_deref();

    match cli.command() {
        Command::Run(cmd) => run_pipeline(&cmd, &project_dir, config_path).await,
        Command::Validate(cmd) => validate_config(&cmd, &project_dir, config_path),
        Command::Probe(cmd) => probe_tools(&cmd, &project_dir, config_path).await,
        Command::History(cmd) => show_history(&cmd, &project_dir).await,
    }
}

fn resolve_project_dir(explicit: Option<&Path>) -> Result<PathBuf> {
    let cwd = std::env::current_dir().context("Failed to read the current directory")?;
    let dir = match explicit {
        Some(path) if path.is_absolute() => path.to_path_buf(),
        Some(path) => cwd.join(path),
        None => cwd,
    };
    if !dir.is_dir() {
        anyhow::bail!("Project directory does not exist: {}", dir.display());
    }
    Ok(dir)
}

fn load_config(project_dir: &Path, config_path: Option<&Path>) -> Result<ProvisionConfig> {
    let (config, source) =
        ProvisionConfig::load(config_path, project_dir).context("Failed to load configuration")?;
    match source {
        ConfigSource::File(path) => debug!("Loaded configuration from {}", path.display()),
        ConfigSource::Defaults => debug!("No configuration file, using built-in defaults"),
    }
    Ok(config)
}

async fn open_store(no_history: bool, project_dir: &Path) -> Arc<dyn PersistenceBackend> {
    if no_history {
        return Arc::new(InMemoryPersistence::new());
    }

    #[cfg(feature = "sqlite")]
    {
        match provision::persistence::SqliteExecutionStore::for_project(project_dir).await {
            Ok(store) => return Arc::new(store),
            Err(e) => warn!("Run history unavailable: {:#}", e),
        }
    }
    #[cfg(not(feature = "sqlite"))]
    {
        let _ = project_dir;
        warn!("Built without sqlite support; run history is not persisted");
    }

    Arc::new(InMemoryPersistence::new())
}

async fn run_pipeline(
    cmd: &RunCommand,
    project_dir: &Path,
    config_path: Option<&Path>,
) -> Result<i32> {
    let config = load_config(project_dir, config_path)?;

    let mut pipeline = config.to_pipeline();
    if let Some(mode) = cmd.environment_mode() {
        pipeline.set_environment_mode(mode);
    }

    let store = open_store(cmd.no_history, project_dir).await;

    let runner = SystemRunner::new().with_timeout(config.timeout_secs);
    let engine = ProvisionEngine::new(runner, project_dir);

    // Console output, with a spinner while each step runs
    let spinner: Arc<Mutex<Option<ProgressBar>>> = Arc::new(Mutex::new(None));
    engine.add_event_handler(move |event| {
        let mut current = spinner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        match &event {
            ExecutionEvent::StepStarted {
                description,
                index,
                total,
                ..
            } => {
                *current = Some(create_step_spinner(format!(
                    "[{}/{}] {}",
                    index, total, description
                )));
            }
            ExecutionEvent::StepCompleted { .. }
            | ExecutionEvent::StepFailed { .. }
            | ExecutionEvent::PipelineCompleted { .. } => {
                if let Some(bar) = current.take() {
                    bar.finish_and_clear();
                }
            }
            _ => {}
        }

        if let Some(line) = format_execution_event(&event) {
            match current.as_ref() {
                Some(bar) => bar.println(line),
                None => println!("{}", line),
            }
        }
    });

    let result = engine.execute(&mut pipeline).await;

    let summary = create_summary(&pipeline, &result);
    if let Err(e) = store.save_execution(&summary).await {
        warn!("Failed to save run history: {:#}", e);
    } else if !cmd.no_history {
        debug!("Run saved to history: {}", summary.execution_id);
    }

    match &result {
        PipelineResult::Succeeded { artifact } => {
            let artifact = artifact
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default();
            println!(
                "\n{} {} provisioned {} {}",
                CHECK,
                style(&pipeline.name).bold(),
                style("successfully").green(),
                style(artifact).dim()
            );
        }
        PipelineResult::Failed { error, .. } => {
            eprintln!("\n{} {}", style("[ERROR]").red().bold(), error);
            if let Some(hint) = error.hint() {
                eprintln!("{} {}", style("[HINT]").yellow().bold(), hint);
            }
            if let Some(output) = error.output().filter(|o| !o.trim().is_empty()) {
                eprintln!("{}", format_output(output, OUTPUT_TAIL_LINES));
            }
        }
    }

    Ok(result.exit_code())
}

fn validate_config(
    cmd: &ValidateCommand,
    project_dir: &Path,
    config_path: Option<&Path>,
) -> Result<i32> {
    let config = match load_config(project_dir, config_path) {
        Ok(config) => config,
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(format!("{:#}", e)).red());
            return Ok(1);
        }
    };
    let pipeline = config.to_pipeline();

    if cmd.json {
        let steps: Vec<_> = pipeline
            .steps
            .iter()
            .map(|step| {
                serde_json::json!({
                    "id": step.id,
                    "kind": step.kind(),
                    "description": step.description,
                })
            })
            .collect();
        let data = serde_json::json!({ "config": config, "steps": steps });
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(0);
    }

    println!(
        "{} Configuration is valid: {}",
        CHECK,
        style(&pipeline.name).bold()
    );
    for (index, step) in pipeline.steps.iter().enumerate() {
        println!("  {}", format_plan_step(index, step));
    }
    Ok(0)
}

async fn probe_tools(
    cmd: &ProbeCommand,
    project_dir: &Path,
    config_path: Option<&Path>,
) -> Result<i32> {
    let config = load_config(project_dir, config_path)?;
    let pipeline = config.to_pipeline();
    let prober = ToolProber::from_env(project_dir);
    let runner = SystemRunner::new().with_timeout(config.timeout_secs);

    let mut reports = Vec::new();
    for step in &pipeline.steps {
        let tool = match &step.action {
            StepAction::RequireTool { tool, .. } | StepAction::EnsureTool { tool, .. } => tool,
            _ => continue,
        };
        reports.push(prober.probe(tool, &runner).await);
    }

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for report in &reports {
            println!("{}", format_probe_report(report));
        }
    }

    Ok(if reports.iter().all(|r| r.is_found()) { 0 } else { 1 })
}

/// Recorded history, opened read-only; `None` when no run was ever saved
async fn open_history(project_dir: &Path) -> Result<Option<Arc<dyn PersistenceBackend>>> {
    #[cfg(feature = "sqlite")]
    {
        let store = provision::persistence::SqliteExecutionStore::open_existing(project_dir)
            .await
            .context("Failed to open run history")?;
        Ok(store.map(|s| Arc::new(s) as Arc<dyn PersistenceBackend>))
    }
    #[cfg(not(feature = "sqlite"))]
    {
        let _ = project_dir;
        Ok(None)
    }
}

async fn show_history(cmd: &HistoryCommand, project_dir: &Path) -> Result<i32> {
    let Some(store) = open_history(project_dir).await? else {
        if cmd.json {
            let data = serde_json::json!({ "executions": [] });
            println!("{}", serde_json::to_string_pretty(&data)?);
        } else {
            println!("{} No runs recorded yet", INFO);
        }
        return Ok(0);
    };

    // If specific execution ID is requested
    if let Some(exec_id_str) = &cmd.execution_id {
        let exec_id = uuid::Uuid::parse_str(exec_id_str).context("Invalid execution ID format")?;
        match store.load_execution(exec_id).await? {
            Some(summary) => print_execution_details(&summary, cmd.json)?,
            None => println!("{} Execution not found", WARN),
        }
        return Ok(0);
    }

    let executions = store.list_recent(cmd.limit).await?;

    if cmd.json {
        let data = serde_json::json!({ "executions": executions });
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(0);
    }

    if executions.is_empty() {
        println!("{} No runs recorded yet", INFO);
        return Ok(0);
    }

    println!("{} Run history (latest {}):", INFO, executions.len());
    for summary in &executions {
        println!("  {}", format_execution_summary(summary));
    }

    Ok(0)
}

fn print_execution_details(summary: &ExecutionSummary, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }

    println!("{} Run Details", INFO);
    println!("  ID: {}", style(summary.execution_id).cyan());
    println!("  Pipeline: {}", style(&summary.pipeline_name).bold());
    println!("  Status: {}", format_status(summary.status));
    println!("  Started: {}", style(summary.started_at.to_rfc3339()).dim());
    if let Some(completed) = summary.completed_at {
        println!("  Finished: {}", style(completed.to_rfc3339()).dim());
        if let Ok(duration) = completed.signed_duration_since(summary.started_at).to_std() {
            println!("  Duration: {}", style(format_duration(duration)).dim());
        }
    }
    println!(
        "  Progress: {} ({}/{})",
        style(format!("{:.0}%", summary.progress() * 100.0)).cyan(),
        summary.completed_steps,
        summary.total_steps
    );
    if let Some(step) = &summary.failed_step {
        println!("  Failed at: {}", style(step).red());
    }
    if let Some(artifact) = &summary.artifact {
        println!("  Artifact: {}", style(artifact).green());
    }

    Ok(())
}
