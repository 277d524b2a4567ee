//! CLI output formatting

use crate::{
    core::{ExecutionStatus, Step},
    execution::ExecutionEvent,
    persistence::ExecutionSummary,
    probe::{CandidateVerdict, ProbeReport},
};
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "! ");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");
pub static SKIP: Emoji<'_, '_> = Emoji("⏭️  ", "- ");

/// Spinner shown while a step runs
pub fn create_step_spinner(message: String) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

/// Format an execution status for display
pub fn format_status(status: ExecutionStatus) -> String {
    match status {
        ExecutionStatus::Pending => style("PENDING").dim().to_string(),
        ExecutionStatus::Running => style("RUNNING").yellow().to_string(),
        ExecutionStatus::Completed => style("COMPLETED").green().to_string(),
        ExecutionStatus::Failed => style("FAILED").red().to_string(),
    }
}

/// One line of the step plan
pub fn format_plan_step(index: usize, step: &Step) -> String {
    format!(
        "{:>2}. {} {} {}",
        index + 1,
        style(&step.id).cyan(),
        style(format!("[{}]", step.kind())).dim(),
        step.description
    )
}

/// Format execution summary for display
pub fn format_execution_summary(summary: &ExecutionSummary) -> String {
    let status_icon = match summary.status {
        ExecutionStatus::Completed => CHECK,
        ExecutionStatus::Failed => CROSS,
        ExecutionStatus::Running => SPINNER,
        ExecutionStatus::Pending => INFO,
    };

    let mut line = format!(
        "{} {} - {} - {} - {} ({}/{})",
        status_icon,
        style(short_id(&summary.execution_id)).dim(),
        style(summary.started_at.format("%Y-%m-%d %H:%M:%S")).dim(),
        style(&summary.pipeline_name).bold(),
        format_status(summary.status),
        summary.completed_steps,
        summary.total_steps,
    );
    if let Some(step) = &summary.failed_step {
        line.push_str(&format!(" at {}", style(step).red()));
    }
    line
}

/// Format a probe report: every candidate with its verdict
pub fn format_probe_report(report: &ProbeReport) -> String {
    let mut lines = Vec::new();
    match &report.selected {
        Some(tool) => lines.push(format!(
            "{} {} {} {}",
            CHECK,
            style(&report.tool).bold(),
            tool.path.display(),
            style(tool.version.as_deref().unwrap_or("")).dim()
        )),
        None => lines.push(format!("{} {} not found", CROSS, style(&report.tool).bold())),
    }

    for candidate in &report.candidates {
        let verdict = match &candidate.verdict {
            CandidateVerdict::Accepted { .. } => style("accepted".to_string()).green(),
            CandidateVerdict::Stub { rule } => style(format!("stub ({})", rule)).yellow(),
            CandidateVerdict::Unusable { reason } => {
                style(format!("unusable ({})", reason)).red()
            }
        };
        lines.push(format!("    {} {}", candidate.path.display(), verdict));
    }
    lines.join("\n")
}

/// Format an execution event for display
pub fn format_execution_event(event: &ExecutionEvent) -> Option<String> {
    let line = match event {
        ExecutionEvent::PipelineStarted {
            execution_id,
            pipeline_name,
            total_steps,
        } => format!(
            "{} Provisioning {} ({} steps, {})",
            ROCKET,
            style(pipeline_name).bold(),
            total_steps,
            style(short_id(execution_id)).dim()
        ),
        ExecutionEvent::StepStarted { .. } => return None,
        ExecutionEvent::ToolProbed {
            tool,
            found,
            rejected,
            ..
        } => {
            let ignored = if *rejected > 0 {
                style(format!(" ({} candidate(s) ignored)", rejected))
                    .dim()
                    .to_string()
            } else {
                String::new()
            };
            match found {
                Some(path) => format!(
                    "  {} {} found at {}{}",
                    INFO,
                    style(tool).cyan(),
                    path.display(),
                    ignored
                ),
                None => format!("  {} {} not found{}", WARN, style(tool).yellow(), ignored),
            }
        }
        ExecutionEvent::RemediationStarted { tool, package, .. } => format!(
            "  {} Installing {} ({})",
            SPINNER,
            style(tool).cyan(),
            style(package).dim()
        ),
        ExecutionEvent::RemediationFinished { outcome, .. } => {
            format!("  {} {}", INFO, style(outcome).dim())
        }
        ExecutionEvent::CommandStarted { command, .. } => {
            format!("  {} {}", style("$").dim(), style(command).dim())
        }
        ExecutionEvent::StepCompleted { step_id, detail } => {
            format!("{} {} {}", CHECK, style(step_id).green(), style(detail).dim())
        }
        ExecutionEvent::StepFailed { step_id, error, .. } => {
            format!("{} {}: {}", CROSS, style(step_id).red(), error)
        }
        ExecutionEvent::StepSkipped { step_id, .. } => {
            format!("{} {}", SKIP, style(step_id).dim())
        }
        ExecutionEvent::PipelineCompleted { .. } => return None,
    };
    Some(line)
}

/// Last `max_lines` lines of subprocess output
pub fn format_output(output: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = output.lines().collect();

    if lines.len() <= max_lines {
        output.trim_end().to_string()
    } else {
        let tail = lines[lines.len() - max_lines..].join("\n");
        format!(
            "{} ({} earlier lines)\n{}",
            style("[truncated]").dim(),
            lines.len() - max_lines,
            tail
        )
    }
}

pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

fn short_id(id: &uuid::Uuid) -> String {
    id.to_string()[..8].to_string()
}
