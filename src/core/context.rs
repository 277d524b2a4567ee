//! Pipeline context - what earlier steps resolved for later ones

use crate::core::step::Program;
use crate::probe::ToolReference;
use crate::stages::EnvironmentHandle;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Execution context for a pipeline run
///
/// Tool references are recorded once and never replaced.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    /// Root for every relative path
    pub project_dir: PathBuf,

    /// Resolved tools by name
    tools: HashMap<String, ToolReference>,

    /// The isolated environment, once built
    pub environment: Option<EnvironmentHandle>,

    /// The verified artifact, once produced
    pub artifact: Option<PathBuf>,
}

impl PipelineContext {
    pub fn new(project_dir: impl Into<PathBuf>) -> Self {
        Self {
            project_dir: project_dir.into(),
            tools: HashMap::new(),
            environment: None,
            artifact: None,
        }
    }

    /// Record a resolved tool; the first resolution wins
    pub fn resolve_tool(&mut self, tool: ToolReference) {
        self.tools.entry(tool.name.clone()).or_insert(tool);
    }

    pub fn tool(&self, name: &str) -> Option<&ToolReference> {
        self.tools.get(name)
    }

    /// Path relative to the project directory
    pub fn project_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_dir.join(path)
        }
    }

    /// Executable for a `Run` step
    pub fn program_path(&self, program: &Program) -> Result<PathBuf, String> {
        match program {
            Program::Tool(name) => self
                .tool(name)
                .map(|t| t.path.clone())
                .ok_or_else(|| format!("tool '{}' has not been resolved", name)),
            Program::EnvironmentInterpreter => self
                .environment
                .as_ref()
                .map(|env| env.interpreter.clone())
                .ok_or_else(|| "the isolated environment has not been built".to_string()),
            Program::Path(path) => Ok(self.project_path(path)),
        }
    }
}
