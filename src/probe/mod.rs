//! Environment prober - finds a usable executable for a tool
//!
//! Candidates come from the search path in order. Each one is checked
//! against the [`StubPolicy`] and, optionally, by running it once; the
//! first candidate passing both becomes the [`ToolReference`].

pub mod policy;

use crate::runner::{Invocation, ProcessRunner};
pub use policy::{StubPolicy, StubRule};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// What to look for
#[derive(Debug, Clone)]
pub struct ToolSpec {
    /// Executable name (without extension on Windows)
    pub name: String,

    /// Arguments for the usability check; empty skips the check
    pub verify_args: Vec<String>,

    /// Locations that never yield a real tool
    pub policy: StubPolicy,

    /// Directories searched after the regular search path
    pub extra_locations: Vec<PathBuf>,
}

impl ToolSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            verify_args: Vec::new(),
            policy: StubPolicy::default(),
            extra_locations: Vec::new(),
        }
    }

    pub fn with_verify_args(mut self, args: Vec<String>) -> Self {
        self.verify_args = args;
        self
    }

    pub fn with_policy(mut self, policy: StubPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_extra_locations(mut self, locations: Vec<PathBuf>) -> Self {
        self.extra_locations = locations;
        self
    }
}

/// A resolved, accepted executable. Never mutated after resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolReference {
    pub name: String,

    /// Absolute path to the executable
    pub path: PathBuf,

    /// First line of the verify output, if the check ran
    pub version: Option<String>,
}

/// Why a candidate was or was not selected
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "lowercase")]
pub enum CandidateVerdict {
    Accepted { version: Option<String> },
    Stub { rule: String },
    Unusable { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub path: PathBuf,
    #[serde(flatten)]
    pub verdict: CandidateVerdict,
}

/// Outcome of one probe: every examined candidate plus the selection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeReport {
    pub tool: String,
    pub candidates: Vec<Candidate>,
    pub selected: Option<ToolReference>,
}

impl ProbeReport {
    pub fn is_found(&self) -> bool {
        self.selected.is_some()
    }

    pub fn rejected(&self) -> usize {
        self.candidates
            .iter()
            .filter(|c| !matches!(c.verdict, CandidateVerdict::Accepted { .. }))
            .count()
    }
}

/// Searches a fixed list of directories for tools
#[derive(Debug, Clone)]
pub struct ToolProber {
    search_path: Vec<PathBuf>,
    cwd: PathBuf,
}

impl ToolProber {
    /// Use the process PATH
    pub fn from_env(cwd: impl Into<PathBuf>) -> Self {
        let search_path = std::env::var_os("PATH")
            .map(|paths| std::env::split_paths(&paths).collect())
            .unwrap_or_default();
        Self {
            search_path,
            cwd: cwd.into(),
        }
    }

    /// Use an explicit directory list instead of PATH
    pub fn with_search_path(search_path: Vec<PathBuf>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            search_path,
            cwd: cwd.into(),
        }
    }

    pub fn search_path(&self) -> &[PathBuf] {
        &self.search_path
    }

    /// All files named like the tool, in search order, as absolute paths
    pub fn candidates(&self, spec: &ToolSpec) -> Vec<PathBuf> {
        let mut found: Vec<PathBuf> = Vec::new();

        for dir in self.search_path.iter().chain(&spec.extra_locations) {
            if dir.as_os_str().is_empty() {
                continue;
            }
            let matches = match which::which_in_all(&spec.name, Some(dir.as_os_str()), &self.cwd) {
                Ok(matches) => matches,
                Err(e) => {
                    debug!("Skipping search dir {}: {}", dir.display(), e);
                    continue;
                }
            };
            for candidate in matches {
                let candidate = policy::absolutize(&candidate, &self.cwd);
                if !found.contains(&candidate) {
                    found.push(candidate);
                }
            }
        }

        found
    }

    /// Find the first candidate that is neither a stub nor broken
    pub async fn probe<R: ProcessRunner + ?Sized>(&self, spec: &ToolSpec, runner: &R) -> ProbeReport {
        let mut report = ProbeReport {
            tool: spec.name.clone(),
            candidates: Vec::new(),
            selected: None,
        };

        for path in self.candidates(spec) {
            if let Some(rule) = spec.policy.denying_rule(&path) {
                info!("Ignoring stub {} ({})", path.display(), rule);
                report.candidates.push(Candidate {
                    path,
                    verdict: CandidateVerdict::Stub {
                        rule: rule.to_string(),
                    },
                });
                continue;
            }

            match verify(&path, spec, runner).await {
                Ok(version) => {
                    info!("Found {} at {}", spec.name, path.display());
                    report.selected = Some(ToolReference {
                        name: spec.name.clone(),
                        path: path.clone(),
                        version: version.clone(),
                    });
                    report.candidates.push(Candidate {
                        path,
                        verdict: CandidateVerdict::Accepted { version },
                    });
                    break;
                }
                Err(reason) => {
                    warn!("Candidate {} is unusable: {}", path.display(), reason);
                    report.candidates.push(Candidate {
                        path,
                        verdict: CandidateVerdict::Unusable { reason },
                    });
                }
            }
        }

        if report.selected.is_none() {
            info!(
                "No usable {} found ({} candidates rejected)",
                spec.name,
                report.rejected()
            );
        }

        report
    }
}

/// Run the usability check; Ok carries the version line
async fn verify<R: ProcessRunner + ?Sized>(
    path: &Path,
    spec: &ToolSpec,
    runner: &R,
) -> Result<Option<String>, String> {
    if spec.verify_args.is_empty() {
        return Ok(None);
    }

    let invocation = Invocation::new(path).args(spec.verify_args.iter().cloned());
    match runner.run(&invocation).await {
        Ok(output) if output.is_success() => Ok(output.first_line()),
        Ok(output) => Err(format!(
            "'{}' exited with code {:?}",
            invocation, output.exit_code
        )),
        Err(e) => Err(e.to_string()),
    }
}
