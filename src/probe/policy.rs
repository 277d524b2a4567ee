//! Allow/deny predicate for stub and alias executables

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// One deny rule over resolved absolute paths
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StubRule {
    /// Any path containing this directory name (case-insensitive)
    Component(String),
    /// Any path under this directory (case-insensitive, component-wise)
    Prefix(PathBuf),
}

impl StubRule {
    pub fn matches(&self, path: &Path) -> bool {
        match self {
            StubRule::Component(name) => {
                let name = name.to_lowercase();
                normal_components(path).iter().any(|c| *c == name)
            }
            StubRule::Prefix(prefix) => {
                let prefix = all_components(prefix);
                let path = all_components(path);
                !prefix.is_empty() && path.len() >= prefix.len() && path[..prefix.len()] == prefix[..]
            }
        }
    }
}

impl fmt::Display for StubRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StubRule::Component(name) => write!(f, "inside a '{}' directory", name),
            StubRule::Prefix(prefix) => write!(f, "under {}", prefix.display()),
        }
    }
}

/// Rejects candidates living in known stub locations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StubPolicy {
    rules: Vec<StubRule>,
}

impl StubPolicy {
    /// Build from plain component names and prefix strings
    pub fn from_lists(components: &[String], prefixes: &[String]) -> Self {
        let rules = components
            .iter()
            .map(|c| StubRule::Component(c.clone()))
            .chain(prefixes.iter().map(|p| StubRule::Prefix(PathBuf::from(p))))
            .collect();
        Self { rules }
    }

    /// The first rule denying this path, if any
    ///
    /// Both the path as found and the file it resolves to are checked, so a
    /// symlink elsewhere on the search path cannot smuggle a stub in.
    pub fn denying_rule(&self, path: &Path) -> Option<&StubRule> {
        if let Some(rule) = self.rules.iter().find(|rule| rule.matches(path)) {
            return Some(rule);
        }
        let resolved = std::fs::canonicalize(path).ok()?;
        self.rules.iter().find(|rule| rule.matches(&resolved))
    }

    pub fn allows(&self, path: &Path) -> bool {
        self.denying_rule(path).is_none()
    }
}

/// Resolve `path` against `base` when relative
pub fn absolutize(path: &Path, base: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

fn normal_components(path: &Path) -> Vec<String> {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().to_lowercase()),
            _ => None,
        })
        .collect()
}

fn all_components(path: &Path) -> Vec<String> {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .map(|c| c.as_os_str().to_string_lossy().to_lowercase())
        .collect()
}
