//! Success predicates for process results

use crate::runner::CommandOutput;
use regex::Regex;
use tracing::warn;

/// Pattern for matching process output (not serializable due to Regex)
#[derive(Debug, Clone)]
pub enum ConditionPattern {
    /// Case-insensitive substring match
    Simple(String),
    /// Regular expression match
    Regex(Regex),
}

impl ConditionPattern {
    /// Build a pattern, falling back to a substring match when the regex is invalid
    pub fn new(pattern: &str, use_regex: bool) -> Self {
        if use_regex {
            match Regex::new(pattern) {
                Ok(regex) => ConditionPattern::Regex(regex),
                Err(e) => {
                    warn!("Invalid regex '{}', matching it as plain text: {}", pattern, e);
                    ConditionPattern::Simple(pattern.to_string())
                }
            }
        } else {
            ConditionPattern::Simple(pattern.to_string())
        }
    }

    /// Check if the pattern matches the given text
    pub fn matches(&self, text: &str) -> bool {
        match self {
            ConditionPattern::Simple(pattern) => {
                text.to_lowercase().contains(&pattern.to_lowercase())
            }
            ConditionPattern::Regex(regex) => regex.is_match(text),
        }
    }

    pub fn display(&self) -> String {
        match self {
            ConditionPattern::Simple(s) => s.clone(),
            ConditionPattern::Regex(r) => format!("[regex: {}]", r.as_str()),
        }
    }
}

/// Verdict of a success predicate over one process result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Exit code 0
    Success,
    /// Non-zero exit whose cause is explicitly tolerated
    Tolerated(String),
    /// Anything else
    Failure,
}

/// Decides whether a finished process counts as success
///
/// Exit code 0 is always success. A non-zero exit is tolerated only when the
/// code is listed or the output matches the tolerated pattern.
#[derive(Debug, Clone, Default)]
pub struct SuccessPredicate {
    pub tolerated_exit_codes: Vec<i32>,
    pub tolerated_output: Option<ConditionPattern>,
}

impl SuccessPredicate {
    /// Plain "exit code == 0"
    pub fn exit_zero() -> Self {
        Self::default()
    }

    pub fn tolerating(exit_codes: Vec<i32>, output: Option<ConditionPattern>) -> Self {
        Self {
            tolerated_exit_codes: exit_codes,
            tolerated_output: output,
        }
    }

    pub fn evaluate(&self, output: &CommandOutput) -> Verdict {
        if output.is_success() {
            return Verdict::Success;
        }

        if let Some(code) = output.exit_code {
            if self.tolerated_exit_codes.contains(&code) {
                return Verdict::Tolerated(format!("exit code {} is tolerated", code));
            }
        }

        if let Some(pattern) = &self.tolerated_output {
            if pattern.matches(&output.combined()) {
                return Verdict::Tolerated(format!(
                    "output matched '{}'",
                    pattern.display()
                ));
            }
        }

        Verdict::Failure
    }
}
