//! Resolution diagnostics
//!
//! Non-fatal conditions observed while resolving roles. They are returned
//! alongside the roles and logged by the caller.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Diagnostic severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Debug,
    Info,
    #[default]
    Warn,
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(Severity::Debug),
            "info" => Ok(Severity::Info),
            "warn" | "warning" => Ok(Severity::Warn),
            other => Err(format!("unknown severity '{}'", other)),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Debug => "debug",
            Severity::Info => "info",
            Severity::Warn => "warn",
        })
    }
}

/// What was observed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// No user entry matched the account name
    UserNotFound { account: String },

    /// No group entry matched a referenced group name
    GroupNotFound { group: String },

    /// A filter expected to match one entry matched several; the first was used
    AmbiguousMatch {
        filter: String,
        base_dn: String,
        count: usize,
    },

    /// Ancestry above `group` was not followed because of the depth limit
    DepthLimitReached { group: String, depth: usize },

    /// Expansion stopped after `limit` distinct groups
    GroupLimitReached { limit: usize },
}

impl DiagnosticKind {
    pub fn default_severity(&self) -> Severity {
        match self {
            DiagnosticKind::UserNotFound { .. } => Severity::Info,
            DiagnosticKind::GroupNotFound { .. } => Severity::Debug,
            DiagnosticKind::AmbiguousMatch { .. }
            | DiagnosticKind::DepthLimitReached { .. }
            | DiagnosticKind::GroupLimitReached { .. } => Severity::Warn,
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticKind::UserNotFound { account } => {
                write!(f, "No directory entry found for user '{}'", account)
            }
            DiagnosticKind::GroupNotFound { group } => {
                write!(f, "No directory entry found for group '{}'", group)
            }
            DiagnosticKind::AmbiguousMatch {
                filter,
                base_dn,
                count,
            } => write!(
                f,
                "More than one response ({}) received for query: {} with distinguished name: {}",
                count, filter, base_dn
            ),
            DiagnosticKind::DepthLimitReached { group, depth } => write!(
                f,
                "Not resolving groups above '{}': depth limit {} reached",
                group, depth
            ),
            DiagnosticKind::GroupLimitReached { limit } => {
                write!(f, "Stopped resolving after {} groups", limit)
            }
        }
    }
}

/// A diagnostic record with its severity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    #[serde(flatten)]
    pub kind: DiagnosticKind,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind) -> Self {
        Self {
            severity: kind.default_severity(),
            kind,
        }
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn is_ambiguous_match(&self) -> bool {
        matches!(self.kind, DiagnosticKind::AmbiguousMatch { .. })
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.severity, self.kind)
    }
}
