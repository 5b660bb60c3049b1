use serde::{Deserialize, Serialize};

use super::{Finding, RuleMetadata};

/// Outcome of one predicate over a whole directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    /// At least one violation was found.
    Open,
    /// The walk completed and found nothing.
    Closed,
    /// The walk itself could not complete.
    Unknown,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "OPEN"),
            Self::Closed => write!(f, "CLOSED"),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Aggregated result of one predicate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResult {
    pub rule_id: String,
    pub status: Status,
    /// Message matching the status.
    pub message: String,
    pub message_open: String,
    pub message_closed: String,
    pub findings: Vec<Finding>,
    /// Resources of the requested types that were inspected.
    pub resources_inspected: usize,
    /// Why the result is `UNKNOWN`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ScanResult {
    /// `OPEN` when there are findings, `CLOSED` otherwise.
    pub fn aggregate(
        rule_id: impl Into<String>,
        findings: Vec<Finding>,
        message_open: impl Into<String>,
        message_closed: impl Into<String>,
    ) -> Self {
        let message_open = message_open.into();
        let message_closed = message_closed.into();
        let (status, message) = if findings.is_empty() {
            (Status::Closed, message_closed.clone())
        } else {
            (Status::Open, message_open.clone())
        };
        Self {
            rule_id: rule_id.into(),
            status,
            message,
            message_open,
            message_closed,
            findings,
            resources_inspected: 0,
            error: None,
        }
    }

    /// A result for a scan that could not be judged.
    pub fn unknown(rule: &RuleMetadata, error: impl std::fmt::Display) -> Self {
        let error = error.to_string();
        Self {
            rule_id: rule.id.clone(),
            status: Status::Unknown,
            message: format!("could not complete scan: {error}"),
            message_open: rule.message_open.clone(),
            message_closed: rule.message_closed.clone(),
            findings: Vec::new(),
            resources_inspected: 0,
            error: Some(error),
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == Status::Open
    }

    pub fn is_closed(&self) -> bool {
        self.status == Status::Closed
    }

    pub fn is_unknown(&self) -> bool {
        self.status == Status::Unknown
    }

    /// Number of findings.
    pub fn vulns_number(&self) -> usize {
        self.findings.len()
    }
}

/// Free-function form of [`ScanResult::aggregate`].
pub fn aggregate(
    rule_id: &str,
    findings: Vec<Finding>,
    message_open: &str,
    message_closed: &str,
) -> ScanResult {
    ScanResult::aggregate(rule_id, findings, message_open, message_closed)
}
