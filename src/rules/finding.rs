use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::ir::{Dialect, Resource};

/// A single predicate violation on one resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Finding {
    /// Rule identifier (e.g., "TF-EC2-001").
    pub rule_id: String,
    /// Human-readable rule name.
    pub rule_name: String,
    pub severity: Severity,
    pub category: Category,
    /// Template the resource was declared in.
    pub path: PathBuf,
    /// Resource type, e.g. `aws_security_group`.
    pub resource_type: String,
    /// Logical name of the offending resource.
    pub identifier: String,
    /// Which part of the resource is at fault, e.g. `cidr_blocks/0.0.0.0/0`.
    pub entity: String,
    pub reason: String,
    /// 1-based line, 0 when unknown.
    pub line: usize,
    /// Stable hash of rule, file, resource, entity and reason.
    pub fingerprint: String,
}

impl Finding {
    pub fn new(rule: &RuleMetadata, resource: &Resource, violation: Violation) -> Self {
        let fingerprint = fingerprint(
            &rule.id,
            &resource.path.display().to_string(),
            &violation.entity,
            &resource.name,
            &violation.reason,
        );
        Self {
            rule_id: rule.id.clone(),
            rule_name: rule.name.clone(),
            severity: rule.default_severity,
            category: rule.category,
            path: resource.path.clone(),
            resource_type: resource.resource_type.clone(),
            identifier: resource.name.clone(),
            entity: violation.entity,
            reason: violation.reason,
            line: violation.line.unwrap_or(resource.line),
            fingerprint,
        }
    }

    /// `path:line` for display; the line is omitted when unknown.
    pub fn location(&self) -> String {
        if self.line > 0 {
            format!("{}:{}", self.path.display(), self.line)
        } else {
            self.path.display().to_string()
        }
    }
}

fn fingerprint(rule_id: &str, path: &str, entity: &str, identifier: &str, reason: &str) -> String {
    let mut hasher = Sha256::new();
    for part in [rule_id, path, entity, identifier, reason] {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    hex::encode(hasher.finalize())
}

/// What a predicate reports about one resource. Turned into a [`Finding`]
/// once the resource and rule are known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub entity: String,
    pub reason: String,
    /// More precise line than the resource header, when known.
    pub line: Option<usize>,
}

impl Violation {
    pub fn new(entity: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            reason: reason.into(),
            line: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn from_str_lenient(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "info" => Some(Self::Info),
            "low" => Some(Self::Low),
            "medium" | "med" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" | "crit" => Some(Self::Critical),
            _ => None,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// Security concern a rule belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    NetworkExposure,
    Encryption,
    KeyManagement,
    ExcessivePermissions,
    InstanceHardening,
    PublicAccess,
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NetworkExposure => write!(f, "Network Exposure"),
            Self::Encryption => write!(f, "Encryption"),
            Self::KeyManagement => write!(f, "Key Management"),
            Self::ExcessivePermissions => write!(f, "Excessive Permissions"),
            Self::InstanceHardening => write!(f, "Instance Hardening"),
            Self::PublicAccess => write!(f, "Public Access"),
        }
    }
}

/// Metadata about a predicate, used for `list-rules` output and reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleMetadata {
    pub id: String,
    pub name: String,
    pub description: String,
    pub dialect: Dialect,
    pub resource_types: Vec<String>,
    pub default_severity: Severity,
    pub category: Category,
    /// Result message when the rule finds violations.
    pub message_open: String,
    /// Result message when it finds none.
    pub message_closed: String,
    pub remediation: Option<String>,
}
