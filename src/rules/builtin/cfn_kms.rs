use super::{literal_bool, owned, window_violation};
use crate::error::Result;
use crate::ir::{Dialect, Resource};
use crate::rules::{Category, Predicate, RuleMetadata, Severity, Violation};

/// CFN-KMS-001: customer keys without automatic rotation.
pub struct KeyRotationDisabled;

impl Predicate for KeyRotationDisabled {
    fn metadata(&self) -> RuleMetadata {
        RuleMetadata {
            id: "CFN-KMS-001".into(),
            name: "KMS key rotation disabled".into(),
            description: "KMS key does not enable automatic key rotation".into(),
            dialect: self.dialect(),
            resource_types: owned(self.resource_types()),
            default_severity: Severity::Medium,
            category: Category::KeyManagement,
            message_open: "KMS keys have key rotation disabled".into(),
            message_closed: "KMS keys have key rotation enabled".into(),
            remediation: Some("Set EnableKeyRotation: true.".into()),
        }
    }

    fn dialect(&self) -> Dialect {
        Dialect::Declarative
    }

    fn resource_types(&self) -> &'static [&'static str] {
        &["AWS::KMS::Key"]
    }

    fn inspect(&self, resource: &Resource) -> Result<Vec<Violation>> {
        if literal_bool(resource.get("EnableKeyRotation"), false) != Some(false) {
            return Ok(vec![]);
        }
        Ok(vec![Violation::new(
            "AWS::KMS::Key/EnableKeyRotation",
            "key rotation is disabled",
        )])
    }
}

/// CFN-KMS-002: pending deletion window other than exactly 30 days.
pub struct PendingWindow;

impl Predicate for PendingWindow {
    fn metadata(&self) -> RuleMetadata {
        RuleMetadata {
            id: "CFN-KMS-002".into(),
            name: "KMS pending window".into(),
            description: "KMS key PendingWindowInDays is not exactly 30 days".into(),
            dialect: self.dialect(),
            resource_types: owned(self.resource_types()),
            default_severity: Severity::Low,
            category: Category::KeyManagement,
            message_open: "KMS keys have a pending window other than 30 days".into(),
            message_closed: "KMS keys have a 30 day pending window".into(),
            remediation: Some("Set PendingWindowInDays: 30.".into()),
        }
    }

    fn dialect(&self) -> Dialect {
        Dialect::Declarative
    }

    fn resource_types(&self) -> &'static [&'static str] {
        &["AWS::KMS::Key"]
    }

    fn inspect(&self, resource: &Resource) -> Result<Vec<Violation>> {
        Ok(window_violation(
            resource.get("PendingWindowInDays"),
            30,
            "AWS::KMS::Key/PendingWindowInDays",
        )
        .into_iter()
        .collect())
    }
}
