use super::{bool_attr, owned, window_violation};
use crate::error::Result;
use crate::ir::{Dialect, Resource};
use crate::rules::{Category, Predicate, RuleMetadata, Severity, Violation};

/// TF-KMS-001: customer keys without automatic rotation.
pub struct KeyRotationDisabled;

impl Predicate for KeyRotationDisabled {
    fn metadata(&self) -> RuleMetadata {
        RuleMetadata {
            id: "TF-KMS-001".into(),
            name: "KMS key rotation disabled".into(),
            description: "KMS key does not enable automatic key rotation".into(),
            dialect: self.dialect(),
            resource_types: owned(self.resource_types()),
            default_severity: Severity::Medium,
            category: Category::KeyManagement,
            message_open: "KMS keys have key rotation disabled".into(),
            message_closed: "KMS keys have key rotation enabled".into(),
            remediation: Some("Set enable_key_rotation = true.".into()),
        }
    }

    fn dialect(&self) -> Dialect {
        Dialect::Block
    }

    fn resource_types(&self) -> &'static [&'static str] {
        &["aws_kms_key"]
    }

    fn inspect(&self, resource: &Resource) -> Result<Vec<Violation>> {
        if bool_attr(resource, "enable_key_rotation", false)? != Some(false) {
            return Ok(vec![]);
        }
        Ok(vec![Violation::new(
            "aws_kms_key/enable_key_rotation",
            "key rotation is disabled",
        )])
    }
}

/// TF-KMS-002: deletion window other than exactly 30 days.
pub struct DeletionWindow;

impl Predicate for DeletionWindow {
    fn metadata(&self) -> RuleMetadata {
        RuleMetadata {
            id: "TF-KMS-002".into(),
            name: "KMS deletion window".into(),
            description: "KMS key deletion window is not exactly 30 days".into(),
            dialect: self.dialect(),
            resource_types: owned(self.resource_types()),
            default_severity: Severity::Low,
            category: Category::KeyManagement,
            message_open: "KMS keys have a deletion window other than 30 days".into(),
            message_closed: "KMS keys have a 30 day deletion window".into(),
            remediation: Some("Set deletion_window_in_days = 30.".into()),
        }
    }

    fn dialect(&self) -> Dialect {
        Dialect::Block
    }

    fn resource_types(&self) -> &'static [&'static str] {
        &["aws_kms_key"]
    }

    fn inspect(&self, resource: &Resource) -> Result<Vec<Violation>> {
        Ok(window_violation(
            resource.get("deletion_window_in_days"),
            30,
            "aws_kms_key/deletion_window_in_days",
        )
        .into_iter()
        .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::builtin::test_support::resource;
    use serde_json::json;

    #[test]
    fn rotation_absent_is_flagged() {
        let key = resource("aws_kms_key", json!({"description": "k"}));
        assert_eq!(KeyRotationDisabled.inspect(&key).unwrap().len(), 1);
    }

    #[test]
    fn rotation_enabled_passes() {
        let key = resource("aws_kms_key", json!({"enable_key_rotation": true}));
        assert!(KeyRotationDisabled.inspect(&key).unwrap().is_empty());
    }

    #[test]
    fn rotation_from_variable_is_not_judged() {
        let key = resource("aws_kms_key", json!({"enable_key_rotation": {"__expr__": "var.rotate"}}));
        assert!(KeyRotationDisabled.inspect(&key).unwrap().is_empty());

        let garbled = resource("aws_kms_key", json!({"enable_key_rotation": "maybe"}));
        assert!(KeyRotationDisabled.inspect(&garbled).is_err());
    }

    #[test]
    fn deletion_window_is_exact() {
        let short = resource("aws_kms_key", json!({"deletion_window_in_days": 14}));
        let violations = DeletionWindow.inspect(&short).unwrap();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].entity, "aws_kms_key/deletion_window_in_days/14");

        let exact = resource("aws_kms_key", json!({"deletion_window_in_days": 30}));
        assert!(DeletionWindow.inspect(&exact).unwrap().is_empty());

        let absent = resource("aws_kms_key", json!({}));
        assert!(DeletionWindow.inspect(&absent).unwrap().is_empty());
    }
}
