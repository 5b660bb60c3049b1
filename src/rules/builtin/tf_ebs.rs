use super::{bool_attr, owned};
use crate::error::Result;
use crate::ir::{Dialect, Resource};
use crate::rules::{Category, Predicate, RuleMetadata, Severity, Violation};

/// TF-EBS-001: unencrypted EBS volumes, or account-level default encryption
/// switched off.
pub struct UnencryptedVolumes;

impl Predicate for UnencryptedVolumes {
    fn metadata(&self) -> RuleMetadata {
        RuleMetadata {
            id: "TF-EBS-001".into(),
            name: "EBS encryption disabled".into(),
            description: "EBS volume is not encrypted, or encryption by default is disabled".into(),
            dialect: self.dialect(),
            resource_types: owned(self.resource_types()),
            default_severity: Severity::High,
            category: Category::Encryption,
            message_open: "EBS volumes are not encrypted".into(),
            message_closed: "EBS volumes are encrypted".into(),
            remediation: Some("Set encrypted = true, or enabled = true on aws_ebs_encryption_by_default.".into()),
        }
    }

    fn dialect(&self) -> Dialect {
        Dialect::Block
    }

    fn resource_types(&self) -> &'static [&'static str] {
        &["aws_ebs_volume", "aws_ebs_encryption_by_default"]
    }

    fn inspect(&self, resource: &Resource) -> Result<Vec<Violation>> {
        let (key, default) = match resource.resource_type.as_str() {
            "aws_ebs_encryption_by_default" => ("enabled", true),
            _ => ("encrypted", false),
        };
        if bool_attr(resource, key, default)? != Some(false) {
            return Ok(vec![]);
        }
        Ok(vec![Violation::new(
            format!("{}/{key}", resource.resource_type),
            "is not encrypted",
        )])
    }
}
