use serde_json::Value;

use super::{literal_bool, owned};
use crate::analysis::privilege::{has_effect, resource_all, statements};
use crate::error::Result;
use crate::ir::value::{as_sequence, to_boolean};
use crate::ir::{Dialect, Resource};
use crate::rules::{Category, Predicate, RuleMetadata, Severity, Violation};

/// Canned ACLs that grant access beyond the bucket owner.
const NON_PRIVATE_ACLS: &[&str] = &[
    "PublicRead",
    "PublicReadWrite",
    "AuthenticatedRead",
    "BucketOwnerRead",
    "BucketOwnerFullControl",
    "AwsExecRead",
    "LogDeliveryWrite",
];

/// CFN-S3-001: buckets with a canned ACL other than `Private`.
pub struct NotPrivateAccessControl;

impl Predicate for NotPrivateAccessControl {
    fn metadata(&self) -> RuleMetadata {
        RuleMetadata {
            id: "CFN-S3-001".into(),
            name: "S3 bucket not private".into(),
            description: "S3 bucket AccessControl is set to a canned ACL other than Private".into(),
            dialect: self.dialect(),
            resource_types: owned(self.resource_types()),
            default_severity: Severity::High,
            category: Category::PublicAccess,
            message_open: "S3 Bucket has not Private Access Control".into(),
            message_closed: "S3 Bucket has Private Access Control".into(),
            remediation: Some("Remove AccessControl or set it to Private.".into()),
        }
    }

    fn dialect(&self) -> Dialect {
        Dialect::Declarative
    }

    fn resource_types(&self) -> &'static [&'static str] {
        &["AWS::S3::Bucket"]
    }

    fn inspect(&self, resource: &Resource) -> Result<Vec<Violation>> {
        let Some(acl) = resource.get("AccessControl").and_then(Value::as_str) else {
            return Ok(vec![]);
        };
        if !NON_PRIVATE_ACLS.contains(&acl) {
            return Ok(vec![]);
        }
        Ok(vec![Violation::new(
            format!("AWS::S3::Bucket/AccessControl/{acl}"),
            "is not Private",
        )])
    }
}

/// CFN-S3-002: buckets without default encryption.
pub struct EncryptionDisabled;

impl Predicate for EncryptionDisabled {
    fn metadata(&self) -> RuleMetadata {
        RuleMetadata {
            id: "CFN-S3-002".into(),
            name: "S3 bucket encryption disabled".into(),
            description: "S3 bucket declares no BucketEncryption configuration".into(),
            dialect: self.dialect(),
            resource_types: owned(self.resource_types()),
            default_severity: Severity::Medium,
            category: Category::Encryption,
            message_open: "S3 buckets have encryption disabled".into(),
            message_closed: "S3 Buckets have encryption enabled".into(),
            remediation: Some("Add a BucketEncryption block with SSE-S3 or SSE-KMS.".into()),
        }
    }

    fn dialect(&self) -> Dialect {
        Dialect::Declarative
    }

    fn resource_types(&self) -> &'static [&'static str] {
        &["AWS::S3::Bucket"]
    }

    fn inspect(&self, resource: &Resource) -> Result<Vec<Violation>> {
        if resource.has("BucketEncryption") {
            return Ok(vec![]);
        }
        Ok(vec![Violation::new(
            "AWS::S3::Bucket/BucketEncryption",
            "has encryption disabled",
        )])
    }
}

/// CFN-S3-003: bucket policies allowing anyone.
pub struct PublicBucketPolicy;

impl Predicate for PublicBucketPolicy {
    fn metadata(&self) -> RuleMetadata {
        RuleMetadata {
            id: "CFN-S3-003".into(),
            name: "S3 bucket policy allows public access".into(),
            description: "S3 bucket policy has an Allow statement whose Principal is \"*\"".into(),
            dialect: self.dialect(),
            resource_types: owned(self.resource_types()),
            default_severity: Severity::Critical,
            category: Category::PublicAccess,
            message_open: "S3 bucket policy allows public access".into(),
            message_closed: "S3 bucket policy does not allow public access".into(),
            remediation: Some("Name the principals that need access instead of \"*\".".into()),
        }
    }

    fn dialect(&self) -> Dialect {
        Dialect::Declarative
    }

    fn resource_types(&self) -> &'static [&'static str] {
        &["AWS::S3::BucketPolicy"]
    }

    fn inspect(&self, resource: &Resource) -> Result<Vec<Violation>> {
        let Some(document) = resource.get("PolicyDocument") else {
            return Ok(vec![]);
        };
        Ok(statements(document)
            .into_iter()
            .filter(|s| has_effect(s, "Allow") && s.get("Principal").is_some_and(resource_all))
            .map(|_| {
                Violation::new(
                    "AWS::S3::BucketPolicy/PolicyDocument/Statement/Principal",
                    "allows public access",
                )
            })
            .collect())
    }
}

/// Condition entries of a statement as `(operator, key, value)`, one per
/// value when a key lists several.
fn conditions(statement: &Value) -> Vec<(&str, &str, &Value)> {
    let Some(Value::Object(operators)) = statement.get("Condition") else {
        return Vec::new();
    };
    let mut entries = Vec::new();
    for (operator, keys) in operators {
        let Value::Object(keys) = keys else {
            continue;
        };
        for (key, values) in keys {
            for value in as_sequence(values) {
                entries.push((operator.as_str(), key.as_str(), value));
            }
        }
    }
    entries
}

/// Whether a condition value is the boolean literal `expected`.
fn is_literal(value: &Value, expected: bool) -> bool {
    to_boolean(value).is_ok_and(|b| b == expected)
}

/// CFN-S3-004: bucket policies that let requests through without TLS.
pub struct InsecureTransport;

impl Predicate for InsecureTransport {
    fn metadata(&self) -> RuleMetadata {
        RuleMetadata {
            id: "CFN-S3-004".into(),
            name: "S3 bucket policy allows insecure transport".into(),
            description: "Bucket policy allows requests with aws:SecureTransport false, or denies those with it true".into(),
            dialect: self.dialect(),
            resource_types: owned(self.resource_types()),
            default_severity: Severity::Medium,
            category: Category::Encryption,
            message_open: "S3 bucket does not use SSL transport".into(),
            message_closed: "S3 buckets use SSL transport".into(),
            remediation: Some("Deny every request where aws:SecureTransport is false.".into()),
        }
    }

    fn dialect(&self) -> Dialect {
        Dialect::Declarative
    }

    fn resource_types(&self) -> &'static [&'static str] {
        &["AWS::S3::BucketPolicy"]
    }

    fn inspect(&self, resource: &Resource) -> Result<Vec<Violation>> {
        let Some(document) = resource.get("PolicyDocument") else {
            return Ok(vec![]);
        };
        let mut violations = Vec::new();
        for statement in statements(document) {
            for (operator, key, value) in conditions(statement) {
                if !key.eq_ignore_ascii_case("aws:SecureTransport") {
                    continue;
                }
                let insecure = (has_effect(statement, "Allow") && is_literal(value, false))
                    || (has_effect(statement, "Deny") && is_literal(value, true));
                if insecure {
                    violations.push(Violation::new(
                        format!("AWS::S3::BucketPolicy/PolicyDocument/Statement/Condition/{operator}/{key}"),
                        "allows requests without SSL",
                    ));
                }
            }
        }
        Ok(violations)
    }
}

/// CFN-S3-005: bucket policies that allow uploads without server-side encryption.
pub struct UnencryptedUploads;

impl Predicate for UnencryptedUploads {
    fn metadata(&self) -> RuleMetadata {
        RuleMetadata {
            id: "CFN-S3-005".into(),
            name: "S3 bucket policy allows unencrypted objects".into(),
            description: "Bucket policy allows requests whose s3:x-amz-server-side-encryption header is missing or disabled".into(),
            dialect: self.dialect(),
            resource_types: owned(self.resource_types()),
            default_severity: Severity::Medium,
            category: Category::Encryption,
            message_open: "S3 bucket policy allows unencrypted objects".into(),
            message_closed: "S3 bucket policy does not allow unencrypted objects".into(),
            remediation: Some("Deny PutObject when s3:x-amz-server-side-encryption is null.".into()),
        }
    }

    fn dialect(&self) -> Dialect {
        Dialect::Declarative
    }

    fn resource_types(&self) -> &'static [&'static str] {
        &["AWS::S3::BucketPolicy"]
    }

    fn inspect(&self, resource: &Resource) -> Result<Vec<Violation>> {
        let Some(document) = resource.get("PolicyDocument") else {
            return Ok(vec![]);
        };
        let mut violations = Vec::new();
        for statement in statements(document).into_iter().filter(|s| has_effect(s, "Allow")) {
            for (operator, key, value) in conditions(statement) {
                if !key.eq_ignore_ascii_case("s3:x-amz-server-side-encryption") {
                    continue;
                }
                // `Null: true` admits requests without the header at all.
                let unencrypted = if operator.eq_ignore_ascii_case("Null") {
                    is_literal(value, true)
                } else {
                    is_literal(value, false)
                };
                if unencrypted {
                    violations.push(Violation::new(
                        format!("AWS::S3::BucketPolicy/PolicyDocument/Statement/Condition/{operator}/{key}"),
                        "has server-side encryption disabled",
                    ));
                }
            }
        }
        Ok(violations)
    }
}

/// CFN-S3-006: buckets without object lock.
pub struct ObjectLockDisabled;

impl Predicate for ObjectLockDisabled {
    fn metadata(&self) -> RuleMetadata {
        RuleMetadata {
            id: "CFN-S3-006".into(),
            name: "S3 object lock disabled".into(),
            description: "S3 bucket does not set ObjectLockEnabled to true".into(),
            dialect: self.dialect(),
            resource_types: owned(self.resource_types()),
            default_severity: Severity::Low,
            category: Category::PublicAccess,
            message_open: "S3 buckets have object lock disabled".into(),
            message_closed: "S3 Buckets have object lock enabled".into(),
            remediation: Some("Set ObjectLockEnabled: true when the bucket is created.".into()),
        }
    }

    fn dialect(&self) -> Dialect {
        Dialect::Declarative
    }

    fn resource_types(&self) -> &'static [&'static str] {
        &["AWS::S3::Bucket"]
    }

    fn inspect(&self, resource: &Resource) -> Result<Vec<Violation>> {
        if literal_bool(resource.get("ObjectLockEnabled"), false) != Some(false) {
            return Ok(vec![]);
        }
        Ok(vec![Violation::new(
            "AWS::S3::Bucket/ObjectLockEnabled",
            "has object lock disabled",
        )])
    }
}
