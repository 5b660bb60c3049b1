use super::owned;
use crate::analysis::privilege::{policy_document, policy_statement_privilege};
use crate::error::Result;
use crate::ir::{Dialect, Resource};
use crate::rules::{Category, Predicate, RuleMetadata, Severity, Violation};
use crate::taxonomy::{ActionCategory, ActionTaxonomy};

/// TF-IAM-001: inline policies granting write actions on every resource.
///
/// The `policy` attribute is read as a JSON document (heredoc or rendered
/// string) or a literal object. References to policy data sources cannot be
/// judged and are skipped.
pub struct WildcardWritePolicy;

impl Predicate for WildcardWritePolicy {
    fn metadata(&self) -> RuleMetadata {
        RuleMetadata {
            id: "TF-IAM-001".into(),
            name: "Write actions on all resources".into(),
            description: "IAM policy allows write actions with Resource \"*\"".into(),
            dialect: self.dialect(),
            resource_types: owned(self.resource_types()),
            default_severity: Severity::High,
            category: Category::ExcessivePermissions,
            message_open: "Write actions are allowed for all resources.".into(),
            message_closed: "Write actions are not allowed for all resources.".into(),
            remediation: Some("Scope Resource to the ARNs the policy needs to modify.".into()),
        }
    }

    fn dialect(&self) -> Dialect {
        Dialect::Block
    }

    fn resource_types(&self) -> &'static [&'static str] {
        &[
            "aws_iam_policy",
            "aws_iam_role_policy",
            "aws_iam_user_policy",
            "aws_iam_group_policy",
        ]
    }

    fn inspect(&self, resource: &Resource) -> Result<Vec<Violation>> {
        let Some(document) = resource.get("policy").and_then(policy_document) else {
            return Ok(vec![]);
        };
        if !policy_statement_privilege(ActionTaxonomy::global(), &document, "Allow", ActionCategory::Write) {
            return Ok(vec![]);
        }
        Ok(vec![Violation::new(
            format!("{}/policy", resource.resource_type),
            "allows write actions on a wildcard resource",
        )])
    }
}
