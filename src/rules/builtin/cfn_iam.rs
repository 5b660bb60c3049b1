use serde_json::Value;

use super::owned;
use crate::analysis::privilege::{
    grants_action, has_effect, is_wildcard_action, policy_statement_privilege,
    service_is_present_statement, statements,
};
use crate::error::Result;
use crate::ir::value::{as_sequence, display};
use crate::ir::{Dialect, Resource};
use crate::rules::{Category, Predicate, RuleMetadata, Severity, Violation};
use crate::taxonomy::{ActionCategory, ActionTaxonomy};

const POLICY_HOLDERS: &[&str] = &["AWS::IAM::Role", "AWS::IAM::ManagedPolicy", "AWS::IAM::Policy"];

/// Every policy document a resource carries, labelled for finding entities.
///
/// A top-level `PolicyDocument` (managed and inline policies) is labelled
/// with the resource's `<Kind>Name` when it is a plain string, or the
/// logical name otherwise. Each entry of `Policies` (roles, users, groups)
/// is labelled with its `PolicyName`.
fn policy_documents(resource: &Resource) -> Vec<(String, &Value)> {
    let mut documents = Vec::new();

    if let Some(document) = resource.get("PolicyDocument").filter(|d| d.is_object()) {
        let kind = resource.resource_type.rsplit("::").next().unwrap_or_default();
        let label = resource
            .get(&format!("{kind}Name"))
            .and_then(Value::as_str)
            .unwrap_or(&resource.name);
        documents.push((label.to_string(), document));
    }

    for policy in resource.get("Policies").map(as_sequence).unwrap_or_default() {
        let Some(document) = policy.get("PolicyDocument").filter(|d| d.is_object()) else {
            continue;
        };
        let label = policy
            .get("PolicyName")
            .and_then(Value::as_str)
            .unwrap_or(&resource.name);
        documents.push((label.to_string(), document));
    }

    documents
}

/// CFN-IAM-001: roles granting unnecessary privileges.
pub struct OverPrivilegedRole;

impl Predicate for OverPrivilegedRole {
    fn metadata(&self) -> RuleMetadata {
        RuleMetadata {
            id: "CFN-IAM-001".into(),
            name: "Over-privileged IAM role".into(),
            description: "Role attaches AdministratorAccess, uses Allow with NotAction/NotResource/NotPrincipal, or grants wildcard actions or resources".into(),
            dialect: self.dialect(),
            resource_types: owned(self.resource_types()),
            default_severity: Severity::High,
            category: Category::ExcessivePermissions,
            message_open: "IAM Role grants unnecessary privileges".into(),
            message_closed: "IAM Role grants granular privileges".into(),
            remediation: Some("Grant only the specific actions and resources the role needs.".into()),
        }
    }

    fn dialect(&self) -> Dialect {
        Dialect::Declarative
    }

    fn resource_types(&self) -> &'static [&'static str] {
        &["AWS::IAM::Role"]
    }

    fn inspect(&self, resource: &Resource) -> Result<Vec<Violation>> {
        let mut violations = Vec::new();
        let mut push = |entity: String, reason: &str| {
            let violation = Violation::new(entity, reason);
            if !violations.contains(&violation) {
                violations.push(violation);
            }
        };

        for arn in resource.get("ManagedPolicyArns").map(as_sequence).unwrap_or_default() {
            let arn = display(arn);
            if arn.contains("AdministratorAccess") {
                push(format!("ManagedPolicyArns/{arn}"), "grants excessive privileges");
            }
        }

        for policy in resource.get("Policies").map(as_sequence).unwrap_or_default() {
            let Some(document) = policy.get("PolicyDocument") else {
                continue;
            };
            for statement in statements(document) {
                if !has_effect(statement, "Allow") {
                    continue;
                }
                for key in ["NotAction", "NotResource"] {
                    if statement.get(key).is_some() {
                        push(
                            format!("Policies/PolicyDocument/Statement/{key}"),
                            "avoid security through black listing",
                        );
                    }
                }
                for action in statement.get("Action").map(as_sequence).unwrap_or_default() {
                    let action = display(action);
                    if is_wildcard_action(&action) {
                        push(
                            format!("Policies/PolicyDocument/Statement/Action/{action}"),
                            "grants wildcard privileges",
                        );
                    }
                }
                for target in statement.get("Resource").map(as_sequence).unwrap_or_default() {
                    if target.as_str() == Some("*") {
                        push(
                            "Policies/PolicyDocument/Statement/Resource/*".into(),
                            "grants wildcard privileges",
                        );
                    }
                }
            }
        }

        if let Some(trust) = resource.get("AssumeRolePolicyDocument") {
            for statement in statements(trust) {
                if !has_effect(statement, "Allow") {
                    continue;
                }
                for action in statement.get("Action").map(as_sequence).unwrap_or_default() {
                    let action = display(action);
                    if is_wildcard_action(&action) {
                        push(
                            format!("AssumeRolePolicyDocument/Statement/Action/{action}"),
                            "grants wildcard privileges",
                        );
                    }
                }
                for key in ["NotAction", "NotPrincipal"] {
                    if statement.get(key).is_some() {
                        push(
                            format!("AssumeRolePolicyDocument/Statement/{key}"),
                            "avoid security through black listing",
                        );
                    }
                }
            }
        }

        Ok(violations)
    }
}

/// CFN-IAM-002: users with inline policies instead of role-based access.
pub struct UserInlinePolicies;

impl Predicate for UserInlinePolicies {
    fn metadata(&self) -> RuleMetadata {
        RuleMetadata {
            id: "CFN-IAM-002".into(),
            name: "IAM user with inline policies".into(),
            description: "IAM user is granted permissions through inline policies rather than a role or group".into(),
            dialect: self.dialect(),
            resource_types: owned(self.resource_types()),
            default_severity: Severity::Medium,
            category: Category::ExcessivePermissions,
            message_open: "IAM User is not assigned permissions through a role".into(),
            message_closed: "IAM User is assigned permissions through a role".into(),
            remediation: Some("Move the policies to a group or role and add the user to it.".into()),
        }
    }

    fn dialect(&self) -> Dialect {
        Dialect::Declarative
    }

    fn resource_types(&self) -> &'static [&'static str] {
        &["AWS::IAM::User"]
    }

    fn inspect(&self, resource: &Resource) -> Result<Vec<Violation>> {
        let mut violations: Vec<Violation> = Vec::new();
        for policy in resource.get("Policies").map(as_sequence).unwrap_or_default() {
            let name = policy
                .get("PolicyName")
                .or_else(|| policy.get("Ref"))
                .map(display)
                .unwrap_or_else(|| "any".into());
            let violation = Violation::new(
                format!("Policies/{name}"),
                "do not attach inline policies; use role-based access control",
            );
            if !violations.contains(&violation) {
                violations.push(violation);
            }
        }
        Ok(violations)
    }
}

/// CFN-IAM-003, 004, 007, 008, 009: statements granting actions of one
/// privilege category on every resource.
pub struct WildcardResourcePrivilege {
    category: ActionCategory,
}

impl WildcardResourcePrivilege {
    pub fn new(category: ActionCategory) -> Self {
        Self { category }
    }

    fn id(&self) -> &'static str {
        match self.category {
            ActionCategory::Write => "CFN-IAM-003",
            ActionCategory::PermissionsManagement => "CFN-IAM-004",
            ActionCategory::Read => "CFN-IAM-007",
            ActionCategory::List => "CFN-IAM-008",
            ActionCategory::Tagging => "CFN-IAM-009",
        }
    }
}

impl Predicate for WildcardResourcePrivilege {
    fn metadata(&self) -> RuleMetadata {
        let category = self.category;
        let capitalised = {
            let text = category.to_string();
            let mut chars = text.chars();
            chars
                .next()
                .map(|c| c.to_uppercase().collect::<String>() + chars.as_str())
                .unwrap_or_default()
        };
        RuleMetadata {
            id: self.id().into(),
            name: format!("{capitalised} actions on all resources"),
            description: format!("IAM policy allows {category} actions with Resource \"*\""),
            dialect: self.dialect(),
            resource_types: owned(self.resource_types()),
            default_severity: match category {
                ActionCategory::PermissionsManagement | ActionCategory::Write => Severity::High,
                ActionCategory::Read | ActionCategory::List | ActionCategory::Tagging => Severity::Low,
            },
            category: Category::ExcessivePermissions,
            message_open: format!("{capitalised} actions are allowed for all resources."),
            message_closed: format!("{capitalised} actions are not allowed for all resources."),
            remediation: Some("Scope Resource to the ARNs the policy needs.".into()),
        }
    }

    fn dialect(&self) -> Dialect {
        Dialect::Declarative
    }

    fn resource_types(&self) -> &'static [&'static str] {
        POLICY_HOLDERS
    }

    fn inspect(&self, resource: &Resource) -> Result<Vec<Violation>> {
        let taxonomy = ActionTaxonomy::global();
        Ok(policy_documents(resource)
            .into_iter()
            .filter(|(_, document)| {
                policy_statement_privilege(taxonomy, document, "Allow", self.category)
            })
            .map(|(label, _)| {
                Violation::new(
                    format!("{}/{label}", resource.resource_type),
                    format!("allows {} actions on a wildcard resource", self.category),
                )
            })
            .collect())
    }
}

/// CFN-IAM-005: policies with privileges over IAM itself.
pub struct PrivilegesOverIam;

impl Predicate for PrivilegesOverIam {
    fn metadata(&self) -> RuleMetadata {
        RuleMetadata {
            id: "CFN-IAM-005".into(),
            name: "Privileges over IAM".into(),
            description: "Policy allows actions of the iam service".into(),
            dialect: self.dialect(),
            resource_types: owned(self.resource_types()),
            default_severity: Severity::Medium,
            category: Category::ExcessivePermissions,
            message_open: "Policies have privileges over iam.".into(),
            message_closed: "Policies have no privileges over iam.".into(),
            remediation: Some("Keep IAM administration out of application policies.".into()),
        }
    }

    fn dialect(&self) -> Dialect {
        Dialect::Declarative
    }

    fn resource_types(&self) -> &'static [&'static str] {
        POLICY_HOLDERS
    }

    fn inspect(&self, resource: &Resource) -> Result<Vec<Violation>> {
        Ok(policy_documents(resource)
            .into_iter()
            .filter(|(_, document)| service_is_present_statement(document, "Allow", "iam"))
            .map(|(label, _)| {
                Violation::new(
                    format!("{}/{label}", resource.resource_type),
                    "has privileges over iam",
                )
            })
            .collect())
    }
}

/// CFN-IAM-006: policies granting `ssm:*`.
pub struct FullAccessToSsm;

impl Predicate for FullAccessToSsm {
    fn metadata(&self) -> RuleMetadata {
        RuleMetadata {
            id: "CFN-IAM-006".into(),
            name: "Full access to SSM".into(),
            description: "Policy allows ssm:*, which lets its holder run commands as root on managed instances".into(),
            dialect: self.dialect(),
            resource_types: owned(self.resource_types()),
            default_severity: Severity::High,
            category: Category::ExcessivePermissions,
            message_open: "Policy allows full access to SSM.".into(),
            message_closed: "Policy does not allow full access to SSM.".into(),
            remediation: Some("Grant only the SSM actions that are needed.".into()),
        }
    }

    fn dialect(&self) -> Dialect {
        Dialect::Declarative
    }

    fn resource_types(&self) -> &'static [&'static str] {
        POLICY_HOLDERS
    }

    fn inspect(&self, resource: &Resource) -> Result<Vec<Violation>> {
        Ok(policy_documents(resource)
            .into_iter()
            .filter(|(_, document)| grants_action(document, "Allow", "ssm:*"))
            .map(|(label, _)| {
                Violation::new(
                    format!("{}/{label}/PolicyDocument", resource.resource_type),
                    "allows full access to SSM",
                )
            })
            .collect())
    }
}

/// Findings shared by CFN-IAM-010 and CFN-IAM-011: Allow statements using
/// NotAction or NotResource, wildcard actions, wildcard resources, and
/// policies attached straight to users.
fn policy_misconfigurations(resource: &Resource) -> Vec<Violation> {
    let kind = resource.resource_type.as_str();
    let mut violations = Vec::new();
    let mut push = |entity: String, reason: String| {
        let violation = Violation::new(entity, reason);
        if !violations.contains(&violation) {
            violations.push(violation);
        }
    };

    if let Some(document) = resource.get("PolicyDocument") {
        for statement in statements(document) {
            if !has_effect(statement, "Allow") {
                continue;
            }
            for key in ["NotAction", "NotResource"] {
                if statement.get(key).is_some() {
                    push(
                        format!("{kind}/PolicyDocument/Statement/{key}"),
                        "avoid security through black listing".into(),
                    );
                }
            }
            for action in statement.get("Action").map(as_sequence).unwrap_or_default() {
                let action = display(action);
                if is_wildcard_action(&action) {
                    push(
                        format!("{kind}/PolicyDocument/Statement/Action/{action}"),
                        "grants wildcard privileges".into(),
                    );
                }
            }
            for target in statement.get("Resource").map(as_sequence).unwrap_or_default() {
                if target.as_str() == Some("*") {
                    push(
                        format!("{kind}/PolicyDocument/Statement/Resource/*"),
                        "grants wildcard privileges".into(),
                    );
                }
            }
        }
    }

    let short = kind.rsplit("::").next().unwrap_or(kind);
    for user in resource.get("Users").map(as_sequence).unwrap_or_default() {
        push(
            format!("{kind}/Users/{}", display(user)),
            format!("{short} applied to user, apply to a group or role instead"),
        );
    }

    violations
}

/// CFN-IAM-010: misconfigured inline policies.
pub struct PolicyMisconfigured;

impl Predicate for PolicyMisconfigured {
    fn metadata(&self) -> RuleMetadata {
        RuleMetadata {
            id: "CFN-IAM-010".into(),
            name: "IAM policy misconfigured".into(),
            description: "IAM policy uses Allow with NotAction/NotResource, grants wildcard actions or resources, or is attached to users".into(),
            dialect: self.dialect(),
            resource_types: owned(self.resource_types()),
            default_severity: Severity::Medium,
            category: Category::ExcessivePermissions,
            message_open: "IAM Policy is miss configured".into(),
            message_closed: "IAM Policy is properly configured".into(),
            remediation: Some("List actions and resources explicitly and attach the policy to a group or role.".into()),
        }
    }

    fn dialect(&self) -> Dialect {
        Dialect::Declarative
    }

    fn resource_types(&self) -> &'static [&'static str] {
        &["AWS::IAM::Policy"]
    }

    fn inspect(&self, resource: &Resource) -> Result<Vec<Violation>> {
        Ok(policy_misconfigurations(resource))
    }
}

/// CFN-IAM-011: misconfigured managed policies.
pub struct ManagedPolicyMisconfigured;

impl Predicate for ManagedPolicyMisconfigured {
    fn metadata(&self) -> RuleMetadata {
        RuleMetadata {
            id: "CFN-IAM-011".into(),
            name: "IAM managed policy misconfigured".into(),
            description: "IAM managed policy uses Allow with NotAction/NotResource, grants wildcard actions or resources, or is attached to users".into(),
            dialect: self.dialect(),
            resource_types: owned(self.resource_types()),
            default_severity: Severity::Medium,
            category: Category::ExcessivePermissions,
            message_open: "IAM ManagedPolicy is miss configured".into(),
            message_closed: "IAM ManagedPolicy is properly configured".into(),
            remediation: Some("List actions and resources explicitly and attach the policy to a group or role.".into()),
        }
    }

    fn dialect(&self) -> Dialect {
        Dialect::Declarative
    }

    fn resource_types(&self) -> &'static [&'static str] {
        &["AWS::IAM::ManagedPolicy"]
    }

    fn inspect(&self, resource: &Resource) -> Result<Vec<Violation>> {
        Ok(policy_misconfigurations(resource))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::builtin::test_support::resource;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn role(statement: Value) -> Resource {
        resource(
            "AWS::IAM::Role",
            json!({"Policies": [{"PolicyName": "app", "PolicyDocument": {"Statement": [statement]}}]}),
        )
    }

    #[test]
    fn over_privileged_role() {
        let res = resource(
            "AWS::IAM::Role",
            json!({
                "ManagedPolicyArns": ["arn:aws:iam::aws:policy/AdministratorAccess"],
                "AssumeRolePolicyDocument": {"Statement": [{"Effect": "Allow", "Action": "sts:*", "NotPrincipal": {}}]},
                "Policies": [{"PolicyDocument": {"Statement": [
                    {"Effect": "Allow", "Action": ["*"], "Resource": "*", "NotResource": "x"},
                    {"Effect": "Deny", "NotAction": "s3:*", "Resource": "*"}
                ]}}]
            }),
        );
        let mut entities: Vec<_> = OverPrivilegedRole
            .inspect(&res)
            .unwrap()
            .into_iter()
            .map(|v| v.entity)
            .collect();
        entities.sort();
        assert_eq!(
            entities,
            vec![
                "AssumeRolePolicyDocument/Statement/Action/sts:*",
                "AssumeRolePolicyDocument/Statement/NotPrincipal",
                "ManagedPolicyArns/arn:aws:iam::aws:policy/AdministratorAccess",
                "Policies/PolicyDocument/Statement/Action/*",
                "Policies/PolicyDocument/Statement/NotResource",
                "Policies/PolicyDocument/Statement/Resource/*",
            ]
        );
    }

    #[test]
    fn granular_role_passes() {
        let res = role(json!({"Effect": "Allow", "Action": "s3:GetObject", "Resource": "arn:aws:s3:::b/*"}));
        assert!(OverPrivilegedRole.inspect(&res).unwrap().is_empty());
    }

    #[test]
    fn user_inline_policies() {
        let user = resource(
            "AWS::IAM::User",
            json!({"Policies": [{"PolicyName": "inline"}, {"PolicyDocument": {}}]}),
        );
        let entities: Vec<_> = UserInlinePolicies
            .inspect(&user)
            .unwrap()
            .into_iter()
            .map(|v| v.entity)
            .collect();
        assert_eq!(entities, vec!["Policies/inline", "Policies/any"]);
    }

    #[test]
    fn write_on_wildcard_resource() {
        let rule = WildcardResourcePrivilege::new(ActionCategory::Write);
        let res = role(json!({"Effect": "Allow", "Action": ["s3:PutObject"], "Resource": "*"}));
        let violations = rule.inspect(&res).unwrap();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].entity, "AWS::IAM::Role/app");

        let read = role(json!({"Effect": "Allow", "Action": ["s3:GetObject"], "Resource": "*"}));
        assert!(rule.inspect(&read).unwrap().is_empty());
    }

    #[test]
    fn managed_policy_labelled_by_name() {
        let rule = WildcardResourcePrivilege::new(ActionCategory::PermissionsManagement);
        let res = resource(
            "AWS::IAM::ManagedPolicy",
            json!({
                "ManagedPolicyName": "bucket-admin",
                "PolicyDocument": {"Statement": {"Effect": "Allow", "Action": "s3:PutBucketPolicy", "Resource": ["*"]}}
            }),
        );
        let violations = rule.inspect(&res).unwrap();
        assert_eq!(violations[0].entity, "AWS::IAM::ManagedPolicy/bucket-admin");
        assert_eq!(rule.metadata().id, "CFN-IAM-004");
    }

    #[test]
    fn iam_service_privileges() {
        let res = role(json!({"Effect": "Allow", "Action": "iam:CreateUser", "Resource": "arn"}));
        assert_eq!(PrivilegesOverIam.inspect(&res).unwrap().len(), 1);
        let other = role(json!({"Effect": "Allow", "Action": "s3:GetObject", "Resource": "arn"}));
        assert!(PrivilegesOverIam.inspect(&other).unwrap().is_empty());
    }

    #[test]
    fn ssm_full_access() {
        let res = resource(
            "AWS::IAM::Policy",
            json!({"PolicyName": "ops", "PolicyDocument": {"Statement": [{"Effect": "Allow", "Action": ["ssm:*"], "Resource": "*"}]}}),
        );
        let violations = FullAccessToSsm.inspect(&res).unwrap();
        assert_eq!(violations[0].entity, "AWS::IAM::Policy/ops/PolicyDocument");
    }

    #[test]
    fn read_list_and_tagging_variants_have_ids() {
        let ids: Vec<String> = [ActionCategory::Read, ActionCategory::List, ActionCategory::Tagging]
            .into_iter()
            .map(|c| WildcardResourcePrivilege::new(c).metadata().id)
            .collect();
        assert_eq!(ids, vec!["CFN-IAM-007", "CFN-IAM-008", "CFN-IAM-009"]);

        let read = WildcardResourcePrivilege::new(ActionCategory::Read);
        let res = role(json!({"Effect": "Allow", "Action": ["s3:GetObject"], "Resource": "*"}));
        assert_eq!(read.inspect(&res).unwrap().len(), 1);
        assert_eq!(read.metadata().default_severity, Severity::Low);
    }

    #[test]
    fn misconfigured_policy() {
        let res = resource(
            "AWS::IAM::Policy",
            json!({
                "PolicyName": "ops",
                "Users": ["alice"],
                "PolicyDocument": {"Statement": [
                    {"Effect": "Allow", "NotAction": "iam:*", "Resource": "*"},
                    {"Effect": "Allow", "Action": ["s3:*", "s3:GetObject"], "Resource": "arn:aws:s3:::b/*"},
                    {"Effect": "Deny", "Action": "*", "NotResource": "arn"}
                ]}
            }),
        );
        let mut entities: Vec<_> = PolicyMisconfigured
            .inspect(&res)
            .unwrap()
            .into_iter()
            .map(|v| v.entity)
            .collect();
        entities.sort();
        assert_eq!(
            entities,
            vec![
                "AWS::IAM::Policy/PolicyDocument/Statement/Action/s3:*",
                "AWS::IAM::Policy/PolicyDocument/Statement/NotAction",
                "AWS::IAM::Policy/PolicyDocument/Statement/Resource/*",
                "AWS::IAM::Policy/Users/alice",
            ]
        );
    }

    #[test]
    fn scoped_managed_policy_on_group_passes() {
        let res = resource(
            "AWS::IAM::ManagedPolicy",
            json!({
                "Groups": ["deployers"],
                "PolicyDocument": {"Statement": [{"Effect": "Allow", "Action": "s3:PutObject", "Resource": "arn:aws:s3:::b/*"}]}
            }),
        );
        assert!(ManagedPolicyMisconfigured.inspect(&res).unwrap().is_empty());

        let user = resource("AWS::IAM::ManagedPolicy", json!({"Users": [{"Ref": "Alice"}]}));
        let violations = ManagedPolicyMisconfigured.inspect(&user).unwrap();
        assert_eq!(violations[0].reason, "ManagedPolicy applied to user, apply to a group or role instead");
    }
}
