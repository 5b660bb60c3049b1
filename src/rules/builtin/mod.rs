mod cfn_ec2;
mod cfn_iam;
mod cfn_kms;
mod cfn_s3;
mod tf_ebs;
mod tf_ec2;
mod tf_iam;
mod tf_kms;

use serde_json::Value;

use super::{Predicate, Violation};
use crate::error::Result;
use crate::ir::value::{expression, to_boolean, to_integer};
use crate::ir::Resource;
use crate::taxonomy::ActionCategory;

/// Returns all built-in predicates, Terraform first.
pub fn all_predicates() -> Vec<Box<dyn Predicate>> {
    vec![
        Box::new(tf_ec2::UnrestrictedCidrs),
        Box::new(tf_ec2::AllowsAllOutbound),
        Box::new(tf_ec2::UnrestrictedProtocols),
        Box::new(tf_ec2::PortRanges),
        Box::new(tf_ec2::MissingInstanceProfile),
        Box::new(tf_ec2::PublicIpOnLaunch),
        Box::new(tf_ec2::DefaultSecurityGroup),
        Box::new(tf_ebs::UnencryptedVolumes),
        Box::new(tf_kms::KeyRotationDisabled),
        Box::new(tf_kms::DeletionWindow),
        Box::new(tf_iam::WildcardWritePolicy),
        Box::new(cfn_ec2::UnrestrictedCidrs),
        Box::new(cfn_ec2::UnencryptedVolumes),
        Box::new(cfn_ec2::MissingInstanceProfile),
        Box::new(cfn_ec2::TerminationProtection),
        Box::new(cfn_ec2::TerminateOnShutdown),
        Box::new(cfn_ec2::DefaultSecurityGroup),
        Box::new(cfn_ec2::AllowsAllOutbound),
        Box::new(cfn_ec2::UnrestrictedProtocols),
        Box::new(cfn_ec2::PortRanges),
        Box::new(cfn_ec2::PublicIpOnLaunch),
        Box::new(cfn_ec2::AdminPortsOpen),
        Box::new(cfn_ec2::UnrestrictedDns),
        Box::new(cfn_ec2::UnrestrictedFtp),
        Box::new(cfn_ec2::PrivateRangeIngress),
        Box::new(cfn_ec2::AllPortsOpen),
        Box::new(cfn_iam::OverPrivilegedRole),
        Box::new(cfn_iam::UserInlinePolicies),
        Box::new(cfn_iam::WildcardResourcePrivilege::new(ActionCategory::Write)),
        Box::new(cfn_iam::WildcardResourcePrivilege::new(
            ActionCategory::PermissionsManagement,
        )),
        Box::new(cfn_iam::PrivilegesOverIam),
        Box::new(cfn_iam::FullAccessToSsm),
        Box::new(cfn_iam::WildcardResourcePrivilege::new(ActionCategory::Read)),
        Box::new(cfn_iam::WildcardResourcePrivilege::new(ActionCategory::List)),
        Box::new(cfn_iam::WildcardResourcePrivilege::new(ActionCategory::Tagging)),
        Box::new(cfn_iam::PolicyMisconfigured),
        Box::new(cfn_iam::ManagedPolicyMisconfigured),
        Box::new(cfn_kms::KeyRotationDisabled),
        Box::new(cfn_kms::PendingWindow),
        Box::new(cfn_s3::NotPrivateAccessControl),
        Box::new(cfn_s3::EncryptionDisabled),
        Box::new(cfn_s3::PublicBucketPolicy),
        Box::new(cfn_s3::InsecureTransport),
        Box::new(cfn_s3::UnencryptedUploads),
        Box::new(cfn_s3::ObjectLockDisabled),
    ]
}

fn owned(types: &[&str]) -> Vec<String> {
    types.iter().map(|t| t.to_string()).collect()
}

/// Read a boolean attribute, `default` when absent and `None` when it is
/// only known at deploy time. Unrecognised literal spellings are errors.
fn bool_attr(resource: &Resource, key: &str, default: bool) -> Result<Option<bool>> {
    match resource.get(key) {
        Some(value) => bool_value(value),
        None => Ok(Some(default)),
    }
}

fn bool_value(value: &Value) -> Result<Option<bool>> {
    if expression(value).is_some() {
        return Ok(None);
    }
    to_boolean(value).map(Some)
}

/// Like [`bool_attr`] but for values that may legitimately be unresolved
/// references (`{"Ref": ...}`): anything that is not a boolean literal is
/// `None`.
fn literal_bool(value: Option<&Value>, default: bool) -> Option<bool> {
    match value {
        Some(value) => to_boolean(value).ok(),
        None => Some(default),
    }
}

/// Day-window check: the attribute (default `required`) must equal
/// `required` exactly. Non-literal values are not judged.
fn window_violation(
    value: Option<&Value>,
    required: i64,
    entity: &str,
) -> Option<Violation> {
    let days = match value {
        Some(value) => to_integer(value).ok()?,
        None => required,
    };
    (days != required).then(|| {
        Violation::new(
            format!("{entity}/{days}"),
            format!("must be exactly {required} days"),
        )
    })
}
