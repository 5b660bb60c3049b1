use super::{bool_attr, bool_value, owned};
use crate::analysis::network::{check_cidrs, normalize_rule_list};
use crate::error::Result;
use crate::ir::value::{as_sequence, display, to_integer};
use crate::ir::{Dialect, Resource};
use crate::rules::{Category, Predicate, RuleMetadata, Severity, Violation};

const SECURITY_GROUPS: &[&str] = &["aws_security_group", "aws_security_group_rule"];
const INSTANCES: &[&str] = &["aws_instance", "aws_launch_template"];

/// TF-EC2-001: security groups open to the world, or ingress wider than one host.
pub struct UnrestrictedCidrs;

impl Predicate for UnrestrictedCidrs {
    fn metadata(&self) -> RuleMetadata {
        RuleMetadata {
            id: "TF-EC2-001".into(),
            name: "Unrestricted security group CIDR".into(),
            description: "Security group rule allows 0.0.0.0/0 or ::/0, or ingress from more than a single host".into(),
            dialect: self.dialect(),
            resource_types: owned(self.resource_types()),
            default_severity: Severity::High,
            category: Category::NetworkExposure,
            message_open: "EC2 security groups have unrestricted CIDRs".into(),
            message_closed: "EC2 security groups do not have unrestricted CIDRs".into(),
            remediation: Some("Restrict cidr_blocks to the specific hosts that need access.".into()),
        }
    }

    fn dialect(&self) -> Dialect {
        Dialect::Block
    }

    fn resource_types(&self) -> &'static [&'static str] {
        SECURITY_GROUPS
    }

    fn inspect(&self, resource: &Resource) -> Result<Vec<Violation>> {
        Ok(normalize_rule_list(resource)
            .iter()
            .flat_map(|rule| check_cidrs(rule, "cidr_blocks", "ipv6_cidr_blocks"))
            .map(|v| Violation::new(v.entity, v.reason))
            .collect())
    }
}

/// TF-EC2-002: a security group without egress rules keeps the default allow-all.
pub struct AllowsAllOutbound;

impl Predicate for AllowsAllOutbound {
    fn metadata(&self) -> RuleMetadata {
        RuleMetadata {
            id: "TF-EC2-002".into(),
            name: "Security group allows all outbound traffic".into(),
            description: "Security group declares no egress block, so AWS keeps its default allow-all egress rule".into(),
            dialect: self.dialect(),
            resource_types: owned(self.resource_types()),
            default_severity: Severity::Low,
            category: Category::NetworkExposure,
            message_open: "EC2 security groups allow all outbound traffic".into(),
            message_closed: "EC2 security groups do not allow all outbound traffic".into(),
            remediation: Some("Declare explicit egress blocks.".into()),
        }
    }

    fn dialect(&self) -> Dialect {
        Dialect::Block
    }

    fn resource_types(&self) -> &'static [&'static str] {
        &["aws_security_group"]
    }

    fn inspect(&self, resource: &Resource) -> Result<Vec<Violation>> {
        if resource.has("egress") {
            return Ok(vec![]);
        }
        Ok(vec![Violation::new(
            "aws_security_group/egress",
            "allows all outbound traffic",
        )])
    }
}

/// TF-EC2-003: rules with protocol `-1`.
pub struct UnrestrictedProtocols;

impl Predicate for UnrestrictedProtocols {
    fn metadata(&self) -> RuleMetadata {
        RuleMetadata {
            id: "TF-EC2-003".into(),
            name: "Unrestricted IP protocols".into(),
            description: "Security group rule authorizes every IP protocol (protocol = -1)".into(),
            dialect: self.dialect(),
            resource_types: owned(self.resource_types()),
            default_severity: Severity::Medium,
            category: Category::NetworkExposure,
            message_open: "EC2 security groups have ingress/egress rules with unrestricted IP protocols".into(),
            message_closed: "EC2 security groups do not have ingress/egress rules with unrestricted IP protocols".into(),
            remediation: Some("Name the protocol explicitly (tcp, udp, icmp).".into()),
        }
    }

    fn dialect(&self) -> Dialect {
        Dialect::Block
    }

    fn resource_types(&self) -> &'static [&'static str] {
        SECURITY_GROUPS
    }

    fn inspect(&self, resource: &Resource) -> Result<Vec<Violation>> {
        Ok(normalize_rule_list(resource)
            .iter()
            .filter(|rule| rule.get("protocol").map(display).as_deref() == Some("-1"))
            .map(|rule| {
                Violation::new(
                    format!("{}/protocol/-1", rule.label()),
                    "authorizes all IP protocols",
                )
            })
            .collect())
    }
}

/// TF-EC2-004: rules opening a range of ports instead of one.
pub struct PortRanges;

impl Predicate for PortRanges {
    fn metadata(&self) -> RuleMetadata {
        RuleMetadata {
            id: "TF-EC2-004".into(),
            name: "Security group port range".into(),
            description: "Security group rule grants access over a port range instead of a single port".into(),
            dialect: self.dialect(),
            resource_types: owned(self.resource_types()),
            default_severity: Severity::Medium,
            category: Category::NetworkExposure,
            message_open: "EC2 security groups have ingress/egress rules that allow access over a range of ports".into(),
            message_closed: "EC2 security groups have ingress/egress rules that allow access over single ports".into(),
            remediation: Some("Open one rule per required port.".into()),
        }
    }

    fn dialect(&self) -> Dialect {
        Dialect::Block
    }

    fn resource_types(&self) -> &'static [&'static str] {
        SECURITY_GROUPS
    }

    fn inspect(&self, resource: &Resource) -> Result<Vec<Violation>> {
        let mut violations = Vec::new();
        for rule in normalize_rule_list(resource) {
            let port = |key: &str| rule.get(key).and_then(|v| to_integer(v).ok());
            let (Some(from), Some(to)) = (port("from_port"), port("to_port")) else {
                continue;
            };
            if from < to {
                violations.push(Violation::new(
                    format!("{}/from_port->to_port/{from}->{to}", rule.label()),
                    "grants access over a port range",
                ));
            }
        }
        Ok(violations)
    }
}

/// TF-EC2-005: instances without an IAM instance profile.
pub struct MissingInstanceProfile;

impl Predicate for MissingInstanceProfile {
    fn metadata(&self) -> RuleMetadata {
        RuleMetadata {
            id: "TF-EC2-005".into(),
            name: "Instance without IAM instance profile".into(),
            description: "EC2 instance has no iam_instance_profile, so credentials must be managed by hand".into(),
            dialect: self.dialect(),
            resource_types: owned(self.resource_types()),
            default_severity: Severity::Low,
            category: Category::InstanceHardening,
            message_open: "EC2 instances have no iam_instance_profile set".into(),
            message_closed: "EC2 instances have an iam_instance_profile set".into(),
            remediation: Some("Attach an IAM role through iam_instance_profile.".into()),
        }
    }

    fn dialect(&self) -> Dialect {
        Dialect::Block
    }

    fn resource_types(&self) -> &'static [&'static str] {
        &["aws_instance"]
    }

    fn inspect(&self, resource: &Resource) -> Result<Vec<Violation>> {
        if resource.has("iam_instance_profile") {
            return Ok(vec![]);
        }
        Ok(vec![Violation::new(
            "aws_instance/iam_instance_profile",
            "is not present",
        )])
    }
}

/// TF-EC2-006: instances launched with a public IP address.
pub struct PublicIpOnLaunch;

impl Predicate for PublicIpOnLaunch {
    fn metadata(&self) -> RuleMetadata {
        RuleMetadata {
            id: "TF-EC2-006".into(),
            name: "Public IP on launch".into(),
            description: "Instance or launch template associates a public IP address".into(),
            dialect: self.dialect(),
            resource_types: owned(self.resource_types()),
            default_severity: Severity::Low,
            category: Category::NetworkExposure,
            message_open: "EC2 instances will be launched with public ip addresses".into(),
            message_closed: "EC2 instances won't be launched with public ip addresses".into(),
            remediation: Some("Set associate_public_ip_address = false and reach instances through a load balancer or bastion.".into()),
        }
    }

    fn dialect(&self) -> Dialect {
        Dialect::Block
    }

    fn resource_types(&self) -> &'static [&'static str] {
        INSTANCES
    }

    fn inspect(&self, resource: &Resource) -> Result<Vec<Violation>> {
        let public = if resource.resource_type == "aws_launch_template" {
            let mut public = false;
            for interface in resource.get("network_interfaces").map(as_sequence).unwrap_or_default() {
                if let Some(flag) = interface.get("associate_public_ip_address") {
                    public |= bool_value(flag)? == Some(true);
                }
            }
            public
        } else {
            bool_attr(resource, "associate_public_ip_address", false)? == Some(true)
        };

        if !public {
            return Ok(vec![]);
        }
        Ok(vec![Violation::new(
            format!("{}/associate_public_ip_address/true", resource.resource_type),
            "associates public IP on launch",
        )])
    }
}

/// TF-EC2-007: instances that fall back to the default security group.
pub struct DefaultSecurityGroup;

impl Predicate for DefaultSecurityGroup {
    fn metadata(&self) -> RuleMetadata {
        RuleMetadata {
            id: "TF-EC2-007".into(),
            name: "Default security group in use".into(),
            description: "Instance or launch template sets neither security_groups nor vpc_security_group_ids".into(),
            dialect: self.dialect(),
            resource_types: owned(self.resource_types()),
            default_severity: Severity::Medium,
            category: Category::NetworkExposure,
            message_open: "EC2 Instances or Launch Templates are using the default security group".into(),
            message_closed: "EC2 Instances or Launch Templates are not using the default security group".into(),
            remediation: Some("Attach a dedicated security group.".into()),
        }
    }

    fn dialect(&self) -> Dialect {
        Dialect::Block
    }

    fn resource_types(&self) -> &'static [&'static str] {
        INSTANCES
    }

    fn inspect(&self, resource: &Resource) -> Result<Vec<Violation>> {
        if resource.has("security_groups") || resource.has("vpc_security_group_ids") {
            return Ok(vec![]);
        }
        Ok(vec![Violation::new(
            format!("{}/(vpc_)security_groups(_ids)", resource.resource_type),
            "is empty, and therefore uses default security group",
        )])
    }
}
