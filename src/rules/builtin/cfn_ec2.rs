use serde_json::Value;

use super::{literal_bool, owned};
use crate::analysis::network::{
    check_cidrs, normalize_rule_list, Direction, Ipv4Net, Ipv6Net, NetworkRule,
};
use crate::error::Result;
use crate::ir::value::{as_sequence, display, is_present, to_integer};
use crate::ir::{Dialect, Resource};
use crate::rules::{Category, Predicate, RuleMetadata, Severity, Violation};

const LAUNCH_TEMPLATE: &str = "AWS::EC2::LaunchTemplate";
const INSTANCE: &str = "AWS::EC2::Instance";
const SECURITY_GROUP: &str = "AWS::EC2::SecurityGroup";
const SECURITY_GROUP_RULES: &[&str] = &[
    SECURITY_GROUP,
    "AWS::EC2::SecurityGroupIngress",
    "AWS::EC2::SecurityGroupEgress",
];

/// Remote administration and database ports.
const ADMIN_PORTS: &[i64] = &[
    22, 445, 1521, 2438, 3306, 3389, 5432, 6379, 7199, 8111, 8888, 9160, 11211, 27017,
];
const DNS_PORT: i64 = 53;
const FTP_PORTS: &[i64] = &[20, 21];
const RFC1918: &[&str] = &["10.0.0.0/8", "172.16.0.0/12", "192.168.0.0/16"];

/// Where launch settings live: under `LaunchTemplateData` for templates,
/// at the top level for instances.
fn launch_setting<'a>(resource: &'a Resource, key: &str) -> Option<&'a serde_json::Value> {
    if resource.resource_type == LAUNCH_TEMPLATE {
        resource.lookup(&["LaunchTemplateData", key])
    } else {
        resource.get(key)
    }
}

fn setting_entity(resource: &Resource, key: &str) -> String {
    if resource.resource_type == LAUNCH_TEMPLATE {
        format!("{LAUNCH_TEMPLATE}/LaunchTemplateData/{key}")
    } else {
        format!("{}/{key}", resource.resource_type)
    }
}

/// CFN-EC2-001: security groups open to the world, or ingress wider than one host.
pub struct UnrestrictedCidrs;

impl Predicate for UnrestrictedCidrs {
    fn metadata(&self) -> RuleMetadata {
        RuleMetadata {
            id: "CFN-EC2-001".into(),
            name: "Unrestricted security group CIDR".into(),
            description: "Security group rule allows 0.0.0.0/0 or ::/0, or ingress from more than a single host".into(),
            dialect: self.dialect(),
            resource_types: owned(self.resource_types()),
            default_severity: Severity::High,
            category: Category::NetworkExposure,
            message_open: "EC2 security groups have unrestricted CIDRs".into(),
            message_closed: "EC2 security groups do not have unrestricted CIDRs".into(),
            remediation: Some("Restrict CidrIp to the specific hosts that need access.".into()),
        }
    }

    fn dialect(&self) -> Dialect {
        Dialect::Declarative
    }

    fn resource_types(&self) -> &'static [&'static str] {
        &[
            "AWS::EC2::SecurityGroup",
            "AWS::EC2::SecurityGroupIngress",
            "AWS::EC2::SecurityGroupEgress",
        ]
    }

    fn inspect(&self, resource: &Resource) -> Result<Vec<Violation>> {
        Ok(normalize_rule_list(resource)
            .iter()
            .flat_map(|rule| check_cidrs(rule, "CidrIp", "CidrIpv6"))
            .map(|v| Violation::new(v.entity, v.reason))
            .collect())
    }
}

/// CFN-EC2-002: volumes that declare `Encrypted` false.
pub struct UnencryptedVolumes;

impl Predicate for UnencryptedVolumes {
    fn metadata(&self) -> RuleMetadata {
        RuleMetadata {
            id: "CFN-EC2-002".into(),
            name: "EC2 volume not encrypted".into(),
            description: "EC2 volume explicitly disables encryption".into(),
            dialect: self.dialect(),
            resource_types: owned(self.resource_types()),
            default_severity: Severity::High,
            category: Category::Encryption,
            message_open: "EC2 volumes are not encrypted".into(),
            message_closed: "EC2 volumes are encrypted".into(),
            remediation: Some("Set Encrypted: true.".into()),
        }
    }

    fn dialect(&self) -> Dialect {
        Dialect::Declarative
    }

    fn resource_types(&self) -> &'static [&'static str] {
        &["AWS::EC2::Volume"]
    }

    fn inspect(&self, resource: &Resource) -> Result<Vec<Violation>> {
        let Some(encrypted) = resource.get("Encrypted") else {
            return Ok(vec![]);
        };
        if literal_bool(Some(encrypted), true) != Some(false) {
            return Ok(vec![]);
        }
        Ok(vec![Violation::new("AWS::EC2::Volume/Encrypted", "is not encrypted")])
    }
}

/// CFN-EC2-003: instances without an IAM instance profile.
pub struct MissingInstanceProfile;

impl Predicate for MissingInstanceProfile {
    fn metadata(&self) -> RuleMetadata {
        RuleMetadata {
            id: "CFN-EC2-003".into(),
            name: "Instance without IAM instance profile".into(),
            description: "EC2 instance has no IamInstanceProfile, so credentials must be managed by hand".into(),
            dialect: self.dialect(),
            resource_types: owned(self.resource_types()),
            default_severity: Severity::Low,
            category: Category::InstanceHardening,
            message_open: "EC2 instances have no IamInstanceProfile set".into(),
            message_closed: "EC2 instances have an IamInstanceProfile set".into(),
            remediation: Some("Attach an IAM role through IamInstanceProfile.".into()),
        }
    }

    fn dialect(&self) -> Dialect {
        Dialect::Declarative
    }

    fn resource_types(&self) -> &'static [&'static str] {
        &[INSTANCE]
    }

    fn inspect(&self, resource: &Resource) -> Result<Vec<Violation>> {
        if resource.has("IamInstanceProfile") {
            return Ok(vec![]);
        }
        Ok(vec![Violation::new(
            "AWS::EC2::Instance/IamInstanceProfile",
            "is not present",
        )])
    }
}

/// CFN-EC2-004: API termination not disabled.
pub struct TerminationProtection;

impl Predicate for TerminationProtection {
    fn metadata(&self) -> RuleMetadata {
        RuleMetadata {
            id: "CFN-EC2-004".into(),
            name: "Termination protection disabled".into(),
            description: "Instance or launch template does not set DisableApiTermination".into(),
            dialect: self.dialect(),
            resource_types: owned(self.resource_types()),
            default_severity: Severity::Low,
            category: Category::InstanceHardening,
            message_open: "EC2 instances or launch templates have API termination enabled".into(),
            message_closed: "EC2 instances or launch templates have API termination disabled".into(),
            remediation: Some("Set DisableApiTermination: true.".into()),
        }
    }

    fn dialect(&self) -> Dialect {
        Dialect::Declarative
    }

    fn resource_types(&self) -> &'static [&'static str] {
        &[LAUNCH_TEMPLATE, INSTANCE]
    }

    fn inspect(&self, resource: &Resource) -> Result<Vec<Violation>> {
        let value = launch_setting(resource, "DisableApiTermination");
        if literal_bool(value, false) != Some(false) {
            return Ok(vec![]);
        }
        Ok(vec![Violation::new(
            setting_entity(resource, "DisableApiTermination"),
            "has not disabled api termination",
        )])
    }
}

/// CFN-EC2-005: launch templates whose instances terminate on shutdown.
pub struct TerminateOnShutdown;

impl Predicate for TerminateOnShutdown {
    fn metadata(&self) -> RuleMetadata {
        RuleMetadata {
            id: "CFN-EC2-005".into(),
            name: "Terminate on shutdown".into(),
            description: "Launch template sets InstanceInitiatedShutdownBehavior to terminate".into(),
            dialect: self.dialect(),
            resource_types: owned(self.resource_types()),
            default_severity: Severity::Low,
            category: Category::InstanceHardening,
            message_open: "EC2 Launch Templates allow the shutdown command to terminate instances".into(),
            message_closed: "EC2 Launch Templates disallow the shutdown command to terminate instances".into(),
            remediation: Some("Use InstanceInitiatedShutdownBehavior: stop.".into()),
        }
    }

    fn dialect(&self) -> Dialect {
        Dialect::Declarative
    }

    fn resource_types(&self) -> &'static [&'static str] {
        &[LAUNCH_TEMPLATE]
    }

    fn inspect(&self, resource: &Resource) -> Result<Vec<Violation>> {
        let behavior = launch_setting(resource, "InstanceInitiatedShutdownBehavior")
            .map(display)
            .unwrap_or_else(|| "stop".into());
        if !behavior.eq_ignore_ascii_case("terminate") {
            return Ok(vec![]);
        }
        Ok(vec![Violation::new(
            format!(
                "{}/{behavior}",
                setting_entity(resource, "InstanceInitiatedShutdownBehavior")
            ),
            "has -terminate- as shutdown behavior",
        )])
    }
}

/// CFN-EC2-006: instances that fall back to the default security group.
pub struct DefaultSecurityGroup;

impl Predicate for DefaultSecurityGroup {
    fn metadata(&self) -> RuleMetadata {
        RuleMetadata {
            id: "CFN-EC2-006".into(),
            name: "Default security group in use".into(),
            description: "Instance or launch template sets neither SecurityGroups nor SecurityGroupIds".into(),
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
        Dialect::Declarative
    }

    fn resource_types(&self) -> &'static [&'static str] {
        &[LAUNCH_TEMPLATE, INSTANCE]
    }

    fn inspect(&self, resource: &Resource) -> Result<Vec<Violation>> {
        let set = ["SecurityGroups", "SecurityGroupIds"]
            .iter()
            .any(|key| launch_setting(resource, key).is_some_and(is_present));
        if set {
            return Ok(vec![]);
        }
        Ok(vec![Violation::new(
            setting_entity(resource, "SecurityGroups(Ids)"),
            "is empty, and therefore uses default security group",
        )])
    }
}

/// Entity prefix of one security group rule:
/// `AWS::EC2::SecurityGroup/SecurityGroupIngress` for nested rules, the
/// resource type for standalone ones.
fn rule_path(resource: &Resource, rule: &NetworkRule<'_>) -> String {
    match (resource.resource_type == SECURITY_GROUP, rule.direction) {
        (true, Some(Direction::Ingress)) => format!("{SECURITY_GROUP}/SecurityGroupIngress"),
        (true, Some(Direction::Egress)) => format!("{SECURITY_GROUP}/SecurityGroupEgress"),
        _ => resource.resource_type.clone(),
    }
}

/// `FromPort`/`ToPort` when both are integers.
fn port_range(rule: &NetworkRule<'_>) -> Option<(i64, i64)> {
    let port = |key: &str| rule.get(key).and_then(|v| to_integer(v).ok());
    Some((port("FromPort")?, port("ToPort")?))
}

/// The rule's CIDR when it is the whole IPv4 or IPv6 address space.
fn world_cidr<'a>(rule: &NetworkRule<'a>) -> Option<&'a str> {
    let v4 = rule
        .get("CidrIp")
        .and_then(Value::as_str)
        .filter(|c| Ipv4Net::parse(c).is_some_and(|n| n.is_unrestricted()));
    let v6 = rule
        .get("CidrIpv6")
        .and_then(Value::as_str)
        .filter(|c| Ipv6Net::parse(c).is_some_and(|n| n.is_unrestricted()));
    v4.or(v6)
}

/// Ports of `ports` that a world-open rule covers.
fn exposed_ports(rule: &NetworkRule<'_>, ports: &[i64]) -> Vec<i64> {
    let Some((from, to)) = port_range(rule) else {
        return Vec::new();
    };
    if world_cidr(rule).is_none() {
        return Vec::new();
    }
    ports
        .iter()
        .copied()
        .filter(|port| (from..=to).contains(port))
        .collect()
}

fn protocol(rule: &NetworkRule<'_>) -> Option<String> {
    rule.get("IpProtocol").map(display)
}

/// CFN-EC2-007: a security group without egress rules keeps the default allow-all.
pub struct AllowsAllOutbound;

impl Predicate for AllowsAllOutbound {
    fn metadata(&self) -> RuleMetadata {
        RuleMetadata {
            id: "CFN-EC2-007".into(),
            name: "Security group allows all outbound traffic".into(),
            description: "Security group declares no SecurityGroupEgress, so AWS keeps its default allow-all egress rule".into(),
            dialect: self.dialect(),
            resource_types: owned(self.resource_types()),
            default_severity: Severity::Low,
            category: Category::NetworkExposure,
            message_open: "EC2 security groups allow all outbound traffic".into(),
            message_closed: "EC2 security groups do not allow all outbound traffic".into(),
            remediation: Some("Declare explicit SecurityGroupEgress rules.".into()),
        }
    }

    fn dialect(&self) -> Dialect {
        Dialect::Declarative
    }

    fn resource_types(&self) -> &'static [&'static str] {
        &[SECURITY_GROUP]
    }

    fn inspect(&self, resource: &Resource) -> Result<Vec<Violation>> {
        if resource.get("SecurityGroupEgress").is_some_and(is_present) {
            return Ok(vec![]);
        }
        Ok(vec![Violation::new(
            format!("{SECURITY_GROUP}/SecurityGroupEgress"),
            "allows all outbound traffic",
        )])
    }
}

/// CFN-EC2-008: rules with `IpProtocol` `-1`.
pub struct UnrestrictedProtocols;

impl Predicate for UnrestrictedProtocols {
    fn metadata(&self) -> RuleMetadata {
        RuleMetadata {
            id: "CFN-EC2-008".into(),
            name: "Unrestricted IP protocols".into(),
            description: "Security group rule authorizes every IP protocol (IpProtocol -1)".into(),
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
        Dialect::Declarative
    }

    fn resource_types(&self) -> &'static [&'static str] {
        SECURITY_GROUP_RULES
    }

    fn inspect(&self, resource: &Resource) -> Result<Vec<Violation>> {
        Ok(normalize_rule_list(resource)
            .iter()
            .filter(|rule| protocol(rule).as_deref() == Some("-1"))
            .map(|rule| {
                Violation::new(
                    format!("{}/IpProtocol/-1", rule_path(resource, rule)),
                    "authorizes all IP protocols",
                )
            })
            .collect())
    }
}

/// CFN-EC2-009: rules opening a range of ports instead of one.
pub struct PortRanges;

impl Predicate for PortRanges {
    fn metadata(&self) -> RuleMetadata {
        RuleMetadata {
            id: "CFN-EC2-009".into(),
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
        Dialect::Declarative
    }

    fn resource_types(&self) -> &'static [&'static str] {
        SECURITY_GROUP_RULES
    }

    fn inspect(&self, resource: &Resource) -> Result<Vec<Violation>> {
        let mut violations = Vec::new();
        for rule in normalize_rule_list(resource) {
            let Some((from, to)) = port_range(&rule) else {
                continue;
            };
            if from != to {
                violations.push(Violation::new(
                    format!("{}/FromPort->ToPort/{from}->{to}", rule_path(resource, &rule)),
                    "grants access over a port range",
                ));
            }
        }
        Ok(violations)
    }
}

/// CFN-EC2-010: instances whose network interfaces get a public IP.
pub struct PublicIpOnLaunch;

impl Predicate for PublicIpOnLaunch {
    fn metadata(&self) -> RuleMetadata {
        RuleMetadata {
            id: "CFN-EC2-010".into(),
            name: "Public IP on launch".into(),
            description: "Instance network interface sets AssociatePublicIpAddress".into(),
            dialect: self.dialect(),
            resource_types: owned(self.resource_types()),
            default_severity: Severity::Low,
            category: Category::NetworkExposure,
            message_open: "EC2 instances will be launched with public ip addresses".into(),
            message_closed: "EC2 instances won't be launched with public ip addresses".into(),
            remediation: Some("Set AssociatePublicIpAddress: false and reach instances through a load balancer or bastion.".into()),
        }
    }

    fn dialect(&self) -> Dialect {
        Dialect::Declarative
    }

    fn resource_types(&self) -> &'static [&'static str] {
        &[INSTANCE]
    }

    fn inspect(&self, resource: &Resource) -> Result<Vec<Violation>> {
        let public = resource
            .get("NetworkInterfaces")
            .map(as_sequence)
            .unwrap_or_default()
            .into_iter()
            .any(|interface| {
                literal_bool(interface.get("AssociatePublicIpAddress"), false) == Some(true)
            });
        if !public {
            return Ok(vec![]);
        }
        Ok(vec![Violation::new(
            "AWS::EC2::Instance/NetworkInterfaces/AssociatePublicIpAddress/true",
            "associates public IP on launch",
        )])
    }
}

/// CFN-EC2-011: administration and database ports open to the internet.
pub struct AdminPortsOpen;

impl Predicate for AdminPortsOpen {
    fn metadata(&self) -> RuleMetadata {
        RuleMetadata {
            id: "CFN-EC2-011".into(),
            name: "Admin ports open to the internet".into(),
            description: "Security group rule from 0.0.0.0/0 or ::/0 covers SSH, RDP, CIFS or a database port".into(),
            dialect: self.dialect(),
            resource_types: owned(self.resource_types()),
            default_severity: Severity::High,
            category: Category::NetworkExposure,
            message_open: "EC2 security groups have ingress/egress rules that allow access to admin ports over the internet".into(),
            message_closed: "EC2 security groups have ingress/egress rules that deny access to admin ports over the internet".into(),
            remediation: Some("Reach admin ports through a VPN or bastion host, never from 0.0.0.0/0.".into()),
        }
    }

    fn dialect(&self) -> Dialect {
        Dialect::Declarative
    }

    fn resource_types(&self) -> &'static [&'static str] {
        SECURITY_GROUP_RULES
    }

    fn inspect(&self, resource: &Resource) -> Result<Vec<Violation>> {
        let mut violations = Vec::new();
        for rule in normalize_rule_list(resource) {
            for port in exposed_ports(&rule, ADMIN_PORTS) {
                violations.push(Violation::new(
                    format!("{}/{port}", rule_path(resource, &rule)),
                    "grants access to admin ports from internet",
                ));
            }
        }
        Ok(violations)
    }
}

/// CFN-EC2-012: DNS open to the internet.
pub struct UnrestrictedDns;

impl Predicate for UnrestrictedDns {
    fn metadata(&self) -> RuleMetadata {
        RuleMetadata {
            id: "CFN-EC2-012".into(),
            name: "Unrestricted DNS access".into(),
            description: "Security group rule from 0.0.0.0/0 or ::/0 covers port 53".into(),
            dialect: self.dialect(),
            resource_types: owned(self.resource_types()),
            default_severity: Severity::Medium,
            category: Category::NetworkExposure,
            message_open: "Security groups allow access to DNS without restrictions.".into(),
            message_closed: "Security groups allow access to DNS to the necessary IP addresses.".into(),
            remediation: Some("Restrict TCP and UDP port 53 to the resolvers that need it.".into()),
        }
    }

    fn dialect(&self) -> Dialect {
        Dialect::Declarative
    }

    fn resource_types(&self) -> &'static [&'static str] {
        SECURITY_GROUP_RULES
    }

    fn inspect(&self, resource: &Resource) -> Result<Vec<Violation>> {
        let mut violations = Vec::new();
        for rule in normalize_rule_list(resource) {
            for port in exposed_ports(&rule, &[DNS_PORT]) {
                violations.push(Violation::new(
                    format!("{}/{port}", rule_path(resource, &rule)),
                    "must restrict TCP and UDP port 53 to the necessary IP addresses",
                ));
            }
        }
        Ok(violations)
    }
}

/// CFN-EC2-013: FTP open to the internet.
pub struct UnrestrictedFtp;

impl Predicate for UnrestrictedFtp {
    fn metadata(&self) -> RuleMetadata {
        RuleMetadata {
            id: "CFN-EC2-013".into(),
            name: "Unrestricted FTP access".into(),
            description: "TCP (or all-protocol) security group rule from 0.0.0.0/0 or ::/0 covers port 20 or 21".into(),
            dialect: self.dialect(),
            resource_types: owned(self.resource_types()),
            default_severity: Severity::Medium,
            category: Category::NetworkExposure,
            message_open: "Security groups allow access to FTP without restrictions.".into(),
            message_closed: "Security groups allow access to FTP to the necessary IP addresses.".into(),
            remediation: Some("Restrict TCP ports 20 and 21 to the hosts that need them, or use SFTP.".into()),
        }
    }

    fn dialect(&self) -> Dialect {
        Dialect::Declarative
    }

    fn resource_types(&self) -> &'static [&'static str] {
        SECURITY_GROUP_RULES
    }

    fn inspect(&self, resource: &Resource) -> Result<Vec<Violation>> {
        let mut violations = Vec::new();
        for rule in normalize_rule_list(resource) {
            if !matches!(protocol(&rule).as_deref(), Some("tcp" | "-1")) {
                continue;
            }
            for port in exposed_ports(&rule, FTP_PORTS) {
                violations.push(Violation::new(
                    format!("{}/{port}", rule_path(resource, &rule)),
                    "must restrict TCP ports 20 and 21 to the necessary IP addresses",
                ));
            }
        }
        Ok(violations)
    }
}

/// CFN-EC2-014: ingress from a whole RFC 1918 private range.
pub struct PrivateRangeIngress;

impl Predicate for PrivateRangeIngress {
    fn metadata(&self) -> RuleMetadata {
        RuleMetadata {
            id: "CFN-EC2-014".into(),
            name: "Ingress from RFC 1918 range".into(),
            description: "Security group ingress allows all of 10.0.0.0/8, 172.16.0.0/12 or 192.168.0.0/16".into(),
            dialect: self.dialect(),
            resource_types: owned(self.resource_types()),
            default_severity: Severity::Medium,
            category: Category::NetworkExposure,
            message_open: "Security groups contain RFC-1918 CIDRs open.".into(),
            message_closed: "Security groups do not contain RFC-1918 CIDRs open.".into(),
            remediation: Some("Allow only the private subnets that need access.".into()),
        }
    }

    fn dialect(&self) -> Dialect {
        Dialect::Declarative
    }

    fn resource_types(&self) -> &'static [&'static str] {
        SECURITY_GROUP_RULES
    }

    fn inspect(&self, resource: &Resource) -> Result<Vec<Violation>> {
        let private: Vec<Ipv4Net> = RFC1918.iter().filter_map(|c| Ipv4Net::parse(c)).collect();
        let mut violations = Vec::new();
        for rule in normalize_rule_list(resource) {
            if !rule.is_ingress() {
                continue;
            }
            let Some(cidr) = rule.get("CidrIp").and_then(Value::as_str) else {
                continue;
            };
            if Ipv4Net::parse(cidr).is_some_and(|net| private.contains(&net)) {
                violations.push(Violation::new(
                    format!("{}/CidrIp/{cidr}", rule_path(resource, &rule)),
                    "allows a whole private address range",
                ));
            }
        }
        Ok(violations)
    }
}

/// CFN-EC2-015: every port open to the internet.
pub struct AllPortsOpen;

impl Predicate for AllPortsOpen {
    fn metadata(&self) -> RuleMetadata {
        RuleMetadata {
            id: "CFN-EC2-015".into(),
            name: "All ports open to the public".into(),
            description: "Security group rule from 0.0.0.0/0 or ::/0 spans the whole port range".into(),
            dialect: self.dialect(),
            resource_types: owned(self.resource_types()),
            default_severity: Severity::High,
            category: Category::NetworkExposure,
            message_open: "Security groups have all ports open to the public".into(),
            message_closed: "Security groups do not have all ports open to the public".into(),
            remediation: Some("Open only the ports the service listens on.".into()),
        }
    }

    fn dialect(&self) -> Dialect {
        Dialect::Declarative
    }

    fn resource_types(&self) -> &'static [&'static str] {
        SECURITY_GROUP_RULES
    }

    fn inspect(&self, resource: &Resource) -> Result<Vec<Violation>> {
        let mut violations = Vec::new();
        for rule in normalize_rule_list(resource) {
            let Some((from, to)) = port_range(&rule) else {
                continue;
            };
            if from <= 1 && to >= 65535 && world_cidr(&rule).is_some() {
                violations.push(Violation::new(
                    format!("{}/FromPort->ToPort/{from}->{to}", rule_path(resource, &rule)),
                    "grants public access to all ports",
                ));
            }
        }
        Ok(violations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::builtin::test_support::resource;
    use serde_json::json;

    #[test]
    fn nested_ingress_cidrs() {
        let sg = resource(
            "AWS::EC2::SecurityGroup",
            json!({
                "SecurityGroupIngress": [
                    {"IpProtocol": "tcp", "CidrIp": "0.0.0.0/0", "FromPort": 22, "ToPort": 22},
                    {"IpProtocol": "tcp", "CidrIpv6": "::/0", "FromPort": 443, "ToPort": 443}
                ],
                "SecurityGroupEgress": [{"CidrIp": "10.0.0.0/16"}]
            }),
        );
        let entities: Vec<_> = UnrestrictedCidrs
            .inspect(&sg)
            .unwrap()
            .into_iter()
            .map(|v| v.entity)
            .collect();
        assert_eq!(entities, vec!["CidrIp/0.0.0.0/0", "CidrIp/0.0.0.0/0", "CidrIpv6/::/0", "CidrIpv6/::/0"]);
    }

    #[test]
    fn standalone_egress_only_checks_world() {
        let egress = resource("AWS::EC2::SecurityGroupEgress", json!({"CidrIp": "10.0.0.0/8"}));
        assert!(UnrestrictedCidrs.inspect(&egress).unwrap().is_empty());
        let ingress = resource("AWS::EC2::SecurityGroupIngress", json!({"CidrIp": "10.0.0.0/8"}));
        assert_eq!(UnrestrictedCidrs.inspect(&ingress).unwrap().len(), 1);
    }

    #[test]
    fn volume_encryption_only_when_declared() {
        let absent = resource("AWS::EC2::Volume", json!({"Size": 10}));
        assert!(UnencryptedVolumes.inspect(&absent).unwrap().is_empty());
        let off = resource("AWS::EC2::Volume", json!({"Encrypted": "false"}));
        assert_eq!(UnencryptedVolumes.inspect(&off).unwrap().len(), 1);
        let reference = resource("AWS::EC2::Volume", json!({"Encrypted": {"Ref": "Flag"}}));
        assert!(UnencryptedVolumes.inspect(&reference).unwrap().is_empty());
    }

    #[test]
    fn termination_protection_reads_template_data() {
        let template = resource(
            LAUNCH_TEMPLATE,
            json!({"LaunchTemplateData": {"DisableApiTermination": true}}),
        );
        assert!(TerminationProtection.inspect(&template).unwrap().is_empty());

        let instance = resource(INSTANCE, json!({}));
        let violations = TerminationProtection.inspect(&instance).unwrap();
        assert_eq!(violations[0].entity, "AWS::EC2::Instance/DisableApiTermination");
    }

    #[test]
    fn shutdown_behavior() {
        let template = resource(
            LAUNCH_TEMPLATE,
            json!({"LaunchTemplateData": {"InstanceInitiatedShutdownBehavior": "Terminate"}}),
        );
        assert_eq!(TerminateOnShutdown.inspect(&template).unwrap().len(), 1);
        let default = resource(LAUNCH_TEMPLATE, json!({"LaunchTemplateData": {}}));
        assert!(TerminateOnShutdown.inspect(&default).unwrap().is_empty());
    }

    #[test]
    fn security_groups() {
        let template = resource(LAUNCH_TEMPLATE, json!({"LaunchTemplateData": {"SecurityGroupIds": ["sg-1"]}}));
        assert!(DefaultSecurityGroup.inspect(&template).unwrap().is_empty());
        let instance = resource(INSTANCE, json!({"SecurityGroups": []}));
        assert_eq!(DefaultSecurityGroup.inspect(&instance).unwrap().len(), 1);
    }

    fn wide_open_group() -> Resource {
        resource(
            SECURITY_GROUP,
            json!({
                "SecurityGroupIngress": [
                    {"IpProtocol": "-1", "FromPort": 0, "ToPort": 65535, "CidrIp": "0.0.0.0/0"},
                    {"IpProtocol": "tcp", "FromPort": "443", "ToPort": "443", "CidrIp": "10.0.0.0/8"}
                ]
            }),
        )
    }

    #[test]
    fn missing_egress_allows_all_outbound() {
        let sg = wide_open_group();
        let violations = AllowsAllOutbound.inspect(&sg).unwrap();
        assert_eq!(violations[0].entity, "AWS::EC2::SecurityGroup/SecurityGroupEgress");

        let restricted = resource(SECURITY_GROUP, json!({"SecurityGroupEgress": [{"CidrIp": "10.0.0.0/16"}]}));
        assert!(AllowsAllOutbound.inspect(&restricted).unwrap().is_empty());
    }

    #[test]
    fn all_protocols_and_port_ranges() {
        let sg = wide_open_group();
        let protocols = UnrestrictedProtocols.inspect(&sg).unwrap();
        assert_eq!(protocols.len(), 1);
        assert_eq!(protocols[0].entity, "AWS::EC2::SecurityGroup/SecurityGroupIngress/IpProtocol/-1");

        let ranges = PortRanges.inspect(&sg).unwrap();
        assert_eq!(ranges.len(), 1);
        assert_eq!(
            ranges[0].entity,
            "AWS::EC2::SecurityGroup/SecurityGroupIngress/FromPort->ToPort/0->65535"
        );

        let standalone = resource(
            "AWS::EC2::SecurityGroupEgress",
            json!({"IpProtocol": -1, "FromPort": 80, "ToPort": 81}),
        );
        assert_eq!(
            UnrestrictedProtocols.inspect(&standalone).unwrap()[0].entity,
            "AWS::EC2::SecurityGroupEgress/IpProtocol/-1"
        );
        assert_eq!(PortRanges.inspect(&standalone).unwrap().len(), 1);
    }

    #[test]
    fn public_ip_on_network_interface() {
        let public = resource(
            INSTANCE,
            json!({"NetworkInterfaces": [{"DeviceIndex": "0", "AssociatePublicIpAddress": "true"}]}),
        );
        assert_eq!(PublicIpOnLaunch.inspect(&public).unwrap().len(), 1);

        let private = resource(
            INSTANCE,
            json!({"NetworkInterfaces": [{"AssociatePublicIpAddress": false}, {"AssociatePublicIpAddress": {"Ref": "Public"}}]}),
        );
        assert!(PublicIpOnLaunch.inspect(&private).unwrap().is_empty());
    }

    #[test]
    fn world_open_ports() {
        let sg = wide_open_group();
        assert_eq!(AdminPortsOpen.inspect(&sg).unwrap().len(), ADMIN_PORTS.len());
        assert_eq!(
            UnrestrictedDns.inspect(&sg).unwrap()[0].entity,
            "AWS::EC2::SecurityGroup/SecurityGroupIngress/53"
        );
        assert_eq!(UnrestrictedFtp.inspect(&sg).unwrap().len(), 2);
        assert_eq!(AllPortsOpen.inspect(&sg).unwrap().len(), 1);
    }

    #[test]
    fn narrow_sources_do_not_expose_ports() {
        let ssh = resource(
            "AWS::EC2::SecurityGroupIngress",
            json!({"IpProtocol": "tcp", "FromPort": 22, "ToPort": 22, "CidrIp": "203.0.113.7/32"}),
        );
        assert!(AdminPortsOpen.inspect(&ssh).unwrap().is_empty());

        let ssh_v6 = resource(
            "AWS::EC2::SecurityGroupIngress",
            json!({"IpProtocol": "tcp", "FromPort": 22, "ToPort": 22, "CidrIpv6": "::/0"}),
        );
        assert_eq!(AdminPortsOpen.inspect(&ssh_v6).unwrap()[0].entity, "AWS::EC2::SecurityGroupIngress/22");

        let udp_ftp = resource(
            "AWS::EC2::SecurityGroupIngress",
            json!({"IpProtocol": "udp", "FromPort": 20, "ToPort": 21, "CidrIp": "0.0.0.0/0"}),
        );
        assert!(UnrestrictedFtp.inspect(&udp_ftp).unwrap().is_empty());
    }

    #[test]
    fn private_ranges_on_ingress_only() {
        let sg = wide_open_group();
        let violations = PrivateRangeIngress.inspect(&sg).unwrap();
        assert_eq!(violations.len(), 1);
        assert_eq!(
            violations[0].entity,
            "AWS::EC2::SecurityGroup/SecurityGroupIngress/CidrIp/10.0.0.0/8"
        );

        let egress = resource("AWS::EC2::SecurityGroupEgress", json!({"CidrIp": "192.168.0.0/16"}));
        assert!(PrivateRangeIngress.inspect(&egress).unwrap().is_empty());
        let subnet = resource("AWS::EC2::SecurityGroupIngress", json!({"CidrIp": "10.1.0.0/16"}));
        assert!(PrivateRangeIngress.inspect(&subnet).unwrap().is_empty());
        let host_bits = resource("AWS::EC2::SecurityGroupIngress", json!({"CidrIp": "172.20.1.1/12"}));
        assert_eq!(PrivateRangeIngress.inspect(&host_bits).unwrap().len(), 1);
    }

    #[test]
    fn instance_profile() {
        let instance = resource(INSTANCE, json!({"IamInstanceProfile": {"Ref": "Profile"}}));
        assert!(MissingInstanceProfile.inspect(&instance).unwrap().is_empty());
    }
}
