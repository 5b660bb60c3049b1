//! Network rule analysis: CIDR parsing and security-group rule shapes.

use std::net::{Ipv4Addr, Ipv6Addr};

use serde_json::Value;

use crate::ir::value::as_sequence;
use crate::ir::{Properties, Resource};

/// Traffic direction of a network rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ingress,
    Egress,
}

impl Direction {
    fn from_str_lenient(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "ingress" | "securitygroupingress" => Some(Self::Ingress),
            "egress" | "securitygroupegress" => Some(Self::Egress),
            _ => None,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ingress => write!(f, "ingress"),
            Self::Egress => write!(f, "egress"),
        }
    }
}

/// One ingress or egress rule, either nested in a security group or
/// declared as a resource of its own.
#[derive(Debug, Clone, Copy)]
pub struct NetworkRule<'a> {
    /// `None` when a standalone rule does not say which way it applies.
    pub direction: Option<Direction>,
    pub fields: &'a Properties,
}

impl<'a> NetworkRule<'a> {
    pub fn get(&self, key: &str) -> Option<&'a Value> {
        self.fields.get(key)
    }

    pub fn is_ingress(&self) -> bool {
        self.direction == Some(Direction::Ingress)
    }

    /// Direction label used in finding entities.
    pub fn label(&self) -> String {
        self.direction
            .map(|d| d.to_string())
            .unwrap_or_else(|| "rule".into())
    }
}

/// Security-group shapes with nested rule lists: `(resource type, [(key, direction)])`.
const NESTED_RULES: &[(&str, &[(&str, Direction)])] = &[
    (
        "aws_security_group",
        &[("ingress", Direction::Ingress), ("egress", Direction::Egress)],
    ),
    (
        "AWS::EC2::SecurityGroup",
        &[
            ("SecurityGroupIngress", Direction::Ingress),
            ("SecurityGroupEgress", Direction::Egress),
        ],
    ),
];

/// Flatten a security-group-like resource into individual rules.
///
/// Groups with nested `ingress`/`egress` entries yield one rule per entry,
/// tagged with its direction. Standalone rule resources yield themselves,
/// with the direction taken from their `type` attribute or, failing that,
/// from the resource type name.
pub fn normalize_rule_list(resource: &Resource) -> Vec<NetworkRule<'_>> {
    if let Some((_, keys)) = NESTED_RULES
        .iter()
        .find(|(kind, _)| *kind == resource.resource_type)
    {
        let mut rules = Vec::new();
        for (key, direction) in keys.iter() {
            let Some(entries) = resource.get(key) else {
                continue;
            };
            rules.extend(
                as_sequence(entries)
                    .into_iter()
                    .filter_map(Value::as_object)
                    .map(|fields| NetworkRule {
                        direction: Some(*direction),
                        fields,
                    }),
            );
        }
        return rules;
    }

    let direction = resource
        .get("type")
        .and_then(Value::as_str)
        .and_then(Direction::from_str_lenient)
        .or_else(|| {
            resource
                .resource_type
                .rsplit("::")
                .next()
                .and_then(Direction::from_str_lenient)
        });

    vec![NetworkRule {
        direction,
        fields: &resource.properties,
    }]
}

/// An IPv4 network in prefix form with host bits cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4Net {
    pub network: Ipv4Addr,
    pub prefix: u8,
}

/// An IPv6 network in prefix form with host bits cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv6Net {
    pub network: Ipv6Addr,
    pub prefix: u8,
}

impl Ipv4Net {
    /// Parse `a.b.c.d[/n]`. Host bits are masked off rather than rejected,
    /// so `10.0.0.7/24` parses as `10.0.0.0/24`.
    pub fn parse(s: &str) -> Option<Self> {
        let (addr, prefix) = split_prefix(s, 32)?;
        let addr: Ipv4Addr = addr.parse().ok()?;
        let mask = if prefix == 0 {
            0
        } else {
            u32::MAX << (32 - u32::from(prefix))
        };
        Some(Self {
            network: Ipv4Addr::from(u32::from(addr) & mask),
            prefix,
        })
    }

    /// The whole address space, `0.0.0.0/0`.
    pub fn is_unrestricted(&self) -> bool {
        self.prefix == 0
    }

    pub fn num_addresses(&self) -> u64 {
        1u64 << (32 - u32::from(self.prefix))
    }
}

impl Ipv6Net {
    /// Parse `addr[/n]`, masking host bits.
    pub fn parse(s: &str) -> Option<Self> {
        let (addr, prefix) = split_prefix(s, 128)?;
        let addr: Ipv6Addr = addr.parse().ok()?;
        let mask = if prefix == 0 {
            0
        } else {
            u128::MAX << (128 - u32::from(prefix))
        };
        Some(Self {
            network: Ipv6Addr::from(u128::from(addr) & mask),
            prefix,
        })
    }

    /// The whole address space, `::/0`.
    pub fn is_unrestricted(&self) -> bool {
        self.prefix == 0
    }

    pub fn num_addresses(&self) -> u128 {
        if self.prefix == 0 {
            u128::MAX
        } else {
            1u128 << (128 - u32::from(self.prefix))
        }
    }
}

fn split_prefix(s: &str, max: u8) -> Option<(&str, u8)> {
    let s = s.trim();
    match s.split_once('/') {
        None => Some((s, max)),
        Some((addr, prefix)) => {
            if prefix.is_empty() || !prefix.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            let prefix: u8 = prefix.parse().ok()?;
            (prefix <= max).then_some((addr, prefix))
        }
    }
}

/// A CIDR that breaks the openness policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CidrViolation {
    pub entity: String,
    pub reason: &'static str,
}

/// Check the IPv4 and IPv6 CIDRs of one rule.
///
/// Every CIDR equal to the whole address space is flagged. On ingress, every
/// CIDR wider than a single host is flagged as well, so one open-to-world
/// ingress CIDR produces two violations. Missing keys, non-string entries and
/// malformed CIDRs are skipped.
pub fn check_cidrs(rule: &NetworkRule<'_>, ipv4_key: &str, ipv6_key: &str) -> Vec<CidrViolation> {
    let mut violations = Vec::new();

    for cidr in rule_strings(rule, ipv4_key) {
        let Some(net) = Ipv4Net::parse(cidr) else {
            continue;
        };
        if net.is_unrestricted() {
            violations.push(CidrViolation {
                entity: format!("{ipv4_key}/{cidr}"),
                reason: "must not be 0.0.0.0/0",
            });
        }
        if rule.is_ingress() && net.num_addresses() > 1 {
            violations.push(CidrViolation {
                entity: format!("{ipv4_key}/{cidr}"),
                reason: "must use /32 subnet mask",
            });
        }
    }

    for cidr in rule_strings(rule, ipv6_key) {
        let Some(net) = Ipv6Net::parse(cidr) else {
            continue;
        };
        if net.is_unrestricted() {
            violations.push(CidrViolation {
                entity: format!("{ipv6_key}/{cidr}"),
                reason: "must not be ::/0",
            });
        }
        if rule.is_ingress() && net.num_addresses() > 1 {
            violations.push(CidrViolation {
                entity: format!("{ipv6_key}/{cidr}"),
                reason: "must use /128 subnet mask",
            });
        }
    }

    violations
}

fn rule_strings<'a>(rule: &NetworkRule<'a>, key: &str) -> Vec<&'a str> {
    rule.get(key)
        .map(|v| as_sequence(v).into_iter().filter_map(Value::as_str).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::Path;

    fn resource(kind: &str, props: Value) -> Resource {
        let Value::Object(props) = props else {
            panic!("properties must be an object")
        };
        Resource::new(Path::new("t"), "r", kind, 1, props)
    }

    #[test]
    fn parses_ipv4_non_strict() {
        let net = Ipv4Net::parse("10.0.0.7/24").unwrap();
        assert_eq!(net.network, Ipv4Addr::new(10, 0, 0, 0));
        assert_eq!(net.prefix, 24);
        assert_eq!(net.num_addresses(), 256);
        assert_eq!(Ipv4Net::parse("10.0.0.1").unwrap().prefix, 32);
        assert!(Ipv4Net::parse("0.0.0.0/0").unwrap().is_unrestricted());
        assert!(Ipv4Net::parse("10.1.2.3/0").unwrap().is_unrestricted());
    }

    #[test]
    fn rejects_malformed_cidrs() {
        for bad in ["10.0.0.0/33", "10.0.0/8", "not-a-cidr", "10.0.0.0/", "10.0.0.0/-1", "::/0"] {
            assert!(Ipv4Net::parse(bad).is_none(), "{bad} should not parse as IPv4");
        }
        assert!(Ipv6Net::parse("::/129").is_none());
        assert!(Ipv6Net::parse("0.0.0.0/0").is_none());
    }

    #[test]
    fn parses_ipv6() {
        assert!(Ipv6Net::parse("::/0").unwrap().is_unrestricted());
        assert_eq!(Ipv6Net::parse("2001:db8::1/128").unwrap().num_addresses(), 1);
        assert_eq!(Ipv6Net::parse("2001:db8::/64").unwrap().prefix, 64);
    }

    #[test]
    fn flattens_nested_rules_with_direction() {
        let sg = resource(
            "aws_security_group",
            json!({
                "ingress": [{"cidr_blocks": ["0.0.0.0/0"]}, {"cidr_blocks": ["10.0.0.1/32"]}],
                "egress": {"cidr_blocks": ["0.0.0.0/0"]}
            }),
        );
        let rules = normalize_rule_list(&sg);
        assert_eq!(rules.len(), 3);
        assert_eq!(rules[0].direction, Some(Direction::Ingress));
        assert_eq!(rules[2].direction, Some(Direction::Egress));
    }

    #[test]
    fn standalone_rules_keep_their_direction() {
        let tf_rule = resource("aws_security_group_rule", json!({"type": "ingress"}));
        assert!(normalize_rule_list(&tf_rule)[0].is_ingress());

        let cfn_rule = resource("AWS::EC2::SecurityGroupEgress", json!({"CidrIp": "0.0.0.0/0"}));
        assert_eq!(
            normalize_rule_list(&cfn_rule)[0].direction,
            Some(Direction::Egress)
        );
    }

    #[test]
    fn open_ingress_cidr_violates_twice() {
        let sg = resource(
            "aws_security_group",
            json!({"ingress": {"cidr_blocks": ["0.0.0.0/0"]}}),
        );
        let rules = normalize_rule_list(&sg);
        let violations = check_cidrs(&rules[0], "cidr_blocks", "ipv6_cidr_blocks");
        assert_eq!(violations.len(), 2);
        assert_eq!(violations[0].reason, "must not be 0.0.0.0/0");
        assert_eq!(violations[1].reason, "must use /32 subnet mask");
        assert_eq!(violations[0].entity, "cidr_blocks/0.0.0.0/0");
    }

    #[test]
    fn egress_only_checks_unrestricted() {
        let sg = resource(
            "aws_security_group",
            json!({"egress": {"cidr_blocks": ["10.0.0.0/8"], "ipv6_cidr_blocks": ["::/0"]}}),
        );
        let rules = normalize_rule_list(&sg);
        let violations = check_cidrs(&rules[0], "cidr_blocks", "ipv6_cidr_blocks");
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].reason, "must not be ::/0");
    }

    #[test]
    fn malformed_and_missing_cidrs_are_skipped() {
        let sg = resource(
            "aws_security_group",
            json!({"ingress": [{"cidr_blocks": ["bogus", "10.0.0.1/32"]}, {"from_port": 22}]}),
        );
        let rules = normalize_rule_list(&sg);
        assert!(rules
            .iter()
            .all(|r| check_cidrs(r, "cidr_blocks", "ipv6_cidr_blocks").is_empty()));
    }
}
