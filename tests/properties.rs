use std::collections::HashSet;
use std::path::Path;

use proptest::prelude::*;
use serde_json::{json, Value};

use iacguard::analysis::network::{check_cidrs, Direction, NetworkRule};
use iacguard::ir::value::to_boolean;
use iacguard::ir::{Dialect, Properties};
use iacguard::parser::parser_for_dialect;
use iacguard::rules::{Predicate, RuleEngine};

fn security_group(name: &str, cidr: &str) -> String {
    format!(
        "resource \"aws_security_group\" \"{name}\" {{\n  ingress {{\n    from_port   = 443\n    to_port     = 443\n    protocol    = \"tcp\"\n    cidr_blocks = [\"{cidr}\"]\n  }}\n}}\n"
    )
}

fn ingress(cidr: &str) -> Properties {
    let mut fields = Properties::new();
    fields.insert("cidr_blocks".into(), json!([cidr]));
    fields.insert("ipv6_cidr_blocks".into(), json!([]));
    fields
}

fn reasons(fields: &Properties, direction: Direction) -> Vec<&'static str> {
    let rule = NetworkRule {
        direction: Some(direction),
        fields,
    };
    check_cidrs(&rule, "cidr_blocks", "ipv6_cidr_blocks")
        .into_iter()
        .map(|v| v.reason)
        .collect()
}

fn ipv4() -> impl Strategy<Value = String> {
    (any::<[u8; 4]>(), 0u8..=32).prop_map(|(o, prefix)| format!("{}.{}.{}.{}/{prefix}", o[0], o[1], o[2], o[3]))
}

proptest! {
    #[test]
    fn repeated_scans_agree(cidrs in prop::collection::vec(ipv4(), 1..4)) {
        let dir = tempfile::tempdir().unwrap();
        for (i, cidr) in cidrs.iter().enumerate() {
            std::fs::write(dir.path().join(format!("sg{i}.tf")), security_group(&format!("sg{i}"), cidr)).unwrap();
        }
        let engine = RuleEngine::new();
        let rule = engine.get("TF-EC2-001").unwrap();

        let first = rule.evaluate(dir.path(), &[]);
        let second = rule.evaluate(dir.path(), &[]);
        prop_assert_eq!(first.status, second.status);
        prop_assert_eq!(first.vulns_number(), second.vulns_number());
        let a: HashSet<_> = first.findings.into_iter().collect();
        let b: HashSet<_> = second.findings.into_iter().collect();
        prop_assert_eq!(a, b);
    }

    #[test]
    fn excluded_paths_never_reported(
        suffix in "[a-z]{3,8}",
        kept in "[A-Z]{3,8}",
    ) {
        // Temp dir names are alphanumeric, so the underscore keeps the
        // substring out of the root itself.
        let excluded = format!("excl_{suffix}");
        let dir = tempfile::tempdir().unwrap();
        let hidden = dir.path().join(format!("env-{excluded}-x"));
        let visible = dir.path().join(&kept);
        std::fs::create_dir_all(&hidden).unwrap();
        std::fs::create_dir_all(&visible).unwrap();
        std::fs::write(hidden.join("main.tf"), security_group("hidden", "0.0.0.0/0")).unwrap();
        std::fs::write(visible.join("main.tf"), security_group("visible", "0.0.0.0/0")).unwrap();

        let engine = RuleEngine::new();
        let result = engine.get("TF-EC2-001").unwrap().evaluate(dir.path(), &[excluded.clone()]);
        prop_assert!(result.is_open());
        for finding in &result.findings {
            prop_assert!(!finding.path.to_string_lossy().contains(excluded.as_str()));
            prop_assert_eq!(finding.identifier.as_str(), "visible");
        }
    }

    #[test]
    fn narrow_ipv4_never_unrestricted(cidr in ipv4().prop_filter("non-zero prefix", |c| !c.ends_with("/0"))) {
        let fields = ingress(&cidr);
        prop_assert!(!reasons(&fields, Direction::Ingress).contains(&"must not be 0.0.0.0/0"));
        prop_assert!(reasons(&fields, Direction::Egress).is_empty());
    }

    #[test]
    fn coercion_rejects_other_strings(s in "\\PC*") {
        let accepted = ["true", "True", "1", "false", "False", "0"];
        prop_assume!(!accepted.contains(&s.as_str()));
        prop_assert!(to_boolean(&Value::String(s)).is_err());
    }

    #[test]
    fn coercion_rejects_other_integers(n in any::<i64>()) {
        prop_assume!(n != 0 && n != 1);
        prop_assert!(to_boolean(&json!(n)).is_err());
    }

    #[test]
    fn parsers_never_panic(content in "\\PC{0,200}") {
        for dialect in [Dialect::Declarative, Dialect::Block] {
            let _ = parser_for_dialect(dialect).parse_template(Path::new("fuzz"), &content);
        }
    }
}

#[test]
fn cidr_boundaries() {
    let open_v4 = ingress("0.0.0.0/0");
    assert!(reasons(&open_v4, Direction::Ingress).contains(&"must not be 0.0.0.0/0"));
    assert!(reasons(&open_v4, Direction::Egress).contains(&"must not be 0.0.0.0/0"));

    let mut open_v6 = Properties::new();
    open_v6.insert("ipv6_cidr_blocks".into(), json!(["::/0"]));
    assert!(reasons(&open_v6, Direction::Egress).contains(&"must not be ::/0"));

    assert!(!reasons(&ingress("10.0.0.0/24"), Direction::Ingress).contains(&"must not be 0.0.0.0/0"));
    assert!(reasons(&ingress("10.0.0.1/32"), Direction::Ingress).is_empty());
    assert_eq!(reasons(&ingress("10.0.0.0/24"), Direction::Ingress), vec!["must use /32 subnet mask"]);
}

#[test]
fn coercion_accepts_known_spellings() {
    for value in [json!(true), json!("true"), json!("True"), json!("1"), json!(1)] {
        assert!(to_boolean(&value).unwrap(), "{value}");
    }
    for value in [json!(false), json!("false"), json!("False"), json!("0"), json!(0)] {
        assert!(!to_boolean(&value).unwrap(), "{value}");
    }
}
