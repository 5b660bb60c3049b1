//! iacguard: security scanner for infrastructure-as-code templates.
//!
//! Offline, multi-dialect, SARIF output. Walks a directory of CloudFormation
//! (YAML/JSON) and Terraform (HCL) templates and runs a fixed set of
//! predicates over the resources they declare. Each predicate reports
//! `OPEN`, `CLOSED` or `UNKNOWN`.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::path::Path;
//! use iacguard::{scan, ScanOptions};
//!
//! let options = ScanOptions::default();
//! let report = scan(Path::new("./infra"), &options).unwrap();
//! println!("Pass: {}, Findings: {}", report.verdict.pass, report.findings().count());
//! ```

pub mod analysis;
pub mod config;
pub mod error;
pub mod ir;
pub mod output;
pub mod parser;
pub mod rules;
pub mod taxonomy;
pub mod walker;

use std::path::{Path, PathBuf};

use config::{Config, CONFIG_FILE};
use error::Result;
use output::OutputFormat;
use rules::policy::PolicyVerdict;
use rules::{Finding, RuleEngine, RuleMetadata, ScanResult};
use walker::FsSource;

/// Options for a scan invocation.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Path to config file (defaults to `.iacguard.toml` in scan dir).
    pub config_path: Option<PathBuf>,
    /// Output format.
    pub format: OutputFormat,
    /// CLI override for fail_on threshold.
    pub fail_on_override: Option<rules::Severity>,
    /// Extra exclusion substrings, added to the configured ones.
    pub exclude: Vec<String>,
    /// Only run these rule ids. Empty runs every enabled rule.
    pub rules: Vec<String>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            config_path: None,
            format: OutputFormat::Console,
            fail_on_override: None,
            exclude: Vec::new(),
            rules: Vec::new(),
        }
    }
}

/// Complete scan report.
#[derive(Debug)]
pub struct ScanReport {
    pub target_name: String,
    /// One result per evaluated rule, after the policy is applied.
    pub results: Vec<ScanResult>,
    /// Metadata of the rules behind `results`.
    pub rules: Vec<RuleMetadata>,
    pub verdict: PolicyVerdict,
}

impl ScanReport {
    /// Every finding across all results.
    pub fn findings(&self) -> impl Iterator<Item = &Finding> {
        self.results.iter().flat_map(|r| r.findings.iter())
    }

    pub fn result(&self, rule_id: &str) -> Option<&ScanResult> {
        self.results.iter().find(|r| r.rule_id == rule_id)
    }

    pub(crate) fn remediation(&self, rule_id: &str) -> Option<&str> {
        self.rules
            .iter()
            .find(|r| r.id == rule_id)
            .and_then(|r| r.remediation.as_deref())
    }
}

/// Run a complete scan: load config, evaluate every enabled rule, apply policy.
///
/// A missing or unreadable target does not fail the scan; each rule reports
/// `UNKNOWN` instead. Only configuration problems are errors.
pub fn scan(path: &Path, options: &ScanOptions) -> Result<ScanReport> {
    let (config, exclude) = load_config(path, options)?;

    let engine = RuleEngine::new()
        .with_dialects(&config.scan.dialects()?)
        .with_rules(&options.rules);
    let source = FsSource {
        ignore_parse_errors: config.scan.ignore_parse_errors,
    };

    tracing::debug!(
        root = %path.display(),
        rules = engine.list_rules().len(),
        exclude = ?exclude,
        "starting scan"
    );
    let raw = engine.run(&source, path, &exclude);

    let results = config.policy.apply(&raw);
    let verdict = config.policy.evaluate(&raw);
    let rules = engine
        .list_rules()
        .into_iter()
        .filter(|m| results.iter().any(|r| r.rule_id == m.id))
        .collect();

    let target_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    Ok(ScanReport {
        target_name,
        results,
        rules,
        verdict,
    })
}

/// Evaluate one rule under the same configuration [`scan`] would use.
///
/// The rule runs even if its dialect is disabled in the config, and the
/// policy is not applied: the result is the rule's own verdict.
pub fn check(path: &Path, rule_id: &str, options: &ScanOptions) -> Result<ScanResult> {
    let engine = RuleEngine::new();
    let Some(predicate) = engine.get(rule_id) else {
        return Err(engine.unknown_rule(rule_id));
    };
    let (config, exclude) = load_config(path, options)?;
    let source = FsSource {
        ignore_parse_errors: config.scan.ignore_parse_errors,
    };
    Ok(rules::evaluate(predicate, &source, path, &exclude))
}

/// Load the config for `path` and merge the CLI excludes into it.
fn load_config(path: &Path, options: &ScanOptions) -> Result<(Config, Vec<String>)> {
    let config_path = options
        .config_path
        .clone()
        .unwrap_or_else(|| path.join(CONFIG_FILE));
    let mut config = Config::load(&config_path)?;

    if let Some(fail_on) = options.fail_on_override {
        config.policy.fail_on = fail_on;
    }

    let mut exclude = config.scan.exclude.clone();
    exclude.extend(options.exclude.iter().cloned());
    Ok((config, exclude))
}

/// Render a scan report in the specified format.
pub fn render_report(report: &ScanReport, format: OutputFormat) -> Result<String> {
    output::render(report, format)
}

#[cfg(test)]
mod integration_tests {
    use super::*;
    use crate::rules::{Predicate, Status};
    use pretty_assertions::assert_eq;
    use std::path::Path;

    const TF_VULNERABLE: &str = "tests/fixtures/terraform/vulnerable";
    const TF_SAFE: &str = "tests/fixtures/terraform/safe";
    const CFN_VULNERABLE: &str = "tests/fixtures/cloudformation/vulnerable";
    const CFN_SAFE: &str = "tests/fixtures/cloudformation/safe";
    const CFN_READ_ONLY: &str = "tests/fixtures/cloudformation/read_only";

    fn run(id: &str, dir: &str) -> ScanResult {
        let engine = RuleEngine::new();
        let predicate = engine.get(id).unwrap();
        predicate.evaluate(Path::new(dir), &[])
    }

    #[test]
    fn open_cidr_reports_both_violations() {
        let result = run("TF-EC2-001", TF_VULNERABLE);
        assert_eq!(result.status, Status::Open);
        assert_eq!(result.vulns_number(), 2);
        let reasons: Vec<&str> = result.findings.iter().map(|f| f.reason.as_str()).collect();
        assert!(reasons.contains(&"must not be 0.0.0.0/0"));
        assert!(reasons.contains(&"must use /32 subnet mask"));
        assert!(result.findings.iter().all(|f| f.line > 0));

        let safe = run("TF-EC2-001", TF_SAFE);
        assert_eq!(safe.status, Status::Closed);
        assert_eq!(safe.vulns_number(), 0);
    }

    #[test]
    fn key_rotation_absent_is_flagged() {
        let result = run("TF-KMS-001", TF_VULNERABLE);
        assert!(result.is_open());
        assert_eq!(result.vulns_number(), 1);
        assert_eq!(result.findings[0].identifier, "no_rotation");

        assert!(run("TF-KMS-001", TF_SAFE).is_closed());
    }

    #[test]
    fn deletion_window_must_be_thirty() {
        let result = run("TF-KMS-002", TF_VULNERABLE);
        assert!(result.is_open());
        assert_eq!(result.vulns_number(), 1);
        assert_eq!(result.findings[0].identifier, "short_window");

        // One key sets 30 explicitly, the other leaves it at the default.
        assert!(run("TF-KMS-002", TF_SAFE).is_closed());
    }

    #[test]
    fn read_only_policy_is_read_not_write() {
        let write = run("CFN-IAM-003", CFN_READ_ONLY);
        assert!(write.is_closed());
        assert!(write.resources_inspected > 0);

        let read = run("CFN-IAM-007", CFN_READ_ONLY);
        assert!(read.is_open());
        assert_eq!(read.findings[0].identifier, "ReadOnlyPolicy");

        let vulnerable = run("CFN-IAM-003", CFN_VULNERABLE);
        assert!(vulnerable.is_open());
    }

    #[test]
    fn missing_root_is_unknown_for_every_rule() {
        let report = scan(Path::new("tests/fixtures/does-not-exist"), &ScanOptions::default()).unwrap();
        assert_eq!(report.results.len(), RuleEngine::new().list_rules().len());
        assert!(report.results.iter().all(ScanResult::is_unknown));
        assert_eq!(report.findings().count(), 0);
    }

    #[test]
    fn safe_fixtures_pass_every_rule() {
        for dir in [TF_SAFE, CFN_SAFE] {
            let report = scan(Path::new(dir), &ScanOptions::default()).unwrap();
            let open: Vec<&str> = report
                .results
                .iter()
                .filter(|r| !r.is_closed())
                .map(|r| r.rule_id.as_str())
                .collect();
            assert_eq!(open, Vec::<&str>::new(), "{dir}");
            assert!(report.verdict.pass);
        }
    }

    #[test]
    fn vulnerable_terraform_fails_verdict() {
        let report = scan(Path::new(TF_VULNERABLE), &ScanOptions::default()).unwrap();
        assert!(!report.verdict.pass);
        for id in ["TF-EC2-001", "TF-EC2-002", "TF-EBS-001", "TF-KMS-001", "TF-IAM-001"] {
            assert!(report.result(id).unwrap().is_open(), "{id}");
        }
    }

    #[test]
    fn vulnerable_cloudformation_fails_verdict() {
        let report = scan(Path::new(CFN_VULNERABLE), &ScanOptions::default()).unwrap();
        assert!(!report.verdict.pass);
        for id in [
            "CFN-EC2-001",
            "CFN-EC2-007",
            "CFN-EC2-008",
            "CFN-EC2-009",
            "CFN-EC2-010",
            "CFN-EC2-011",
            "CFN-EC2-012",
            "CFN-EC2-013",
            "CFN-EC2-014",
            "CFN-EC2-015",
            "CFN-IAM-001",
            "CFN-IAM-010",
            "CFN-IAM-011",
            "CFN-KMS-001",
            "CFN-S3-001",
            "CFN-S3-003",
            "CFN-S3-004",
            "CFN-S3-005",
            "CFN-S3-006",
        ] {
            assert!(report.result(id).unwrap().is_open(), "{id}");
        }
    }

    #[test]
    fn exclusion_hides_vulnerable_tree() {
        let options = ScanOptions {
            exclude: vec!["vulnerable".into()],
            ..ScanOptions::default()
        };
        let report = scan(Path::new(TF_VULNERABLE), &options).unwrap();
        assert_eq!(report.findings().count(), 0);
        assert!(report.results.iter().all(ScanResult::is_closed));
    }

    #[test]
    fn rule_filter_limits_results() {
        let options = ScanOptions {
            rules: vec!["TF-KMS-002".into()],
            ..ScanOptions::default()
        };
        let report = scan(Path::new(TF_VULNERABLE), &options).unwrap();
        assert_eq!(report.results.len(), 1);
        assert_eq!(report.rules.len(), 1);
    }

    #[test]
    fn renders_every_format() {
        let report = scan(Path::new(TF_VULNERABLE), &ScanOptions::default()).unwrap();

        let console = render_report(&report, OutputFormat::Console).unwrap();
        assert!(console.contains("[OPEN]"));
        assert!(console.contains("Result: FAIL"));

        let json: serde_json::Value =
            serde_json::from_str(&render_report(&report, OutputFormat::Json).unwrap()).unwrap();
        assert!(json["generated_at"].is_string());
        assert_eq!(json["results"].as_array().unwrap().len(), report.results.len());

        let sarif: serde_json::Value =
            serde_json::from_str(&render_report(&report, OutputFormat::Sarif).unwrap()).unwrap();
        let run = &sarif["runs"][0];
        assert_eq!(run["tool"]["driver"]["name"], "iacguard");
        assert_eq!(run["results"].as_array().unwrap().len(), report.findings().count());
        assert!(run["results"][0]["partialFingerprints"]["iacguardFinding/v1"].is_string());
    }

    fn write_tree(files: &[(&str, &str)]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for (name, content) in files {
            std::fs::write(dir.path().join(name), content).unwrap();
        }
        dir
    }

    #[test]
    fn strict_parsing_makes_rule_unknown() {
        let dir = write_tree(&[
            ("keys.tf", "resource \"aws_kms_key\" \"plain\" {\n  description = \"k\"\n}\n"),
            ("broken.tf", "resource \"aws_kms_key\" \"k\" {\n  enable_key_rotation = \n"),
        ]);
        let engine = RuleEngine::new();
        let predicate = engine.get("TF-KMS-001").unwrap();

        let strict = FsSource {
            ignore_parse_errors: false,
        };
        let result = rules::evaluate(predicate, &strict, dir.path(), &[]);
        assert_eq!(result.status, Status::Unknown);
        assert!(result.error.as_deref().is_some_and(|e| e.contains("broken.tf")));
        assert_eq!(result.vulns_number(), 0);

        let lenient = FsSource::default();
        let result = rules::evaluate(predicate, &lenient, dir.path(), &[]);
        assert!(result.is_open());
        assert_eq!(result.vulns_number(), 1);
    }

    #[test]
    fn variable_rotation_does_not_hide_other_findings() {
        let dir = write_tree(&[
            (
                "a.tf",
                "resource \"aws_kms_key\" \"parameterised\" {\n  enable_key_rotation = var.rotate\n}\n",
            ),
            ("b.tf", "resource \"aws_kms_key\" \"plain\" {\n  description = \"k\"\n}\n"),
        ]);
        let result = run("TF-KMS-001", dir.path().to_str().unwrap());
        assert_eq!(result.status, Status::Open);
        assert_eq!(result.vulns_number(), 1);
        assert_eq!(result.findings[0].identifier, "plain");
        assert_eq!(result.resources_inspected, 2);
    }

    #[test]
    fn jsonencode_policy_is_analysed() {
        let result = run("TF-IAM-001", TF_VULNERABLE);
        let mut identifiers: Vec<&str> = result.findings.iter().map(|f| f.identifier.as_str()).collect();
        identifiers.sort_unstable();
        assert_eq!(identifiers, vec!["uploader", "writer"]);
    }

    #[test]
    fn dynamic_ingress_is_checked() {
        let dir = write_tree(&[(
            "sg.tf",
            r#"
resource "aws_security_group" "dyn" {
  dynamic "ingress" {
    for_each = var.ports
    content {
      from_port   = ingress.value
      to_port     = ingress.value
      protocol    = "tcp"
      cidr_blocks = ["0.0.0.0/0"]
    }
  }
}
"#,
        )]);
        let result = run("TF-EC2-001", dir.path().to_str().unwrap());
        assert!(result.is_open());
        assert_eq!(result.vulns_number(), 2);
    }

    #[test]
    fn check_honours_config() {
        let dir = write_tree(&[
            ("keys.tf", "resource \"aws_kms_key\" \"plain\" {\n  description = \"k\"\n}\n"),
            ("broken.tf", "resource \"aws_kms_key\" \"k\" {\n  enable_key_rotation = \n"),
        ]);
        let options = ScanOptions::default();
        assert!(check(dir.path(), "tf-kms-001", &options).unwrap().is_open());

        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "[scan]\nignore_parse_errors = false\n",
        )
        .unwrap();
        assert!(check(dir.path(), "TF-KMS-001", &options).unwrap().is_unknown());

        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "[scan]\nexclude = [\"keys\", \"broken\"]\n",
        )
        .unwrap();
        let result = check(dir.path(), "TF-KMS-001", &options).unwrap();
        assert!(result.is_closed());
        assert_eq!(result.resources_inspected, 0);

        let err = check(dir.path(), "TF-KMS-01", &options).unwrap_err();
        assert!(err.to_string().contains("TF-KMS-001"));
    }
}
