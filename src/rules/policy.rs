use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::{ScanResult, Severity};

/// Policy verdict: the final pass/fail decision after applying the ignore
/// list and severity overrides to raw results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyVerdict {
    pub pass: bool,
    pub total_findings: usize,
    pub effective_findings: usize,
    /// Rules whose scan could not be judged.
    pub unknown_rules: Vec<String>,
    pub highest_severity: Option<Severity>,
    pub fail_threshold: Severity,
}

/// Policy configuration loaded from `.iacguard.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    /// Minimum severity to fail the scan.
    #[serde(default = "default_fail_on")]
    pub fail_on: Severity,
    /// Whether an `UNKNOWN` rule fails the scan.
    #[serde(default)]
    pub fail_on_unknown: bool,
    /// Rule IDs to ignore entirely.
    #[serde(default)]
    pub ignore_rules: HashSet<String>,
    /// Per-rule severity overrides.
    #[serde(default)]
    pub overrides: HashMap<String, Severity>,
}

fn default_fail_on() -> Severity {
    Severity::High
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            fail_on: Severity::High,
            fail_on_unknown: false,
            ignore_rules: HashSet::new(),
            overrides: HashMap::new(),
        }
    }
}

impl Policy {
    /// Evaluate results against this policy and produce a verdict.
    pub fn evaluate(&self, results: &[ScanResult]) -> PolicyVerdict {
        let kept: Vec<&ScanResult> = results
            .iter()
            .filter(|r| !self.ignore_rules.contains(&r.rule_id))
            .collect();

        let effective: Vec<Severity> = kept
            .iter()
            .flat_map(|r| r.findings.iter())
            .map(|f| {
                self.overrides
                    .get(&f.rule_id)
                    .copied()
                    .unwrap_or(f.severity)
            })
            .collect();

        let unknown_rules: Vec<String> = kept
            .iter()
            .filter(|r| r.is_unknown())
            .map(|r| r.rule_id.clone())
            .collect();

        let highest = effective.iter().copied().max();
        let failed = effective.iter().any(|&sev| sev >= self.fail_on)
            || (self.fail_on_unknown && !unknown_rules.is_empty());

        PolicyVerdict {
            pass: !failed,
            total_findings: results.iter().map(ScanResult::vulns_number).sum(),
            effective_findings: effective.len(),
            unknown_rules,
            highest_severity: highest,
            fail_threshold: self.fail_on,
        }
    }

    /// Filter results: remove ignored rules, apply overrides to findings.
    pub fn apply(&self, results: &[ScanResult]) -> Vec<ScanResult> {
        results
            .iter()
            .filter(|r| !self.ignore_rules.contains(&r.rule_id))
            .map(|r| {
                let mut r = r.clone();
                if let Some(&override_sev) = self.overrides.get(&r.rule_id) {
                    for f in &mut r.findings {
                        f.severity = override_sev;
                    }
                }
                r
            })
            .collect()
    }
}
