use crate::rules::{Finding, Severity, Status};
use crate::ScanReport;

/// Render a report as console text: one status line per rule, then the
/// findings grouped by severity then file path.
pub fn render(report: &ScanReport) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "\n  Scanned {} with {} rule(s):\n\n",
        report.target_name,
        report.results.len()
    ));
    for result in &report.results {
        let status = match result.status {
            Status::Open => "[OPEN]   ",
            Status::Closed => "[CLOSED] ",
            Status::Unknown => "[UNKNOWN]",
        };
        output.push_str(&format!("  {} {:<11} {}", status, result.rule_id, result.message));
        if result.is_open() {
            output.push_str(&format!(" ({})", result.vulns_number()));
        }
        output.push('\n');
    }

    let mut sorted: Vec<&Finding> = report.findings().collect();
    if sorted.is_empty() {
        output.push_str("\n  No security findings detected.\n\n");
    } else {
        sorted.sort_by(|a, b| {
            b.severity
                .cmp(&a.severity)
                .then_with(|| a.path.cmp(&b.path))
                .then_with(|| a.line.cmp(&b.line))
        });

        output.push_str(&format!("\n  {} finding(s) detected:\n\n", sorted.len()));

        for finding in &sorted {
            let severity_tag = match finding.severity {
                Severity::Critical => "[CRITICAL]",
                Severity::High => "[HIGH]    ",
                Severity::Medium => "[MEDIUM]  ",
                Severity::Low => "[LOW]     ",
                Severity::Info => "[INFO]    ",
            };

            output.push_str(&format!(
                "  {} {} {}.{}: {} {}\n",
                severity_tag,
                finding.rule_id,
                finding.resource_type,
                finding.identifier,
                finding.entity,
                finding.reason
            ));
            output.push_str(&format!("           at {}\n", finding.location()));
            if let Some(remediation) = report.remediation(&finding.rule_id) {
                output.push_str(&format!("           fix: {}\n", remediation));
            }
            output.push('\n');
        }
    }

    let verdict = &report.verdict;
    let status = if verdict.pass { "PASS" } else { "FAIL" };
    output.push_str(&format!(
        "  Result: {} (threshold: {}, highest: {}",
        status,
        verdict.fail_threshold,
        verdict
            .highest_severity
            .map(|s| s.to_string())
            .unwrap_or_else(|| "none".into()),
    ));
    if !verdict.unknown_rules.is_empty() {
        output.push_str(&format!(", unknown: {}", verdict.unknown_rules.join(", ")));
    }
    output.push_str(")\n\n");

    output
}
