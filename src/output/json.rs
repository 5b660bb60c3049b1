use crate::error::Result;
use crate::rules::policy::PolicyVerdict;
use crate::rules::ScanResult;
use crate::ScanReport;

use serde::Serialize;

#[derive(Serialize)]
struct JsonReport<'a> {
    target: &'a str,
    generated_at: String,
    results: &'a [ScanResult],
    verdict: &'a PolicyVerdict,
}

/// Render a report as JSON.
pub fn render(report: &ScanReport) -> Result<String> {
    let json = JsonReport {
        target: &report.target_name,
        generated_at: chrono::Utc::now().to_rfc3339(),
        results: &report.results,
        verdict: &report.verdict,
    };
    let json = serde_json::to_string_pretty(&json)?;
    Ok(json)
}
