use crate::error::Result;
use crate::rules::Severity;
use crate::ScanReport;

use serde_json::{json, Value};

/// Render a report as SARIF 2.1.0.
///
/// Every evaluated rule is listed in the driver, whether or not it fired.
/// Rules that ended `UNKNOWN` are reported as tool notifications.
pub fn render(report: &ScanReport) -> Result<String> {
    let rules: Vec<Value> = report
        .rules
        .iter()
        .map(|rule| {
            let mut entry = json!({
                "id": rule.id,
                "name": rule.name,
                "shortDescription": { "text": rule.name },
                "fullDescription": { "text": rule.description },
                "defaultConfiguration": {
                    "level": severity_to_sarif_level(rule.default_severity),
                },
                "properties": {
                    "tags": [rule.category.to_string(), rule.dialect.to_string()],
                },
            });
            if let Some(remediation) = &rule.remediation {
                entry["help"] = json!({ "text": remediation });
            }
            entry
        })
        .collect();

    let results: Vec<Value> = report
        .findings()
        .map(|f| {
            let mut region = json!({});
            if f.line > 0 {
                region["startLine"] = json!(f.line);
            }
            json!({
                "ruleId": f.rule_id,
                "level": severity_to_sarif_level(f.severity),
                "message": {
                    "text": format!("{}.{}: {} {}", f.resource_type, f.identifier, f.entity, f.reason),
                },
                "locations": [{
                    "physicalLocation": {
                        "artifactLocation": {
                            "uri": f.path.display().to_string(),
                        },
                        "region": region,
                    },
                    "logicalLocations": [{
                        "name": f.identifier,
                        "kind": f.resource_type,
                    }],
                }],
                "partialFingerprints": {
                    "iacguardFinding/v1": f.fingerprint,
                },
            })
        })
        .collect();

    let notifications: Vec<Value> = report
        .results
        .iter()
        .filter(|r| r.is_unknown())
        .map(|r| {
            json!({
                "level": "warning",
                "message": { "text": r.message },
                "associatedRule": { "id": r.rule_id },
            })
        })
        .collect();

    let sarif = json!({
        "$schema": "https://docs.oasis-open.org/sarif/sarif/v2.1.0/errata01/os/schemas/sarif-schema-2.1.0.json",
        "version": "2.1.0",
        "runs": [{
            "tool": {
                "driver": {
                    "name": "iacguard",
                    "version": env!("CARGO_PKG_VERSION"),
                    "semanticVersion": env!("CARGO_PKG_VERSION"),
                    "rules": rules,
                },
            },
            "invocations": [{
                "executionSuccessful": notifications.is_empty(),
                "toolExecutionNotifications": notifications,
            }],
            "results": results,
            "automationDetails": {
                "id": format!("iacguard/{}/", report.target_name),
                "guid": uuid::Uuid::new_v4().to_string(),
            },
        }],
    });

    let output = serde_json::to_string_pretty(&sarif)?;
    Ok(output)
}

fn severity_to_sarif_level(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical | Severity::High => "error",
        Severity::Medium => "warning",
        Severity::Low | Severity::Info => "note",
    }
}
