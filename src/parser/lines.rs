//! Best-effort source line lookup.
//!
//! Neither `serde_yaml` nor `hcl-rs` report node positions, so resource
//! header lines are recovered from the raw text. A miss yields no entry and
//! the resource keeps line 0.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

static HCL_RESOURCE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^\s*resource\s+"?([A-Za-z0-9_\-]+)"?\s+"?([A-Za-z0-9_\-]+)"?\s*\{"#).unwrap()
});

/// Lines of `resource "<type>" "<name>" {` headers, keyed by `(type, name)`.
pub fn hcl_resource_lines(content: &str) -> HashMap<(String, String), usize> {
    let mut lines = HashMap::new();
    for (idx, line) in content.lines().enumerate() {
        if let Some(cap) = HCL_RESOURCE_RE.captures(line) {
            lines
                .entry((cap[1].to_string(), cap[2].to_string()))
                .or_insert(idx + 1);
        }
    }
    lines
}

/// Lines of the keys declared directly under the top-level YAML key `parent`.
pub fn yaml_child_key_lines(content: &str, parent: &str) -> HashMap<String, usize> {
    let mut lines = HashMap::new();
    let mut in_parent = false;
    let mut child_indent: Option<usize> = None;

    for (idx, line) in content.lines().enumerate() {
        let trimmed = line.trim_start();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let indent = line.len() - trimmed.len();

        if indent == 0 {
            in_parent = mapping_key(trimmed) == Some(parent);
            child_indent = None;
            continue;
        }
        if !in_parent {
            continue;
        }

        let expected = *child_indent.get_or_insert(indent);
        if indent == expected {
            if let Some(key) = mapping_key(trimmed) {
                lines.entry(key.to_string()).or_insert(idx + 1);
            }
        }
    }

    lines
}

fn mapping_key(line: &str) -> Option<&str> {
    let (key, _) = line.split_once(':')?;
    let key = key.trim().trim_matches(|c| c == '"' || c == '\'');
    if key.is_empty() || key.starts_with('-') {
        None
    } else {
        Some(key)
    }
}
