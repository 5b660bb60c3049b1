//! Policy-document analysis.
//!
//! A policy document is a mapping with a `Statement` entry holding one
//! statement or a list of them. Each statement carries `Effect`, `Action`
//! and usually `Resource`. Helpers here never fail: shapes they do not
//! understand simply do not match.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::ir::value::{as_sequence, expression};
use crate::taxonomy::{ActionCategory, ActionTaxonomy};

static WILDCARD_ACTION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\*|\w+:\*)$").unwrap());

/// Statements of a policy document, or of a raw `Statement` value.
pub fn statements(document: &Value) -> Vec<&Value> {
    let statement = match document.get("Statement") {
        Some(statement) => statement,
        None if document.is_array() => document,
        None => return Vec::new(),
    };
    as_sequence(statement)
        .into_iter()
        .filter(|s| s.is_object())
        .collect()
}

/// Whether `statement` has the given `Effect`.
pub fn has_effect(statement: &Value, effect: &str) -> bool {
    statement.get("Effect").and_then(Value::as_str) == Some(effect)
}

/// Whether a value, or anything nested in it, is the string `"*"`.
pub fn resource_all(resource: &Value) -> bool {
    match resource {
        Value::String(s) => s == "*",
        Value::Array(items) => items.iter().any(resource_all),
        Value::Object(map) => map.values().any(resource_all),
        _ => false,
    }
}

/// `*` on its own or `service:*`.
pub fn is_wildcard_action(action: &str) -> bool {
    WILDCARD_ACTION_RE.is_match(action)
}

/// Whether any action in `action` belongs to `category` of its service.
///
/// Each entry is split on `:` into service and verb. A verb starting with
/// `*` matches unconditionally, a verb ending in `*` matches any action of
/// the category with the same prefix, anything else must match exactly.
/// Entries without a service prefix and services missing from the table do
/// not match.
pub fn policy_actions_have_privilege(
    taxonomy: &ActionTaxonomy,
    action: &Value,
    category: ActionCategory,
) -> bool {
    if action.as_str() == Some("*") {
        return true;
    }
    as_sequence(action)
        .into_iter()
        .filter_map(Value::as_str)
        .any(|entry| action_has_privilege(taxonomy, entry, category))
}

fn action_has_privilege(taxonomy: &ActionTaxonomy, entry: &str, category: ActionCategory) -> bool {
    let Some((service, verb)) = entry.split_once(':') else {
        return false;
    };
    if verb.contains(':') {
        return false;
    }
    if verb.starts_with('*') {
        return true;
    }
    match verb.find('*') {
        Some(idx) if verb.ends_with('*') => taxonomy.contains_prefix(service, category, &verb[..idx]),
        _ => taxonomy.contains(service, category, verb),
    }
}

/// Whether any statement with `effect` applies to every resource and grants
/// at least one action of `category`.
pub fn policy_statement_privilege(
    taxonomy: &ActionTaxonomy,
    document: &Value,
    effect: &str,
    category: ActionCategory,
) -> bool {
    statements(document).into_iter().any(|statement| {
        has_effect(statement, effect)
            && statement.get("Resource").is_some_and(resource_all)
            && statement
                .get("Action")
                .is_some_and(|action| policy_actions_have_privilege(taxonomy, action, category))
    })
}

/// Whether `action` names `service` (or is the bare `*`).
pub fn service_is_present_action(action: &Value, service: &str) -> bool {
    as_sequence(action)
        .into_iter()
        .filter_map(Value::as_str)
        .any(|entry| entry == "*" || entry.split(':').next() == Some(service))
}

/// Whether any statement with `effect` grants actions of `service`.
pub fn service_is_present_statement(document: &Value, effect: &str, service: &str) -> bool {
    statements(document).into_iter().any(|statement| {
        has_effect(statement, effect)
            && statement
                .get("Action")
                .is_some_and(|action| service_is_present_action(action, service))
    })
}

/// Whether any statement with `effect` grants exactly `action` (e.g. `ssm:*`).
pub fn grants_action(document: &Value, effect: &str, action: &str) -> bool {
    statements(document).into_iter().any(|statement| {
        has_effect(statement, effect)
            && statement.get("Action").is_some_and(|value| {
                as_sequence(value)
                    .into_iter()
                    .filter_map(Value::as_str)
                    .any(|a| a == action)
            })
    })
}

/// Parse a policy that may be inlined as a JSON string (Terraform heredocs)
/// or given as a mapping (`jsonencode` arguments). Unresolved references
/// yield `None`.
pub fn policy_document(value: &Value) -> Option<Value> {
    if expression(value).is_some() {
        return None;
    }
    match value {
        Value::Object(_) => Some(value.clone()),
        Value::String(text) => serde_json::from_str::<Value>(text.trim())
            .ok()
            .filter(Value::is_object),
        _ => None,
    }
}
