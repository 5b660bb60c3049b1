use std::path::Path;

use hcl::{Expression, ObjectKey, Structure, TemplateExpr};
use serde_json::Value;

use super::{lines, parse_error, unsupported, TemplateParser};
use crate::error::Result;
use crate::ir::value::unresolved;
use crate::ir::{Dialect, Properties, Resource, Template};

/// Block identifier of the resource container.
const RESOURCE_BLOCK: &str = "resource";

const DYNAMIC_BLOCK: &str = "dynamic";
const DYNAMIC_CONTENT: &str = "content";

/// Function whose argument is lowered in place of the call.
const JSONENCODE: &str = "jsonencode";

/// Terraform-style HCL templates.
///
/// Only `resource "<type>" "<name>"` blocks are lowered. Attributes become
/// JSON values; expressions that are not literals (references, function
/// calls, conditionals, interpolations) become [`unresolved`] values holding
/// their source text. `jsonencode(x)` lowers to `x`. Repeated nested blocks
/// (`ingress { }` twice) become a sequence, a single one a mapping, and
/// `dynamic` blocks contribute their `content`.
pub struct BlockParser;

impl TemplateParser for BlockParser {
    fn dialect(&self) -> Dialect {
        Dialect::Block
    }

    fn parse_template(&self, path: &Path, content: &str) -> Result<Template> {
        let body = hcl::parse(content).map_err(|e| parse_error(path, e))?;
        let header_lines = lines::hcl_resource_lines(content);

        let mut container = Properties::new();
        let mut resources = Vec::new();

        for structure in body.iter() {
            let Structure::Block(block) = structure else {
                continue;
            };
            if block.identifier() != RESOURCE_BLOCK {
                continue;
            }
            let [kind, name] = block.labels.as_slice() else {
                tracing::debug!(
                    file = %path.display(),
                    labels = block.labels.len(),
                    "resource block without type and name labels, skipping"
                );
                continue;
            };
            let (kind, name) = (kind.as_str(), name.as_str());

            let properties = body_to_properties(block.body());
            let line = header_lines
                .get(&(kind.to_string(), name.to_string()))
                .copied()
                .unwrap_or(0);

            if let Value::Object(by_name) = container
                .entry(kind.to_string())
                .or_insert_with(|| Value::Object(Properties::new()))
            {
                by_name.insert(name.to_string(), Value::Object(properties.clone()));
            }
            resources.push(Resource::new(path, name, kind, line, properties));
        }

        if resources.is_empty() {
            return Err(unsupported(path, "no resource blocks"));
        }

        let mut root = Properties::new();
        root.insert(RESOURCE_BLOCK.into(), Value::Object(container));

        Ok(Template {
            path: path.to_path_buf(),
            dialect: Dialect::Block,
            root,
            resources,
        })
    }
}

fn body_to_properties(body: &hcl::Body) -> Properties {
    let mut props = Properties::new();

    for structure in body.iter() {
        match structure {
            Structure::Attribute(attr) => {
                props.insert(attr.key().to_string(), expression_to_value(&attr.expr));
            }
            Structure::Block(block) if block.identifier() == DYNAMIC_BLOCK => {
                // `dynamic "ingress" { content { } }` stands for `ingress { }`.
                let [label] = block.labels.as_slice() else {
                    continue;
                };
                if let Some(content) = block.body().blocks().find(|b| b.identifier() == DYNAMIC_CONTENT) {
                    push_block(
                        &mut props,
                        label.as_str(),
                        Value::Object(body_to_properties(content.body())),
                    );
                }
            }
            Structure::Block(block) => {
                let mut value = Value::Object(body_to_properties(block.body()));
                for label in block.labels.iter().rev() {
                    let mut wrapper = Properties::new();
                    wrapper.insert(label.as_str().to_string(), value);
                    value = Value::Object(wrapper);
                }
                push_block(&mut props, block.identifier(), value);
            }
        }
    }

    props
}

fn push_block(props: &mut Properties, identifier: &str, value: Value) {
    match props.get_mut(identifier) {
        Some(Value::Array(items)) => items.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
        None => {
            props.insert(identifier.to_string(), value);
        }
    }
}

fn expression_to_value(expr: &Expression) -> Value {
    match expr {
        Expression::Null => Value::Null,
        Expression::Bool(b) => Value::Bool(*b),
        Expression::Number(n) => serde_json::to_value(n).unwrap_or(Value::Null),
        Expression::String(s) => Value::String(s.clone()),
        Expression::Array(items) => Value::Array(items.iter().map(expression_to_value).collect()),
        Expression::Object(object) => Value::Object(
            object
                .iter()
                .map(|(k, v)| (object_key(k), expression_to_value(v)))
                .collect(),
        ),
        Expression::TemplateExpr(template) => {
            let text = match template.as_ref() {
                TemplateExpr::QuotedString(s) => s.clone(),
                TemplateExpr::Heredoc(heredoc) => heredoc.template.clone(),
            };
            if is_interpolated(&text) {
                unresolved(text)
            } else {
                Value::String(text)
            }
        }
        Expression::Parenthesis(inner) => expression_to_value(inner),
        Expression::FuncCall(call)
            if call.name.namespace.is_empty()
                && call.name.name.as_str() == JSONENCODE
                && call.args.len() == 1 =>
        {
            expression_to_value(&call.args[0])
        }
        other => unresolved(other.to_string()),
    }
}

/// Whether template text holds a live `${...}` or `%{...}` sequence.
fn is_interpolated(text: &str) -> bool {
    let text = text.replace("$${", "").replace("%%{", "");
    text.contains("${") || text.contains("%{")
}

fn object_key(key: &ObjectKey) -> String {
    match key {
        ObjectKey::Identifier(ident) => ident.to_string(),
        ObjectKey::Expression(Expression::String(s)) => s.clone(),
        ObjectKey::Expression(expr) => expr.to_string(),
        other => other.to_string(),
    }
}
