use std::path::Path;

use serde_json::Value;

use super::{lines, parse_error, unsupported, TemplateParser};
use crate::error::Result;
use crate::ir::{Dialect, Properties, Resource, Template};

/// Top-level resource container of a declarative template.
const RESOURCES_KEY: &str = "Resources";

/// Intrinsic functions whose YAML short form (`!Name`) maps to `Fn::Name`.
const FN_INTRINSICS: &[&str] = &[
    "And",
    "Base64",
    "Cidr",
    "Equals",
    "FindInMap",
    "GetAZs",
    "If",
    "ImportValue",
    "Join",
    "Not",
    "Or",
    "Select",
    "Split",
    "Sub",
    "Transform",
];

/// CloudFormation-style templates in YAML or JSON.
///
/// `.yml`/`.yaml` files go through `serde_yaml` (short-form intrinsic tags
/// are expanded to their long form); every other extension is read as JSON.
pub struct DeclarativeParser;

impl TemplateParser for DeclarativeParser {
    fn dialect(&self) -> Dialect {
        Dialect::Declarative
    }

    fn parse_template(&self, path: &Path, content: &str) -> Result<Template> {
        let yaml = is_yaml(path);
        let document = if yaml {
            let doc: serde_yaml::Value =
                serde_yaml::from_str(content).map_err(|e| parse_error(path, e))?;
            yaml_to_json(doc)
        } else {
            serde_json::from_str::<Value>(content).map_err(|e| parse_error(path, e))?
        };

        let Value::Object(root) = document else {
            return Err(unsupported(path, "document is not a mapping"));
        };

        let declared = match root.get(RESOURCES_KEY) {
            Some(Value::Object(map)) if !map.is_empty() => map,
            _ => return Err(unsupported(path, "missing or empty Resources mapping")),
        };

        let header_lines = if yaml {
            lines::yaml_child_key_lines(content, RESOURCES_KEY)
        } else {
            Default::default()
        };

        let mut resources = Vec::with_capacity(declared.len());
        for (name, data) in declared {
            if name.starts_with("Fn::") || name.starts_with('!') {
                continue;
            }
            let Some(resource_type) = data.get("Type").and_then(Value::as_str) else {
                tracing::debug!(file = %path.display(), resource = %name, "resource without Type, skipping");
                continue;
            };
            let properties = match data.get("Properties") {
                Some(Value::Object(props)) => props.clone(),
                _ => Properties::new(),
            };
            let line = header_lines.get(name.as_str()).copied().unwrap_or(0);
            resources.push(Resource::new(path, name, resource_type, line, properties));
        }

        Ok(Template {
            path: path.to_path_buf(),
            dialect: Dialect::Declarative,
            root,
            resources,
        })
    }
}

fn is_yaml(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("yml") || e.eq_ignore_ascii_case("yaml"))
}

/// Convert a YAML document into the JSON value model used by predicates.
fn yaml_to_json(value: serde_yaml::Value) -> Value {
    use serde_yaml::Value as Yaml;

    match value {
        Yaml::Null => Value::Null,
        Yaml::Bool(b) => Value::Bool(b),
        Yaml::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::from(i)
            } else if let Some(u) = n.as_u64() {
                Value::from(u)
            } else {
                n.as_f64()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
                    .unwrap_or(Value::Null)
            }
        }
        Yaml::String(s) => Value::String(s),
        Yaml::Sequence(items) => Value::Array(items.into_iter().map(yaml_to_json).collect()),
        Yaml::Mapping(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (mapping_key(k), yaml_to_json(v)))
                .collect(),
        ),
        Yaml::Tagged(tagged) => {
            let tag = tagged.tag.to_string();
            expand_intrinsic(tag.trim_start_matches('!'), yaml_to_json(tagged.value))
        }
    }
}

fn mapping_key(key: serde_yaml::Value) -> String {
    match yaml_to_json(key) {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

/// Expand a short-form intrinsic (`!Ref`, `!GetAtt`, `!Sub`, ...) to its long form.
fn expand_intrinsic(tag: &str, value: Value) -> Value {
    let (key, value) = match tag {
        "Ref" | "Condition" => (tag.to_string(), value),
        "GetAtt" => {
            let value = match value {
                Value::String(s) => match s.split_once('.') {
                    Some((resource, attribute)) => {
                        Value::Array(vec![resource.into(), attribute.into()])
                    }
                    None => Value::String(s),
                },
                other => other,
            };
            ("Fn::GetAtt".to_string(), value)
        }
        t if FN_INTRINSICS.contains(&t) => (format!("Fn::{t}"), value),
        _ => return value,
    };
    let mut map = Properties::new();
    map.insert(key, value);
    Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScanError;
    use crate::ir::LINE_KEY;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn parse(name: &str, content: &str) -> Result<Template> {
        DeclarativeParser.parse_template(Path::new(name), content)
    }

    #[test]
    fn yaml_resources_with_lines() {
        let template = parse(
            "stack.yaml",
            "Resources:\n  Sg:\n    Type: AWS::EC2::SecurityGroup\n    Properties:\n      GroupDescription: web\n  Key:\n    Type: AWS::KMS::Key\n",
        )
        .unwrap();
        assert_eq!(template.resources.len(), 2);
        let sg = &template.resources[0];
        assert_eq!(sg.name, "Sg");
        assert_eq!(sg.resource_type, "AWS::EC2::SecurityGroup");
        assert_eq!(sg.line, 2);
        assert_eq!(sg.get("GroupDescription"), Some(&json!("web")));
        assert_eq!(template.resources[1].get(LINE_KEY), Some(&json!(6)));
    }

    #[test]
    fn json_resources_have_no_lines() {
        let template = parse(
            "stack.json",
            r#"{"Resources": {"Vol": {"Type": "AWS::EC2::Volume", "Properties": {"Encrypted": "false"}}}}"#,
        )
        .unwrap();
        assert_eq!(template.resources[0].line, 0);
        assert_eq!(template.resources[0].get("Encrypted"), Some(&json!("false")));
    }

    #[test]
    fn short_form_intrinsics_are_expanded() {
        let template = parse(
            "stack.yml",
            "Resources:\n  Policy:\n    Type: AWS::S3::BucketPolicy\n    Properties:\n      Bucket: !Ref Logs\n      Arn: !GetAtt Logs.Arn\n      Name: !Sub '${AWS::StackName}-logs'\n",
        )
        .unwrap();
        let res = &template.resources[0];
        assert_eq!(res.get("Bucket"), Some(&json!({"Ref": "Logs"})));
        assert_eq!(res.get("Arn"), Some(&json!({"Fn::GetAtt": ["Logs", "Arn"]})));
        assert_eq!(
            res.get("Name"),
            Some(&json!({"Fn::Sub": "${AWS::StackName}-logs"}))
        );
    }

    #[test]
    fn skips_non_resource_entries() {
        let template = parse(
            "stack.json",
            r#"{"Resources": {
                "Fn::Transform": {"Name": "AWS::Include"},
                "Untyped": {"Properties": {}},
                "Key": {"Type": "AWS::KMS::Key"}
            }}"#,
        )
        .unwrap();
        let names: Vec<_> = template.resources.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Key"]);
    }

    #[test]
    fn missing_resources_is_unsupported() {
        let err = parse("config.yml", "name: not-a-template\n").unwrap_err();
        assert!(matches!(err, ScanError::UnsupportedTemplate { .. }));
        let err = parse("config.yml", "Resources: {}\n").unwrap_err();
        assert!(matches!(err, ScanError::UnsupportedTemplate { .. }));
    }

    #[test]
    fn invalid_syntax_is_parse_error() {
        assert!(matches!(
            parse("broken.json", "{\"Resources\": "),
            Err(ScanError::Parse { .. })
        ));
        assert!(matches!(
            parse("broken.yaml", "Resources:\n  - a\n  b: c\n"),
            Err(ScanError::Parse { .. })
        ));
    }
}
