//! Intermediate representation shared by template parsers, the resource
//! walker and the predicates.
//!
//! Both dialects are lowered into the same shape: a [`Template`] holding an
//! ordered list of [`Resource`]s whose properties are plain JSON values.
//! Predicates never see dialect-specific syntax trees.

pub mod value;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Ordered property mapping of a resource.
pub type Properties = serde_json::Map<String, Value>;

/// Key injected into every resource's properties carrying its declared type.
///
/// Namespaced so it never clobbers a real attribute such as the `type`
/// (ingress/egress) of a Terraform `aws_security_group_rule`.
pub const TYPE_KEY: &str = "__type__";

/// Key injected into every resource's properties carrying its source line.
pub const LINE_KEY: &str = "__line__";

/// Key of the one-entry mapping that stands in for a value only known at
/// deploy time (`var.x`, `aws_iam_role.r.arn`, `"${local.name}"`). The
/// entry holds the expression's source text.
pub const EXPR_KEY: &str = "__expr__";

/// Infrastructure-as-code template dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dialect {
    /// YAML/JSON templates with a top-level `Resources` mapping (CloudFormation).
    Declarative,
    /// HCL block syntax with `resource "<type>" "<name>"` blocks (Terraform).
    Block,
}

impl Dialect {
    pub const ALL: [Dialect; 2] = [Dialect::Declarative, Dialect::Block];

    /// File extensions (without the dot) recognised for this dialect.
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            Self::Declarative => &["yml", "yaml", "json", "template"],
            Self::Block => &["tf"],
        }
    }

    /// Select the dialect of a file by its extension.
    ///
    /// The comparison ignores ASCII case, so `MAIN.TF` and `stack.YAML`
    /// are picked up as well.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        Self::ALL
            .into_iter()
            .find(|d| d.extensions().contains(&ext.as_str()))
    }

    pub fn from_str_lenient(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "declarative" | "cloudformation" | "cfn" => Some(Self::Declarative),
            "block" | "terraform" | "tf" | "hcl" => Some(Self::Block),
            _ => None,
        }
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Declarative => write!(f, "CloudFormation"),
            Self::Block => write!(f, "Terraform"),
        }
    }
}

/// One parsed template file.
#[derive(Debug, Clone)]
pub struct Template {
    pub path: PathBuf,
    pub dialect: Dialect,
    /// Whole document, after dialect normalisation.
    pub root: Properties,
    /// Resources in declaration order.
    pub resources: Vec<Resource>,
}

impl Template {
    /// Resources whose declared type is one of `types`.
    pub fn resources_of<'a>(
        &'a self,
        types: &'a [&'a str],
    ) -> impl Iterator<Item = &'a Resource> + 'a {
        self.resources
            .iter()
            .filter(move |r| types.contains(&r.resource_type.as_str()))
    }
}

/// A declared infrastructure resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// Template the resource was declared in.
    pub path: PathBuf,
    /// Logical name, unique within its template.
    pub name: String,
    pub resource_type: String,
    /// 1-based line of the resource header, 0 when unknown.
    pub line: usize,
    pub properties: Properties,
}

impl Resource {
    pub fn new(
        path: &Path,
        name: impl Into<String>,
        resource_type: impl Into<String>,
        line: usize,
        mut properties: Properties,
    ) -> Self {
        let resource_type = resource_type.into();
        properties.insert(TYPE_KEY.into(), Value::String(resource_type.clone()));
        properties.insert(LINE_KEY.into(), Value::from(line));
        Self {
            path: path.to_path_buf(),
            name: name.into(),
            resource_type,
            line,
            properties,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// Whether `key` is declared with a non-empty value.
    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some_and(value::is_present)
    }

    /// Follow a chain of mapping keys from the resource properties.
    pub fn lookup(&self, keys: &[&str]) -> Option<&Value> {
        let (first, rest) = keys.split_first()?;
        value::lookup(self.get(first)?, rest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn dialect_from_extension() {
        assert_eq!(
            Dialect::from_path(Path::new("stack/main.yaml")),
            Some(Dialect::Declarative)
        );
        assert_eq!(
            Dialect::from_path(Path::new("stack/app.TEMPLATE")),
            Some(Dialect::Declarative)
        );
        assert_eq!(Dialect::from_path(Path::new("infra/main.tf")), Some(Dialect::Block));
        assert_eq!(Dialect::from_path(Path::new("INFRA/MAIN.TF")), Some(Dialect::Block));
        assert_eq!(Dialect::from_path(Path::new("stack/app.Json")), Some(Dialect::Declarative));
        assert_eq!(Dialect::from_path(Path::new("infra/vars.tfvars")), None);
        assert_eq!(Dialect::from_path(Path::new("Makefile")), None);
    }

    #[test]
    fn resource_injects_type_and_line() {
        let mut props = Properties::new();
        props.insert("type".into(), json!("ingress"));
        let res = Resource::new(Path::new("a.tf"), "rule", "aws_security_group_rule", 7, props);
        assert_eq!(res.get(TYPE_KEY), Some(&json!("aws_security_group_rule")));
        assert_eq!(res.get(LINE_KEY), Some(&json!(7)));
        // Real attributes survive the injection.
        assert_eq!(res.get("type"), Some(&json!("ingress")));
    }

    #[test]
    fn lookup_follows_nested_keys() {
        let mut props = Properties::new();
        props.insert(
            "LaunchTemplateData".into(),
            json!({"DisableApiTermination": true}),
        );
        let res = Resource::new(Path::new("a.yml"), "lt", "AWS::EC2::LaunchTemplate", 0, props);
        assert_eq!(
            res.lookup(&["LaunchTemplateData", "DisableApiTermination"]),
            Some(&json!(true))
        );
        assert_eq!(res.lookup(&["LaunchTemplateData", "Missing"]), None);
    }
}
