use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScanError};
use crate::ir::Dialect;
use crate::rules::policy::Policy;

/// Default config file name, looked up in the scanned directory.
pub const CONFIG_FILE: &str = ".iacguard.toml";

/// Top-level configuration from `.iacguard.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub policy: Policy,
}

/// How templates are found and which rules run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Path substrings to skip.
    #[serde(default)]
    pub exclude: Vec<String>,
    /// Skip templates that fail to parse instead of marking rules `UNKNOWN`.
    #[serde(default = "default_true")]
    pub ignore_parse_errors: bool,
    /// Dialects whose rules run (`declarative`/`cloudformation`, `block`/`terraform`).
    #[serde(default = "default_dialects")]
    pub dialects: Vec<String>,
}

fn default_true() -> bool {
    true
}

fn default_dialects() -> Vec<String> {
    vec!["declarative".into(), "block".into()]
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            exclude: Vec::new(),
            ignore_parse_errors: true,
            dialects: default_dialects(),
        }
    }
}

impl ScanConfig {
    /// Resolve dialect names. Unknown names are a configuration error.
    pub fn dialects(&self) -> Result<Vec<Dialect>> {
        self.dialects
            .iter()
            .map(|name| {
                Dialect::from_str_lenient(name)
                    .ok_or_else(|| ScanError::Config(format!("unknown dialect '{name}'")))
            })
            .collect()
    }
}

impl Config {
    /// Load config from a TOML file. Returns default if file doesn't exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.scan.dialects()?;
        tracing::debug!(file = %path.display(), "loaded config");
        Ok(config)
    }

    /// Generate a starter config file.
    pub fn starter_toml() -> &'static str {
        r#"# iacguard configuration

[scan]
# Skip templates whose path contains any of these substrings.
exclude = [".terraform", "node_modules"]

# Skip templates that fail to parse. When false, a broken template makes
# every rule of its dialect report UNKNOWN.
ignore_parse_errors = true

# Template dialects to scan: "declarative" (CloudFormation YAML/JSON)
# and "block" (Terraform HCL).
dialects = ["declarative", "block"]

[policy]
# Minimum severity to fail the scan (info, low, medium, high, critical).
fail_on = "high"

# Fail when a rule cannot complete its scan.
fail_on_unknown = false

# Rule IDs to ignore entirely.
# ignore_rules = ["TF-EC2-002"]

# Per-rule severity overrides.
# [policy.overrides]
# "CFN-EC2-005" = "info"
"#
    }
}
