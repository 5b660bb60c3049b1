//! Static classification of cloud API actions into privilege categories.
//!
//! The table maps a service prefix (`s3`, `ec2`, `kms`, ...) to the actions
//! of each category. It is embedded at compile time and parsed once.

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

static ACTIONS_JSON: &str = include_str!("../../data/actions.json");

static TAXONOMY: Lazy<ActionTaxonomy> = Lazy::new(|| {
    serde_json::from_str(ACTIONS_JSON).expect("embedded action taxonomy is valid JSON")
});

/// Privilege category of an API action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionCategory {
    Read,
    Write,
    List,
    Tagging,
    PermissionsManagement,
}

impl ActionCategory {
    pub fn from_str_lenient(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "read" => Some(Self::Read),
            "write" => Some(Self::Write),
            "list" => Some(Self::List),
            "tagging" => Some(Self::Tagging),
            "permissions_management" | "permissions" => Some(Self::PermissionsManagement),
            _ => None,
        }
    }
}

impl std::fmt::Display for ActionCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read => write!(f, "read"),
            Self::Write => write!(f, "write"),
            Self::List => write!(f, "list"),
            Self::Tagging => write!(f, "tagging"),
            Self::PermissionsManagement => write!(f, "permissions management"),
        }
    }
}

/// `service -> category -> actions`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct ActionTaxonomy {
    services: HashMap<String, HashMap<ActionCategory, HashSet<String>>>,
}

impl ActionTaxonomy {
    /// The process-wide embedded taxonomy.
    pub fn global() -> &'static ActionTaxonomy {
        &TAXONOMY
    }

    /// Whether `action` of `service` belongs to `category`.
    ///
    /// Unknown services and categories are not errors; they contain nothing.
    pub fn contains(&self, service: &str, category: ActionCategory, action: &str) -> bool {
        self.services
            .get(service)
            .and_then(|categories| categories.get(&category))
            .is_some_and(|actions| actions.contains(action))
    }

    /// Whether any action of `service` in `category` starts with `prefix`.
    pub fn contains_prefix(&self, service: &str, category: ActionCategory, prefix: &str) -> bool {
        self.services
            .get(service)
            .and_then(|categories| categories.get(&category))
            .is_some_and(|actions| actions.iter().any(|a| a.starts_with(prefix)))
    }

    pub fn has_service(&self, service: &str) -> bool {
        self.services.contains_key(service)
    }

    pub fn services(&self) -> impl Iterator<Item = &str> {
        self.services.keys().map(String::as_str)
    }
}
