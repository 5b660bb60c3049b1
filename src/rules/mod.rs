pub mod builtin;
pub mod finding;
pub mod policy;
pub mod result;

use std::path::Path;

use crate::error::{Result, ScanError};
use crate::ir::{Dialect, Resource};
use crate::walker::{FsSource, ResourceSource};

pub use finding::{Category, Finding, RuleMetadata, Severity, Violation};
pub use result::{aggregate, ScanResult, Status};

/// A predicate inspects resources of a few types and reports violations.
pub trait Predicate: Send + Sync {
    /// Metadata about this rule (id, name, severity, messages).
    fn metadata(&self) -> RuleMetadata;

    fn dialect(&self) -> Dialect;

    /// Resource types this predicate looks at.
    fn resource_types(&self) -> &'static [&'static str];

    /// Inspect one resource.
    ///
    /// Missing or oddly shaped attributes are not errors; they simply yield
    /// no violation. An error here (a malformed boolean) makes the whole
    /// result `UNKNOWN`.
    fn inspect(&self, resource: &Resource) -> Result<Vec<Violation>>;

    /// Evaluate against every template under `root`, reading the filesystem.
    fn evaluate(&self, root: &Path, exclude: &[String]) -> ScanResult {
        evaluate(self, &FsSource::default(), root, exclude)
    }
}

/// Drive one predicate over every resource `source` yields.
///
/// Never fails: a walk that cannot start or complete, or an inspection
/// error, turns into an `UNKNOWN` result.
pub fn evaluate<P, S>(predicate: &P, source: &S, root: &Path, exclude: &[String]) -> ScanResult
where
    P: Predicate + ?Sized,
    S: ResourceSource + ?Sized,
{
    let rule = predicate.metadata();
    let resources =
        match source.fetch_resources(predicate.dialect(), root, predicate.resource_types(), exclude) {
            Ok(resources) => resources,
            Err(e) => {
                tracing::warn!(rule = %rule.id, error = %e, "scan could not start");
                return ScanResult::unknown(&rule, e);
            }
        };

    let mut findings = Vec::new();
    let mut inspected = 0;
    for item in resources {
        let outcome = item.and_then(|resource| {
            let violations = predicate.inspect(&resource)?;
            Ok((resource, violations))
        });
        match outcome {
            Ok((resource, violations)) => {
                inspected += 1;
                findings.extend(
                    violations
                        .into_iter()
                        .map(|v| Finding::new(&rule, &resource, v)),
                );
            }
            Err(e) => {
                tracing::warn!(rule = %rule.id, error = %e, "scan aborted");
                return ScanResult::unknown(&rule, e);
            }
        }
    }

    let mut result = ScanResult::aggregate(&rule.id, findings, &rule.message_open, &rule.message_closed);
    result.resources_inspected = inspected;
    if inspected == 0 {
        result.message = format!("{}: no objects found", rule.message_closed);
    }

    tracing::info!(
        rule = %rule.id,
        status = %result.status,
        resources = inspected,
        findings = result.vulns_number(),
        "rule evaluated"
    );
    result
}

/// The rule engine holds every registered predicate.
pub struct RuleEngine {
    predicates: Vec<Box<dyn Predicate>>,
}

impl RuleEngine {
    /// Create a new engine with all built-in predicates registered.
    pub fn new() -> Self {
        Self {
            predicates: builtin::all_predicates(),
        }
    }

    /// Keep only predicates of the given dialects.
    pub fn with_dialects(mut self, dialects: &[Dialect]) -> Self {
        self.predicates.retain(|p| dialects.contains(&p.dialect()));
        self
    }

    /// Keep only predicates whose id is listed. An empty list keeps all.
    pub fn with_rules(mut self, ids: &[String]) -> Self {
        if !ids.is_empty() {
            self.predicates
                .retain(|p| ids.iter().any(|id| id.eq_ignore_ascii_case(&p.metadata().id)));
        }
        self
    }

    pub fn get(&self, id: &str) -> Option<&dyn Predicate> {
        self.predicates
            .iter()
            .find(|p| p.metadata().id.eq_ignore_ascii_case(id))
            .map(|p| p.as_ref())
    }

    /// Closest known rule id to a mistyped one.
    pub fn suggest(&self, id: &str) -> Option<String> {
        let id = id.to_uppercase();
        self.predicates
            .iter()
            .map(|p| p.metadata().id)
            .map(|known| (levenshtein::levenshtein(&id, &known), known))
            .filter(|(distance, _)| *distance <= 3)
            .min_by_key(|(distance, _)| *distance)
            .map(|(_, known)| known)
    }

    /// `UnknownRule` error for `id`, naming the closest known id if any.
    pub fn unknown_rule(&self, id: &str) -> ScanError {
        match self.suggest(id) {
            Some(close) => ScanError::UnknownRule(format!("{id} (did you mean {close}?)")),
            None => ScanError::UnknownRule(id.to_string()),
        }
    }

    /// Run every predicate, each with its own walk.
    pub fn run<S>(&self, source: &S, root: &Path, exclude: &[String]) -> Vec<ScanResult>
    where
        S: ResourceSource + ?Sized,
    {
        self.predicates
            .iter()
            .map(|p| evaluate(p.as_ref(), source, root, exclude))
            .collect()
    }

    /// List metadata for all registered rules.
    pub fn list_rules(&self) -> Vec<RuleMetadata> {
        self.predicates.iter().map(|p| p.metadata()).collect()
    }
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::new()
    }
}
