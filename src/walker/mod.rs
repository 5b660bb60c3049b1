//! Resource walker: lazily enumerate the resources of every template under a
//! directory.
//!
//! Files are parsed one at a time as the iterator is pulled, so a predicate
//! that stops early never reads the rest of the tree. Each call performs a
//! fresh walk; nothing is cached between calls.

use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};

use crate::error::{Result, ScanError};
use crate::ir::{Dialect, Resource};
use crate::parser;

/// Lazy stream of resources. Items are errors only for failures the caller
/// asked to see (unignored parse errors, unreadable files).
pub type ResourceIter = Box<dyn Iterator<Item = Result<Resource>>>;

/// Where predicates get their resources from.
pub trait ResourceSource: Send + Sync {
    /// Resources of `dialect` under `root` whose type is one of
    /// `resource_types`, skipping files whose path contains any `exclude`
    /// substring.
    ///
    /// Fails up front only when the walk cannot start at all.
    fn fetch_resources(
        &self,
        dialect: Dialect,
        root: &Path,
        resource_types: &[&str],
        exclude: &[String],
    ) -> Result<ResourceIter>;
}

/// Filesystem-backed resource source.
#[derive(Debug, Clone, Copy)]
pub struct FsSource {
    /// Skip files that fail to parse instead of yielding their error.
    pub ignore_parse_errors: bool,
}

impl Default for FsSource {
    fn default() -> Self {
        Self {
            ignore_parse_errors: true,
        }
    }
}

impl ResourceSource for FsSource {
    fn fetch_resources(
        &self,
        dialect: Dialect,
        root: &Path,
        resource_types: &[&str],
        exclude: &[String],
    ) -> Result<ResourceIter> {
        let walker = iterate(root, dialect, resource_types, exclude, self.ignore_parse_errors)?;
        Ok(Box::new(walker))
    }
}

/// Start a walk over `root`. Fails with [`ScanError::PathNotFound`] when the
/// root does not exist; every other problem surfaces while iterating.
pub fn iterate(
    root: &Path,
    dialect: Dialect,
    resource_types: &[&str],
    exclude: &[String],
    ignore_parse_errors: bool,
) -> Result<ResourceWalker> {
    if !root.exists() {
        return Err(ScanError::PathNotFound(root.display().to_string()));
    }

    let files = ignore::WalkBuilder::new(root)
        .standard_filters(false)
        .follow_links(false)
        .sort_by_file_name(|a, b| a.cmp(b))
        .build();

    Ok(ResourceWalker {
        files,
        dialect,
        resource_types: resource_types.iter().map(|t| t.to_string()).collect(),
        exclude: exclude.iter().filter(|e| !e.is_empty()).cloned().collect(),
        ignore_parse_errors,
        pending: VecDeque::new(),
    })
}

/// Iterator returned by [`iterate`].
pub struct ResourceWalker {
    files: ignore::Walk,
    dialect: Dialect,
    resource_types: HashSet<String>,
    exclude: Vec<String>,
    ignore_parse_errors: bool,
    pending: VecDeque<Resource>,
}

fn is_excluded(exclude: &[String], path: &Path) -> bool {
    let path = path.to_string_lossy();
    exclude.iter().any(|e| path.contains(e.as_str()))
}

impl ResourceWalker {
    /// Next candidate template file of this walker's dialect.
    fn next_file(&mut self) -> Option<PathBuf> {
        while let Some(entry) = self.files.next() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to read directory entry");
                    continue;
                }
            };
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }
            let path = entry.path();
            if Dialect::from_path(path) != Some(self.dialect) {
                continue;
            }
            if is_excluded(&self.exclude, path) {
                tracing::debug!(file = %path.display(), "excluded");
                continue;
            }
            return Some(entry.into_path());
        }
        None
    }
}

impl Iterator for ResourceWalker {
    type Item = Result<Resource>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(resource) = self.pending.pop_front() {
                return Some(Ok(resource));
            }

            let path = self.next_file()?;
            match parser::load_as(&path, self.dialect) {
                Ok(template) => {
                    let types = &self.resource_types;
                    self.pending.extend(
                        template
                            .resources
                            .into_iter()
                            .filter(|r| types.contains(&r.resource_type)),
                    );
                }
                Err(e) if e.is_template_error() && self.ignore_parse_errors => {
                    tracing::debug!(file = %path.display(), error = %e, "skipping template");
                }
                Err(e) => return Some(Err(e)),
            }
        }
    }
}
