pub mod block;
pub mod declarative;
mod lines;

use std::path::Path;

use crate::error::{Result, ScanError};
use crate::ir::{Dialect, Template};

/// Template parser trait. Each parser lowers one dialect into a [`Template`].
pub trait TemplateParser: Send + Sync {
    fn dialect(&self) -> Dialect;

    /// Parse `content` (read from `path`) into a template.
    ///
    /// Fails with [`ScanError::Parse`] on invalid syntax and with
    /// [`ScanError::UnsupportedTemplate`] when the document has no
    /// non-empty resource container.
    fn parse_template(&self, path: &Path, content: &str) -> Result<Template>;
}

/// Get the parser for a dialect.
pub fn parser_for_dialect(dialect: Dialect) -> Box<dyn TemplateParser> {
    match dialect {
        Dialect::Declarative => Box::new(declarative::DeclarativeParser),
        Dialect::Block => Box::new(block::BlockParser),
    }
}

/// Load a template, selecting the dialect from the file extension.
pub fn load(path: &Path) -> Result<Template> {
    let dialect = Dialect::from_path(path).ok_or_else(|| ScanError::UnsupportedTemplate {
        file: path.display().to_string(),
        message: "unrecognised template extension".into(),
    })?;
    load_as(path, dialect)
}

/// Load a template with an explicit dialect.
pub fn load_as(path: &Path, dialect: Dialect) -> Result<Template> {
    let bytes = std::fs::read(path)?;
    let content = String::from_utf8_lossy(&bytes);
    parser_for_dialect(dialect).parse_template(path, &content)
}

pub(crate) fn parse_error(path: &Path, err: impl std::fmt::Display) -> ScanError {
    ScanError::Parse {
        file: path.display().to_string(),
        message: err.to_string(),
    }
}

pub(crate) fn unsupported(path: &Path, message: &str) -> ScanError {
    ScanError::UnsupportedTemplate {
        file: path.display().to_string(),
        message: message.into(),
    }
}
