use thiserror::Error;

pub type Result<T> = std::result::Result<T, ScanError>;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Parse error in {file}: {message}")]
    Parse { file: String, message: String },

    #[error("Unsupported template {file}: {message}")]
    UnsupportedTemplate { file: String, message: String },

    #[error("Cannot coerce {value} to {expected}")]
    Coercion {
        value: String,
        expected: &'static str,
    },

    #[error("Path not found: {0}")]
    PathNotFound(String),

    #[error("Unknown rule: {0}")]
    UnknownRule(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Output error: {0}")]
    Output(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl ScanError {
    pub fn exit_code(&self) -> i32 {
        2
    }

    /// Whether this error belongs to a single template file (and may be
    /// skipped by the walker) rather than to the scan as a whole.
    pub fn is_template_error(&self) -> bool {
        matches!(self, Self::Parse { .. } | Self::UnsupportedTemplate { .. })
    }
}
