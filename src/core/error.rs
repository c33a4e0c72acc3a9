use thiserror::Error;

/// Errors raised while compiling a single glob pattern.
#[derive(Debug, Error)]
pub enum PatternError {
    #[error("glob pattern is empty")]
    Empty,
    #[error("negated pattern '{0}' has nothing after '!'")]
    EmptyNegation(String),
    #[error("invalid glob '{pattern}': {source}")]
    Glob {
        pattern: String,
        #[source]
        source: globset::Error,
    },
}

/// Errors detected while loading a label configuration into a `RuleStore`.
///
/// All of these are raised by `RuleStore::load` and friends. Classification
/// itself never fails, so nothing here is produced after a store exists.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse YAML document: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("failed to parse JSON document: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to parse TOML document: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("label '{label}' is declared more than once")]
    DuplicateLabel { label: String },
    #[error("label '{label}' has no match groups")]
    EmptyRule { label: String },
    #[error("label '{label}': unknown key '{key}'")]
    UnknownKey { label: String, key: String },
    #[error("label '{label}': {message}")]
    Malformed { label: String, message: String },
    #[error("label '{label}': {source}")]
    InvalidPattern {
        label: String,
        #[source]
        source: PatternError,
    },
    #[error("label '{label}': invalid branch pattern '{pattern}': {source}")]
    InvalidRegex {
        label: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

impl ConfigError {
    pub(crate) fn malformed(label: &str, message: impl Into<String>) -> Self {
        ConfigError::Malformed {
            label: label.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn unknown_key(label: &str, key: &str) -> Self {
        ConfigError::UnknownKey {
            label: label.to_string(),
            key: key.to_string(),
        }
    }

    /// The label the error is attached to, if any.
    pub fn label(&self) -> Option<&str> {
        match self {
            ConfigError::DuplicateLabel { label }
            | ConfigError::EmptyRule { label }
            | ConfigError::UnknownKey { label, .. }
            | ConfigError::Malformed { label, .. }
            | ConfigError::InvalidPattern { label, .. }
            | ConfigError::InvalidRegex { label, .. } => Some(label),
            _ => None,
        }
    }
}
