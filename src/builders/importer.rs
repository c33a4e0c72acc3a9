use anyhow::{Context, Result};
use serde::de::{Deserialize, Deserializer, MapAccess, Visitor};
use serde::Serialize;
use serde_yaml::Value;
use std::fmt;
use std::fs;
use std::path::Path;

use crate::core::error::ConfigError;

/// The serialization formats a label configuration can be written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Yaml,
    Json,
    Toml,
}

impl DocumentFormat {
    /// Picks the format from a file extension. Unknown extensions yield `None`.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        Self::from_name(&ext)
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "yml" | "yaml" => Some(DocumentFormat::Yaml),
            "json" => Some(DocumentFormat::Json),
            "toml" => Some(DocumentFormat::Toml),
            _ => None,
        }
    }

    /// Parses a document into its ordered top-level entries.
    pub fn parse(&self, text: &str) -> Result<RawDocument, ConfigError> {
        if *self == DocumentFormat::Yaml && text.trim().is_empty() {
            return Ok(RawDocument::default());
        }

        let document = match self {
            DocumentFormat::Yaml => serde_yaml::from_str(text)?,
            DocumentFormat::Json => serde_json::from_str(text)?,
            DocumentFormat::Toml => toml::from_str(text)?,
        };
        Ok(document)
    }

    /// Renders any serializable value in this format.
    pub fn render<T: Serialize>(&self, value: &T) -> Result<String> {
        let content = match self {
            DocumentFormat::Yaml => {
                serde_yaml::to_string(value).context("Failed to serialize to YAML")?
            }
            DocumentFormat::Json => {
                serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?
            }
            DocumentFormat::Toml => {
                toml::to_string_pretty(value).context("Failed to serialize to TOML")?
            }
        };
        Ok(content)
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentFormat::Yaml => write!(f, "yaml"),
            DocumentFormat::Json => write!(f, "json"),
            DocumentFormat::Toml => write!(f, "toml"),
        }
    }
}

/// The top level of a label configuration: `label -> raw match groups`, in
/// declaration order.
///
/// Duplicate labels are kept rather than collapsed so that the rule store can
/// reject them by name. Every format is decoded into `serde_yaml::Value`, which
/// gives the rule decoder a single loosely-typed shape to work with.
#[derive(Debug, Default, Clone)]
pub struct RawDocument {
    entries: Vec<(String, Value)>,
}

impl RawDocument {
    pub fn entries(&self) -> &[(String, Value)] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<(String, Value)> {
        self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'de> Deserialize<'de> for RawDocument {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct DocumentVisitor;

        impl<'de> Visitor<'de> for DocumentVisitor {
            type Value = RawDocument;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a mapping of labels to match groups")
            }

            // An empty YAML file.
            fn visit_unit<E>(self) -> Result<RawDocument, E> {
                Ok(RawDocument::default())
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<RawDocument, A::Error> {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((label, value)) = map.next_entry::<String, Value>()? {
                    entries.push((label, value));
                }
                Ok(RawDocument { entries })
            }
        }

        deserializer.deserialize_map(DocumentVisitor)
    }
}

/// A source of label configuration documents.
pub trait RuleImporter {
    fn import_from_file(&self, path: &Path) -> Result<RawDocument>;
}

/// Reads documents from disk, choosing the format from the file extension
/// unless one is forced.
#[derive(Debug, Default)]
pub struct FileImporter {
    format: Option<DocumentFormat>,
}

impl FileImporter {
    pub fn with_format(format: DocumentFormat) -> Self {
        Self {
            format: Some(format),
        }
    }
}

impl RuleImporter for FileImporter {
    fn import_from_file(&self, path: &Path) -> Result<RawDocument> {
        let format = self
            .format
            .or_else(|| DocumentFormat::from_path(path))
            .unwrap_or(DocumentFormat::Yaml);

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let document = format
            .parse(&content)
            .with_context(|| format!("Invalid {format} document {}", path.display()))?;
        Ok(document)
    }
}
