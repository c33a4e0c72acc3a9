use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::HashSet;
use tracing::debug;

use crate::builders::importer::{DocumentFormat, RawDocument};
use crate::builders::rules::Rule;
use crate::core::error::ConfigError;

/// The ordered, immutable set of label rules.
///
/// A store only exists once the whole document has been validated, so holding
/// one means classification cannot fail. It is `Send + Sync` and can be shared
/// across threads by reference.
#[derive(Debug, Clone, Default)]
pub struct RuleStore {
    rules: Vec<Rule>,
}

impl RuleStore {
    /// Decodes every entry of a document, rejecting duplicate labels.
    pub fn load(document: RawDocument) -> Result<Self, ConfigError> {
        let mut seen = HashSet::new();
        let mut rules = Vec::with_capacity(document.entries().len());

        for (label, value) in document.into_entries() {
            if !seen.insert(label.clone()) {
                return Err(ConfigError::DuplicateLabel { label });
            }
            let rule = Rule::decode(&label, &value)?;
            debug!(label = %label, groups = rule.groups().len(), "loaded rule");
            rules.push(rule);
        }

        Ok(Self { rules })
    }

    /// Parses and loads a document in one step.
    pub fn parse(text: &str, format: DocumentFormat) -> Result<Self, ConfigError> {
        Self::load(format.parse(text)?)
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn get(&self, label: &str) -> Option<&Rule> {
        self.rules.iter().find(|rule| rule.label() == label)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|rule| rule.label())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Serializes back to the document shape (`label -> groups`) in normalized
/// form, so an exported store loads into an equivalent one.
impl Serialize for RuleStore {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.rules.len()))?;
        for rule in &self.rules {
            map.serialize_entry(rule.label(), rule.groups())?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LABELER_YML: &str = r#"
CI:
  - changed-files:
      - any-glob-to-any-file: ["ci/**", ".github/**"]
topic-documentation:
  - changed-files:
      - all-globs-to-all-files: ["doc/**/*", "!doc/whats-new.rst"]
topic-plotting:
  - changed-files:
      - any-glob-to-any-file: ["xarray/plot/*", "xarray/plot/**/*"]
"#;

    #[test]
    fn test_load_keeps_declaration_order() {
        let store = RuleStore::parse(LABELER_YML, DocumentFormat::Yaml).unwrap();
        let labels: Vec<&str> = store.labels().collect();
        assert_eq!(labels, vec!["CI", "topic-documentation", "topic-plotting"]);
        assert_eq!(store.len(), 3);
        assert!(store.get("CI").is_some());
        assert!(store.get("topic-backends").is_none());
    }

    #[test]
    fn test_duplicate_label_fails_load() {
        let text = "CI:\n  - changed-files: ['ci/**']\nCI:\n  - changed-files: ['.github/**']\n";
        let err = RuleStore::parse(text, DocumentFormat::Yaml).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateLabel { ref label } if label == "CI"));
        assert_eq!(err.label(), Some("CI"));
    }

    #[test]
    fn test_duplicate_label_in_json_fails_load() {
        let text = r#"{"CI": [{"changed-files": ["ci/**"]}], "CI": [{"changed-files": ["a"]}]}"#;
        let err = RuleStore::parse(text, DocumentFormat::Json).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateLabel { .. }));
    }

    #[test]
    fn test_label_without_groups_fails_load() {
        let err = RuleStore::parse("CI:\n", DocumentFormat::Yaml).unwrap_err();
        assert!(matches!(err, ConfigError::EmptyRule { .. }));
    }

    #[test]
    fn test_empty_document_is_an_empty_store() {
        let store = RuleStore::parse("", DocumentFormat::Yaml).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_exported_store_reloads_in_every_format() {
        let store = RuleStore::parse(LABELER_YML, DocumentFormat::Yaml).unwrap();
        for format in [DocumentFormat::Yaml, DocumentFormat::Json, DocumentFormat::Toml] {
            let rendered = format.render(&store).unwrap();
            let reloaded = RuleStore::parse(&rendered, format).unwrap();
            let labels: Vec<&str> = reloaded.labels().collect();
            assert_eq!(labels, vec!["CI", "topic-documentation", "topic-plotting"]);
        }
    }

    #[test]
    fn test_store_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RuleStore>();
    }
}
