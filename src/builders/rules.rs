use regex::Regex;
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_yaml::Value;
use std::fmt;

use crate::builders::patterns::{GlobPattern, GlobSpec};
use crate::core::error::ConfigError;

/// A regular expression tested against a branch name.
#[derive(Debug, Clone)]
pub struct BranchPattern {
    regex: Regex,
}

impl BranchPattern {
    pub fn is_match(&self, branch: &str) -> bool {
        self.regex.is_match(branch)
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}

impl Serialize for BranchPattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// A single predicate inside a match group.
#[derive(Debug, Clone)]
pub enum Condition {
    ChangedFiles(Vec<GlobSpec>),
    HeadBranch(Vec<BranchPattern>),
    BaseBranch(Vec<BranchPattern>),
}

impl Condition {
    pub const KEYS: [&'static str; 3] = ["changed-files", "head-branch", "base-branch"];

    pub fn key(&self) -> &'static str {
        match self {
            Condition::ChangedFiles(_) => "changed-files",
            Condition::HeadBranch(_) => "head-branch",
            Condition::BaseBranch(_) => "base-branch",
        }
    }
}

impl Serialize for Condition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        match self {
            Condition::ChangedFiles(specs) => map.serialize_entry(self.key(), specs)?,
            Condition::HeadBranch(branches) | Condition::BaseBranch(branches) => {
                map.serialize_entry(self.key(), branches)?
            }
        }
        map.end()
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::ChangedFiles(specs) => {
                let specs: Vec<String> = specs
                    .iter()
                    .map(|spec| format!("{} [{}]", spec.key(), join(spec.patterns())))
                    .collect();
                write!(f, "changed-files: {}", specs.join(", "))
            }
            Condition::HeadBranch(branches) | Condition::BaseBranch(branches) => {
                let branches: Vec<&str> = branches.iter().map(|b| b.as_str()).collect();
                write!(f, "{}: [{}]", self.key(), branches.join(", "))
            }
        }
    }
}

/// One top-level entry of a rule.
#[derive(Debug, Clone)]
pub enum MatchGroup {
    /// Holds when at least one condition holds.
    Any(Vec<Condition>),
    /// Holds when every condition holds.
    All(Vec<Condition>),
}

impl MatchGroup {
    pub fn key(&self) -> &'static str {
        match self {
            MatchGroup::Any(_) => "any",
            MatchGroup::All(_) => "all",
        }
    }

    pub fn conditions(&self) -> &[Condition] {
        match self {
            MatchGroup::Any(conditions) | MatchGroup::All(conditions) => conditions,
        }
    }
}

impl Serialize for MatchGroup {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(self.key(), self.conditions())?;
        map.end()
    }
}

impl fmt::Display for MatchGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let conditions: Vec<String> = self.conditions().iter().map(|c| c.to_string()).collect();
        write!(f, "{} of ({})", self.key(), conditions.join("; "))
    }
}

/// A label together with the groups that must all hold for it to apply.
#[derive(Debug, Clone)]
pub struct Rule {
    label: String,
    groups: Vec<MatchGroup>,
}

impl Rule {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn groups(&self) -> &[MatchGroup] {
        &self.groups
    }

    /// Decodes the raw value stored under `label` in a configuration document.
    ///
    /// The value must be a non-empty list of single-key objects. `any` and
    /// `all` introduce explicit groups; a bare `changed-files`, `head-branch`
    /// or `base-branch` entry is a one-condition `any` group.
    pub fn decode(label: &str, value: &Value) -> Result<Self, ConfigError> {
        let items = match value {
            Value::Null => return Err(empty_rule(label)),
            Value::Sequence(items) if items.is_empty() => return Err(empty_rule(label)),
            Value::Sequence(items) => items,
            other => {
                return Err(ConfigError::malformed(
                    label,
                    format!("expected a list of match groups, found {}", describe(other)),
                ));
            }
        };

        let groups = items
            .iter()
            .map(|item| decode_group(label, item))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            label: label.to_string(),
            groups,
        })
    }
}

fn empty_rule(label: &str) -> ConfigError {
    ConfigError::EmptyRule {
        label: label.to_string(),
    }
}

fn decode_group(label: &str, item: &Value) -> Result<MatchGroup, ConfigError> {
    let (key, value) = single_entry(label, item, "match group")?;

    match key {
        "any" => Ok(MatchGroup::Any(decode_conditions(label, key, value)?)),
        "all" => Ok(MatchGroup::All(decode_conditions(label, key, value)?)),
        _ if Condition::KEYS.contains(&key) => {
            Ok(MatchGroup::Any(vec![decode_condition(label, key, value)?]))
        }
        _ => Err(ConfigError::unknown_key(label, key)),
    }
}

/// Items of an `any` / `all` list: condition objects, or glob shorthands
/// standing for a `changed-files` condition.
fn decode_conditions(label: &str, key: &str, value: &Value) -> Result<Vec<Condition>, ConfigError> {
    let items = match value {
        Value::Sequence(items) if !items.is_empty() => items,
        Value::Sequence(_) | Value::Null => {
            return Err(ConfigError::malformed(label, format!("'{key}' list is empty")));
        }
        other => {
            return Err(ConfigError::malformed(
                label,
                format!("'{key}' expects a list, found {}", describe(other)),
            ));
        }
    };

    let mut conditions = Vec::with_capacity(items.len());
    // Plain globs of an `all` list form one all-globs-to-all-files spec, so a
    // negated glob excludes its files from the positive ones. It takes the
    // place of the first plain glob.
    let mut all_globs: Option<(usize, Vec<GlobPattern>)> = None;

    for item in items {
        match item {
            Value::String(raw) if key == "all" => {
                let glob = compile_glob(label, raw)?;
                all_globs
                    .get_or_insert_with(|| (conditions.len(), Vec::new()))
                    .1
                    .push(glob);
            }
            Value::String(_) => {
                conditions.push(Condition::ChangedFiles(vec![decode_glob_item(label, item)?]))
            }
            Value::Mapping(_) => {
                let (inner_key, inner_value) = single_entry(label, item, "condition")?;
                if Condition::KEYS.contains(&inner_key) {
                    conditions.push(decode_condition(label, inner_key, inner_value)?);
                } else if GlobSpec::KEYS.contains(&inner_key) {
                    conditions.push(Condition::ChangedFiles(vec![decode_glob_item(label, item)?]));
                } else {
                    return Err(ConfigError::unknown_key(label, inner_key));
                }
            }
            other => {
                return Err(ConfigError::malformed(
                    label,
                    format!("'{key}' items must be strings or objects, found {}", describe(other)),
                ));
            }
        }
    }

    if let Some((at, globs)) = all_globs {
        conditions.insert(
            at,
            Condition::ChangedFiles(vec![GlobSpec::AllGlobsToAllFiles(globs)]),
        );
    }
    Ok(conditions)
}

fn decode_condition(label: &str, key: &str, value: &Value) -> Result<Condition, ConfigError> {
    match key {
        "changed-files" => {
            let specs = match value {
                Value::Sequence(items) if !items.is_empty() => items
                    .iter()
                    .map(|item| decode_glob_item(label, item))
                    .collect::<Result<Vec<_>, _>>()?,
                Value::String(_) | Value::Mapping(_) => vec![decode_glob_item(label, value)?],
                Value::Sequence(_) | Value::Null => {
                    return Err(ConfigError::malformed(label, "'changed-files' list is empty"));
                }
                other => {
                    return Err(ConfigError::malformed(
                        label,
                        format!("'changed-files' expects a list, found {}", describe(other)),
                    ));
                }
            };
            Ok(Condition::ChangedFiles(specs))
        }
        "head-branch" => Ok(Condition::HeadBranch(decode_branches(label, key, value)?)),
        "base-branch" => Ok(Condition::BaseBranch(decode_branches(label, key, value)?)),
        _ => Err(ConfigError::unknown_key(label, key)),
    }
}

/// A plain string is an `any-glob-to-any-file` spec with one glob; an object
/// names its quantifier explicitly.
fn decode_glob_item(label: &str, item: &Value) -> Result<GlobSpec, ConfigError> {
    match item {
        Value::String(raw) => Ok(GlobSpec::AnyGlobToAnyFile(vec![compile_glob(label, raw)?])),
        Value::Mapping(_) => {
            let (key, value) = single_entry(label, item, "glob spec")?;
            if !GlobSpec::KEYS.contains(&key) {
                return Err(ConfigError::unknown_key(label, key));
            }
            let patterns = strings(label, key, value)?
                .into_iter()
                .map(|raw| compile_glob(label, raw))
                .collect::<Result<Vec<_>, _>>()?;
            GlobSpec::from_key(key, patterns).ok_or_else(|| ConfigError::unknown_key(label, key))
        }
        other => Err(ConfigError::malformed(
            label,
            format!("glob entries must be strings or objects, found {}", describe(other)),
        )),
    }
}

fn compile_glob(label: &str, raw: &str) -> Result<GlobPattern, ConfigError> {
    GlobPattern::parse(raw).map_err(|source| ConfigError::InvalidPattern {
        label: label.to_string(),
        source,
    })
}

fn decode_branches(label: &str, key: &str, value: &Value) -> Result<Vec<BranchPattern>, ConfigError> {
    strings(label, key, value)?
        .into_iter()
        .map(|raw| {
            Regex::new(raw)
                .map(|regex| BranchPattern { regex })
                .map_err(|source| ConfigError::InvalidRegex {
                    label: label.to_string(),
                    pattern: raw.to_string(),
                    source,
                })
        })
        .collect()
}

/// A string or a non-empty list of strings.
fn strings<'a>(label: &str, key: &str, value: &'a Value) -> Result<Vec<&'a str>, ConfigError> {
    match value {
        Value::String(s) => Ok(vec![s.as_str()]),
        Value::Sequence(items) if !items.is_empty() => items
            .iter()
            .map(|item| {
                item.as_str().ok_or_else(|| {
                    ConfigError::malformed(
                        label,
                        format!("'{key}' entries must be strings, found {}", describe(item)),
                    )
                })
            })
            .collect(),
        Value::Sequence(_) | Value::Null => {
            Err(ConfigError::malformed(label, format!("'{key}' has no patterns")))
        }
        other => Err(ConfigError::malformed(
            label,
            format!("'{key}' expects a string or a list of strings, found {}", describe(other)),
        )),
    }
}

/// Unpacks an object that must have exactly one string key.
fn single_entry<'a>(
    label: &str,
    item: &'a Value,
    what: &str,
) -> Result<(&'a str, &'a Value), ConfigError> {
    let mapping = item.as_mapping().ok_or_else(|| {
        ConfigError::malformed(label, format!("expected a {what} object, found {}", describe(item)))
    })?;

    let mut entries = mapping.iter();
    match (entries.next(), entries.next()) {
        (Some((key, value)), None) => {
            let key = key.as_str().ok_or_else(|| {
                ConfigError::malformed(label, format!("{what} keys must be strings"))
            })?;
            Ok((key, value))
        }
        (None, _) => Err(ConfigError::malformed(label, format!("{what} object is empty"))),
        (Some(_), Some(_)) => {
            let keys: Vec<String> = mapping
                .keys()
                .map(|k| k.as_str().unwrap_or("?").to_string())
                .collect();
            Err(ConfigError::malformed(
                label,
                format!("{what} must have exactly one key, found {}", keys.join(", ")),
            ))
        }
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::Null => "nothing".to_string(),
        Value::Bool(b) => format!("boolean {b}"),
        Value::Number(n) => format!("number {n}"),
        Value::String(s) => format!("string '{s}'"),
        Value::Sequence(_) => "a list".to_string(),
        Value::Mapping(_) => "an object".to_string(),
        Value::Tagged(tagged) => format!("tagged value {}", tagged.tag),
    }
}

fn join(patterns: &[GlobPattern]) -> String {
    patterns
        .iter()
        .map(|p| p.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yaml(text: &str) -> Value {
        serde_yaml::from_str(text).unwrap()
    }

    #[test]
    fn test_bare_changed_files_becomes_any_group() {
        let rule = Rule::decode(
            "CI",
            &yaml("- changed-files:\n    - any-glob-to-any-file: ['ci/**']\n"),
        )
        .unwrap();
        assert_eq!(rule.label(), "CI");
        assert_eq!(rule.groups().len(), 1);
        let MatchGroup::Any(conditions) = &rule.groups()[0] else {
            panic!("expected an any group");
        };
        let Condition::ChangedFiles(specs) = &conditions[0] else {
            panic!("expected changed-files");
        };
        assert_eq!(specs[0].key(), "any-glob-to-any-file");
        assert_eq!(specs[0].patterns()[0].as_str(), "ci/**");
    }

    #[test]
    fn test_plain_strings_are_any_glob_to_any_file() {
        let rule = Rule::decode("docs", &yaml("- changed-files: ['doc/*', '*.md']\n")).unwrap();
        let Condition::ChangedFiles(specs) = &rule.groups()[0].conditions()[0] else {
            panic!("expected changed-files");
        };
        assert_eq!(specs.len(), 2);
        assert!(specs.iter().all(|s| s.key() == "any-glob-to-any-file"));
    }

    #[test]
    fn test_all_group_accepts_glob_shorthands_and_conditions() {
        let rule = Rule::decode(
            "docs",
            &yaml(
                "- all:\n    - 'doc/**/*'\n    - all-globs-to-any-file: ['doc/**', '!doc/whats-new.rst']\n    - head-branch: '^docs/'\n",
            ),
        )
        .unwrap();
        let MatchGroup::All(conditions) = &rule.groups()[0] else {
            panic!("expected an all group");
        };
        assert_eq!(conditions.len(), 3);
        assert_eq!(conditions[0].key(), "changed-files");
        assert_eq!(conditions[1].key(), "changed-files");
        assert_eq!(conditions[2].key(), "head-branch");
    }

    #[test]
    fn test_all_group_plain_globs_share_one_spec() {
        let rule = Rule::decode(
            "docs",
            &yaml("- all:\n    - head-branch: '^docs/'\n    - 'doc/**/*'\n    - '!doc/whats-new.rst'\n"),
        )
        .unwrap();
        let conditions = rule.groups()[0].conditions();
        assert_eq!(conditions.len(), 2);
        assert_eq!(conditions[0].key(), "head-branch");
        let Condition::ChangedFiles(specs) = &conditions[1] else {
            panic!("expected changed-files");
        };
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].key(), "all-globs-to-all-files");
        let raw: Vec<&str> = specs[0].patterns().iter().map(|p| p.as_str()).collect();
        assert_eq!(raw, vec!["doc/**/*", "!doc/whats-new.rst"]);

        // Under `any` each plain glob stays its own condition.
        let rule = Rule::decode("docs", &yaml("- any: ['doc/**', '*.md']\n")).unwrap();
        assert_eq!(rule.groups()[0].conditions().len(), 2);
    }

    #[test]
    fn test_empty_rule_is_rejected() {
        assert!(matches!(
            Rule::decode("empty", &Value::Null),
            Err(ConfigError::EmptyRule { .. })
        ));
        assert!(matches!(
            Rule::decode("empty", &yaml("[]")),
            Err(ConfigError::EmptyRule { .. })
        ));
    }

    #[test]
    fn test_unknown_keys_are_reported_with_label() {
        let err = Rule::decode("CI", &yaml("- changed-file: ['ci/**']\n")).unwrap_err();
        match err {
            ConfigError::UnknownKey { label, key } => {
                assert_eq!(label, "CI");
                assert_eq!(key, "changed-file");
            }
            other => panic!("unexpected error: {other}"),
        }

        let err = Rule::decode(
            "CI",
            &yaml("- changed-files:\n    - some-glob-to-any-file: ['ci/**']\n"),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownKey { key, .. } if key == "some-glob-to-any-file"));
    }

    #[test]
    fn test_group_with_two_keys_is_malformed() {
        let err = Rule::decode(
            "CI",
            &yaml("- changed-files: ['ci/**']\n  head-branch: 'ci'\n"),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Malformed { .. }));
    }

    #[test]
    fn test_bad_patterns_fail_decoding() {
        let err = Rule::decode("CI", &yaml("- changed-files: ['ci/[a']\n")).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPattern { .. }));

        let err = Rule::decode("CI", &yaml("- head-branch: ['(unclosed']\n")).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRegex { .. }));
    }

    #[test]
    fn test_display_summarizes_group() {
        let rule = Rule::decode("CI", &yaml("- changed-files: ['ci/**']\n")).unwrap();
        assert_eq!(
            rule.groups()[0].to_string(),
            "any of (changed-files: any-glob-to-any-file [ci/**])"
        );
    }
}
