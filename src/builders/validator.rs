use std::collections::HashSet;

use crate::builders::patterns::{GlobPattern, GlobSpec};
use crate::builders::rules::{Condition, MatchGroup, Rule};
use crate::core::store::RuleStore;

/// The `RuleValidator` trait looks for rules that load fine but are likely
/// mistakes. Hard errors are the store's job; this only produces warnings.
pub trait RuleValidator {
    /// Lints every rule in the store.
    fn validate_store(&self, store: &RuleStore) -> Vec<String>;

    /// Lints a single rule.
    fn validate_rule(&self, rule: &Rule) -> Vec<String>;
}

/// The default set of lints.
pub struct StandardValidator;

impl StandardValidator {
    pub fn new() -> Self {
        Self
    }

    /// Warnings for one glob. Paths from git are relative and never start
    /// with `/` or `./`, so such globs can never match.
    fn check_glob(&self, label: &str, glob: &GlobPattern) -> Vec<String> {
        let mut warnings = Vec::new();
        let body = glob.as_str().trim_start_matches('!');

        if body.starts_with('/') {
            warnings.push(format!(
                "{label}: pattern '{glob}' starts with '/' and will never match a repository path"
            ));
        }
        if body.starts_with("./") {
            warnings.push(format!(
                "{label}: pattern '{glob}' starts with './'; write it relative to the repository root"
            ));
        }
        if body.contains('\\') {
            warnings.push(format!(
                "{label}: pattern '{glob}' contains '\\'; paths use '/' as the separator"
            ));
        }
        warnings
    }

    /// Warnings for one glob spec: repeated globs, and specs made only of
    /// negations where that makes them match almost everything.
    fn check_spec(&self, label: &str, spec: &GlobSpec) -> Vec<String> {
        let mut warnings = Vec::new();
        let mut seen = HashSet::new();

        for glob in spec.patterns() {
            if !seen.insert(glob.as_str()) {
                warnings.push(format!(
                    "{label}: pattern '{glob}' is listed more than once in {}",
                    spec.key()
                ));
            }
            warnings.extend(self.check_glob(label, glob));
        }

        let only_negated = spec.patterns().iter().all(GlobPattern::is_negated);
        if only_negated && matches!(spec, GlobSpec::AnyGlobToAnyFile(_)) {
            warnings.push(format!(
                "{label}: {} contains only negated patterns and matches any change touching another file",
                spec.key()
            ));
        }
        warnings
    }
}

impl Default for StandardValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleValidator for StandardValidator {
    fn validate_store(&self, store: &RuleStore) -> Vec<String> {
        let mut warnings = Vec::new();

        for rule in store.rules() {
            let label = rule.label();
            if label.trim() != label {
                warnings.push(format!("label '{label}' has leading or trailing whitespace"));
            }
            if label.is_empty() {
                warnings.push("a rule has an empty label".to_string());
            }
            warnings.extend(self.validate_rule(rule));
        }
        warnings
    }

    fn validate_rule(&self, rule: &Rule) -> Vec<String> {
        let label = rule.label();
        let mut warnings = Vec::new();

        let has_files = rule
            .groups()
            .iter()
            .flat_map(MatchGroup::conditions)
            .any(|c| matches!(c, Condition::ChangedFiles(_)));
        if !has_files {
            warnings.push(format!(
                "{label}: no changed-files condition; the label depends only on branch names"
            ));
        }

        for group in rule.groups() {
            for condition in group.conditions() {
                if let Condition::ChangedFiles(specs) = condition {
                    for spec in specs {
                        warnings.extend(self.check_spec(label, spec));
                    }
                }
            }
        }
        warnings
    }
}
