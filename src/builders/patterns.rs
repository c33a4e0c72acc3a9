use globset::{GlobBuilder, GlobMatcher};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::fmt;

use crate::core::error::PatternError;

/// A compiled glob pattern, optionally negated with a leading `!`.
///
/// `*` never crosses a `/`, `**` spans any number of path segments (including
/// none) and everything else is matched literally and case-sensitively. The
/// pattern is anchored to the whole path, so only a leading `**/` lets it match
/// at any depth.
#[derive(Debug, Clone)]
pub struct GlobPattern {
    /// The pattern exactly as written in the configuration, `!` included.
    raw: String,
    negated: bool,
    matcher: GlobMatcher,
}

/// The `PatternMatcher` trait is the single question the classifier asks of a
/// pattern: does this path satisfy it?
pub trait PatternMatcher {
    fn matches_path(&self, path: &str) -> bool;
}

impl GlobPattern {
    /// Compiles a pattern. Any syntax problem is reported here, so a loaded
    /// rule never fails at match time.
    pub fn parse(raw: &str) -> Result<Self, PatternError> {
        if raw.is_empty() {
            return Err(PatternError::Empty);
        }

        let (negated, body) = match raw.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, raw),
        };
        if body.is_empty() {
            return Err(PatternError::EmptyNegation(raw.to_string()));
        }

        let matcher = GlobBuilder::new(body)
            .literal_separator(true)
            .backslash_escape(true)
            .build()
            .map_err(|source| PatternError::Glob {
                pattern: raw.to_string(),
                source,
            })?
            .compile_matcher();

        Ok(Self {
            raw: raw.to_string(),
            negated,
            matcher,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn is_negated(&self) -> bool {
        self.negated
    }

    /// Matches the pattern with its `!` stripped off.
    pub fn matches_unnegated(&self, path: &str) -> bool {
        self.matcher.is_match(normalize_path(path))
    }
}

impl PatternMatcher for GlobPattern {
    fn matches_path(&self, path: &str) -> bool {
        self.matches_unnegated(path) != self.negated
    }
}

impl fmt::Display for GlobPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Serialize for GlobPattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

/// One-shot form of the glob matcher: compile `pattern` and test `path`.
pub fn matches(pattern: &str, path: &str) -> Result<bool, PatternError> {
    Ok(GlobPattern::parse(pattern)?.matches_path(path))
}

/// Diff tools sometimes report `./dir/file`; rules are written against `dir/file`.
fn normalize_path(path: &str) -> &str {
    path.strip_prefix("./").unwrap_or(path)
}

/// How a list of globs is quantified over the changed files.
#[derive(Debug, Clone)]
pub enum GlobSpec {
    /// Some file matches some glob.
    AnyGlobToAnyFile(Vec<GlobPattern>),
    /// Every file matches some glob.
    AnyGlobToAllFiles(Vec<GlobPattern>),
    /// Some single file matches every glob.
    AllGlobsToAnyFile(Vec<GlobPattern>),
    /// Negated globs remove files from consideration; at least one file must
    /// remain and every positive glob must match one of the remaining files.
    AllGlobsToAllFiles(Vec<GlobPattern>),
}

impl GlobSpec {
    pub const KEYS: [&'static str; 4] = [
        "any-glob-to-any-file",
        "any-glob-to-all-files",
        "all-globs-to-any-file",
        "all-globs-to-all-files",
    ];

    /// Builds the variant named by a configuration key.
    pub fn from_key(key: &str, patterns: Vec<GlobPattern>) -> Option<Self> {
        match key {
            "any-glob-to-any-file" => Some(GlobSpec::AnyGlobToAnyFile(patterns)),
            "any-glob-to-all-files" => Some(GlobSpec::AnyGlobToAllFiles(patterns)),
            "all-globs-to-any-file" => Some(GlobSpec::AllGlobsToAnyFile(patterns)),
            "all-globs-to-all-files" => Some(GlobSpec::AllGlobsToAllFiles(patterns)),
            _ => None,
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            GlobSpec::AnyGlobToAnyFile(_) => "any-glob-to-any-file",
            GlobSpec::AnyGlobToAllFiles(_) => "any-glob-to-all-files",
            GlobSpec::AllGlobsToAnyFile(_) => "all-globs-to-any-file",
            GlobSpec::AllGlobsToAllFiles(_) => "all-globs-to-all-files",
        }
    }

    pub fn patterns(&self) -> &[GlobPattern] {
        match self {
            GlobSpec::AnyGlobToAnyFile(p)
            | GlobSpec::AnyGlobToAllFiles(p)
            | GlobSpec::AllGlobsToAnyFile(p)
            | GlobSpec::AllGlobsToAllFiles(p) => p,
        }
    }

    /// Evaluates the spec against the whole change. An empty change never matches.
    pub fn evaluate(&self, paths: &[&str]) -> bool {
        if paths.is_empty() {
            return false;
        }

        match self {
            GlobSpec::AnyGlobToAnyFile(globs) => paths
                .iter()
                .any(|path| globs.iter().any(|g| g.matches_path(path))),
            GlobSpec::AnyGlobToAllFiles(globs) => paths
                .iter()
                .all(|path| globs.iter().any(|g| g.matches_path(path))),
            GlobSpec::AllGlobsToAnyFile(globs) => paths
                .iter()
                .any(|path| globs.iter().all(|g| g.matches_path(path))),
            GlobSpec::AllGlobsToAllFiles(globs) => {
                let remaining: Vec<&str> = paths
                    .iter()
                    .copied()
                    .filter(|path| {
                        !globs
                            .iter()
                            .any(|g| g.is_negated() && g.matches_unnegated(path))
                    })
                    .collect();

                !remaining.is_empty()
                    && globs
                        .iter()
                        .filter(|g| !g.is_negated())
                        .all(|g| remaining.iter().any(|path| g.matches_unnegated(path)))
            }
        }
    }
}

impl Serialize for GlobSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(self.key(), self.patterns())?;
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn globs(raw: &[&str]) -> Vec<GlobPattern> {
        raw.iter().map(|r| GlobPattern::parse(r).unwrap()).collect()
    }

    #[test]
    fn test_single_star_stays_in_segment() {
        assert!(matches("doc/*", "doc/index.rst").unwrap());
        assert!(!matches("doc/*", "doc/api/index.rst").unwrap());
        assert!(matches("*.md", "README.md").unwrap());
        assert!(!matches("*.md", "doc/README.md").unwrap());
    }

    #[test]
    fn test_double_star_spans_segments() {
        assert!(matches("a/**", "a/b/c.txt").unwrap());
        assert!(!matches("a/**", "z/b/c.txt").unwrap());
        assert!(matches("doc/**/*", "doc/whats-new.rst").unwrap());
        assert!(matches("doc/**/*", "doc/api/index.rst").unwrap());
        assert!(matches("xarray/**/test_*.py", "xarray/tests/test_plot.py").unwrap());
    }

    #[test]
    fn test_anchoring_and_leading_recursive_prefix() {
        assert!(!matches("setup.cfg", "nested/setup.cfg").unwrap());
        assert!(matches("**/setup.cfg", "nested/setup.cfg").unwrap());
        assert!(matches("**/setup.cfg", "setup.cfg").unwrap());
        assert!(!matches("ci", "ci/requirements/min.yml").unwrap());
    }

    #[test]
    fn test_case_sensitive() {
        assert!(matches("README.md", "README.md").unwrap());
        assert!(!matches("README.md", "readme.md").unwrap());
    }

    #[test]
    fn test_negation_inverts_match() {
        assert!(!matches("!doc/whats-new.rst", "doc/whats-new.rst").unwrap());
        assert!(matches("!doc/whats-new.rst", "doc/api.rst").unwrap());
        let pattern = GlobPattern::parse("!doc/*").unwrap();
        assert!(pattern.is_negated());
        assert!(pattern.matches_unnegated("doc/api.rst"));
        assert_eq!(pattern.as_str(), "!doc/*");
    }

    #[test]
    fn test_dot_slash_prefix_on_path_is_ignored() {
        assert!(matches("ci/**", "./ci/install.sh").unwrap());
    }

    #[test]
    fn test_invalid_patterns_are_rejected() {
        assert!(matches!(GlobPattern::parse(""), Err(PatternError::Empty)));
        assert!(matches!(
            GlobPattern::parse("!"),
            Err(PatternError::EmptyNegation(_))
        ));
        assert!(matches!(
            GlobPattern::parse("doc/[abc"),
            Err(PatternError::Glob { .. })
        ));
    }

    #[test]
    fn test_any_glob_to_any_file() {
        let spec = GlobSpec::AnyGlobToAnyFile(globs(&["ci/**", "*.toml"]));
        assert!(spec.evaluate(&["README.md", "pyproject.toml"]));
        assert!(!spec.evaluate(&["README.md"]));
        assert!(!spec.evaluate(&[]));
    }

    #[test]
    fn test_any_glob_to_all_files() {
        let spec = GlobSpec::AnyGlobToAllFiles(globs(&["doc/**", "*.md"]));
        assert!(spec.evaluate(&["doc/api.rst", "README.md"]));
        assert!(!spec.evaluate(&["doc/api.rst", "xarray/core/dataset.py"]));
    }

    #[test]
    fn test_all_globs_to_any_file() {
        let spec = GlobSpec::AllGlobsToAnyFile(globs(&["doc/**/*", "!doc/whats-new.rst"]));
        assert!(!spec.evaluate(&["doc/whats-new.rst"]));
        assert!(spec.evaluate(&["doc/whats-new.rst", "doc/api.rst"]));
    }

    #[test]
    fn test_all_globs_to_all_files_excludes_negated_files() {
        let spec = GlobSpec::AllGlobsToAllFiles(globs(&["doc/**/*", "!doc/whats-new.rst"]));
        assert!(!spec.evaluate(&["doc/whats-new.rst"]));
        assert!(spec.evaluate(&["doc/whats-new.rst", "doc/api.rst"]));
        assert!(!spec.evaluate(&["doc/whats-new.rst", "README.md"]));
    }

    #[test]
    fn test_all_globs_to_all_files_requires_every_positive_glob() {
        let spec = GlobSpec::AllGlobsToAllFiles(globs(&["xarray/**", "doc/**"]));
        assert!(spec.evaluate(&["xarray/core/variable.py", "doc/api.rst"]));
        assert!(!spec.evaluate(&["xarray/core/variable.py"]));
    }

    #[test]
    fn test_spec_key_lookup() {
        for key in GlobSpec::KEYS {
            let spec = GlobSpec::from_key(key, globs(&["a/**"])).unwrap();
            assert_eq!(spec.key(), key);
        }
        assert!(GlobSpec::from_key("some-glob", vec![]).is_none());
    }
}
