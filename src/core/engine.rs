use anyhow::Result;
use std::collections::BTreeSet;
use tracing::info;

use crate::core::classifier::{classify_change, ChangeSet};
use crate::core::config::ConfigManager;
use crate::core::git::{Git2Client, GitClient};
use crate::core::store::RuleStore;

/// Loads the rules once and classifies change sets drawn from git or given
/// directly.
pub struct LabelEngine {
    store: RuleStore,
    git: Option<Box<dyn GitClient>>,
}

impl LabelEngine {
    /// Loads the store through the config manager and opens the repository
    /// it belongs to.
    pub fn new(config_manager: &ConfigManager) -> Result<Self> {
        let store = config_manager.load_store()?;
        let git = Git2Client::new(config_manager.get_repo_root())?;
        Ok(Self::with_git(store, Box::new(git)))
    }

    /// An engine with no repository; only `classify` is available.
    pub fn from_store(store: RuleStore) -> Self {
        Self { store, git: None }
    }

    pub fn with_git(store: RuleStore, git: Box<dyn GitClient>) -> Self {
        Self {
            store,
            git: Some(git),
        }
    }

    pub fn classify(&self, change: &ChangeSet) -> BTreeSet<String> {
        let labels = classify_change(&self.store, change);
        info!(
            paths = change.paths.len(),
            labels = labels.len(),
            "classified change"
        );
        labels
    }

    /// Classifies the files staged in the index. The current branch is used
    /// as the head branch.
    pub fn classify_staged(&self) -> Result<(ChangeSet, BTreeSet<String>)> {
        let git = self.git()?;
        let change = ChangeSet {
            paths: git.staged_files()?,
            head_branch: git.current_branch(),
            base_branch: None,
        };
        let labels = self.classify(&change);
        Ok((change, labels))
    }

    /// Classifies the files `head` changed relative to `base`.
    pub fn classify_range(&self, base: &str, head: &str) -> Result<(ChangeSet, BTreeSet<String>)> {
        let git = self.git()?;
        let change = ChangeSet {
            paths: git.changed_files(base, head)?,
            head_branch: git.branch_name(head),
            base_branch: git.branch_name(base),
        };
        let labels = self.classify(&change);
        Ok((change, labels))
    }

    fn git(&self) -> Result<&dyn GitClient> {
        match &self.git {
            Some(git) => Ok(git.as_ref()),
            None => anyhow::bail!("No git repository is attached to this engine"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::importer::DocumentFormat;

    /// Serves a canned change instead of reading a repository.
    struct FakeGit {
        staged: Vec<String>,
        branch: Option<String>,
    }

    impl GitClient for FakeGit {
        fn staged_files(&self) -> Result<Vec<String>> {
            Ok(self.staged.clone())
        }

        fn changed_files(&self, base: &str, _head: &str) -> Result<Vec<String>> {
            if base == "missing" {
                anyhow::bail!("Unknown revision '{base}'");
            }
            Ok(vec!["doc/api.rst".to_string()])
        }

        fn current_branch(&self) -> Option<String> {
            self.branch.clone()
        }

        fn branch_name(&self, rev: &str) -> Option<String> {
            (rev != "HEAD").then(|| rev.to_string())
        }
    }

    fn engine() -> LabelEngine {
        let store = RuleStore::parse(
            "CI:\n  - changed-files: ['ci/**']\ndocs:\n  - changed-files: ['doc/**']\nto-main:\n  - base-branch: '^main$'\n  - changed-files: ['**']\nfeature:\n  - head-branch: '^feature/'\n  - changed-files: ['**']\n",
            DocumentFormat::Yaml,
        )
        .unwrap();
        let git = FakeGit {
            staged: vec!["ci/install.sh".to_string()],
            branch: Some("feature/labels".to_string()),
        };
        LabelEngine::with_git(store, Box::new(git))
    }

    #[test]
    fn test_classify_staged_uses_current_branch() {
        let (change, labels) = engine().classify_staged().unwrap();
        assert_eq!(change.head_branch.as_deref(), Some("feature/labels"));
        let labels: Vec<&str> = labels.iter().map(String::as_str).collect();
        assert_eq!(labels, vec!["CI", "feature"]);
    }

    #[test]
    fn test_classify_range_uses_revision_branches() {
        let (change, labels) = engine().classify_range("main", "HEAD").unwrap();
        assert_eq!(change.base_branch.as_deref(), Some("main"));
        let labels: Vec<&str> = labels.iter().map(String::as_str).collect();
        assert_eq!(labels, vec!["docs", "to-main"]);
    }

    #[test]
    fn test_git_errors_propagate() {
        assert!(engine().classify_range("missing", "HEAD").is_err());
    }

    #[test]
    fn test_engine_without_repository() {
        let engine = LabelEngine::from_store(RuleStore::default());
        assert!(engine.classify_staged().is_err());
        assert!(engine.classify(&ChangeSet::new(["a"])).is_empty());
    }
}
