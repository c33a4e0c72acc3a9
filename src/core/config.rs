use anyhow::{Context, Result};
use git2::Repository;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::builders::importer::{DocumentFormat, FileImporter, RuleImporter};
use crate::builders::validator::{RuleValidator, StandardValidator};
use crate::core::store::RuleStore;

/// Environment variable that overrides the config location.
pub const CONFIG_ENV: &str = "GIT_PATH_LABELER_CONFIG";

/// Default location of the label configuration, relative to the repository root.
pub const DEFAULT_CONFIG_PATH: &str = ".github/labeler.yml";

/// Written by `init`.
const STARTER_CONFIG: &str = r#"# Label configuration for git-path-labeler.
#
# Each label maps to a list of match groups; all groups must hold for the
# label to apply. Glob patterns are anchored to the repository root, `*`
# stays within a directory, `**` spans directories, and `!` negates.

CI:
  - changed-files:
      - any-glob-to-any-file: ["ci/**", ".github/**"]

documentation:
  - changed-files:
      - all-globs-to-all-files: ["doc/**/*", "!doc/whats-new.rst"]

dependencies:
  - changed-files:
      - any-glob-to-any-file: ["ci/requirements/*", "pyproject.toml", "setup.cfg"]
"#;

pub struct ConfigManager {
    config_path: PathBuf,
    repo_root: PathBuf,
}

impl ConfigManager {
    /// Locates the repository from the current directory. The config path
    /// comes from `GIT_PATH_LABELER_CONFIG` when set.
    pub fn new() -> Result<Self> {
        let repo_root = find_git_root()?;
        Self::new_at(repo_root)
    }

    /// Uses an explicit repository root.
    pub fn new_at(repo_root: PathBuf) -> Result<Self> {
        let config_path = config_path_for(&repo_root, std::env::var_os(CONFIG_ENV).as_deref());

        Ok(Self {
            config_path,
            repo_root,
        })
    }

    /// Overrides the config location; relative paths are taken from the
    /// repository root.
    pub fn set_config_path(&mut self, path: &Path) {
        self.config_path = resolve(&self.repo_root, path);
    }

    pub fn get_config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn get_repo_root(&self) -> &Path {
        &self.repo_root
    }

    pub fn format(&self) -> DocumentFormat {
        DocumentFormat::from_path(&self.config_path).unwrap_or(DocumentFormat::Yaml)
    }

    /// Writes the starter configuration unless a file is already there.
    /// Returns whether a file was written.
    pub fn initialize(&self) -> Result<bool> {
        if self.config_path.exists() {
            return Ok(false);
        }

        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let content = match self.format() {
            DocumentFormat::Yaml => STARTER_CONFIG.to_string(),
            // Other formats get the same rules, rendered by the store.
            format => {
                let store = RuleStore::parse(STARTER_CONFIG, DocumentFormat::Yaml)?;
                format.render(&store)?
            }
        };

        fs::write(&self.config_path, content).context("Failed to write config file")?;
        info!(path = %self.config_path.display(), "wrote starter config");
        Ok(true)
    }

    /// Reads and validates the configuration into a rule store.
    pub fn load_store(&self) -> Result<RuleStore> {
        if !self.config_path.exists() {
            anyhow::bail!(
                "No label configuration at {}; run 'git-path-labeler init' or pass --config",
                self.config_path.display()
            );
        }

        let document = FileImporter::with_format(self.format()).import_from_file(&self.config_path)?;
        let store = RuleStore::load(document)
            .with_context(|| format!("Invalid label configuration {}", self.config_path.display()))?;

        info!(
            path = %self.config_path.display(),
            rules = store.len(),
            "loaded label configuration"
        );
        Ok(store)
    }

    /// Loads the store and runs the lints over it. Hard errors fail;
    /// lint findings are returned.
    pub fn validate_config(&self) -> Result<Vec<String>> {
        let store = self.load_store()?;
        let warnings = StandardValidator::new().validate_store(&store);
        info!(warnings = warnings.len(), "validated label configuration");
        Ok(warnings)
    }

    /// Writes the normalized rule store to `output` in the given format.
    pub fn export_rules(&self, output: &Path, format: DocumentFormat) -> Result<()> {
        let store = self.load_store()?;
        let content = format.render(&store)?;
        fs::write(output, content).context("Failed to write export file")?;
        info!(path = %output.display(), %format, "exported rules");
        Ok(())
    }
}

/// The config location for `repo_root`, given the value of `GIT_PATH_LABELER_CONFIG`.
fn config_path_for(repo_root: &Path, env_override: Option<&OsStr>) -> PathBuf {
    match env_override {
        Some(path) if !path.is_empty() => resolve(repo_root, Path::new(path)),
        _ => repo_root.join(DEFAULT_CONFIG_PATH),
    }
}

fn resolve(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

fn find_git_root() -> Result<PathBuf> {
    discover_root(&std::env::current_dir()?)
}

/// The working tree of the repository containing `start`.
fn discover_root(start: &Path) -> Result<PathBuf> {
    let repo = Repository::discover(start).context("Not in a Git repository")?;
    match repo.workdir() {
        Some(workdir) => Ok(workdir.to_path_buf()),
        None => anyhow::bail!("Repository at {} has no working tree", repo.path().display()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;

    #[test]
    fn test_env_override_sets_config_path() {
        let root = Path::new("/work/xarray");
        assert_eq!(
            config_path_for(root, None),
            root.join(".github").join("labeler.yml")
        );

        let relative = OsString::from("ci/labels.toml");
        assert_eq!(
            config_path_for(root, Some(&relative)),
            root.join("ci/labels.toml")
        );

        let absolute = OsString::from("/etc/labeler/labels.json");
        assert_eq!(
            config_path_for(root, Some(&absolute)),
            PathBuf::from("/etc/labeler/labels.json")
        );

        // Set but empty counts as unset.
        assert_eq!(
            config_path_for(root, Some(OsStr::new(""))),
            root.join(DEFAULT_CONFIG_PATH)
        );
    }

    #[test]
    fn test_root_is_found_from_a_subdirectory() {
        let dir = tempfile::tempdir().unwrap();
        Repository::init(dir.path()).unwrap();
        let nested = dir.path().join("xarray").join("plot");
        fs::create_dir_all(&nested).unwrap();

        let root = discover_root(&nested).unwrap();
        assert_eq!(
            root.canonicalize().unwrap(),
            dir.path().canonicalize().unwrap()
        );
    }

    #[test]
    fn test_bare_repository_has_no_root() {
        let dir = tempfile::tempdir().unwrap();
        Repository::init_bare(dir.path()).unwrap();
        assert!(discover_root(dir.path()).is_err());
    }
}
