use anyhow::{Context, Result};
use git2::{BranchType, DiffFindOptions, DiffOptions, ErrorCode, Oid, Repository, Tree};
use std::path::Path;
use tracing::debug;

/// Trait defining the Git operations the labeler needs.
/// This abstraction allows the engine to be tested without a repository.
pub trait GitClient {
    /// Files that differ between `HEAD` (or the empty tree) and the index.
    fn staged_files(&self) -> Result<Vec<String>>;

    /// Files changed on `head` since it diverged from `base`, the same set a
    /// pull request from `head` into `base` would show.
    fn changed_files(&self, base: &str, head: &str) -> Result<Vec<String>>;

    /// The short name of the checked-out branch, if `HEAD` is on one.
    fn current_branch(&self) -> Option<String>;

    /// The branch name a revision argument refers to, if it names a local
    /// or remote-tracking branch.
    fn branch_name(&self, rev: &str) -> Option<String>;
}

/// Concrete implementation of GitClient using the git2 crate.
pub struct Git2Client {
    repo: Repository,
}

impl Git2Client {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let repo = Repository::open(path)
            .with_context(|| format!("Failed to open repository at {}", path.display()))?;
        Ok(Self { repo })
    }

    fn tree_for(&self, rev: &str) -> Result<Tree<'_>> {
        let object = self
            .repo
            .revparse_single(rev)
            .with_context(|| format!("Unknown revision '{rev}'"))?;
        object
            .peel_to_tree()
            .with_context(|| format!("Revision '{rev}' does not point to a tree"))
    }

    fn commit_id(&self, rev: &str) -> Result<Oid> {
        let object = self
            .repo
            .revparse_single(rev)
            .with_context(|| format!("Unknown revision '{rev}'"))?;
        Ok(object
            .peel_to_commit()
            .with_context(|| format!("Revision '{rev}' is not a commit"))?
            .id())
    }

    fn collect_paths(diff: &git2::Diff<'_>) -> Vec<String> {
        let mut paths = Vec::new();
        for delta in diff.deltas() {
            let new_path = delta.new_file().path();
            let old_path = delta.old_file().path();

            if let Some(path) = new_path.and_then(Path::to_str) {
                paths.push(path.to_string());
            }
            // A rename touches both locations.
            if let Some(path) = old_path.and_then(Path::to_str)
                && old_path != new_path
            {
                paths.push(path.to_string());
            }
        }
        paths
    }
}

impl GitClient for Git2Client {
    fn staged_files(&self) -> Result<Vec<String>> {
        let index = self.repo.index()?;
        let mut options = DiffOptions::new();

        let head_tree = match self.repo.head() {
            Ok(head) => Some(head.peel_to_tree()?),
            // No commit yet: a `None` tree diffs the index against the empty tree.
            Err(e) if e.code() == ErrorCode::UnbornBranch => None,
            Err(e) => return Err(e).context("Failed to resolve HEAD"),
        };

        let diff =
            self.repo
                .diff_tree_to_index(head_tree.as_ref(), Some(&index), Some(&mut options))?;
        let files = Self::collect_paths(&diff);
        debug!(count = files.len(), "collected staged files");
        Ok(files)
    }

    fn changed_files(&self, base: &str, head: &str) -> Result<Vec<String>> {
        let head_tree = self.tree_for(head)?;

        let base_tree = match (self.commit_id(base), self.commit_id(head)) {
            (Ok(base_id), Ok(head_id)) => match self.repo.merge_base(base_id, head_id) {
                Ok(merge_base) => self.repo.find_commit(merge_base)?.tree()?,
                // Unrelated histories: compare the trees directly.
                Err(_) => self.tree_for(base)?,
            },
            _ => self.tree_for(base)?,
        };

        let mut options = DiffOptions::new();
        let mut diff = self.repo.diff_tree_to_tree(
            Some(&base_tree),
            Some(&head_tree),
            Some(&mut options),
        )?;
        let mut find = DiffFindOptions::new();
        find.renames(true);
        diff.find_similar(Some(&mut find))?;

        let files = Self::collect_paths(&diff);
        debug!(base, head, count = files.len(), "collected changed files");
        Ok(files)
    }

    fn current_branch(&self) -> Option<String> {
        let head = self.repo.head().ok()?;
        if !head.is_branch() {
            return None;
        }
        head.shorthand().map(str::to_string)
    }

    fn branch_name(&self, rev: &str) -> Option<String> {
        if rev == "HEAD" {
            return self.current_branch();
        }
        if self.repo.find_branch(rev, BranchType::Local).is_ok() {
            return Some(rev.to_string());
        }
        // `origin/main` -> `main`
        if self.repo.find_branch(rev, BranchType::Remote).is_ok() {
            return rev.split_once('/').map(|(_, name)| name.to_string());
        }
        None
    }
}
