use std::collections::BTreeSet;
use tracing::debug;

use crate::builders::rules::{BranchPattern, Condition, MatchGroup, Rule};
use crate::core::store::RuleStore;

/// Everything a rule can look at: the touched paths and, when known, the
/// branches of the change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub paths: Vec<String>,
    pub head_branch: Option<String>,
    pub base_branch: Option<String>,
}

impl ChangeSet {
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn with_head_branch(mut self, branch: impl Into<String>) -> Self {
        self.head_branch = Some(branch.into());
        self
    }

    pub fn with_base_branch(mut self, branch: impl Into<String>) -> Self {
        self.base_branch = Some(branch.into());
        self
    }
}

/// Labels whose rules match the given paths. No branch information is used.
pub fn classify<S: AsRef<str>>(store: &RuleStore, paths: &[S]) -> BTreeSet<String> {
    let paths: Vec<&str> = paths.iter().map(AsRef::as_ref).collect();
    classify_paths(store, &paths, None, None)
}

/// Labels whose rules match the change, branch conditions included.
pub fn classify_change(store: &RuleStore, change: &ChangeSet) -> BTreeSet<String> {
    let paths: Vec<&str> = change.paths.iter().map(String::as_str).collect();
    classify_paths(
        store,
        &paths,
        change.head_branch.as_deref(),
        change.base_branch.as_deref(),
    )
}

struct Context<'a> {
    paths: &'a [&'a str],
    head_branch: Option<&'a str>,
    base_branch: Option<&'a str>,
}

fn classify_paths(
    store: &RuleStore,
    paths: &[&str],
    head_branch: Option<&str>,
    base_branch: Option<&str>,
) -> BTreeSet<String> {
    // A change that touches nothing gets no labels.
    if paths.is_empty() {
        return BTreeSet::new();
    }

    let ctx = Context {
        paths,
        head_branch,
        base_branch,
    };

    store
        .rules()
        .iter()
        .filter(|rule| {
            let matched = rule_matches(rule, &ctx);
            debug!(label = rule.label(), matched, "evaluated rule");
            matched
        })
        .map(|rule| rule.label().to_string())
        .collect()
}

fn rule_matches(rule: &Rule, ctx: &Context<'_>) -> bool {
    rule.groups().iter().all(|group| group_matches(group, ctx))
}

fn group_matches(group: &MatchGroup, ctx: &Context<'_>) -> bool {
    match group {
        MatchGroup::Any(conditions) => conditions.iter().any(|c| condition_matches(c, ctx, false)),
        MatchGroup::All(conditions) => conditions.iter().all(|c| condition_matches(c, ctx, true)),
    }
}

/// Inside an `all` group every spec / branch pattern of a condition must hold;
/// inside an `any` group one is enough.
fn condition_matches(condition: &Condition, ctx: &Context<'_>, require_all: bool) -> bool {
    match condition {
        Condition::ChangedFiles(specs) => {
            if require_all {
                specs.iter().all(|spec| spec.evaluate(ctx.paths))
            } else {
                specs.iter().any(|spec| spec.evaluate(ctx.paths))
            }
        }
        Condition::HeadBranch(patterns) => branch_matches(patterns, ctx.head_branch, require_all),
        Condition::BaseBranch(patterns) => branch_matches(patterns, ctx.base_branch, require_all),
    }
}

fn branch_matches(patterns: &[BranchPattern], branch: Option<&str>, require_all: bool) -> bool {
    let Some(branch) = branch else {
        return false;
    };
    if require_all {
        patterns.iter().all(|p| p.is_match(branch))
    } else {
        patterns.iter().any(|p| p.is_match(branch))
    }
}
