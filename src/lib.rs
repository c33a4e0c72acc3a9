//! Path-based pull request labeling.
//!
//! A [`core::store::RuleStore`] is loaded once from a label configuration and
//! [`core::classifier::classify`] maps a set of changed paths to the labels
//! whose rules they satisfy.

pub mod builders;
pub mod core;
pub mod utils;


pub use crate::builders::patterns::{matches, GlobPattern, GlobSpec};
pub use crate::core::classifier::{classify, classify_change, ChangeSet};
pub use crate::core::error::{ConfigError, PatternError};
pub use crate::core::store::RuleStore;
