// This file is the module declaration file for the `core` module.
//
// `store` owns the validated rules, `classifier` evaluates them against a
// change, and `config`, `git` and `engine` connect both to a repository.

pub mod classifier;
pub mod config;
pub mod engine;
pub mod error;
pub mod git;
pub mod store;
