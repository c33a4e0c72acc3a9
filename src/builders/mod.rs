// This file is the module declaration file for the `builders` module.
// It declares the pieces that turn a configuration document into rules and
// rules into output.

// `importer` module:
// Reads a label configuration (YAML, JSON or TOML) into an ordered list of
// raw `label -> value` entries, keeping duplicate labels so they can be
// reported.
pub mod importer;

// `patterns` module:
// The glob matcher. Compiles single patterns (with `!` negation) and
// evaluates the four file/glob quantifiers against a set of paths.
pub mod patterns;

// `reporter` module:
// Prints classification results, rule listings and lint warnings as text
// or JSON.
pub mod reporter;

// `rules` module:
// The typed rule model (`Rule`, `MatchGroup`, `Condition`) and its decoder
// from the loosely-typed document.
pub mod rules;

// `validator` module:
// Non-fatal lints over a loaded rule store.
pub mod validator;
