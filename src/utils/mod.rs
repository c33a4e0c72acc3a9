use anyhow::{Context, Result};
use std::io::{BufRead, Write};
use std::path::Path;
use tracing_subscriber::EnvFilter;

use crate::builders::importer::DocumentFormat;
use crate::builders::reporter::{LabelReport, LabelReporter};
use crate::core::classifier::ChangeSet;
use crate::core::config::ConfigManager;
use crate::core::engine::LabelEngine;

/// Sends diagnostics to stderr so stdout carries only results. `RUST_LOG`
/// wins over the verbosity flag.
pub fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // A second call (e.g. from tests) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Builds a config manager for the current repository, honoring `--config`.
pub fn get_config_manager(config: Option<&Path>) -> Result<ConfigManager> {
    let mut config_manager = ConfigManager::new()?;
    if let Some(path) = config {
        config_manager.set_config_path(path);
    }
    Ok(config_manager)
}

pub fn initialize_repository(config: Option<&Path>) -> Result<()> {
    let config_manager = get_config_manager(config)?;
    let path = config_manager.get_config_path().display().to_string();
    if config_manager.initialize()? {
        println!("✓ Wrote starter label configuration to {path}");
    } else {
        println!("ℹ️  {path} already exists; leaving it untouched");
    }
    Ok(())
}

pub fn validate(config: Option<&Path>, reporter: &dyn LabelReporter) -> Result<()> {
    let warnings = get_config_manager(config)?.validate_config()?;
    reporter.report_warnings(&mut std::io::stdout().lock(), &warnings)
}

pub fn list_rules(config: Option<&Path>, reporter: &dyn LabelReporter) -> Result<()> {
    let store = get_config_manager(config)?.load_store()?;
    reporter.report_rules(&mut std::io::stdout().lock(), &store)
}

pub fn export_rules(config: Option<&Path>, output: &Path, format: &str) -> Result<()> {
    let format = DocumentFormat::from_name(format)
        .with_context(|| format!("Unknown export format '{format}' (expected yaml, json or toml)"))?;
    get_config_manager(config)?.export_rules(output, format)?;
    println!("✓ Exported rules to {}", output.display());
    Ok(())
}

/// Classifies explicit paths, or the non-empty lines of stdin when none are given.
pub fn classify_paths(
    config: Option<&Path>,
    paths: Vec<String>,
    head_branch: Option<String>,
    base_branch: Option<String>,
    reporter: &dyn LabelReporter,
) -> Result<()> {
    let store = get_config_manager(config)?.load_store()?;
    let engine = LabelEngine::from_store(store);

    let paths = if paths.is_empty() {
        read_paths(std::io::stdin().lock())?
    } else {
        paths
    };

    let change = ChangeSet {
        paths,
        head_branch,
        base_branch,
    };
    let labels = engine.classify(&change);
    print_report(reporter, &change, &labels)
}

pub fn classify_staged(config: Option<&Path>, reporter: &dyn LabelReporter) -> Result<()> {
    let engine = LabelEngine::new(&get_config_manager(config)?)?;
    let (change, labels) = engine.classify_staged()?;
    print_report(reporter, &change, &labels)
}

pub fn classify_range(
    config: Option<&Path>,
    base: &str,
    head: &str,
    reporter: &dyn LabelReporter,
) -> Result<()> {
    let engine = LabelEngine::new(&get_config_manager(config)?)?;
    let (change, labels) = engine.classify_range(base, head)?;
    print_report(reporter, &change, &labels)
}

fn print_report(
    reporter: &dyn LabelReporter,
    change: &ChangeSet,
    labels: &std::collections::BTreeSet<String>,
) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    reporter.report_labels(&mut stdout, &LabelReport::new(change, labels))?;
    stdout.flush()?;
    Ok(())
}

/// One path per line; blank lines are skipped and surrounding whitespace trimmed.
pub fn read_paths<R: BufRead>(reader: R) -> Result<Vec<String>> {
    let mut paths = Vec::new();
    for line in reader.lines() {
        let line = line.context("Failed to read paths from stdin")?;
        let line = line.trim();
        if !line.is_empty() {
            paths.push(line.to_string());
        }
    }
    Ok(paths)
}
