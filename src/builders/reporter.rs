use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeSet;
use std::io::Write;

use crate::core::classifier::ChangeSet;
use crate::core::store::RuleStore;

/// Output format for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => anyhow::bail!("Unknown output format '{name}' (expected text or json)"),
        }
    }
}

/// The outcome of classifying one change, as printed by the CLI.
#[derive(Debug, Serialize)]
pub struct LabelReport<'a> {
    pub labels: &'a BTreeSet<String>,
    pub files: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub head_branch: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_branch: Option<&'a str>,
}

impl<'a> LabelReport<'a> {
    pub fn new(change: &'a ChangeSet, labels: &'a BTreeSet<String>) -> Self {
        Self {
            labels,
            files: &change.paths,
            head_branch: change.head_branch.as_deref(),
            base_branch: change.base_branch.as_deref(),
        }
    }
}

#[derive(Debug, Serialize)]
struct RuleSummary<'a> {
    label: &'a str,
    groups: Vec<String>,
}

pub trait LabelReporter {
    fn report_labels(&self, out: &mut dyn Write, report: &LabelReport<'_>) -> Result<()>;
    fn report_rules(&self, out: &mut dyn Write, store: &RuleStore) -> Result<()>;
    fn report_warnings(&self, out: &mut dyn Write, warnings: &[String]) -> Result<()>;
}

/// Plain text: one label per line, so the output pipes into other tools.
pub struct ConsoleReporter {
    verbose: bool,
}

impl ConsoleReporter {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl LabelReporter for ConsoleReporter {
    fn report_labels(&self, out: &mut dyn Write, report: &LabelReport<'_>) -> Result<()> {
        if self.verbose {
            writeln!(out, "# {} changed file(s)", report.files.len())?;
            if let Some(branch) = report.head_branch {
                writeln!(out, "# head branch: {branch}")?;
            }
            if let Some(branch) = report.base_branch {
                writeln!(out, "# base branch: {branch}")?;
            }
        }
        for label in report.labels {
            writeln!(out, "{label}")?;
        }
        Ok(())
    }

    fn report_rules(&self, out: &mut dyn Write, store: &RuleStore) -> Result<()> {
        if store.is_empty() {
            writeln!(out, "No label rules configured.")?;
            return Ok(());
        }

        for rule in store.rules() {
            writeln!(out, "{}", rule.label())?;
            for group in rule.groups() {
                writeln!(out, "  └─ {group}")?;
            }
        }
        writeln!(out, "\n{} rule(s)", store.len())?;
        Ok(())
    }

    fn report_warnings(&self, out: &mut dyn Write, warnings: &[String]) -> Result<()> {
        if warnings.is_empty() {
            writeln!(out, "✓ Configuration is valid.")?;
        } else {
            writeln!(out, "⚠️  Configuration loaded with {} warning(s):", warnings.len())?;
            for warning in warnings {
                writeln!(out, "  - {warning}")?;
            }
        }
        Ok(())
    }
}

/// Machine-readable output.
pub struct JsonReporter;

impl JsonReporter {
    fn write<T: Serialize>(out: &mut dyn Write, value: &T) -> Result<()> {
        let text = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
        writeln!(out, "{text}")?;
        Ok(())
    }
}

impl LabelReporter for JsonReporter {
    fn report_labels(&self, out: &mut dyn Write, report: &LabelReport<'_>) -> Result<()> {
        Self::write(out, report)
    }

    fn report_rules(&self, out: &mut dyn Write, store: &RuleStore) -> Result<()> {
        let summaries: Vec<RuleSummary<'_>> = store
            .rules()
            .iter()
            .map(|rule| RuleSummary {
                label: rule.label(),
                groups: rule.groups().iter().map(|g| g.to_string()).collect(),
            })
            .collect();
        Self::write(out, &summaries)
    }

    fn report_warnings(&self, out: &mut dyn Write, warnings: &[String]) -> Result<()> {
        Self::write(out, &serde_json::json!({ "valid": true, "warnings": warnings }))
    }
}

pub fn reporter_for(format: OutputFormat, verbose: bool) -> Box<dyn LabelReporter> {
    match format {
        OutputFormat::Text => Box::new(ConsoleReporter::new(verbose)),
        OutputFormat::Json => Box::new(JsonReporter),
    }
}
