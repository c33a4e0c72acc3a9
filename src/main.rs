//! Labels a change by the files it touches.
//!
//! Rules live in a YAML (or JSON / TOML) document that maps each label to
//! glob-based match groups. The change can come from the command line, from
//! stdin, from the git index or from a revision range.
use anyhow::Result;
use clap::{Parser, Subcommand};
use git_path_labeler::builders::reporter::{reporter_for, OutputFormat};
use git_path_labeler::utils;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "git-path-labeler")]
#[command(about = "Apply labels to a change based on the paths it touches")]
#[command(version)]
struct Cli {
    /// Label configuration file (default: .github/labeler.yml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Output format for results: text or json
    #[arg(short, long, global = true, default_value = "text")]
    format: String,

    /// Print debug diagnostics to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a starter label configuration
    Init,
    /// Check the label configuration
    Validate,
    /// List the configured rules
    List,
    /// Label the given paths (or paths read from stdin, one per line)
    Classify {
        paths: Vec<String>,
        /// Branch the change comes from
        #[arg(long)]
        head_branch: Option<String>,
        /// Branch the change targets
        #[arg(long)]
        base_branch: Option<String>,
    },
    /// Label the files staged in the index
    Staged,
    /// Label the files changed between two revisions
    Diff {
        base: String,
        #[arg(default_value = "HEAD")]
        head: String,
    },
    /// Write the normalized rules to a file
    Export {
        output: PathBuf,
        /// yaml, json or toml
        #[arg(long = "as", default_value = "yaml")]
        export_format: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    utils::init_logging(cli.verbose);

    let reporter = reporter_for(OutputFormat::from_name(&cli.format)?, cli.verbose);
    let config = cli.config.as_deref();

    match cli.command {
        Commands::Init => utils::initialize_repository(config),
        Commands::Validate => utils::validate(config, reporter.as_ref()),
        Commands::List => utils::list_rules(config, reporter.as_ref()),
        Commands::Classify {
            paths,
            head_branch,
            base_branch,
        } => utils::classify_paths(config, paths, head_branch, base_branch, reporter.as_ref()),
        Commands::Staged => utils::classify_staged(config, reporter.as_ref()),
        Commands::Diff { base, head } => {
            utils::classify_range(config, &base, &head, reporter.as_ref())
        }
        Commands::Export {
            output,
            export_format,
        } => utils::export_rules(config, &output, &export_format),
    }
}
