// SPDX-License-Identifier: Apache-2.0

//! Command-line interface definition for Orchid Sync.
//!
//! Uses clap's derive API with noun-verb subcommands.

use std::io::IsTerminal;
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use orchid_sync::{IssueStatus, Severity};

/// Output format for CLI results.
#[derive(Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text with colors (default)
    #[default]
    Text,
    /// JSON output for programmatic consumption
    Json,
}

/// Global output configuration passed to commands.
#[derive(Clone)]
pub struct OutputContext {
    /// Output format
    pub format: OutputFormat,
    /// Enable verbose output
    pub verbose: bool,
    /// Whether stdout is a terminal (TTY)
    pub is_tty: bool,
}

impl OutputContext {
    /// Creates an `OutputContext` from CLI arguments.
    pub fn from_cli(format: OutputFormat, verbose: bool) -> Self {
        Self {
            format,
            verbose,
            is_tty: std::io::stdout().is_terminal(),
        }
    }
}

/// Orchid Sync - operator tooling for the Orchid GitHub sync engine.
///
/// Checks GitHub App credentials and bootstraps or repairs the managed
/// status and severity labels on a repository.
#[derive(Parser)]
#[command(name = "orchid-sync")]
#[command(version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Output format
    #[arg(long, short = 'o', global = true, default_value = "text", value_enum)]
    pub output: OutputFormat,

    /// Show more detail in text output
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Read configuration from this file instead of the default location
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Subcommand)]
pub enum Commands {
    /// GitHub credentials
    #[command(subcommand)]
    Auth(AuthCommand),

    /// Managed status and severity labels
    #[command(subcommand)]
    Labels(LabelsCommand),
}

/// Authentication subcommands
#[derive(Subcommand)]
pub enum AuthCommand {
    /// Obtain a token with the configured credentials
    Check,
}

/// Label subcommands
#[derive(Subcommand)]
pub enum LabelsCommand {
    /// Create any managed label missing from the repository
    Ensure {
        /// Target repository (owner/repo); defaults to github.repo
        #[arg(long, short = 'r')]
        repo: Option<String>,
    },

    /// Replace the managed labels on an existing GitHub issue
    Reconcile {
        /// GitHub issue number
        number: u64,

        /// Workflow status (backlog, todo, in_progress, in_review, done, canceled)
        #[arg(long, short = 's')]
        status: IssueStatus,

        /// Severity (low, medium, high, critical)
        #[arg(long)]
        severity: Option<Severity>,

        /// Target repository (owner/repo); defaults to github.repo
        #[arg(long, short = 'r')]
        repo: Option<String>,
    },
}
