use std::path::PathBuf;

use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

use crate::output::OutputFormat;

#[derive(Parser)]
#[command(name = "clixen")]
#[command(version, about = "Clixen - turn plain-language requests into n8n workflows")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Database path (defaults to ~/.clixen/clixen.db)
    #[arg(long, global = true, env = "CLIXEN_DB_PATH")]
    pub db_path: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

impl Cli {
    /// Write a completion script for `shell` to stdout.
    pub fn print_completions(shell: Shell) {
        let mut cmd = Self::command();
        let name = cmd.get_name().to_string();
        clap_complete::generate(shell, &mut cmd, name, &mut std::io::stdout());
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },

    /// Turn a request into a workflow and deploy it
    Generate(GenerateArgs),

    /// Validate a workflow JSON file against the node catalog
    Validate(ValidateArgs),

    /// Show the supported node types
    Catalog {
        /// Show a single node type
        type_id: Option<String>,
    },

    /// Inspect past generation requests
    History {
        #[command(subcommand)]
        command: HistoryCommands,
    },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum SourceKind {
    /// Built-in templates, falling back to synthesis when none fits
    #[default]
    Auto,
    /// Built-in templates only
    Templates,
    /// Chat-completion synthesis only
    Synthesis,
}

#[derive(Args)]
pub struct GenerateArgs {
    /// What the workflow should do, in plain language
    pub intent: String,

    /// Workflow name (before owner namespacing)
    #[arg(short, long)]
    pub name: Option<String>,

    /// Owner the workflow is deployed for
    #[arg(long, env = "CLIXEN_OWNER")]
    pub owner: Option<String>,

    /// Where candidate workflows come from
    #[arg(long, value_enum, default_value = "auto")]
    pub source: SourceKind,

    /// n8n base URL (overrides the config file)
    #[arg(long, env = "N8N_BASE_URL")]
    pub engine_url: Option<String>,

    /// Activate the workflow after deploying it
    #[arg(long)]
    pub activate: bool,

    /// Deploy into an in-process engine instead of n8n
    #[arg(long)]
    pub dry_run: bool,

    /// Stop once the workflow is ready, without deploying
    #[arg(long, conflicts_with = "dry_run")]
    pub no_deploy: bool,
}

#[derive(Args)]
pub struct ValidateArgs {
    /// Workflow JSON file; reads stdin when omitted or "-"
    pub file: Option<PathBuf>,

    /// Run the repair loop and report what changed
    #[arg(long)]
    pub repair: bool,
}

#[derive(Subcommand)]
pub enum HistoryCommands {
    /// List recent requests
    List {
        #[arg(long, env = "CLIXEN_OWNER")]
        owner: Option<String>,

        /// Maximum number of requests to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Show one request with its repair audit trail
    Show {
        request_id: String,

        #[arg(long, env = "CLIXEN_OWNER")]
        owner: Option<String>,
    },

    /// Forget a request
    Delete {
        request_id: String,

        #[arg(long, env = "CLIXEN_OWNER")]
        owner: Option<String>,
    },
}
