use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// blueprint - turn a rough idea into a validated project design
#[derive(Debug, Parser)]
#[command(name = "blueprint")]
#[command(version)]
#[command(long_about = r#"
blueprint walks a project from three questions (what, why, when) through
follow-up questions, a technology stack choice and a reality check to a
validated project overview. Progress is saved as you go and resumed on the
next run for the same project.

EXAMPLES:
  # Start the design server
  blueprint serve --bind 127.0.0.1:8787

  # Design a project against the running server
  blueprint design shop-42

  # Design a project in-process, without a server
  blueprint design shop-42 --local

  # Check on a background job
  blueprint job-status job_5f0c... --project shop-42 --wait

  # Show the effective configuration and where each value came from
  blueprint config show

CONFIGURATION:
  Precedence: CLI flags > config file > defaults. The config file is found by
  searching upward from the working directory for .blueprint/config.toml, or
  at $BLUEPRINT_HOME/config.toml when BLUEPRINT_HOME is set.
"#)]
pub struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Language model provider (anthropic, scripted)
    #[arg(long, global = true)]
    pub provider: Option<String>,

    /// Model name passed to the provider
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// Storage backend (file, memory)
    #[arg(long, global = true)]
    pub storage_backend: Option<String>,

    /// Directory of the file storage backend
    #[arg(long, global = true)]
    pub storage_dir: Option<PathBuf>,

    /// Debug-level logging for blueprint crates
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormatArg::Compact)]
    pub log_format: LogFormatArg,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormatArg {
    Compact,
    Json,
}

/// Where a client command sends its requests
#[derive(Debug, Clone, Args)]
pub struct ServerArgs {
    /// Server root URL (defaults to http://<server.bind>)
    #[arg(long)]
    pub server: Option<String>,

    /// Identity sent as x-user-id
    #[arg(long)]
    pub user: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the design HTTP server
    Serve {
        /// Address to listen on (overrides server.bind)
        #[arg(long)]
        bind: Option<String>,

        /// Reject anonymous callers; each project belongs to its first user
        #[arg(long)]
        require_user: bool,
    },

    /// Design a project interactively
    Design {
        /// Project identifier (letters, digits, '-' and '_')
        project_id: String,

        /// Run the design service in this process instead of calling a server
        #[arg(long, conflicts_with = "server")]
        local: bool,

        #[command(flatten)]
        target: ServerArgs,
    },

    /// Show the status of a background job
    JobStatus {
        job_id: String,

        /// Owning project, used for the persisted-mirror fallback
        #[arg(long)]
        project: String,

        /// Wait until the job finishes and print its result
        #[arg(long)]
        wait: bool,

        #[command(flatten)]
        target: ServerArgs,
    },

    /// Inspect configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Print every effective value with its source
    Show,
}
