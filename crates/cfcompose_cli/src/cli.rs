//! Argument definitions.

use std::path::PathBuf;

use cfcompose_core::TracingFormat;
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::Level;

// ── CLI definition ─────────────────────────────────────────────────

/// Top-level arguments.
#[derive(Debug, Parser)]
#[command(
    name = "cfcompose",
    version,
    about = "Compose CloudFormation component templates into deployable stacks",
    long_about = "Builds a shipped stack from its component templates: resolves\n\
                  parameters, orders components by their output dependencies and\n\
                  writes one compiled template per component plus the root stack."
)]
pub struct Cli {
    /// Command to run.
    #[command(subcommand)]
    pub command: Command,

    /// Maximum log level.
    #[arg(long, global = true, value_enum, default_value_t = LogLevel::Info, env = "CFCOMPOSE_LOG_LEVEL")]
    pub log_level: LogLevel,

    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,
}

/// Subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Build a stack and write its compiled templates
    Build {
        /// What to build.
        #[command(flatten)]
        target: TargetArgs,
        /// Output directory (overrides the config's `output_dir`)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Print the expansion order and resolved parameters of a stack
    Plan {
        /// What to plan.
        #[command(flatten)]
        target: TargetArgs,
    },
    /// Build several stacks for one environment and check their exports
    Exports {
        /// Stacks to check (repeatable)
        #[arg(long = "stack", required = true)]
        stacks: Vec<String>,
        /// Parameter sources shared by every stack.
        #[command(flatten)]
        inputs: InputArgs,
    },
    /// List shipped stacks and registered templates
    List,
    /// Print the JSON schema of the deployment config file
    Schema,
}

/// Selects a stack and its inputs.
#[derive(Debug, Args)]
pub struct TargetArgs {
    /// Stack to build (default: the config's `stack`, then `amis`)
    #[arg(long)]
    pub stack: Option<String>,
    /// Parameter sources.
    #[command(flatten)]
    pub inputs: InputArgs,
    /// Prefix of every nested stack's `TemplateURL`
    #[arg(long, default_value = "")]
    pub template_url_prefix: String,
}

/// Parameter sources.
#[derive(Debug, Args)]
pub struct InputArgs {
    /// Deployment config file (JSON)
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Parameter override as KEY=VALUE (repeatable)
    #[arg(short = 'p', long = "param", value_name = "KEY=VALUE")]
    pub params: Vec<String>,
}

/// Log level names accepted on the command line.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogLevel {
    /// Errors only.
    Error,
    /// Warnings and errors.
    Warn,
    /// Build progress.
    Info,
    /// Per-component detail.
    Debug,
    /// Everything.
    Trace,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => Self::ERROR,
            LogLevel::Warn => Self::WARN,
            LogLevel::Info => Self::INFO,
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Trace => Self::TRACE,
        }
    }
}

/// Log format names accepted on the command line.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogFormat {
    /// Multi-line colored output.
    Pretty,
    /// Single-line output.
    Compact,
    /// JSON lines.
    Json,
}

impl From<LogFormat> for TracingFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
            LogFormat::Json => Self::Json,
        }
    }
}
