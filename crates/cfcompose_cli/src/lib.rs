//! The `cfcompose` command line.
//!
//! # Usage
//!
//! ```bash
//! cfcompose list
//! cfcompose plan --stack amis -p EnvironmentName=qa
//! cfcompose build --config deploy.json --out build/templates
//! cfcompose exports --stack amis --stack s3-events -p EnvironmentName=prod
//! cfcompose schema > deploy.schema.json
//! ```

/// Argument definitions.
pub mod cli;

/// Command implementations.
pub mod commands;

pub use cli::{Cli, Command};
pub use commands::{CliError, run};
