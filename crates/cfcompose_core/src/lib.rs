//! Process setup for cfcompose: logging and deployment configuration.
//!
//! # Core Concepts
//!
//! - [`TracingConfig`] - Installs the `tracing` subscriber (pretty, compact or JSON)
//! - [`DeploymentConfig`] - Stack selection, parameter overrides and component config
//!
//! # Example
//!
//! ```ignore
//! use cfcompose_core::{DeploymentConfig, TracingConfig};
//!
//! TracingConfig::new().with_level(Level::DEBUG).init();
//!
//! let _ = dotenvy::dotenv();
//! let mut config = DeploymentConfig::load(Path::new("deploy.json"))?;
//! config.overlay_process_env();
//! config.assign(["EnvironmentName=qa"])?;
//! ```

/// Deployment configuration.
pub mod config;

/// Subscriber setup.
pub mod tracing_config;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use crate::config::{ConfigError, DeploymentConfig};
    pub use crate::tracing_config::{TracingConfig, TracingFormat};
}

// Re-export key types at crate root for convenience
pub use config::{ConfigError, DeploymentConfig, load_dotenv, parse_assignment};
pub use tracing_config::{TracingConfig, TracingFormat};
