//! Deployment configuration.
//!
//! A [`DeploymentConfig`] selects a stack, overrides its parameters and
//! overlays component config. Sources are applied in this order, later ones
//! winning:
//!
//! 1. the JSON config file ([`DeploymentConfig::load`])
//! 2. `CFCOMPOSE_*` environment variables ([`DeploymentConfig::overlay_env`]),
//!    after `.env` has been loaded with `dotenvy`
//! 3. `KEY=VALUE` assignments from the command line
//!
//! # Example
//!
//! ```json
//! {
//!   "stack": "amis",
//!   "parameters": { "EnvironmentName": "qa", "LambdaFunctionsVersion": "1.4.2" },
//!   "components": { "dynamodb": { "table_name": "images" } },
//!   "output_dir": "build/templates"
//! }
//! ```

use std::path::{Path, PathBuf};

use cfcompose_graph::Composition;
use cfcompose_model::{TemplateConfig, Value};
use indexmap::IndexMap;
use schemars::{JsonSchema, schema_for};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variables that override parameters, and the parameter each
/// one sets.
pub const ENV_PARAMETERS: [(&str, &str); 2] = [
    ("CFCOMPOSE_ENVIRONMENT_NAME", "EnvironmentName"),
    ("CFCOMPOSE_ENVIRONMENT_TYPE", "EnvironmentType"),
];

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Errors raised while loading or applying a deployment config.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("cannot read config '{}': {source}", path.display())]
    Io {
        /// The config file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The config file is not a valid deployment config.
    #[error("cannot parse config '{}': {source}", path.display())]
    Parse {
        /// The config file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: serde_json::Error,
    },

    /// A parameter assignment is not of the form `KEY=VALUE`.
    #[error("invalid parameter assignment '{0}', expected KEY=VALUE")]
    InvalidAssignment(String),

    /// Component config names a component the stack does not have.
    #[error("config for component '{component}' but stack '{stack}' has no such component")]
    UnknownComponent {
        /// The stack name.
        stack: String,
        /// The unknown component.
        component: String,
    },

    /// Component config is not a JSON object of template values.
    #[error("invalid config for component '{component}': {reason}")]
    InvalidComponentConfig {
        /// The component name.
        component: String,
        /// What is wrong.
        reason: String,
    },

    /// The JSON schema could not be serialized.
    #[error("cannot render schema: {0}")]
    Schema(#[source] serde_json::Error),
}

impl ConfigError {
    fn component_config(component: &str, reason: impl Into<String>) -> Self {
        Self::InvalidComponentConfig {
            component: component.to_string(),
            reason: reason.into(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// DeploymentConfig
// ─────────────────────────────────────────────────────────────────────────────

/// What to build and with which inputs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct DeploymentConfig {
    /// Name of the stack to build (e.g. `amis`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    /// Parameter overrides, by parameter name.
    pub parameters: IndexMap<String, String>,
    /// Config merged over each component's own config, by component name.
    pub components: IndexMap<String, serde_json::Value>,
    /// Directory the compiled templates are written to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
}

impl DeploymentConfig {
    /// Reads a config file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] or [`ConfigError::Parse`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(
            path = %path.display(),
            parameters = config.parameters.len(),
            components = config.components.len(),
            "loaded deployment config"
        );
        Ok(config)
    }

    /// Overrides parameters from `CFCOMPOSE_*` variables, looked up through
    /// `lookup`.
    ///
    /// ```
    /// use cfcompose_core::DeploymentConfig;
    ///
    /// let mut config = DeploymentConfig::default();
    /// config.overlay_env(|key| (key == "CFCOMPOSE_ENVIRONMENT_NAME").then(|| "qa".to_string()));
    /// assert_eq!(config.parameters["EnvironmentName"], "qa");
    /// ```
    pub fn overlay_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        for (variable, parameter) in ENV_PARAMETERS {
            if let Some(value) = lookup(variable) {
                tracing::debug!(variable, parameter, "parameter set from environment");
                self.parameters.insert(parameter.to_string(), value);
            }
        }
    }

    /// Overrides parameters from the process environment.
    pub fn overlay_process_env(&mut self) {
        self.overlay_env(|key| std::env::var(key).ok());
    }

    /// Applies `KEY=VALUE` assignments.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidAssignment`] for an entry without `=` or
    /// with an empty key.
    pub fn assign<'a>(
        &mut self,
        assignments: impl IntoIterator<Item = &'a str>,
    ) -> Result<(), ConfigError> {
        for assignment in assignments {
            let (key, value) = parse_assignment(assignment)?;
            self.parameters.insert(key.to_string(), value.to_string());
        }
        Ok(())
    }

    /// Returns the parameter overrides as template values.
    #[must_use]
    pub fn overrides(&self) -> IndexMap<String, Value> {
        self.parameters
            .iter()
            .map(|(name, value)| (name.clone(), Value::from(value)))
            .collect()
    }

    /// Merges the component config into `composition`.
    ///
    /// # Errors
    ///
    /// Fails if a configured component does not exist or its config is not
    /// an object of template values.
    pub fn apply_components(&self, composition: &mut Composition) -> Result<(), ConfigError> {
        match self.merge_components(composition)?.into_iter().next() {
            Some(component) => Err(ConfigError::UnknownComponent {
                stack: composition.name().to_string(),
                component,
            }),
            None => Ok(()),
        }
    }

    /// Merges the config of the components `composition` declares and
    /// returns the names of the configured components it skipped.
    ///
    /// Used when one config is shared by several stacks.
    ///
    /// # Errors
    ///
    /// Fails if a component's config is not an object of template values.
    pub fn apply_declared_components(
        &self,
        composition: &mut Composition,
    ) -> Result<Vec<String>, ConfigError> {
        let skipped = self.merge_components(composition)?;
        for component in &skipped {
            tracing::debug!(
                stack = composition.name(),
                component = component.as_str(),
                "stack has no such component, config skipped"
            );
        }
        Ok(skipped)
    }

    fn merge_components(&self, composition: &mut Composition) -> Result<Vec<String>, ConfigError> {
        let mut skipped = Vec::new();
        for (name, json) in &self.components {
            let value = Value::from_json(json.clone())
                .map_err(|e| ConfigError::component_config(name, e.to_string()))?;
            let Value::Map(entries) = value else {
                return Err(ConfigError::component_config(name, "expected a JSON object"));
            };
            match composition.component_mut(name) {
                Some(component) => component.config_mut().merge(&TemplateConfig::from(entries)),
                None => skipped.push(name.clone()),
            }
        }
        Ok(skipped)
    }

    /// Renders the JSON schema of the config file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Schema`] if serialization fails.
    pub fn schema() -> Result<String, ConfigError> {
        serde_json::to_string_pretty(&schema_for!(DeploymentConfig)).map_err(ConfigError::Schema)
    }
}

/// Loads `.env` from the working directory or its parents, if present.
pub fn load_dotenv() -> Option<PathBuf> {
    let path = dotenvy::dotenv().ok()?;
    tracing::debug!(path = %path.display(), "loaded environment file");
    Some(path)
}

/// Splits a `KEY=VALUE` assignment at the first `=`.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidAssignment`] if there is no `=` or the key
/// is empty.
pub fn parse_assignment(assignment: &str) -> Result<(&str, &str), ConfigError> {
    match assignment.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => Ok((key.trim(), value)),
        _ => Err(ConfigError::InvalidAssignment(assignment.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assignment_splits_at_first_equals() {
        assert_eq!(parse_assignment("S3Prefix=a=b").unwrap(), ("S3Prefix", "a=b"));
        assert_eq!(parse_assignment("Empty=").unwrap(), ("Empty", ""));
        assert!(matches!(
            parse_assignment("=value"),
            Err(ConfigError::InvalidAssignment(_))
        ));
        assert!(parse_assignment("novalue").is_err());
    }

    #[test]
    fn later_sources_win() {
        let mut config: DeploymentConfig =
            serde_json::from_str(r#"{ "parameters": { "EnvironmentName": "file" } }"#).unwrap();
        config.overlay_env(|key| (key == "CFCOMPOSE_ENVIRONMENT_NAME").then(|| "env".to_string()));
        assert_eq!(config.parameters["EnvironmentName"], "env");

        config.assign(["EnvironmentName=cli"]).unwrap();
        assert_eq!(
            config.overrides().get("EnvironmentName"),
            Some(&Value::from("cli"))
        );
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result = serde_json::from_str::<DeploymentConfig>(r#"{ "stacks": "amis" }"#);
        assert!(result.is_err());
    }

    #[test]
    fn schema_describes_fields() {
        let schema = DeploymentConfig::schema().unwrap();
        assert!(schema.contains("\"output_dir\""));
        assert!(schema.contains("\"components\""));
    }
}
