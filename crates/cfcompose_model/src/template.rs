//! The [`Template`] trait and its expansion context.
//!
//! A template is the unit a component instantiates. It declares the
//! parameters it accepts (possibly depending on its config) and expands a
//! fully resolved parameter set into a [`TemplateDocument`].

use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::document::TemplateDocument;
use crate::error::ModelError;
use crate::parameter::{Parameter, ResolvedParameters};
use crate::value::Value;

// ─────────────────────────────────────────────────────────────────────────────
// TemplateConfig
// ─────────────────────────────────────────────────────────────────────────────

/// Free-form configuration handed to a template by its component.
///
/// Config is static: it shapes *which* resources a template produces (table
/// name, enabled notifications, function list) while parameters flow into
/// the produced resources.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TemplateConfig(IndexMap<String, Value>);

impl TemplateConfig {
    /// Creates an empty config.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a key, returning self for chaining.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Sets a key.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Returns a raw value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Returns true if the key is set.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Iterates over entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// Returns true if no keys are set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Overlays `other` on top of this config; nested maps merge key by key.
    pub fn merge(&mut self, other: &TemplateConfig) {
        for (key, value) in &other.0 {
            match (self.0.get_mut(key), value) {
                (Some(Value::Map(existing)), Value::Map(overlay)) => merge_maps(existing, overlay),
                _ => {
                    self.0.insert(key.clone(), value.clone());
                }
            }
        }
    }

    /// Reads an optional string key.
    pub fn str(&self, template: &str, key: &str) -> Result<Option<&str>, TemplateError> {
        match self.0.get(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(other) => Err(TemplateError::invalid_config(
                template,
                key,
                format!("expected a string, found {other}"),
            )),
        }
    }

    /// Reads an optional boolean key.
    pub fn bool(&self, template: &str, key: &str) -> Result<Option<bool>, TemplateError> {
        match self.0.get(key) {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(other) => Err(TemplateError::invalid_config(
                template,
                key,
                format!("expected a boolean, found {other}"),
            )),
        }
    }

    /// Reads an optional non-negative integer key.
    pub fn number(&self, template: &str, key: &str) -> Result<Option<u64>, TemplateError> {
        match self.0.get(key) {
            None => Ok(None),
            Some(Value::Number(n)) if n.as_u64().is_some() => Ok(n.as_u64()),
            Some(other) => Err(TemplateError::invalid_config(
                template,
                key,
                format!("expected a non-negative integer, found {other}"),
            )),
        }
    }

    /// Reads an optional map key.
    pub fn map(
        &self,
        template: &str,
        key: &str,
    ) -> Result<Option<&IndexMap<String, Value>>, TemplateError> {
        match self.0.get(key) {
            None => Ok(None),
            Some(Value::Map(map)) => Ok(Some(map)),
            Some(other) => Err(TemplateError::invalid_config(
                template,
                key,
                format!("expected a map, found {other}"),
            )),
        }
    }
}

fn merge_maps(base: &mut IndexMap<String, Value>, overlay: &IndexMap<String, Value>) {
    for (key, value) in overlay {
        match (base.get_mut(key), value) {
            (Some(Value::Map(existing)), Value::Map(nested)) => merge_maps(existing, nested),
            _ => {
                base.insert(key.clone(), value.clone());
            }
        }
    }
}

impl From<IndexMap<String, Value>> for TemplateConfig {
    fn from(entries: IndexMap<String, Value>) -> Self {
        Self(entries)
    }
}

impl FromIterator<(String, Value)> for TemplateConfig {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Errors raised by a template while declaring parameters or expanding.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// A config key has the wrong shape or value.
    #[error("template '{template}': invalid config '{key}': {reason}")]
    InvalidConfig {
        /// The template name.
        template: String,
        /// The offending config key.
        key: String,
        /// What is wrong.
        reason: String,
    },

    /// A parameter the template needs was not resolved.
    #[error("template '{template}': parameter '{parameter}' was not resolved")]
    MissingParameter {
        /// The template name.
        template: String,
        /// The missing parameter.
        parameter: String,
    },

    /// Building the document failed.
    #[error(transparent)]
    Model(#[from] ModelError),

    /// A nested composition failed to build.
    #[error("nested composition '{template}' failed: {source}")]
    Nested {
        /// The nested composition name.
        template: String,
        /// The underlying build error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl TemplateError {
    /// Creates an [`InvalidConfig`](Self::InvalidConfig).
    pub fn invalid_config(
        template: impl Into<String>,
        key: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidConfig {
            template: template.into(),
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Creates a [`MissingParameter`](Self::MissingParameter).
    pub fn missing_parameter(template: impl Into<String>, parameter: impl Into<String>) -> Self {
        Self::MissingParameter {
            template: template.into(),
            parameter: parameter.into(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Template trait
// ─────────────────────────────────────────────────────────────────────────────

/// Looks templates up by name.
pub trait TemplateSource {
    /// Returns the template registered under `name`.
    fn template(&self, name: &str) -> Option<Arc<dyn Template>>;
}

/// Everything a template sees while expanding.
pub struct ExpansionContext<'a> {
    /// Name of the component being expanded.
    pub component: &'a str,
    /// The component's config.
    pub config: &'a TemplateConfig,
    /// The resolved parameter set.
    pub parameters: &'a ResolvedParameters,
    /// Template lookup, for templates that expand other templates.
    pub templates: &'a dyn TemplateSource,
    /// `TemplateURL` prefix for stacks nested below this component.
    pub template_url_prefix: &'a str,
}

impl ExpansionContext<'_> {
    /// Returns a resolved parameter value or a [`TemplateError::MissingParameter`].
    pub fn require(&self, template: &str, name: &str) -> Result<&Value, TemplateError> {
        self.parameters
            .value(name)
            .ok_or_else(|| TemplateError::missing_parameter(template, name))
    }
}

/// An export published by a stack nested below a component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NestedExport {
    /// The rendered export name.
    pub name: String,
    /// Dotted path of the producing component, relative to the expanded one.
    pub component: String,
    /// The output name.
    pub output: String,
}

/// The result of expanding one template.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Expansion {
    /// The component's own document. Its `Parameters` section is filled in
    /// by the composer from the resolved declarations.
    pub document: TemplateDocument,
    /// Additional documents emitted alongside (nested compositions), keyed by
    /// file stem relative to the component.
    pub children: IndexMap<String, TemplateDocument>,
    /// Exports published by the stacks in `children`.
    pub exports: Vec<NestedExport>,
}

impl Expansion {
    /// Wraps a single document.
    #[must_use]
    pub fn new(document: TemplateDocument) -> Self {
        Self {
            document,
            children: IndexMap::new(),
            exports: Vec::new(),
        }
    }
}

/// A parameterized unit of resource expansion.
///
/// Implementations must be deterministic: identical config and resolved
/// parameters must always produce an identical [`Expansion`].
///
/// # Example
///
/// ```
/// use cfcompose_model::{
///     Expansion, ExpansionContext, Parameter, Resource, Template, TemplateConfig,
///     TemplateDocument, TemplateError,
/// };
///
/// struct LogGroup;
///
/// impl Template for LogGroup {
///     fn name(&self) -> &str {
///         "log-group"
///     }
///
///     fn parameters(&self, _config: &TemplateConfig) -> Result<Vec<Parameter>, TemplateError> {
///         Ok(vec![Parameter::new("RetentionInDays").with_default("7")])
///     }
///
///     fn expand(&self, _ctx: &ExpansionContext<'_>) -> Result<Expansion, TemplateError> {
///         let mut doc = TemplateDocument::new();
///         doc.add_resource(Resource::new("LogGroup", "AWS::Logs::LogGroup"))?;
///         Ok(Expansion::new(doc))
///     }
/// }
/// ```
pub trait Template: Send + Sync + 'static {
    /// The name components use to refer to this template.
    fn name(&self) -> &str;

    /// A one-line description written into the rendered document.
    fn description(&self) -> String {
        self.name().to_string()
    }

    /// Declares the parameters this template accepts for `config`.
    fn parameters(&self, config: &TemplateConfig) -> Result<Vec<Parameter>, TemplateError>;

    /// Expands resolved parameters into resources and outputs.
    fn expand(&self, ctx: &ExpansionContext<'_>) -> Result<Expansion, TemplateError>;
}
