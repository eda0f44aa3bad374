//! Parameter declarations and resolved parameter sets.

use indexmap::IndexMap;
use serde::Serialize;

use crate::value::Value;

/// A named template parameter.
///
/// Parameters are declared by templates and compositions. A parameter marked
/// [`global`](Parameter::global) is bound automatically to the composition's
/// parameter of the same name; an [`optional`](Parameter::optional) parameter
/// without default is dropped from the resolved set when nothing binds it.
///
/// # Example
///
/// ```
/// use cfcompose_model::Parameter;
///
/// let env_type = Parameter::new("EnvironmentType")
///     .with_default("development")
///     .with_allowed_values(["development", "production"])
///     .global();
///
/// assert!(env_type.allows(&"production".into()));
/// assert!(!env_type.allows(&"staging".into()));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    name: String,
    default: Option<String>,
    allowed_values: Vec<String>,
    global: bool,
    optional: bool,
    description: Option<String>,
}

impl Parameter {
    /// Declares a parameter with no default.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default: None,
            allowed_values: Vec::new(),
            global: false,
            optional: false,
            description: None,
        }
    }

    /// Sets the default value.
    #[must_use]
    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Restricts the parameter to an enumerated set of values.
    #[must_use]
    pub fn with_allowed_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_values = values.into_iter().map(Into::into).collect();
        self
    }

    /// Marks the parameter as shared across the whole composition.
    #[must_use]
    pub fn global(mut self) -> Self {
        self.global = true;
        self
    }

    /// Allows the parameter to stay unresolved.
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Sets a human-readable description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Returns the parameter name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the default value, if any.
    #[must_use]
    pub fn default_value(&self) -> Option<&str> {
        self.default.as_deref()
    }

    /// Returns the allowed values (empty means unrestricted).
    #[must_use]
    pub fn allowed_values(&self) -> &[String] {
        &self.allowed_values
    }

    /// Returns whether the parameter is global.
    #[must_use]
    pub fn is_global(&self) -> bool {
        self.global
    }

    /// Returns whether the parameter may stay unresolved.
    #[must_use]
    pub fn is_optional(&self) -> bool {
        self.optional
    }

    /// Returns the description, if any.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns true if `value` satisfies the allowed-value constraint.
    ///
    /// Only literal strings can be checked; values computed at deploy time
    /// (references, attribute reads) are accepted.
    #[must_use]
    pub fn allows(&self, value: &Value) -> bool {
        if self.allowed_values.is_empty() {
            return true;
        }
        match value {
            Value::String(s) => self.allowed_values.iter().any(|allowed| allowed == s),
            other => !other.is_static(),
        }
    }

    /// Converts the declaration into the `Parameters` section entry.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let mut entry = serde_json::Map::new();
        entry.insert("Type".into(), "String".into());
        if let Some(default) = &self.default {
            entry.insert("Default".into(), default.as_str().into());
        }
        if !self.allowed_values.is_empty() {
            entry.insert(
                "AllowedValues".into(),
                self.allowed_values
                    .iter()
                    .map(|v| serde_json::Value::from(v.as_str()))
                    .collect(),
            );
        }
        if let Some(description) = &self.description {
            entry.insert("Description".into(), description.as_str().into());
        }
        serde_json::Value::Object(entry)
    }
}

/// Where a resolved parameter value came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValueSource {
    /// The declaration's default.
    Default,
    /// A literal binding supplied by the parent composition.
    Literal,
    /// The composition's global parameter of the same name.
    Global,
    /// A `Ref` binding to a composition parameter.
    CompositionParameter {
        /// The referenced composition parameter.
        name: String,
    },
    /// A `cfout` binding to a sibling component's output.
    Output {
        /// The producing component.
        component: String,
        /// The output name.
        output: String,
    },
}

/// A single resolved parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedParameter {
    /// The value handed to the component.
    pub value: Value,
    /// Where the value came from.
    pub source: ValueSource,
}

/// The fully resolved parameter set of one component.
///
/// Entries keep the declaration order of the template.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedParameters {
    entries: IndexMap<String, ResolvedParameter>,
}

impl ResolvedParameters {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a resolved entry, replacing nothing: the first resolution wins.
    ///
    /// Returns `false` if the name was already resolved.
    pub fn insert(&mut self, name: impl Into<String>, parameter: ResolvedParameter) -> bool {
        let name = name.into();
        if self.entries.contains_key(&name) {
            return false;
        }
        self.entries.insert(name, parameter);
        true
    }

    /// Returns the resolved entry for `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ResolvedParameter> {
        self.entries.get(name)
    }

    /// Returns the resolved value for `name`.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.entries.get(name).map(|entry| &entry.value)
    }

    /// Returns the value for `name` if it is a literal string.
    #[must_use]
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.value(name).and_then(Value::as_str)
    }

    /// Returns true if `name` was resolved.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Returns the resolved names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Iterates over all entries in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ResolvedParameter)> {
        self.entries.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    /// Returns the number of resolved parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing was resolved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Looks up a literal string value, for use with [`Value::render_static`].
    #[must_use]
    pub fn static_lookup(&self, name: &str) -> Option<String> {
        self.get_str(name).map(str::to_string)
    }
}
