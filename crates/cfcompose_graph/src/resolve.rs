//! Parameter resolution.
//!
//! Resolution happens in two steps. [`GlobalParameters::resolve`] overlays
//! caller overrides on the composition's declared parameters once per build.
//! [`ParameterResolver`] then resolves each component's declared parameters,
//! in expansion order, against those values and the [`OutputTable`] of
//! components expanded so far.

use cfcompose_model::{Parameter, ResolvedParameter, ResolvedParameters, Value, ValueSource};
use indexmap::IndexMap;
use thiserror::Error;

use crate::composition::{Binding, Component, Composition};

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Errors raised while resolving parameters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// An override names a parameter the composition does not declare.
    #[error("override for undeclared parameter '{parameter}'")]
    UnknownOverride {
        /// The override key.
        parameter: String,
    },

    /// A concrete value is outside the parameter's allowed values.
    #[error(
        "parameter '{parameter}' of '{scope}' has value '{value}', expected one of [{}]",
        allowed.join(", ")
    )]
    DisallowedValue {
        /// Component (or composition) declaring the parameter.
        scope: String,
        /// The parameter.
        parameter: String,
        /// The rejected value.
        value: String,
        /// The allowed values.
        allowed: Vec<String>,
    },

    /// A required parameter has no binding, global or default.
    #[error("parameter '{parameter}' of '{scope}' is required but has no value")]
    MissingParameter {
        /// Component (or composition) declaring the parameter.
        scope: String,
        /// The parameter.
        parameter: String,
    },

    /// A binding targets a parameter the template does not declare.
    #[error("component '{component}' binds undeclared parameter '{parameter}'")]
    UnknownBinding {
        /// The component.
        component: String,
        /// The bound parameter.
        parameter: String,
    },

    /// A `Ref` binding names an undeclared composition parameter.
    #[error("component '{component}' binds '{parameter}' to undeclared parameter '{reference}'")]
    UnknownCompositionParameter {
        /// The component.
        component: String,
        /// The bound parameter.
        parameter: String,
        /// The missing composition parameter.
        reference: String,
    },

    /// A `cfout` binding reads a component that has not been expanded yet.
    #[error("component '{component}' reads outputs of '{target}', which has not been expanded")]
    ComponentNotExpanded {
        /// The consuming component.
        component: String,
        /// The producing component.
        target: String,
    },

    /// A `cfout` binding reads an output the producer does not declare.
    #[error("component '{component}' reads output '{output}' of '{target}', which does not exist")]
    UnknownOutput {
        /// The consuming component.
        component: String,
        /// The producing component.
        target: String,
        /// The missing output.
        output: String,
    },

    /// Outputs of a component were recorded twice.
    #[error("outputs of component '{component}' were already recorded")]
    OutputsAlreadyRecorded {
        /// The component.
        component: String,
    },
}

impl ResolveError {
    fn disallowed(scope: &str, parameter: &Parameter, value: &Value) -> Self {
        Self::DisallowedValue {
            scope: scope.to_string(),
            parameter: parameter.name().to_string(),
            value: value.as_str().map_or_else(|| value.to_string(), str::to_string),
            allowed: parameter.allowed_values().to_vec(),
        }
    }

    fn missing(scope: &str, parameter: &str) -> Self {
        Self::MissingParameter {
            scope: scope.to_string(),
            parameter: parameter.to_string(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// GlobalParameters
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
struct CompositionValue {
    value: Value,
    global: bool,
    overridden: bool,
}

/// The composition's parameter values for one build.
///
/// Resolved once from declared defaults and caller overrides, then shared
/// read-only with every component resolution. Parameters flagged global are
/// handed to any component parameter of the same name; the rest are only
/// reachable through explicit `Ref` bindings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GlobalParameters {
    values: IndexMap<String, CompositionValue>,
}

impl GlobalParameters {
    /// Resolves the composition's parameters.
    ///
    /// # Errors
    ///
    /// Fails if an override names an undeclared parameter, a value is outside
    /// its allowed set, or a required parameter has neither override nor
    /// default.
    pub fn resolve(
        composition: &Composition,
        overrides: &IndexMap<String, Value>,
    ) -> Result<Self, ResolveError> {
        if let Some(unknown) = overrides
            .keys()
            .find(|name| composition.parameter(name).is_none())
        {
            return Err(ResolveError::UnknownOverride {
                parameter: unknown.clone(),
            });
        }

        let mut values = IndexMap::new();
        for parameter in composition.parameters() {
            let (value, overridden) = match overrides.get(parameter.name()) {
                Some(value) => (value.clone(), true),
                None => match parameter.default_value() {
                    Some(default) => (Value::from(default), false),
                    None if parameter.is_optional() => continue,
                    None => {
                        return Err(ResolveError::missing(composition.name(), parameter.name()));
                    }
                },
            };
            if !parameter.allows(&value) {
                return Err(ResolveError::disallowed(composition.name(), parameter, &value));
            }
            values.insert(
                parameter.name().to_string(),
                CompositionValue {
                    value,
                    global: parameter.is_global(),
                    overridden,
                },
            );
        }

        Ok(Self { values })
    }

    /// Returns the value of a global parameter.
    #[must_use]
    pub fn global(&self, name: &str) -> Option<&Value> {
        self.values
            .get(name)
            .filter(|entry| entry.global)
            .map(|entry| &entry.value)
    }

    /// Returns the value of any composition parameter.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name).map(|entry| &entry.value)
    }

    /// Returns true if the caller overrode the declared default.
    #[must_use]
    pub fn is_overridden(&self, name: &str) -> bool {
        self.values.get(name).is_some_and(|entry| entry.overridden)
    }

    /// Iterates over resolved values in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values
            .iter()
            .map(|(name, entry)| (name.as_str(), &entry.value))
    }

    /// Looks up a literal string value, for use with [`Value::render_static`].
    #[must_use]
    pub fn static_lookup(&self, name: &str) -> Option<String> {
        self.get(name).and_then(Value::as_str).map(str::to_string)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// OutputTable
// ─────────────────────────────────────────────────────────────────────────────

/// Outputs of the components expanded so far.
///
/// Append-only: each component records its outputs exactly once, right after
/// it is expanded. Entries hold the value a consumer sees, which is an
/// attribute read on the producing nested stack.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutputTable {
    components: IndexMap<String, IndexMap<String, Value>>,
}

impl OutputTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the output names of an expanded component.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::OutputsAlreadyRecorded`] on a second call for
    /// the same component.
    pub fn record<'a>(
        &mut self,
        component: &str,
        outputs: impl IntoIterator<Item = &'a str>,
    ) -> Result<(), ResolveError> {
        if self.components.contains_key(component) {
            return Err(ResolveError::OutputsAlreadyRecorded {
                component: component.to_string(),
            });
        }
        let values = outputs
            .into_iter()
            .map(|output| {
                (
                    output.to_string(),
                    Value::get_att(component, format!("Outputs.{output}")),
                )
            })
            .collect();
        self.components.insert(component.to_string(), values);
        Ok(())
    }

    /// Returns true if the component's outputs are recorded.
    #[must_use]
    pub fn contains(&self, component: &str) -> bool {
        self.components.contains_key(component)
    }

    /// Looks up `target.output` on behalf of `consumer`.
    ///
    /// # Errors
    ///
    /// Fails if `target` has not been expanded or does not declare `output`.
    pub fn lookup(&self, consumer: &str, target: &str, output: &str) -> Result<&Value, ResolveError> {
        let outputs = self
            .components
            .get(target)
            .ok_or_else(|| ResolveError::ComponentNotExpanded {
                component: consumer.to_string(),
                target: target.to_string(),
            })?;
        outputs.get(output).ok_or_else(|| ResolveError::UnknownOutput {
            component: consumer.to_string(),
            target: target.to_string(),
            output: output.to_string(),
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ParameterResolver
// ─────────────────────────────────────────────────────────────────────────────

/// Resolves a component's declared parameters.
///
/// For each declared parameter the first applicable source wins:
///
/// 1. an explicit binding (literal, `Ref`, `cfout`)
/// 2. the composition's global parameter of the same name, when the
///    component also declares the parameter global
/// 3. the declared default
///
/// Optional parameters with no source are left out of the result; any other
/// parameter without a source is an error.
#[derive(Debug, Clone, Copy)]
pub struct ParameterResolver<'a> {
    globals: &'a GlobalParameters,
    outputs: &'a OutputTable,
}

impl<'a> ParameterResolver<'a> {
    /// Creates a resolver over the build's globals and the current output table.
    #[must_use]
    pub fn new(globals: &'a GlobalParameters, outputs: &'a OutputTable) -> Self {
        Self { globals, outputs }
    }

    /// Resolves `declared` for `component`.
    ///
    /// # Errors
    ///
    /// See [`ResolveError`].
    pub fn resolve(
        &self,
        component: &Component,
        declared: &[Parameter],
    ) -> Result<ResolvedParameters, ResolveError> {
        if let Some(unknown) = component
            .bindings()
            .keys()
            .find(|name| !declared.iter().any(|p| p.name() == name.as_str()))
        {
            return Err(ResolveError::UnknownBinding {
                component: component.name().to_string(),
                parameter: unknown.clone(),
            });
        }

        let mut resolved = ResolvedParameters::new();
        for parameter in declared {
            let Some(entry) = self.resolve_one(component, parameter)? else {
                continue;
            };
            if !parameter.allows(&entry.value) {
                return Err(ResolveError::disallowed(component.name(), parameter, &entry.value));
            }
            resolved.insert(parameter.name(), entry);
        }
        Ok(resolved)
    }

    fn resolve_one(
        &self,
        component: &Component,
        parameter: &Parameter,
    ) -> Result<Option<ResolvedParameter>, ResolveError> {
        let name = parameter.name();

        if let Some(binding) = component.bindings().get(name) {
            let entry = match binding {
                Binding::Literal(value) => Some(ResolvedParameter {
                    value: value.clone(),
                    source: ValueSource::Literal,
                }),
                Binding::Parameter(reference) => {
                    self.globals.get(reference).map(|value| ResolvedParameter {
                        value: value.clone(),
                        source: ValueSource::CompositionParameter {
                            name: reference.clone(),
                        },
                    })
                }
                Binding::Output {
                    component: target,
                    output,
                } => Some(ResolvedParameter {
                    value: self.outputs.lookup(component.name(), target, output)?.clone(),
                    source: ValueSource::Output {
                        component: target.clone(),
                        output: output.clone(),
                    },
                }),
            };
            // A `Ref` to an optional composition parameter left unset falls
            // through to the remaining sources.
            if entry.is_some() {
                return Ok(entry);
            }
        }

        if let Some(value) = self.globals.global(name).filter(|_| parameter.is_global()) {
            return Ok(Some(ResolvedParameter {
                value: value.clone(),
                source: ValueSource::Global,
            }));
        }

        if let Some(default) = parameter.default_value() {
            return Ok(Some(ResolvedParameter {
                value: Value::from(default),
                source: ValueSource::Default,
            }));
        }

        if parameter.is_optional() {
            return Ok(None);
        }

        Err(ResolveError::missing(component.name(), name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composition::cfout;

    fn amis() -> Composition {
        let mut composition = Composition::new("amis");
        composition
            .add_parameter(Parameter::new("EnvironmentName").with_default("dev").global())
            .add_parameter(
                Parameter::new("EnvironmentType")
                    .with_default("development")
                    .with_allowed_values(["development", "production"])
                    .global(),
            )
            .add_parameter(Parameter::new("S3Bucket").with_default("builds"))
            .add_parameter(Parameter::new("Unset").optional());
        composition
    }

    fn overrides<const N: usize>(entries: [(&str, &str); N]) -> IndexMap<String, Value> {
        entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), Value::from(v)))
            .collect()
    }

    #[test]
    fn globals_overlay_overrides_on_defaults() {
        let globals = GlobalParameters::resolve(&amis(), &overrides([("EnvironmentName", "prod")])).unwrap();
        assert_eq!(globals.global("EnvironmentName"), Some(&Value::from("prod")));
        assert!(globals.is_overridden("EnvironmentName"));
        assert_eq!(globals.global("EnvironmentType"), Some(&Value::from("development")));
        // Non-global parameters are only reachable by name.
        assert_eq!(globals.global("S3Bucket"), None);
        assert_eq!(globals.get("S3Bucket"), Some(&Value::from("builds")));
        assert_eq!(globals.get("Unset"), None);
    }

    #[test]
    fn disallowed_override_is_rejected() {
        let err = GlobalParameters::resolve(&amis(), &overrides([("EnvironmentType", "staging")])).unwrap_err();
        assert!(matches!(
            err,
            ResolveError::DisallowedValue { ref parameter, ref value, .. }
                if parameter == "EnvironmentType" && value == "staging"
        ));
    }

    #[test]
    fn disallowed_value_is_reported_unquoted() {
        let err = GlobalParameters::resolve(&amis(), &overrides([("EnvironmentType", "staging")])).unwrap_err();
        assert_eq!(
            err.to_string(),
            "parameter 'EnvironmentType' of 'amis' has value 'staging', expected one of [development, production]"
        );
    }

    #[test]
    fn unknown_override_is_rejected() {
        let err = GlobalParameters::resolve(&amis(), &overrides([("Nope", "x")])).unwrap_err();
        assert_eq!(
            err,
            ResolveError::UnknownOverride {
                parameter: "Nope".to_string()
            }
        );
    }

    #[test]
    fn resolution_precedence() {
        let globals = GlobalParameters::resolve(&amis(), &IndexMap::new()).unwrap();
        let mut outputs = OutputTable::new();
        outputs.record("dynamodb", ["TableName"]).unwrap();

        let component = Component::new("lambda", "lambda")
            .bind("S3Bucket", Binding::parameter("S3Bucket"))
            .bind("DynamoDbTableName", cfout("dynamodb", "TableName"))
            .bind("EnvironmentName", Binding::literal("pinned"));
        let declared = vec![
            Parameter::new("EnvironmentName").global(),
            Parameter::new("EnvironmentType").global(),
            Parameter::new("S3Bucket"),
            Parameter::new("DynamoDbTableName").optional(),
            Parameter::new("Memory").with_default("128"),
            Parameter::new("Extra").optional(),
        ];

        let resolved = ParameterResolver::new(&globals, &outputs)
            .resolve(&component, &declared)
            .unwrap();

        assert_eq!(resolved.get_str("EnvironmentName"), Some("pinned"));
        assert_eq!(resolved.get("EnvironmentType").unwrap().source, ValueSource::Global);
        assert_eq!(
            resolved.get("S3Bucket").unwrap().source,
            ValueSource::CompositionParameter {
                name: "S3Bucket".to_string()
            }
        );
        assert_eq!(
            resolved.value("DynamoDbTableName"),
            Some(&Value::get_att("dynamodb", "Outputs.TableName"))
        );
        assert_eq!(resolved.get("Memory").unwrap().source, ValueSource::Default);
        assert!(!resolved.contains("Extra"));
        let names: Vec<_> = resolved.names().collect();
        assert_eq!(
            names,
            vec!["EnvironmentName", "EnvironmentType", "S3Bucket", "DynamoDbTableName", "Memory"]
        );
    }

    #[test]
    fn local_parameter_ignores_global_of_same_name() {
        let globals = GlobalParameters::resolve(&amis(), &IndexMap::new()).unwrap();
        let outputs = OutputTable::new();
        let declared = [
            Parameter::new("EnvironmentName").with_default("local"),
            Parameter::new("EnvironmentType").optional(),
        ];

        let resolved = ParameterResolver::new(&globals, &outputs)
            .resolve(&Component::new("lambda", "lambda"), &declared)
            .unwrap();

        assert_eq!(resolved.get_str("EnvironmentName"), Some("local"));
        assert_eq!(resolved.get("EnvironmentName").unwrap().source, ValueSource::Default);
        assert!(!resolved.contains("EnvironmentType"));
    }

    #[test]
    fn missing_required_parameter_names_component() {
        let globals = GlobalParameters::resolve(&amis(), &IndexMap::new()).unwrap();
        let outputs = OutputTable::new();
        let err = ParameterResolver::new(&globals, &outputs)
            .resolve(&Component::new("lambda", "lambda"), &[Parameter::new("S3Prefix")])
            .unwrap_err();
        assert_eq!(
            err,
            ResolveError::MissingParameter {
                scope: "lambda".to_string(),
                parameter: "S3Prefix".to_string()
            }
        );
    }

    #[test]
    fn output_lookup_distinguishes_missing_component_and_output() {
        let mut outputs = OutputTable::new();
        outputs.record("dynamodb", ["TableName"]).unwrap();

        assert!(matches!(
            outputs.lookup("lambda", "s3", "Bucket"),
            Err(ResolveError::ComponentNotExpanded { .. })
        ));
        assert!(matches!(
            outputs.lookup("lambda", "dynamodb", "Arn"),
            Err(ResolveError::UnknownOutput { .. })
        ));
        assert_eq!(
            outputs.record("dynamodb", ["TableName"]),
            Err(ResolveError::OutputsAlreadyRecorded {
                component: "dynamodb".to_string()
            })
        );
    }

    #[test]
    fn literal_binding_outside_allowed_values_is_rejected() {
        let globals = GlobalParameters::resolve(&amis(), &IndexMap::new()).unwrap();
        let outputs = OutputTable::new();
        let component = Component::new("lambda", "lambda").bind("EnvironmentType", Binding::literal("staging"));
        let declared = [Parameter::new("EnvironmentType").with_allowed_values(["development", "production"])];
        assert!(matches!(
            ParameterResolver::new(&globals, &outputs).resolve(&component, &declared),
            Err(ResolveError::DisallowedValue { .. })
        ));
    }
}
