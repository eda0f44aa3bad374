//! Composition structure and builder API.
//!
//! A [`Composition`] declares parameters and a list of [`Component`]s. Each
//! component names a template and binds the template's parameters to
//! literals, composition parameters or sibling outputs ([`cfout`]).

use core::fmt;

use cfcompose_model::{Parameter, TemplateConfig, TemplateSource, Value, is_valid_logical_id};
use hashbrown::HashSet;
use indexmap::IndexMap;

// ─────────────────────────────────────────────────────────────────────────────
// Binding
// ─────────────────────────────────────────────────────────────────────────────

/// How a component parameter gets its value.
#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    /// A literal value.
    Literal(Value),
    /// A reference to a parameter of the enclosing composition (`Ref`).
    Parameter(String),
    /// An output of a sibling component (`cfout`).
    Output {
        /// The producing component.
        component: String,
        /// The output name.
        output: String,
    },
}

impl Binding {
    /// Binds a literal value.
    pub fn literal(value: impl Into<Value>) -> Self {
        Self::Literal(value.into())
    }

    /// Binds a composition parameter.
    pub fn parameter(name: impl Into<String>) -> Self {
        Self::Parameter(name.into())
    }

    /// Returns the component whose output this binding reads, if any.
    #[must_use]
    pub fn referenced_component(&self) -> Option<&str> {
        match self {
            Self::Output { component, .. } => Some(component),
            Self::Literal(_) | Self::Parameter(_) => None,
        }
    }
}

/// Binds a sibling component's output.
///
/// # Example
///
/// ```
/// use cfcompose_graph::composition::{Binding, cfout};
///
/// let binding = cfout("dynamodb", "TableName");
/// assert_eq!(binding.referenced_component(), Some("dynamodb"));
/// ```
pub fn cfout(component: impl Into<String>, output: impl Into<String>) -> Binding {
    Binding::Output {
        component: component.into(),
        output: output.into(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Component
// ─────────────────────────────────────────────────────────────────────────────

/// A named instance of a template inside a composition.
#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    name: String,
    template: String,
    bindings: IndexMap<String, Binding>,
    config: TemplateConfig,
}

impl Component {
    /// Creates a component instantiating `template`.
    pub fn new(name: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            template: template.into(),
            bindings: IndexMap::new(),
            config: TemplateConfig::new(),
        }
    }

    /// Binds one of the template's parameters.
    #[must_use]
    pub fn bind(mut self, parameter: impl Into<String>, binding: Binding) -> Self {
        self.bindings.insert(parameter.into(), binding);
        self
    }

    /// Replaces the template config.
    #[must_use]
    pub fn with_config(mut self, config: TemplateConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets a single config key.
    #[must_use]
    pub fn with_config_value(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.config.set(key, value);
        self
    }

    /// Returns the component name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the template name.
    #[must_use]
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Returns the parameter bindings.
    #[must_use]
    pub fn bindings(&self) -> &IndexMap<String, Binding> {
        &self.bindings
    }

    /// Returns the template config.
    #[must_use]
    pub fn config(&self) -> &TemplateConfig {
        &self.config
    }

    /// Returns a mutable reference to the template config.
    pub fn config_mut(&mut self) -> &mut TemplateConfig {
        &mut self.config
    }

    /// Returns the components this one reads outputs from, deduplicated, in
    /// binding order.
    #[must_use]
    pub fn dependencies(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.bindings
            .values()
            .filter_map(Binding::referenced_component)
            .filter(|name| seen.insert(*name))
            .collect()
    }
}

/// An output of the composition itself, re-exporting a component output.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositionOutput {
    /// Output name.
    pub name: String,
    /// Component producing the value.
    pub component: String,
    /// Output name on that component.
    pub output: String,
    /// Optional export name.
    pub export: Option<Value>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Composition
// ─────────────────────────────────────────────────────────────────────────────

/// A set of parameters and wired components.
///
/// # Example
///
/// ```
/// use cfcompose_graph::composition::{Binding, Component, Composition, cfout};
/// use cfcompose_model::Parameter;
///
/// let mut composition = Composition::new("amis");
/// composition
///     .add_parameter(Parameter::new("EnvironmentName").with_default("dev").global())
///     .add_parameter(Parameter::new("S3Bucket").with_default("builds"))
///     .add_component(Component::new("dynamodb", "dynamodb"))
///     .add_component(
///         Component::new("lambda", "lambda")
///             .bind("S3Bucket", Binding::parameter("S3Bucket"))
///             .bind("DynamoDbTableName", cfout("dynamodb", "TableName")),
///     );
///
/// assert_eq!(composition.dependency_edges(), vec![(1, 0)]);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Composition {
    name: String,
    description: Option<String>,
    parameters: Vec<Parameter>,
    components: Vec<Component>,
    outputs: Vec<CompositionOutput>,
}

impl Composition {
    /// Creates an empty composition.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Sets the description.
    pub fn with_description(&mut self, description: impl Into<String>) -> &mut Self {
        self.description = Some(description.into());
        self
    }

    /// Declares a composition parameter.
    pub fn add_parameter(&mut self, parameter: Parameter) -> &mut Self {
        self.parameters.push(parameter);
        self
    }

    /// Adds a component. Declaration order breaks ordering ties.
    pub fn add_component(&mut self, component: Component) -> &mut Self {
        self.components.push(component);
        self
    }

    /// Re-exposes a component output as an output of this composition.
    pub fn add_output(
        &mut self,
        name: impl Into<String>,
        component: impl Into<String>,
        output: impl Into<String>,
    ) -> &mut Self {
        self.outputs.push(CompositionOutput {
            name: name.into(),
            component: component.into(),
            output: output.into(),
            export: None,
        });
        self
    }

    /// Re-exposes a component output and exports it.
    pub fn add_exported_output(
        &mut self,
        name: impl Into<String>,
        component: impl Into<String>,
        output: impl Into<String>,
        export: impl Into<Value>,
    ) -> &mut Self {
        self.outputs.push(CompositionOutput {
            name: name.into(),
            component: component.into(),
            output: output.into(),
            export: Some(export.into()),
        });
        self
    }

    /// Returns the composition name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the description, if any.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns the declared parameters.
    #[must_use]
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// Returns a declared parameter by name.
    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name() == name)
    }

    /// Returns the components in declaration order.
    #[must_use]
    pub fn components(&self) -> &[Component] {
        &self.components
    }

    /// Returns a component by name.
    #[must_use]
    pub fn component(&self, name: &str) -> Option<&Component> {
        self.components.iter().find(|c| c.name() == name)
    }

    /// Returns a mutable component by name.
    pub fn component_mut(&mut self, name: &str) -> Option<&mut Component> {
        self.components.iter_mut().find(|c| c.name() == name)
    }

    /// Returns the declaration index of a component.
    #[must_use]
    pub fn component_index(&self, name: &str) -> Option<usize> {
        self.components.iter().position(|c| c.name() == name)
    }

    /// Returns the composition's own outputs.
    #[must_use]
    pub fn outputs(&self) -> &[CompositionOutput] {
        &self.outputs
    }

    /// Returns `(consumer, producer)` index pairs, one per distinct `cfout`
    /// dependency. References to undeclared components are skipped.
    #[must_use]
    pub fn dependency_edges(&self) -> Vec<(usize, usize)> {
        let mut edges = Vec::new();
        for (consumer, component) in self.components.iter().enumerate() {
            for dependency in component.dependencies() {
                if let Some(producer) = self.component_index(dependency) {
                    edges.push((consumer, producer));
                }
            }
        }
        edges
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Validation
    // ─────────────────────────────────────────────────────────────────────────

    /// Validates the composition's structure against the available templates.
    ///
    /// Checks performed:
    /// - at least one component
    /// - component names are unique and valid logical ids
    /// - no component shares the composition's name
    /// - composition parameter names are unique and defaults satisfy allowed values
    /// - every component's template exists and accepts its config
    /// - every binding names a parameter the template declares
    /// - `Ref` bindings name a composition parameter
    /// - `cfout` bindings name a declared component
    /// - composition outputs name a declared component
    ///
    /// Cycles are detected when planning, not here.
    pub fn validate(&self, templates: &dyn TemplateSource) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if self.components.is_empty() {
            errors.push(ValidationError::EmptyComposition);
        }

        let mut parameter_names = HashSet::new();
        for parameter in &self.parameters {
            if !parameter_names.insert(parameter.name()) {
                errors.push(ValidationError::DuplicateParameter {
                    parameter: parameter.name().to_string(),
                });
            }
            if let Some(default) = parameter.default_value()
                && !parameter.allows(&Value::from(default))
            {
                errors.push(ValidationError::InvalidParameterDefault {
                    parameter: parameter.name().to_string(),
                    value: default.to_string(),
                });
            }
        }

        let component_names: HashSet<&str> = self.components.iter().map(Component::name).collect();
        let mut seen = HashSet::new();
        for component in &self.components {
            if !seen.insert(component.name()) {
                errors.push(ValidationError::DuplicateComponent {
                    component: component.name().to_string(),
                });
            }
            if component.name() == self.name {
                errors.push(ValidationError::ComponentNamedAfterComposition {
                    component: component.name().to_string(),
                });
            }
            if !is_valid_logical_id(component.name()) {
                errors.push(ValidationError::InvalidComponentName {
                    component: component.name().to_string(),
                });
            }
            self.validate_component(component, &component_names, templates, &mut errors);
        }

        for output in &self.outputs {
            if !component_names.contains(output.component.as_str()) {
                errors.push(ValidationError::UnknownOutputComponent {
                    output: output.name.clone(),
                    component: output.component.clone(),
                });
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn validate_component(
        &self,
        component: &Component,
        component_names: &HashSet<&str>,
        templates: &dyn TemplateSource,
        errors: &mut Vec<ValidationError>,
    ) {
        let Some(template) = templates.template(component.template()) else {
            errors.push(ValidationError::UnknownTemplate {
                component: component.name().to_string(),
                template: component.template().to_string(),
            });
            return;
        };

        let declared = match template.parameters(component.config()) {
            Ok(declared) => declared,
            Err(err) => {
                errors.push(ValidationError::TemplateConfig {
                    component: component.name().to_string(),
                    message: err.to_string(),
                });
                return;
            }
        };

        for (parameter, binding) in component.bindings() {
            if !declared.iter().any(|p| p.name() == parameter) {
                errors.push(ValidationError::UnknownParameter {
                    component: component.name().to_string(),
                    parameter: parameter.clone(),
                    template: component.template().to_string(),
                });
            }
            match binding {
                Binding::Literal(_) => {}
                Binding::Parameter(reference) => {
                    if self.parameter(reference).is_none() {
                        errors.push(ValidationError::UnknownCompositionParameter {
                            component: component.name().to_string(),
                            parameter: parameter.clone(),
                            reference: reference.clone(),
                        });
                    }
                }
                Binding::Output {
                    component: target, ..
                } => {
                    if !component_names.contains(target.as_str()) {
                        errors.push(ValidationError::UnknownComponentReference {
                            component: component.name().to_string(),
                            parameter: parameter.clone(),
                            target: target.clone(),
                        });
                    }
                }
            }
        }
    }
}

/// Structural errors detected by [`Composition::validate`].
///
/// These are found before any parameter is resolved or template expanded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The composition has no components.
    EmptyComposition,
    /// Two components share a name.
    DuplicateComponent {
        /// The repeated name.
        component: String,
    },
    /// A component shares the composition's name, so its compiled file
    /// would replace the root template.
    ComponentNamedAfterComposition {
        /// The shared name.
        component: String,
    },
    /// A component name cannot be used as a logical id.
    InvalidComponentName {
        /// The offending name.
        component: String,
    },
    /// Two composition parameters share a name.
    DuplicateParameter {
        /// The repeated name.
        parameter: String,
    },
    /// A composition parameter's default violates its allowed values.
    InvalidParameterDefault {
        /// The parameter.
        parameter: String,
        /// The default value.
        value: String,
    },
    /// A component names a template that is not registered.
    UnknownTemplate {
        /// The component.
        component: String,
        /// The missing template.
        template: String,
    },
    /// A template rejected the component's config.
    TemplateConfig {
        /// The component.
        component: String,
        /// The template's error message.
        message: String,
    },
    /// A binding targets a parameter the template does not declare.
    UnknownParameter {
        /// The component.
        component: String,
        /// The bound parameter.
        parameter: String,
        /// The component's template.
        template: String,
    },
    /// A `Ref` binding names an undeclared composition parameter.
    UnknownCompositionParameter {
        /// The component.
        component: String,
        /// The bound parameter.
        parameter: String,
        /// The missing composition parameter.
        reference: String,
    },
    /// A `cfout` binding names an undeclared component.
    UnknownComponentReference {
        /// The component.
        component: String,
        /// The bound parameter.
        parameter: String,
        /// The missing component.
        target: String,
    },
    /// A composition output names an undeclared component.
    UnknownOutputComponent {
        /// The composition output.
        output: String,
        /// The missing component.
        component: String,
    },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::EmptyComposition => write!(f, "composition has no components"),
            ValidationError::DuplicateComponent { component } => {
                write!(f, "component '{component}' is declared more than once")
            }
            ValidationError::ComponentNamedAfterComposition { component } => {
                write!(
                    f,
                    "component '{component}' shares the composition's name"
                )
            }
            ValidationError::InvalidComponentName { component } => {
                write!(f, "component name '{component}' must be alphanumeric")
            }
            ValidationError::DuplicateParameter { parameter } => {
                write!(f, "parameter '{parameter}' is declared more than once")
            }
            ValidationError::InvalidParameterDefault { parameter, value } => {
                write!(
                    f,
                    "parameter '{parameter}' has default '{value}' outside its allowed values"
                )
            }
            ValidationError::UnknownTemplate {
                component,
                template,
            } => {
                write!(f, "component '{component}' uses unknown template '{template}'")
            }
            ValidationError::TemplateConfig { component, message } => {
                write!(f, "component '{component}' has invalid config: {message}")
            }
            ValidationError::UnknownParameter {
                component,
                parameter,
                template,
            } => {
                write!(
                    f,
                    "component '{component}' binds '{parameter}', which template '{template}' does not declare"
                )
            }
            ValidationError::UnknownCompositionParameter {
                component,
                parameter,
                reference,
            } => {
                write!(
                    f,
                    "component '{component}' binds '{parameter}' to undeclared parameter '{reference}'"
                )
            }
            ValidationError::UnknownComponentReference {
                component,
                parameter,
                target,
            } => {
                write!(
                    f,
                    "component '{component}' binds '{parameter}' to an output of undeclared component '{target}'"
                )
            }
            ValidationError::UnknownOutputComponent { output, component } => {
                write!(
                    f,
                    "composition output '{output}' reads undeclared component '{component}'"
                )
            }
        }
    }
}

impl core::error::Error for ValidationError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dependencies_are_deduplicated_in_binding_order() {
        let component = Component::new("httpapi", "api-gateway-v2")
            .bind("A", cfout("lambda", "GetAmiArn"))
            .bind("B", cfout("dynamodb", "TableName"))
            .bind("C", cfout("lambda", "PutAmiArn"))
            .bind("D", Binding::parameter("EnvironmentName"));
        assert_eq!(component.dependencies(), vec!["lambda", "dynamodb"]);
    }

    #[test]
    fn dependency_edges_point_from_consumer_to_producer() {
        let mut composition = Composition::new("c");
        composition
            .add_component(Component::new("a", "t"))
            .add_component(Component::new("b", "t").bind("X", cfout("a", "Out")))
            .add_component(Component::new("c", "t").bind("Y", cfout("b", "Out")).bind("Z", cfout("ghost", "Out")));
        assert_eq!(composition.dependency_edges(), vec![(1, 0), (2, 1)]);
    }

    #[test]
    fn validation_error_display_names_component_and_parameter() {
        let err = ValidationError::UnknownComponentReference {
            component: "lambda".to_string(),
            parameter: "DynamoDbTableName".to_string(),
            target: "dynamodb".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "component 'lambda' binds 'DynamoDbTableName' to an output of undeclared component 'dynamodb'"
        );
    }
}
