//! The build pipeline.
//!
//! [`Composer::build`] turns a [`Composition`] into a [`ComposedStack`]:
//!
//! 1. validate the composition's structure
//! 2. plan the expansion order
//! 3. resolve the composition's parameters into [`GlobalParameters`]
//! 4. resolve and expand each component in order, recording its outputs
//! 5. render export names and check them for collisions
//! 6. assemble the root document with one nested stack per component
//!
//! Builds are atomic: any error aborts before a stack is returned.

use cfcompose_model::{
    ExpansionContext, ModelError, NestedExport, Output, Parameter, ResolvedParameters, Resource, TemplateDocument,
    TemplateError, TemplateSource, Value, ValueSource,
};
use indexmap::IndexMap;
use thiserror::Error;

use crate::composition::{Component, Composition, ValidationError};
use crate::export::{ExportCollision, ExportLedger, ExportRecord};
use crate::plan::{ExpansionPlan, PlanError};
use crate::resolve::{GlobalParameters, OutputTable, ParameterResolver, ResolveError};

/// Resource type of the nested stacks in the root document.
pub const NESTED_STACK_TYPE: &str = "AWS::CloudFormation::Stack";

/// File suffix of rendered documents.
pub const COMPILED_SUFFIX: &str = ".compiled.json";

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Errors raised by [`Composer::build`].
#[derive(Debug, Error)]
pub enum ComposeError {
    /// The composition failed structural validation.
    #[error("composition '{composition}' is invalid: {}", join_errors(errors))]
    Validation {
        /// The composition.
        composition: String,
        /// Every problem found.
        errors: Vec<ValidationError>,
    },

    /// No expansion order exists.
    #[error(transparent)]
    Plan(#[from] PlanError),

    /// A parameter could not be resolved.
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// A component's template disappeared between validation and expansion.
    #[error("component '{component}' uses unknown template '{template}'")]
    UnknownTemplate {
        /// The component.
        component: String,
        /// The missing template.
        template: String,
    },

    /// A template failed to declare parameters or expand.
    #[error("component '{component}' failed to expand: {source}")]
    Template {
        /// The component.
        component: String,
        /// The template's error.
        #[source]
        source: TemplateError,
    },

    /// A produced document is malformed.
    #[error("document for '{component}' is malformed: {source}")]
    Model {
        /// The component (or composition, for the root document).
        component: String,
        /// The document error.
        #[source]
        source: ModelError,
    },

    /// A composition output reads an output the component does not produce.
    #[error("composition output '{output}' reads '{component}.{source_output}', which does not exist")]
    UnknownCompositionOutput {
        /// The composition output.
        output: String,
        /// The component.
        component: String,
        /// The missing component output.
        source_output: String,
    },

    /// Two outputs render the same export name.
    #[error(transparent)]
    ExportCollision(#[from] ExportCollision),
}

impl ComposeError {
    fn model(component: &str, source: ModelError) -> Self {
        Self::Model {
            component: component.to_string(),
            source,
        }
    }
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

// ─────────────────────────────────────────────────────────────────────────────
// Output types
// ─────────────────────────────────────────────────────────────────────────────

/// One expanded component.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpandedComponent {
    /// Component name.
    pub name: String,
    /// Template the component instantiated.
    pub template: String,
    /// The resolved parameter set the template saw.
    pub parameters: ResolvedParameters,
    /// The component's document.
    pub document: TemplateDocument,
    /// Documents of stacks nested below this component, keyed by file stem.
    pub children: IndexMap<String, TemplateDocument>,
    /// Exports published by the stacks in `children`.
    pub nested_exports: Vec<NestedExport>,
}

impl ExpandedComponent {
    /// Returns every export this component publishes: its own document's,
    /// rendered with its resolved parameters, then those of nested stacks.
    /// Component paths are prefixed with this component's name.
    #[must_use]
    pub fn published_exports(&self) -> Vec<NestedExport> {
        let own = self.document.outputs().values().filter_map(|output| {
            output.export_name().map(|export| NestedExport {
                name: export.render_static(|n| self.parameters.static_lookup(n)),
                component: self.name.clone(),
                output: output.name().to_string(),
            })
        });
        let nested = self.nested_exports.iter().map(|export| NestedExport {
            name: export.name.clone(),
            component: format!("{}.{}", self.name, export.component),
            output: export.output.clone(),
        });
        own.chain(nested).collect()
    }
}

/// The result of a successful build.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedStack {
    name: String,
    root: TemplateDocument,
    order: Vec<String>,
    components: IndexMap<String, ExpandedComponent>,
    exports: Vec<ExportRecord>,
    globals: GlobalParameters,
}

impl ComposedStack {
    /// Returns the composition name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the root document.
    #[must_use]
    pub fn root(&self) -> &TemplateDocument {
        &self.root
    }

    /// Returns component names in expansion order.
    #[must_use]
    pub fn order(&self) -> &[String] {
        &self.order
    }

    /// Returns an expanded component.
    #[must_use]
    pub fn component(&self, name: &str) -> Option<&ExpandedComponent> {
        self.components.get(name)
    }

    /// Returns all expanded components, in expansion order.
    #[must_use]
    pub fn components(&self) -> &IndexMap<String, ExpandedComponent> {
        &self.components
    }

    /// Returns the rendered exports.
    #[must_use]
    pub fn exports(&self) -> &[ExportRecord] {
        &self.exports
    }

    /// Returns the composition parameter values used for this build.
    #[must_use]
    pub fn globals(&self) -> &GlobalParameters {
        &self.globals
    }

    /// Renders every document to pretty JSON, keyed by file name.
    ///
    /// The root document comes first, then each component in expansion
    /// order, each followed by its nested documents.
    ///
    /// # Errors
    ///
    /// Returns a [`ModelError`] if a document fails validation.
    pub fn render_files(&self) -> Result<IndexMap<String, String>, ModelError> {
        let mut files = IndexMap::new();
        files.insert(format!("{}{COMPILED_SUFFIX}", self.name), self.root.render()?);
        for (name, component) in &self.components {
            files.insert(format!("{name}{COMPILED_SUFFIX}"), component.document.render()?);
            for (stem, child) in &component.children {
                files.insert(format!("{name}.{stem}{COMPILED_SUFFIX}"), child.render()?);
            }
        }
        Ok(files)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Composer
// ─────────────────────────────────────────────────────────────────────────────

/// Builds compositions against a set of templates.
///
/// # Example
///
/// ```ignore
/// let registry = TemplateRegistry::with_builtin();
/// let stack = Composer::new(&registry).build(&composition, &IndexMap::new())?;
/// for (file, json) in stack.render_files()? {
///     std::fs::write(file, json)?;
/// }
/// ```
pub struct Composer<'a> {
    templates: &'a dyn TemplateSource,
    template_url_prefix: String,
}

impl<'a> Composer<'a> {
    /// Creates a composer reading templates from `templates`.
    #[must_use]
    pub fn new(templates: &'a dyn TemplateSource) -> Self {
        Self {
            templates,
            template_url_prefix: String::new(),
        }
    }

    /// Sets the prefix of every nested stack's `TemplateURL`
    /// (e.g. `https://bucket.s3.amazonaws.com/templates/`).
    #[must_use]
    pub fn with_template_url_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.template_url_prefix = prefix.into();
        self
    }

    /// Returns the `TemplateURL` of a component's document.
    #[must_use]
    pub fn template_url(&self, component: &str) -> String {
        format!("{}{component}{COMPILED_SUFFIX}", self.template_url_prefix)
    }

    /// Builds `composition` with the given parameter overrides.
    ///
    /// # Errors
    ///
    /// See [`ComposeError`].
    pub fn build(
        &self,
        composition: &Composition,
        overrides: &IndexMap<String, Value>,
    ) -> Result<ComposedStack, ComposeError> {
        tracing::info!(composition = composition.name(), "building composition");

        if let Err(errors) = composition.validate(self.templates) {
            for error in &errors {
                tracing::warn!(composition = composition.name(), "{error}");
            }
            return Err(ComposeError::Validation {
                composition: composition.name().to_string(),
                errors,
            });
        }

        let plan = ExpansionPlan::build(composition)?;
        tracing::debug!(order = ?plan.names(), "planned expansion order");

        let globals = GlobalParameters::resolve(composition, overrides)?;

        let mut outputs = OutputTable::new();
        let mut exports = Vec::new();
        let mut components = IndexMap::new();

        for &index in plan.order() {
            let component = &composition.components()[index];
            let expanded = self.expand_component(composition, component, &globals, &outputs)?;

            outputs.record(component.name(), expanded.document.outputs().keys().map(String::as_str))?;
            for export in expanded.published_exports() {
                tracing::debug!(component = %export.component, export = %export.name, "rendered export name");
                exports.push(ExportRecord {
                    name: export.name,
                    stack: composition.name().to_string(),
                    component: export.component,
                    output: export.output,
                });
            }
            components.insert(component.name().to_string(), expanded);
        }

        let root = self.root_document(composition, &globals, &components, &mut exports)?;

        ExportLedger::new().register_all(&exports)?;

        tracing::info!(
            composition = composition.name(),
            components = components.len(),
            exports = exports.len(),
            "composition built"
        );

        Ok(ComposedStack {
            name: composition.name().to_string(),
            root,
            order: plan.names().to_vec(),
            components,
            exports,
            globals,
        })
    }

    fn expand_component(
        &self,
        composition: &Composition,
        component: &Component,
        globals: &GlobalParameters,
        outputs: &OutputTable,
    ) -> Result<ExpandedComponent, ComposeError> {
        let span = tracing::debug_span!(
            "expand",
            composition = composition.name(),
            component = component.name(),
            template = component.template()
        );
        let _guard = span.enter();

        let template = self.templates.template(component.template()).ok_or_else(|| {
            ComposeError::UnknownTemplate {
                component: component.name().to_string(),
                template: component.template().to_string(),
            }
        })?;
        let template_error = |source| ComposeError::Template {
            component: component.name().to_string(),
            source,
        };

        let declared = template.parameters(component.config()).map_err(template_error)?;
        let parameters = ParameterResolver::new(globals, outputs).resolve(component, &declared)?;
        tracing::debug!(resolved = parameters.len(), "resolved parameters");

        let nested_prefix = format!("{}{}.", self.template_url_prefix, component.name());
        let ctx = ExpansionContext {
            component: component.name(),
            config: component.config(),
            parameters: &parameters,
            templates: self.templates,
            template_url_prefix: &nested_prefix,
        };
        let expansion = template.expand(&ctx).map_err(template_error)?;

        let document = component_document(template.description(), &declared, &parameters, expansion.document)
            .map_err(|source| ComposeError::model(component.name(), source))?;
        for (stem, child) in &expansion.children {
            child
                .validate()
                .map_err(|source| ComposeError::model(&format!("{}.{stem}", component.name()), source))?;
        }

        tracing::debug!(
            resources = document.resources().len(),
            outputs = document.outputs().len(),
            "expanded component"
        );

        Ok(ExpandedComponent {
            name: component.name().to_string(),
            template: component.template().to_string(),
            parameters,
            document,
            children: expansion.children,
            nested_exports: expansion.exports,
        })
    }

    fn root_document(
        &self,
        composition: &Composition,
        globals: &GlobalParameters,
        components: &IndexMap<String, ExpandedComponent>,
        exports: &mut Vec<ExportRecord>,
    ) -> Result<TemplateDocument, ComposeError> {
        let root_error = |source| ComposeError::model(composition.name(), source);
        let mut root = TemplateDocument::new()
            .with_description(composition.description().unwrap_or(composition.name()));

        // Optional parameters left unset are not referenced by any component.
        for parameter in composition
            .parameters()
            .iter()
            .filter(|p| globals.get(p.name()).is_some())
        {
            root.add_parameter(root_parameter(parameter, globals))
                .map_err(root_error)?;
        }

        for (name, component) in components {
            let mut stack = Resource::new(name.as_str(), NESTED_STACK_TYPE)
                .property("TemplateURL", self.template_url(name));
            let parameters = stack_parameters(&component.parameters);
            if !parameters.is_empty() {
                stack = stack.property("Parameters", parameters);
            }
            root.add_resource(stack).map_err(root_error)?;
        }

        for output in composition.outputs() {
            let exists = components
                .get(&output.component)
                .is_some_and(|c| c.document.output(&output.output).is_some());
            if !exists {
                return Err(ComposeError::UnknownCompositionOutput {
                    output: output.name.clone(),
                    component: output.component.clone(),
                    source_output: output.output.clone(),
                });
            }
            let mut root_output = Output::new(
                output.name.as_str(),
                Value::get_att(output.component.as_str(), format!("Outputs.{}", output.output)),
            );
            if let Some(export) = &output.export {
                exports.push(ExportRecord {
                    name: export.render_static(|n| globals.static_lookup(n)),
                    stack: composition.name().to_string(),
                    component: output.component.clone(),
                    output: output.name.clone(),
                });
                root_output = root_output.export(export.clone());
            }
            root.add_output(root_output).map_err(root_error)?;
        }

        root.validate().map_err(root_error)?;
        Ok(root)
    }
}

/// Assembles a component's document: resolved parameter declarations, then
/// the template's resources and outputs.
fn component_document(
    description: String,
    declared: &[Parameter],
    parameters: &ResolvedParameters,
    expanded: TemplateDocument,
) -> Result<TemplateDocument, ModelError> {
    let mut document = TemplateDocument::new().with_description(description);
    for parameter in declared.iter().filter(|p| parameters.contains(p.name())) {
        document.add_parameter(parameter.clone())?;
    }
    for resource in expanded.resources().values() {
        document.add_resource(resource.clone())?;
    }
    for output in expanded.outputs().values() {
        document.add_output(output.clone())?;
    }
    document.validate()?;
    Ok(document)
}

/// Root parameters default to the value used for this build, so the deployed
/// stack renders the same export names.
fn root_parameter(parameter: &Parameter, globals: &GlobalParameters) -> Parameter {
    match globals.get(parameter.name()).and_then(Value::as_str) {
        Some(value) if globals.is_overridden(parameter.name()) => parameter.clone().with_default(value),
        _ => parameter.clone(),
    }
}

/// Maps resolved parameters to the nested stack's `Parameters` property.
/// Defaults are left to the child document.
fn stack_parameters(parameters: &ResolvedParameters) -> IndexMap<String, Value> {
    parameters
        .iter()
        .filter_map(|(name, resolved)| {
            let value = match &resolved.source {
                ValueSource::Default => return None,
                ValueSource::Literal | ValueSource::Output { .. } => resolved.value.clone(),
                ValueSource::Global => Value::reference(name),
                ValueSource::CompositionParameter { name } => Value::reference(name.as_str()),
            };
            Some((name.to_string(), value))
        })
        .collect()
}
