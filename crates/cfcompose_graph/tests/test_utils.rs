//! Shared test utilities for `cfcompose_graph` integration tests.
//!
//! Provides a configurable stub template and an in-memory template source.
//! Import via `mod test_utils;` in test files.

#![allow(
    dead_code,
    missing_docs,
    reason = "shared test utilities, not all items used in every test binary"
)]

use std::sync::Arc;

use cfcompose_graph::composition::{Binding, Component, Composition, cfout};
use cfcompose_model::{
    Expansion, ExpansionContext, Output, Parameter, Resource, Template, TemplateConfig,
    TemplateDocument, TemplateError, TemplateSource, Value,
};
use indexmap::IndexMap;

// ═══════════════════════════════════════════════════════════════════════════════
// STUB TEMPLATE
// ═══════════════════════════════════════════════════════════════════════════════

/// A template with a fixed parameter list, one marker resource and a set of
/// outputs. The config key `inputs` (a list of names) declares extra required
/// parameters, which lets tests wire arbitrary graphs through one template.
#[derive(Debug, Clone)]
pub struct StubTemplate {
    name: String,
    parameters: Vec<Parameter>,
    outputs: Vec<(String, Option<String>)>,
}

impl StubTemplate {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            parameters: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub fn parameter(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn output(mut self, name: &str) -> Self {
        self.outputs.push((name.to_string(), None));
        self
    }

    pub fn exported_output(mut self, name: &str, export: &str) -> Self {
        self.outputs.push((name.to_string(), Some(export.to_string())));
        self
    }
}

impl Template for StubTemplate {
    fn name(&self) -> &str {
        &self.name
    }

    fn parameters(&self, config: &TemplateConfig) -> Result<Vec<Parameter>, TemplateError> {
        let mut parameters = self.parameters.clone();
        if let Some(inputs) = config.get("inputs") {
            let inputs = inputs
                .as_list()
                .ok_or_else(|| TemplateError::invalid_config(&self.name, "inputs", "expected a list"))?;
            for input in inputs {
                let name = input
                    .as_str()
                    .ok_or_else(|| TemplateError::invalid_config(&self.name, "inputs", "expected strings"))?;
                parameters.push(Parameter::new(name));
            }
        }
        Ok(parameters)
    }

    fn expand(&self, _ctx: &ExpansionContext<'_>) -> Result<Expansion, TemplateError> {
        let mut document = TemplateDocument::new();
        document.add_resource(Resource::new("Marker", "AWS::CloudFormation::WaitConditionHandle"))?;
        for (name, export) in &self.outputs {
            let mut output = Output::new(name.as_str(), Value::reference("Marker"));
            if let Some(export) = export {
                output = output.export(Value::sub(export.as_str()));
            }
            document.add_output(output)?;
        }
        Ok(Expansion::new(document))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TEMPLATE SOURCE
// ═══════════════════════════════════════════════════════════════════════════════

/// In-memory template lookup.
#[derive(Default)]
pub struct Templates(IndexMap<String, Arc<dyn Template>>);

impl Templates {
    pub fn with(mut self, template: impl Template) -> Self {
        self.0.insert(template.name().to_string(), Arc::new(template));
        self
    }
}

impl TemplateSource for Templates {
    fn template(&self, name: &str) -> Option<Arc<dyn Template>> {
        self.0.get(name).cloned()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// FIXTURES
// ═══════════════════════════════════════════════════════════════════════════════

pub fn environment_name() -> Parameter {
    Parameter::new("EnvironmentName").with_default("dev").global()
}

pub fn environment_type() -> Parameter {
    Parameter::new("EnvironmentType")
        .with_default("development")
        .with_allowed_values(["development", "production"])
        .global()
}

/// Templates shaped like the table / function / gateway trio.
pub fn trio_templates() -> Templates {
    Templates::default()
        .with(
            StubTemplate::new("table")
                .parameter(environment_name())
                .exported_output("TableName", "${EnvironmentName}-DynamoDb-TableName"),
        )
        .with(
            StubTemplate::new("functions")
                .parameter(environment_name())
                .parameter(environment_type())
                .parameter(Parameter::new("S3Bucket"))
                .parameter(Parameter::new("MemorySize").with_default("128"))
                .parameter(Parameter::new("TableName").optional())
                .output("GetAmiArn"),
        )
        .with(
            StubTemplate::new("gateway")
                .parameter(environment_name())
                .parameter(Parameter::new("FunctionArn"))
                .parameter(Parameter::new("StageName"))
                .exported_output("ApiUrl", "${EnvironmentName}-ApiUrl"),
        )
}

/// A three-component composition over [`trio_templates`], declared in
/// reverse dependency order.
pub fn trio_composition() -> Composition {
    let mut composition = Composition::new("trio");
    composition
        .add_parameter(environment_name())
        .add_parameter(environment_type())
        .add_parameter(Parameter::new("S3Bucket").with_default("builds"))
        .add_component(
            Component::new("api", "gateway")
                .bind("FunctionArn", cfout("fn", "GetAmiArn"))
                .bind("StageName", Binding::literal("$default")),
        )
        .add_component(
            Component::new("fn", "functions")
                .bind("S3Bucket", Binding::parameter("S3Bucket"))
                .bind("TableName", cfout("db", "TableName")),
        )
        .add_component(Component::new("db", "table"));
    composition
}

pub fn overrides(entries: &[(&str, &str)]) -> IndexMap<String, Value> {
    entries
        .iter()
        .map(|(name, value)| ((*name).to_string(), Value::from(*value)))
        .collect()
}
