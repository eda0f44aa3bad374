//! Template documents.
//!
//! A [`TemplateDocument`] is the serializable form of one CloudFormation
//! template: parameters, resources and outputs, each kept in insertion order so
//! identical inputs always render byte-identical JSON.

use indexmap::IndexMap;

use crate::error::ModelError;
use crate::parameter::Parameter;
use crate::resource::{Output, Resource, is_valid_logical_id};
use crate::value::ReferenceScope;

/// Template format version written into every document.
pub const TEMPLATE_FORMAT_VERSION: &str = "2010-09-09";

/// A single CloudFormation template.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemplateDocument {
    description: Option<String>,
    parameters: IndexMap<String, Parameter>,
    resources: IndexMap<String, Resource>,
    outputs: IndexMap<String, Output>,
}

impl TemplateDocument {
    /// Creates an empty document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Returns the description, if any.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Declares a parameter.
    pub fn add_parameter(&mut self, parameter: Parameter) -> Result<(), ModelError> {
        if self.parameters.contains_key(parameter.name()) {
            return Err(ModelError::DuplicateParameter(parameter.name().to_string()));
        }
        self.parameters.insert(parameter.name().to_string(), parameter);
        Ok(())
    }

    /// Adds a resource.
    pub fn add_resource(&mut self, resource: Resource) -> Result<(), ModelError> {
        if self.resources.contains_key(resource.logical_id()) {
            return Err(ModelError::DuplicateResource(resource.logical_id().to_string()));
        }
        self.resources.insert(resource.logical_id().to_string(), resource);
        Ok(())
    }

    /// Adds an output.
    pub fn add_output(&mut self, output: Output) -> Result<(), ModelError> {
        if self.outputs.contains_key(output.name()) {
            return Err(ModelError::DuplicateOutput(output.name().to_string()));
        }
        self.outputs.insert(output.name().to_string(), output);
        Ok(())
    }

    /// Returns all declared parameters.
    #[must_use]
    pub fn parameters(&self) -> &IndexMap<String, Parameter> {
        &self.parameters
    }

    /// Returns all resources.
    #[must_use]
    pub fn resources(&self) -> &IndexMap<String, Resource> {
        &self.resources
    }

    /// Returns a resource by logical id.
    #[must_use]
    pub fn resource(&self, logical_id: &str) -> Option<&Resource> {
        self.resources.get(logical_id)
    }

    /// Returns resources of a given type, in insertion order.
    pub fn resources_of_type<'a>(
        &'a self,
        resource_type: &'a str,
    ) -> impl Iterator<Item = &'a Resource> + 'a {
        self.resources
            .values()
            .filter(move |resource| resource.resource_type() == resource_type)
    }

    /// Returns all outputs.
    #[must_use]
    pub fn outputs(&self) -> &IndexMap<String, Output> {
        &self.outputs
    }

    /// Returns an output by name.
    #[must_use]
    pub fn output(&self, name: &str) -> Option<&Output> {
        self.outputs.get(name)
    }

    /// Checks logical ids and that every reference resolves inside this document.
    pub fn validate(&self) -> Result<(), ModelError> {
        for name in self.parameters.keys() {
            if !is_valid_logical_id(name) {
                return Err(ModelError::InvalidLogicalId(name.clone()));
            }
        }

        for (logical_id, resource) in &self.resources {
            if !is_valid_logical_id(logical_id) {
                return Err(ModelError::InvalidLogicalId(logical_id.clone()));
            }
            for dependency in resource.dependencies() {
                if !self.resources.contains_key(dependency) {
                    return Err(ModelError::UnknownDependency {
                        resource: logical_id.clone(),
                        target: dependency.clone(),
                    });
                }
            }
            for (key, value) in resource.properties() {
                value.check_references(self, &format!("Resources.{logical_id}.Properties.{key}"))?;
            }
        }

        for (name, output) in &self.outputs {
            if !is_valid_logical_id(name) {
                return Err(ModelError::InvalidLogicalId(name.clone()));
            }
            output
                .value()
                .check_references(self, &format!("Outputs.{name}.Value"))?;
            if let Some(export) = output.export_name() {
                export.check_references(self, &format!("Outputs.{name}.Export.Name"))?;
            }
        }

        Ok(())
    }

    /// Converts to JSON without validating references.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let mut root = serde_json::Map::new();
        root.insert("AWSTemplateFormatVersion".into(), TEMPLATE_FORMAT_VERSION.into());
        if let Some(description) = &self.description {
            root.insert("Description".into(), description.as_str().into());
        }
        if !self.parameters.is_empty() {
            root.insert(
                "Parameters".into(),
                serde_json::Value::Object(
                    self.parameters
                        .iter()
                        .map(|(name, parameter)| (name.clone(), parameter.to_json()))
                        .collect(),
                ),
            );
        }
        root.insert(
            "Resources".into(),
            serde_json::Value::Object(
                self.resources
                    .iter()
                    .map(|(id, resource)| (id.clone(), resource.to_json()))
                    .collect(),
            ),
        );
        if !self.outputs.is_empty() {
            root.insert(
                "Outputs".into(),
                serde_json::Value::Object(
                    self.outputs
                        .iter()
                        .map(|(name, output)| (name.clone(), output.to_json()))
                        .collect(),
                ),
            );
        }
        serde_json::Value::Object(root)
    }

    /// Validates and renders pretty-printed JSON.
    pub fn render(&self) -> Result<String, ModelError> {
        self.validate()?;
        Ok(serde_json::to_string_pretty(&self.to_json())?)
    }
}

impl ReferenceScope for TemplateDocument {
    fn has_parameter(&self, name: &str) -> bool {
        self.parameters.contains_key(name)
    }

    fn has_resource(&self, name: &str) -> bool {
        self.resources.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn api_document() -> TemplateDocument {
        let mut doc = TemplateDocument::new().with_description("api");
        doc.add_parameter(Parameter::new("EnvironmentName").with_default("dev"))
            .unwrap();
        doc.add_resource(Resource::new("Api", "AWS::ApiGatewayV2::Api").property("ProtocolType", "HTTP"))
            .unwrap();
        doc.add_output(
            Output::new("ApiUrl", Value::sub("https://${Api}.execute-api.${AWS::Region}.amazonaws.com"))
                .export(Value::sub("${EnvironmentName}-ApiUrl")),
        )
        .unwrap();
        doc
    }

    #[test]
    fn duplicate_resources_are_rejected() {
        let mut doc = api_document();
        let err = doc
            .add_resource(Resource::new("Api", "AWS::ApiGatewayV2::Api"))
            .unwrap_err();
        assert_eq!(err, ModelError::DuplicateResource("Api".to_string()));
    }

    #[test]
    fn valid_document_renders() {
        let rendered = api_document().render().unwrap();
        assert!(rendered.contains("\"AWSTemplateFormatVersion\": \"2010-09-09\""));
        assert!(rendered.contains("${EnvironmentName}-ApiUrl"));
    }

    #[test]
    fn rendering_is_deterministic() {
        assert_eq!(api_document().render().unwrap(), api_document().render().unwrap());
    }

    #[test]
    fn sections_keep_insertion_order() {
        let json = api_document().to_json();
        let keys: Vec<_> = json.as_object().unwrap().keys().cloned().collect();
        assert_eq!(
            keys,
            vec!["AWSTemplateFormatVersion", "Description", "Parameters", "Resources", "Outputs"]
        );
    }

    #[test]
    fn unknown_dependency_fails_validation() {
        let mut doc = TemplateDocument::new();
        doc.add_resource(Resource::new("Deployment", "AWS::ApiGatewayV2::Deployment").depends_on("Route"))
            .unwrap();
        assert!(matches!(
            doc.validate(),
            Err(ModelError::UnknownDependency { .. })
        ));
    }

    #[test]
    fn invalid_logical_id_fails_validation() {
        let mut doc = TemplateDocument::new();
        doc.add_resource(Resource::new("s3-events", "Custom::S3LambdaNotification"))
            .unwrap();
        assert_eq!(
            doc.validate(),
            Err(ModelError::InvalidLogicalId("s3-events".to_string()))
        );
    }
}
