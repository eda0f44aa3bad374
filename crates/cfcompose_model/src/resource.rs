//! Resources and outputs.

use indexmap::IndexMap;

use crate::value::Value;

/// Returns true if `id` is a valid CloudFormation logical id.
#[must_use]
pub fn is_valid_logical_id(id: &str) -> bool {
    !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric())
}

/// A typed cloud resource.
///
/// # Example
///
/// ```
/// use cfcompose_model::{Resource, Value};
///
/// let log_group = Resource::new("LogGroup", "AWS::Logs::LogGroup")
///     .property("RetentionInDays", 7)
///     .property("LogGroupName", "http-gateway-amis");
///
/// assert_eq!(log_group.get("RetentionInDays"), Some(&Value::from(7)));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    logical_id: String,
    resource_type: String,
    depends_on: Vec<String>,
    properties: IndexMap<String, Value>,
}

impl Resource {
    /// Creates a resource with no properties.
    pub fn new(logical_id: impl Into<String>, resource_type: impl Into<String>) -> Self {
        Self {
            logical_id: logical_id.into(),
            resource_type: resource_type.into(),
            depends_on: Vec::new(),
            properties: IndexMap::new(),
        }
    }

    /// Sets a property, keeping first-insertion order.
    #[must_use]
    pub fn property(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    /// Adds a `DependsOn` entry.
    #[must_use]
    pub fn depends_on(mut self, logical_id: impl Into<String>) -> Self {
        let logical_id = logical_id.into();
        if !self.depends_on.contains(&logical_id) {
            self.depends_on.push(logical_id);
        }
        self
    }

    /// Returns the logical id.
    #[must_use]
    pub fn logical_id(&self) -> &str {
        &self.logical_id
    }

    /// Returns the resource type (e.g. `AWS::DynamoDB::Table`).
    #[must_use]
    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    /// Returns the `DependsOn` list.
    #[must_use]
    pub fn dependencies(&self) -> &[String] {
        &self.depends_on
    }

    /// Returns all properties.
    #[must_use]
    pub fn properties(&self) -> &IndexMap<String, Value> {
        &self.properties
    }

    /// Returns a single property.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    /// Converts to the `Resources` section entry.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let mut entry = serde_json::Map::new();
        entry.insert("Type".into(), self.resource_type.as_str().into());
        match self.depends_on.as_slice() {
            [] => {}
            [single] => {
                entry.insert("DependsOn".into(), single.as_str().into());
            }
            many => {
                entry.insert(
                    "DependsOn".into(),
                    many.iter().map(|d| serde_json::Value::from(d.as_str())).collect(),
                );
            }
        }
        if !self.properties.is_empty() {
            entry.insert(
                "Properties".into(),
                serde_json::Value::Object(
                    self.properties
                        .iter()
                        .map(|(key, value)| (key.clone(), value.to_json()))
                        .collect(),
                ),
            );
        }
        serde_json::Value::Object(entry)
    }
}

/// A named value produced by a template.
#[derive(Debug, Clone, PartialEq)]
pub struct Output {
    name: String,
    value: Value,
    export: Option<Value>,
    description: Option<String>,
}

impl Output {
    /// Creates an output that is not exported.
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            export: None,
            description: None,
        }
    }

    /// Publishes the output under an export name.
    #[must_use]
    pub fn export(mut self, name: impl Into<Value>) -> Self {
        self.export = Some(name.into());
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Returns the output name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the value expression.
    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Returns the export name expression, if exported.
    #[must_use]
    pub fn export_name(&self) -> Option<&Value> {
        self.export.as_ref()
    }

    /// Converts to the `Outputs` section entry.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let mut entry = serde_json::Map::new();
        if let Some(description) = &self.description {
            entry.insert("Description".into(), description.as_str().into());
        }
        entry.insert("Value".into(), self.value.to_json());
        if let Some(export) = &self.export {
            entry.insert("Export".into(), serde_json::json!({ "Name": export.to_json() }));
        }
        serde_json::Value::Object(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn logical_ids_are_alphanumeric() {
        assert!(is_valid_logical_id("GetAmi"));
        assert!(is_valid_logical_id("httpapi"));
        assert!(!is_valid_logical_id("api-gateway"));
        assert!(!is_valid_logical_id(""));
    }

    #[test]
    fn single_dependency_serializes_as_string() {
        let deployment = Resource::new("Deployment", "AWS::ApiGatewayV2::Deployment")
            .depends_on("Route")
            .depends_on("Route")
            .property("ApiId", Value::reference("Api"));
        assert_eq!(
            deployment.to_json(),
            json!({
                "Type": "AWS::ApiGatewayV2::Deployment",
                "DependsOn": "Route",
                "Properties": { "ApiId": { "Ref": "Api" } }
            })
        );
    }

    #[test]
    fn several_dependencies_serialize_as_list() {
        let stage = Resource::new("Stage", "AWS::ApiGatewayV2::Stage")
            .depends_on("Deployment")
            .depends_on("LogGroup");
        assert_eq!(stage.to_json()["DependsOn"], json!(["Deployment", "LogGroup"]));
    }

    #[test]
    fn exported_output_serializes_export_name() {
        let output = Output::new("TableName", "amis")
            .export(Value::sub("${EnvironmentName}-DynamoDb-TableName"));
        assert_eq!(
            output.to_json(),
            json!({
                "Value": "amis",
                "Export": { "Name": { "Fn::Sub": "${EnvironmentName}-DynamoDb-TableName" } }
            })
        );
    }
}
