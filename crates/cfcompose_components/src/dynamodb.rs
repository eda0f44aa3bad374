//! The `dynamodb` template: one table keyed by `id`.
//!
//! Config:
//! - `table_name` (string, default `amis`)
//!
//! Outputs `TableName`, exported as `${EnvironmentName}-DynamoDb-TableName`.

use cfcompose_model::{
    Expansion, ExpansionContext, Output, Parameter, Resource, Template, TemplateConfig,
    TemplateDocument, TemplateError, Value,
};

use crate::common::{environment_name, environment_type};

/// Template name.
pub const NAME: &str = "dynamodb";

/// Table name used when the config does not set one.
pub const DEFAULT_TABLE_NAME: &str = "amis";

/// Provisioned read and write capacity.
const CAPACITY_UNITS: u32 = 5;

/// A single provisioned-throughput table.
#[derive(Debug, Default, Clone, Copy)]
pub struct DynamoDbTemplate;

impl Template for DynamoDbTemplate {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> String {
        "dynamodb - table keyed by id".to_string()
    }

    fn parameters(&self, config: &TemplateConfig) -> Result<Vec<Parameter>, TemplateError> {
        config.str(NAME, "table_name")?;
        Ok(vec![environment_name(), environment_type()])
    }

    fn expand(&self, ctx: &ExpansionContext<'_>) -> Result<Expansion, TemplateError> {
        let table_name = ctx
            .config
            .str(NAME, "table_name")?
            .unwrap_or(DEFAULT_TABLE_NAME);

        let key = |extra: (&str, &str)| {
            Value::list([Value::map([("AttributeName", "id"), extra])])
        };

        let mut document = TemplateDocument::new();
        document.add_resource(
            Resource::new("Table", "AWS::DynamoDB::Table")
                .property("AttributeDefinitions", key(("AttributeType", "S")))
                .property("KeySchema", key(("KeyType", "HASH")))
                .property(
                    "ProvisionedThroughput",
                    Value::map([
                        ("ReadCapacityUnits", CAPACITY_UNITS),
                        ("WriteCapacityUnits", CAPACITY_UNITS),
                    ]),
                )
                .property("TableName", table_name),
        )?;
        document.add_output(
            Output::new("TableName", table_name)
                .export(Value::sub("${EnvironmentName}-DynamoDb-TableName")),
        )?;

        Ok(Expansion::new(document))
    }
}
