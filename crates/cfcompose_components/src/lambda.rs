//! The `lambda` template: functions deployed from versioned S3 artifacts.
//!
//! Each configured function becomes an `AWS::Lambda::Function` whose code is
//! fetched from `S3Bucket` at `${S3Prefix}/${LambdaFunctionsVersion}/<name>.zip`.
//! All functions share one execution role.
//!
//! Config:
//! - `functions` (map, default `get_ami` and `put_ami`): function name to a
//!   map with optional `handler`, `runtime`, `timeout`, `memory` and
//!   `manages_s3_notifications` keys
//!
//! When `DynamoDbTableName` is resolved, every function gets a `TABLE`
//! environment variable and the role gets table access.
//!
//! Outputs `<Function>Arn` per function (e.g. `GetAmiArn`).

use cfcompose_model::{
    Expansion, ExpansionContext, Output, Parameter, Resource, Template, TemplateConfig,
    TemplateDocument, TemplateError, Value,
};
use indexmap::IndexMap;

use crate::common::{environment_name, environment_type, pascal_case};

/// Template name.
pub const NAME: &str = "lambda";

/// Optional parameter wiring a table into the functions.
pub const TABLE_PARAMETER: &str = "DynamoDbTableName";

/// Functions deployed when the config lists none.
pub const DEFAULT_FUNCTIONS: [&str; 2] = ["get_ami", "put_ami"];

const DEFAULT_HANDLER: &str = "handler.lambda_handler";
const DEFAULT_RUNTIME: &str = "python3.12";
const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
const DEFAULT_MEMORY_MB: u64 = 128;
const POLICY_VERSION: &str = "2012-10-17";
const BASIC_EXECUTION_POLICY: &str =
    "arn:aws:iam::aws:policy/service-role/AWSLambdaBasicExecutionRole";

/// One configured function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSpec {
    /// Function name; also the artifact file stem.
    pub name: String,
    /// Handler entry point.
    pub handler: String,
    /// Runtime identifier.
    pub runtime: String,
    /// Timeout in seconds.
    pub timeout: u64,
    /// Memory in MB.
    pub memory: u64,
    /// Whether the function manages bucket notifications.
    pub manages_s3_notifications: bool,
}

impl FunctionSpec {
    fn with_defaults(name: &str) -> Self {
        Self {
            name: name.to_string(),
            handler: DEFAULT_HANDLER.to_string(),
            runtime: DEFAULT_RUNTIME.to_string(),
            timeout: DEFAULT_TIMEOUT_SECONDS,
            memory: DEFAULT_MEMORY_MB,
            manages_s3_notifications: false,
        }
    }

    /// Logical id of the function resource (e.g. `GetAmiFunction`).
    #[must_use]
    pub fn logical_id(&self) -> String {
        format!("{}Function", pascal_case(&self.name))
    }

    /// Name of the ARN output (e.g. `GetAmiArn`).
    #[must_use]
    pub fn output_name(&self) -> String {
        format!("{}Arn", pascal_case(&self.name))
    }
}

/// Reads the `functions` config key.
///
/// # Errors
///
/// Fails on a malformed entry or on two names mapping to the same logical id.
pub fn function_specs(config: &TemplateConfig) -> Result<Vec<FunctionSpec>, TemplateError> {
    let Some(functions) = config.map(NAME, "functions")? else {
        return Ok(DEFAULT_FUNCTIONS
            .into_iter()
            .map(FunctionSpec::with_defaults)
            .collect());
    };

    let mut specs: Vec<FunctionSpec> = Vec::with_capacity(functions.len());
    for (name, entry) in functions {
        let key = format!("functions.{name}");
        let settings = match entry {
            Value::Map(map) => TemplateConfig::from(map.clone()),
            Value::Null => TemplateConfig::new(),
            other => {
                return Err(TemplateError::invalid_config(
                    NAME,
                    key,
                    format!("expected a map, found {other}"),
                ));
            }
        };

        let mut spec = FunctionSpec::with_defaults(name);
        if pascal_case(name).is_empty() {
            return Err(TemplateError::invalid_config(NAME, key, "name has no alphanumeric characters"));
        }
        if let Some(existing) = specs.iter().find(|s| s.logical_id() == spec.logical_id()) {
            return Err(TemplateError::invalid_config(
                NAME,
                key,
                format!("clashes with function '{}'", existing.name),
            ));
        }
        if let Some(handler) = settings.str(NAME, "handler")? {
            spec.handler = handler.to_string();
        }
        if let Some(runtime) = settings.str(NAME, "runtime")? {
            spec.runtime = runtime.to_string();
        }
        if let Some(timeout) = settings.number(NAME, "timeout")? {
            spec.timeout = timeout;
        }
        if let Some(memory) = settings.number(NAME, "memory")? {
            spec.memory = memory;
        }
        if let Some(manages) = settings.bool(NAME, "manages_s3_notifications")? {
            spec.manages_s3_notifications = manages;
        }
        specs.push(spec);
    }
    Ok(specs)
}

/// Lambda functions sharing one execution role.
#[derive(Debug, Default, Clone, Copy)]
pub struct LambdaTemplate;

impl Template for LambdaTemplate {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> String {
        "lambda - functions deployed from S3 artifacts".to_string()
    }

    fn parameters(&self, config: &TemplateConfig) -> Result<Vec<Parameter>, TemplateError> {
        function_specs(config)?;
        Ok(vec![
            environment_name(),
            environment_type(),
            Parameter::new("LambdaFunctionsVersion"),
            Parameter::new("S3Bucket"),
            Parameter::new("S3Prefix"),
            Parameter::new(TABLE_PARAMETER)
                .optional()
                .with_description("Table the functions read and write"),
        ])
    }

    fn expand(&self, ctx: &ExpansionContext<'_>) -> Result<Expansion, TemplateError> {
        let specs = function_specs(ctx.config)?;
        for required in ["LambdaFunctionsVersion", "S3Bucket", "S3Prefix"] {
            ctx.require(NAME, required)?;
        }
        let has_table = ctx.parameters.contains(TABLE_PARAMETER);

        let mut document = TemplateDocument::new();
        document.add_resource(execution_role(&specs, has_table))?;

        for spec in &specs {
            let mut variables = IndexMap::new();
            variables.insert("REGION".to_string(), Value::reference("AWS::Region"));
            if has_table {
                variables.insert("TABLE".to_string(), Value::reference(TABLE_PARAMETER));
            }

            document.add_resource(
                Resource::new(spec.logical_id(), "AWS::Lambda::Function")
                    .property(
                        "FunctionName",
                        Value::sub(format!("${{EnvironmentName}}-{}", spec.name.replace('_', "-"))),
                    )
                    .property(
                        "Code",
                        Value::map([
                            ("S3Bucket", Value::reference("S3Bucket")),
                            (
                                "S3Key",
                                Value::sub(format!(
                                    "${{S3Prefix}}/${{LambdaFunctionsVersion}}/{}.zip",
                                    spec.name
                                )),
                            ),
                        ]),
                    )
                    .property("Handler", spec.handler.as_str())
                    .property("Runtime", spec.runtime.as_str())
                    .property("Role", Value::get_att("LambdaRole", "Arn"))
                    .property("Timeout", spec.timeout)
                    .property("MemorySize", spec.memory)
                    .property("Environment", Value::map([("Variables", Value::Map(variables))])),
            )?;
            document.add_output(Output::new(
                spec.output_name(),
                Value::get_att(spec.logical_id(), "Arn"),
            ))?;
        }

        Ok(Expansion::new(document))
    }
}

fn execution_role(specs: &[FunctionSpec], has_table: bool) -> Resource {
    let mut statements = Vec::new();
    if has_table {
        statements.push(allow(
            [
                "dynamodb:GetItem",
                "dynamodb:PutItem",
                "dynamodb:UpdateItem",
                "dynamodb:Query",
                "dynamodb:Scan",
            ],
            Value::sub(format!(
                "arn:aws:dynamodb:${{AWS::Region}}:${{AWS::AccountId}}:table/${{{TABLE_PARAMETER}}}"
            )),
        ));
    }
    if specs.iter().any(|s| s.manages_s3_notifications) {
        statements.push(allow(
            [
                "s3:GetBucketNotification",
                "s3:PutBucketNotification",
                "lambda:AddPermission",
                "lambda:RemovePermission",
            ],
            Value::from("*"),
        ));
    }

    let mut role = Resource::new("LambdaRole", "AWS::IAM::Role")
        .property(
            "AssumeRolePolicyDocument",
            policy_document(vec![Value::map([
                ("Effect", Value::from("Allow")),
                (
                    "Principal",
                    Value::map([("Service", Value::list(["lambda.amazonaws.com"]))]),
                ),
                ("Action", Value::list(["sts:AssumeRole"])),
            ])]),
        )
        .property("ManagedPolicyArns", Value::list([BASIC_EXECUTION_POLICY]));

    if !statements.is_empty() {
        role = role.property(
            "Policies",
            Value::list([Value::map([
                ("PolicyName", Value::from("function-access")),
                ("PolicyDocument", policy_document(statements)),
            ])]),
        );
    }
    role
}

fn policy_document(statements: Vec<Value>) -> Value {
    Value::map([
        ("Version", Value::from(POLICY_VERSION)),
        ("Statement", Value::List(statements)),
    ])
}

fn allow<const N: usize>(actions: [&str; N], resource: Value) -> Value {
    Value::map([
        ("Effect", Value::from("Allow")),
        ("Action", Value::list(actions)),
        ("Resource", resource),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_functions_are_get_and_put() {
        let specs = function_specs(&TemplateConfig::new()).unwrap();
        let ids: Vec<_> = specs.iter().map(FunctionSpec::logical_id).collect();
        assert_eq!(ids, vec!["GetAmiFunction", "PutAmiFunction"]);
        assert_eq!(specs[0].output_name(), "GetAmiArn");
    }

    #[test]
    fn function_settings_override_defaults() {
        let config = TemplateConfig::new().with(
            "functions",
            Value::map([(
                "s3_events",
                Value::map([
                    ("timeout", Value::from(60)),
                    ("manages_s3_notifications", Value::from(true)),
                ]),
            )]),
        );
        let specs = function_specs(&config).unwrap();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].timeout, 60);
        assert_eq!(specs[0].memory, DEFAULT_MEMORY_MB);
        assert!(specs[0].manages_s3_notifications);
    }

    #[test]
    fn clashing_function_names_are_rejected() {
        let config = TemplateConfig::new().with(
            "functions",
            Value::map([("get_ami", Value::Null), ("get-ami", Value::Null)]),
        );
        assert!(matches!(
            function_specs(&config),
            Err(TemplateError::InvalidConfig { ref key, .. }) if key == "functions.get-ami"
        ));
    }
}
