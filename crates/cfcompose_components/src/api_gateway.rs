//! The `api-gateway-v2` template: an HTTP API fronting one Lambda function.
//!
//! Produces the API, a `$default` auto-deploying stage with JSON access logs,
//! a proxy integration to `GetAmiFunctionArn` and a single route.
//!
//! Config:
//! - `api_name` (string, default `amis`)
//! - `route_key` (string, default `GET /amis`)
//! - `log_group_name` (string, default `http-gateway-amis`)
//! - `log_retention_days` (integer, default 7)
//!
//! Outputs `ApiUrl`, exported as `${EnvironmentName}-ApiUrl`.

use cfcompose_model::{
    Expansion, ExpansionContext, Output, Parameter, Resource, Template, TemplateConfig,
    TemplateDocument, TemplateError, Value,
};

use crate::common::{environment_name, environment_type};

/// Template name.
pub const NAME: &str = "api-gateway-v2";

/// Parameter carrying the integration target.
pub const FUNCTION_ARN_PARAMETER: &str = "GetAmiFunctionArn";

const DEFAULT_API_NAME: &str = "amis";
const DEFAULT_ROUTE_KEY: &str = "GET /amis";
const DEFAULT_LOG_GROUP_NAME: &str = "http-gateway-amis";
const DEFAULT_LOG_RETENTION_DAYS: u64 = 7;
const INTEGRATION_TIMEOUT_MILLIS: u32 = 30_000;

/// Access log line written by the stage.
const ACCESS_LOG_FORMAT: &str = r#"{"requestId":"$context.requestId", "ip": "$context.identity.sourceIp", "requestTime":"$context.requestTime", "httpMethod":"$context.httpMethod","routeKey":"$context.routeKey", "status":"$context.status","protocol":"$context.protocol", "responseLength":"$context.responseLength" }"#;

/// HTTP API with a Lambda proxy integration.
#[derive(Debug, Default, Clone, Copy)]
pub struct ApiGatewayV2Template;

struct ApiSettings<'a> {
    api_name: &'a str,
    route_key: &'a str,
    log_group_name: &'a str,
    log_retention_days: u64,
}

impl<'a> ApiSettings<'a> {
    fn from_config(config: &'a TemplateConfig) -> Result<Self, TemplateError> {
        Ok(Self {
            api_name: config.str(NAME, "api_name")?.unwrap_or(DEFAULT_API_NAME),
            route_key: config.str(NAME, "route_key")?.unwrap_or(DEFAULT_ROUTE_KEY),
            log_group_name: config
                .str(NAME, "log_group_name")?
                .unwrap_or(DEFAULT_LOG_GROUP_NAME),
            log_retention_days: config
                .number(NAME, "log_retention_days")?
                .unwrap_or(DEFAULT_LOG_RETENTION_DAYS),
        })
    }
}

impl Template for ApiGatewayV2Template {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> String {
        "api-gateway-v2 - HTTP API with Lambda proxy integration".to_string()
    }

    fn parameters(&self, config: &TemplateConfig) -> Result<Vec<Parameter>, TemplateError> {
        ApiSettings::from_config(config)?;
        Ok(vec![
            environment_name(),
            environment_type(),
            Parameter::new(FUNCTION_ARN_PARAMETER),
        ])
    }

    fn expand(&self, ctx: &ExpansionContext<'_>) -> Result<Expansion, TemplateError> {
        let settings = ApiSettings::from_config(ctx.config)?;
        ctx.require(NAME, FUNCTION_ARN_PARAMETER)?;

        let api_id = || Value::reference("Api");
        let mut document = TemplateDocument::new();

        document.add_resource(
            Resource::new("Api", "AWS::ApiGatewayV2::Api")
                .property("ProtocolType", "HTTP")
                .property("Name", settings.api_name)
                .property("ApiKeySelectionExpression", "$request.header.x-api-key")
                .property("RouteSelectionExpression", "$request.method $request.path")
                .property(
                    "CorsConfiguration",
                    Value::map([
                        ("AllowCredentials", Value::from(false)),
                        ("AllowMethods", Value::list(["GET"])),
                        ("AllowOrigins", Value::list(["*"])),
                        ("MaxAge", Value::from(0)),
                    ]),
                ),
        )?;

        document.add_resource(
            Resource::new("Deployment", "AWS::ApiGatewayV2::Deployment")
                .depends_on("Route")
                .property("ApiId", api_id()),
        )?;

        document.add_resource(
            Resource::new("Stage", "AWS::ApiGatewayV2::Stage")
                .property(
                    "AccessLogSettings",
                    Value::map([
                        ("DestinationArn", Value::get_att("LogGroup", "Arn")),
                        ("Format", Value::from(ACCESS_LOG_FORMAT)),
                    ]),
                )
                .property("ApiId", api_id())
                .property("AutoDeploy", true)
                .property(
                    "DefaultRouteSettings",
                    Value::map([("DetailedMetricsEnabled", false)]),
                )
                .property("DeploymentId", Value::reference("Deployment"))
                .property("RouteSettings", Value::empty_map())
                .property("StageName", "$default")
                .property("StageVariables", Value::empty_map())
                .property("Tags", Value::empty_map()),
        )?;

        document.add_resource(
            Resource::new("Integration", "AWS::ApiGatewayV2::Integration")
                .property("ApiId", api_id())
                .property("ConnectionType", "INTERNET")
                .property("IntegrationType", "AWS_PROXY")
                .property("IntegrationUri", Value::reference(FUNCTION_ARN_PARAMETER))
                .property("IntegrationMethod", "POST")
                .property("PayloadFormatVersion", "2.0")
                .property("TimeoutInMillis", INTEGRATION_TIMEOUT_MILLIS),
        )?;

        document.add_resource(
            Resource::new("Route", "AWS::ApiGatewayV2::Route")
                .property("ApiId", api_id())
                .property("ApiKeyRequired", false)
                .property("AuthorizationType", "NONE")
                .property("RouteKey", settings.route_key)
                .property("Target", Value::sub("integrations/${Integration}")),
        )?;

        document.add_resource(
            Resource::new("LogGroup", "AWS::Logs::LogGroup")
                .property("RetentionInDays", settings.log_retention_days)
                .property("LogGroupName", settings.log_group_name),
        )?;

        document.add_output(
            Output::new(
                "ApiUrl",
                Value::sub("https://${Api}.execute-api.${AWS::Region}.amazonaws.com"),
            )
            .export(Value::sub("${EnvironmentName}-ApiUrl")),
        )?;

        Ok(Expansion::new(document))
    }
}
