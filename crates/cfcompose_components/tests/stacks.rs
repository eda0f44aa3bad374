//! Builds of the shipped stacks against the built-in templates.
//!
//! These tests check:
//! - Expansion order and root wiring of `amis` and its table-less variant
//! - Environment-qualified export names and cross-stack collisions
//! - Allowed-value enforcement on `EnvironmentType`
//! - Conditional notification resources
//! - Deterministic rendering
//! - Reusing a shipped stack as a nested composition


use cfcompose_components::TemplateRegistry;
use cfcompose_components::common::environment_name;
use cfcompose_components::stacks::{self, amis, amis_without_table, s3_events};
use cfcompose_graph::composition::{Component, Composition};
use cfcompose_graph::export::ExportLedger;
use cfcompose_graph::resolve::ResolveError;
use cfcompose_graph::{ComposeError, Composer};
use cfcompose_model::{Resource, TemplateConfig, Value};
use serde_json::json;
use test_utils::{build, component_json, exports, overrides};

// ─────────────────────────────────────────────────────────────────────────────
// amis
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn amis_expands_table_before_functions_before_api() {
    let stack = build(&amis(), &[]).unwrap();
    assert_eq!(stack.order(), ["dynamodb", "lambda", "httpapi"]);

    let variant = build(&amis_without_table(), &[]).unwrap();
    assert_eq!(variant.order(), ["lambda", "httpapi"]);
}

#[test]
fn lambda_receives_table_name_only_with_table() {
    let stack = build(&amis(), &[]).unwrap();
    let root = stack.root().to_json();
    assert_eq!(
        root["Resources"]["lambda"]["Properties"]["Parameters"],
        json!({
            "EnvironmentName": { "Ref": "EnvironmentName" },
            "EnvironmentType": { "Ref": "EnvironmentType" },
            "LambdaFunctionsVersion": { "Ref": "LambdaFunctionsVersion" },
            "S3Bucket": { "Ref": "S3Bucket" },
            "S3Prefix": { "Ref": "S3Prefix" },
            "DynamoDbTableName": { "Fn::GetAtt": ["dynamodb", "Outputs.TableName"] }
        })
    );
    let lambda = component_json(&stack, "lambda");
    assert!(lambda["Parameters"].get("DynamoDbTableName").is_some());
    assert_eq!(
        lambda["Resources"]["GetAmiFunction"]["Properties"]["Environment"]["Variables"]["TABLE"],
        json!({ "Ref": "DynamoDbTableName" })
    );

    let variant = build(&amis_without_table(), &[]).unwrap();
    let root = variant.root().to_json();
    assert!(
        root["Resources"]["lambda"]["Properties"]["Parameters"]
            .get("DynamoDbTableName")
            .is_none()
    );
    let lambda = component_json(&variant, "lambda");
    assert!(lambda["Parameters"].get("DynamoDbTableName").is_none());
    assert!(
        lambda["Resources"]["GetAmiFunction"]["Properties"]["Environment"]["Variables"]
            .get("TABLE")
            .is_none()
    );
    assert!(lambda["Resources"]["LambdaRole"]["Properties"].get("Policies").is_none());
}

#[test]
fn function_code_points_at_versioned_artifact() {
    let stack = build(&amis(), &[]).unwrap();
    let lambda = component_json(&stack, "lambda");
    assert_eq!(
        lambda["Resources"]["PutAmiFunction"]["Properties"]["Code"],
        json!({
            "S3Bucket": { "Ref": "S3Bucket" },
            "S3Key": { "Fn::Sub": "${S3Prefix}/${LambdaFunctionsVersion}/put_ami.zip" }
        })
    );
    assert_eq!(
        lambda["Outputs"]["GetAmiArn"]["Value"],
        json!({ "Fn::GetAtt": ["GetAmiFunction", "Arn"] })
    );
}

#[test]
fn api_integrates_with_get_ami_function() {
    let stack = build(&amis(), &[]).unwrap();
    let root = stack.root().to_json();
    assert_eq!(
        root["Resources"]["httpapi"]["Properties"]["Parameters"]["GetAmiFunctionArn"],
        json!({ "Fn::GetAtt": ["lambda", "Outputs.GetAmiArn"] })
    );

    let api = component_json(&stack, "httpapi");
    let resources: Vec<_> = api["Resources"].as_object().unwrap().keys().cloned().collect();
    assert_eq!(
        resources,
        vec!["Api", "Deployment", "Stage", "Integration", "Route", "LogGroup"]
    );
    assert_eq!(api["Resources"]["Deployment"]["DependsOn"], "Route");
    assert_eq!(api["Resources"]["Route"]["Properties"]["RouteKey"], "GET /amis");
    assert_eq!(api["Resources"]["LogGroup"]["Properties"]["RetentionInDays"], 7);
}

// ─────────────────────────────────────────────────────────────────────────────
// Exports
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn export_names_follow_environment_name() {
    let stack = build(&amis(), &[]).unwrap();
    assert_eq!(
        exports(&stack),
        vec![
            ("dev-DynamoDb-TableName".to_string(), "dynamodb".to_string()),
            ("dev-ApiUrl".to_string(), "httpapi".to_string()),
        ]
    );

    let prod = build(&amis(), &[("EnvironmentName", "prod")]).unwrap();
    assert_eq!(prod.exports()[0].name, "prod-DynamoDb-TableName");
}

#[test]
fn variants_in_one_environment_collide_on_api_url() {
    let full = build(&amis(), &[]).unwrap();
    let lean = build(&amis_without_table(), &[]).unwrap();

    let mut ledger = ExportLedger::new();
    ledger.register_all(full.exports()).unwrap();
    let collision = ledger.register_all(lean.exports()).unwrap_err();
    assert_eq!(collision.name(), "dev-ApiUrl");
    assert_eq!(collision.existing.stack, "amis");
    assert_eq!(collision.conflicting.stack, "amis-without-table");
    assert_eq!(ledger.len(), 2);
}

#[test]
fn variants_in_separate_environments_coexist() {
    let full = build(&amis(), &[("EnvironmentName", "dev")]).unwrap();
    let lean = build(&amis_without_table(), &[("EnvironmentName", "qa")]).unwrap();

    let mut ledger = ExportLedger::new();
    ledger.register_all(full.exports()).unwrap();
    ledger.register_all(lean.exports()).unwrap();
    assert!(ledger.get("qa-ApiUrl").is_some());
}

// ─────────────────────────────────────────────────────────────────────────────
// Parameters
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn staging_environment_type_is_rejected() {
    let err = build(&amis(), &[("EnvironmentType", "staging")]).unwrap_err();
    assert!(matches!(
        err,
        ComposeError::Resolve(ResolveError::DisallowedValue { ref parameter, .. })
            if parameter == "EnvironmentType"
    ));
    assert!(err.to_string().contains("staging"));
}

#[test]
fn production_environment_type_is_accepted() {
    let stack = build(&amis(), &[("EnvironmentType", "production")]).unwrap();
    assert_eq!(
        stack.globals().get("EnvironmentType"),
        Some(&Value::from("production"))
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// s3-events
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn one_resource_per_enabled_notification() {
    let stack = build(&s3_events(), &[]).unwrap();
    assert_eq!(stack.order(), ["lambda", "events"]);

    let events = &stack.component("events").unwrap().document;
    let notifications: Vec<_> = events
        .resources_of_type("Custom::S3LambdaNotification")
        .map(Resource::logical_id)
        .collect();
    assert_eq!(notifications, vec!["AmiUploadsS3LambdaNotification"]);
    assert!(events.outputs().is_empty());

    let json = component_json(&stack, "events");
    assert_eq!(
        json["Resources"]["AmiUploadsS3LambdaNotification"]["Properties"],
        json!({
            "ServiceToken": { "Ref": "S3EventsFunctionArn" },
            "Region": { "Ref": "AWS::Region" },
            "AccountId": { "Ref": "AWS::AccountId" },
            "StackName": { "Ref": "AWS::StackName" },
            "LambdaNotification": {
                "Bucket": { "Fn::Sub": "${EnvironmentName}-ami-uploads" },
                "Function": { "Fn::Sub": "${EnvironmentName}-put-ami" },
                "Prefix": "amis/",
                "Suffix": ".json"
            }
        })
    );
}

#[test]
fn disabling_every_notification_leaves_no_resources() {
    let mut composition = s3_events();
    if let Some(events) = composition.component_mut("events") {
        events.config_mut().merge(
            &TemplateConfig::new().with(
                "notifications",
                Value::map([("ami_uploads", Value::map([("enabled", false)]))]),
            ),
        );
    }

    let stack = build(&composition, &[]).unwrap();
    assert!(stack.component("events").unwrap().document.resources().is_empty());
}

#[test]
fn notification_manager_gets_bucket_permissions() {
    let stack = build(&s3_events(), &[]).unwrap();
    let lambda = component_json(&stack, "lambda");
    let statements = &lambda["Resources"]["LambdaRole"]["Properties"]["Policies"][0]
        ["PolicyDocument"]["Statement"];
    assert_eq!(statements.as_array().unwrap().len(), 1);
    assert_eq!(statements[0]["Action"][0], "s3:GetBucketNotification");

    let root = stack.root().to_json();
    assert_eq!(
        root["Resources"]["events"]["Properties"]["Parameters"]["S3EventsFunctionArn"],
        json!({ "Fn::GetAtt": ["lambda", "Outputs.S3EventsArn"] })
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Determinism and reuse
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn every_stack_renders_identically_twice() {
    for name in stacks::names() {
        let composition = stacks::stack(name).unwrap();
        let first = build(&composition, &[]).unwrap().render_files().unwrap();
        let second = build(&composition, &[]).unwrap().render_files().unwrap();
        assert_eq!(first, second, "{name} rendered differently");
    }
}

#[test]
fn rendered_file_names_follow_components() {
    let files = build(&amis(), &[]).unwrap().render_files().unwrap();
    let names: Vec<_> = files.keys().map(String::as_str).collect();
    assert_eq!(
        names,
        vec![
            "amis.compiled.json",
            "dynamodb.compiled.json",
            "lambda.compiled.json",
            "httpapi.compiled.json"
        ]
    );
}

#[test]
fn shipped_stack_nests_with_config_overlay() {
    let mut registry = TemplateRegistry::with_builtin();
    registry.register_composition(amis());

    let mut platform = Composition::new("platform");
    platform.add_parameter(environment_name()).add_component(Component::new("catalogue", stacks::AMIS).with_config_value(
        "dynamodb",
        Value::map([("table_name", "images")]),
    ));

    let stack = Composer::new(&registry)
        .build(&platform, &overrides(&[("EnvironmentName", "qa")]))
        .unwrap();

    let catalogue = stack.component("catalogue").unwrap();
    let children: Vec<_> = catalogue.children.keys().map(String::as_str).collect();
    assert_eq!(children, vec!["dynamodb", "lambda", "httpapi"]);
    assert_eq!(
        catalogue.children["dynamodb"].to_json()["Resources"]["Table"]["Properties"]["TableName"],
        "images"
    );
    assert_eq!(
        exports(&stack),
        vec![
            ("qa-DynamoDb-TableName".to_string(), "catalogue.dynamodb".to_string()),
            ("qa-ApiUrl".to_string(), "catalogue.httpapi".to_string()),
        ]
    );
}
