//! The stack catalogue.
//!
//! Each function returns a fresh [`Composition`] wired from the leaf
//! templates in [`TemplateRegistry::with_builtin`](crate::registry::TemplateRegistry::with_builtin).
//! [`CATALOGUE`] lists them by name for the command line.

use cfcompose_graph::{Binding, Component, Composition, cfout};
use cfcompose_model::{Parameter, Value};

use crate::common::{environment_name, environment_type};
use crate::{api_gateway, dynamodb, lambda, s3_events};

/// Name of the full AMI-catalogue stack.
pub const AMIS: &str = "amis";

/// Name of the AMI-catalogue stack without its table.
pub const AMIS_WITHOUT_TABLE: &str = "amis-without-table";

/// Name of the bucket-notification stack.
pub const S3_EVENTS: &str = "s3-events";

/// Every shipped stack, by name.
pub const CATALOGUE: [(&str, fn() -> Composition); 3] = [
    (AMIS, amis),
    (AMIS_WITHOUT_TABLE, amis_without_table),
    (S3_EVENTS, s3_events),
];

/// Returns the shipped stack named `name`.
#[must_use]
pub fn stack(name: &str) -> Option<Composition> {
    CATALOGUE
        .iter()
        .find(|(candidate, _)| *candidate == name)
        .map(|(_, build)| build())
}

/// Returns the names of the shipped stacks.
#[must_use]
pub fn names() -> Vec<&'static str> {
    CATALOGUE.iter().map(|(name, _)| *name).collect()
}

/// The AMI catalogue: a table, the functions reading and writing it, and an
/// HTTP API in front of `get_ami`.
///
/// Expands in the order `dynamodb`, `lambda`, `httpapi`.
#[must_use]
pub fn amis() -> Composition {
    let mut composition = amis_base(AMIS);
    composition
        .add_component(Component::new("dynamodb", dynamodb::NAME))
        .add_component(
            artifact_bound(Component::new("lambda", lambda::NAME))
                .bind(lambda::TABLE_PARAMETER, cfout("dynamodb", "TableName")),
        )
        .add_component(http_api());
    composition
}

/// The AMI catalogue without the table; the functions get no `TABLE`
/// variable.
#[must_use]
pub fn amis_without_table() -> Composition {
    let mut composition = amis_base(AMIS_WITHOUT_TABLE);
    composition
        .add_component(artifact_bound(Component::new("lambda", lambda::NAME)))
        .add_component(http_api());
    composition
}

/// A notification-managing function plus the notifications it installs.
#[must_use]
pub fn s3_events() -> Composition {
    let mut composition = Composition::new(S3_EVENTS);
    composition.with_description("Bucket notifications for the AMI catalogue");
    add_artifact_parameters(&mut composition);

    let functions = Value::map([
        ("put_ami", Value::Null),
        (
            "s3_events",
            Value::map([("manages_s3_notifications", true)]),
        ),
    ]);
    let notifications = Value::map([
        (
            "ami_uploads",
            Value::map([
                ("enabled", Value::from(true)),
                ("bucket", Value::from("${EnvironmentName}-ami-uploads")),
                ("function", Value::from("${EnvironmentName}-put-ami")),
                ("prefix", Value::from("amis/")),
                ("suffix", Value::from(".json")),
            ]),
        ),
        (
            "image_builds",
            Value::map([
                ("enabled", Value::from(false)),
                ("bucket", Value::from("${EnvironmentName}-image-builds")),
                ("function", Value::from("${EnvironmentName}-put-ami")),
            ]),
        ),
    ]);

    composition
        .add_component(
            artifact_bound(Component::new("lambda", lambda::NAME))
                .with_config_value("functions", functions),
        )
        .add_component(
            Component::new("events", s3_events::NAME)
                .bind(
                    s3_events::SERVICE_TOKEN_PARAMETER,
                    cfout("lambda", "S3EventsArn"),
                )
                .with_config_value("notifications", notifications),
        );
    composition
}

fn amis_base(name: &str) -> Composition {
    let mut composition = Composition::new(name);
    composition.with_description("AMI catalogue: table, functions and HTTP API");
    add_artifact_parameters(&mut composition);
    composition
}

fn add_artifact_parameters(composition: &mut Composition) {
    composition
        .add_parameter(environment_name())
        .add_parameter(environment_type())
        .add_parameter(
            Parameter::new("LambdaFunctionsVersion")
                .with_default("test")
                .with_description("Artifact version of the function bundles"),
        )
        .add_parameter(
            Parameter::new("S3Bucket")
                .with_default("ztlewis-builds")
                .with_description("Bucket holding the function bundles"),
        )
        .add_parameter(
            Parameter::new("S3Prefix")
                .with_default("lambdas")
                .with_description("Key prefix of the function bundles"),
        );
}

fn artifact_bound(component: Component) -> Component {
    ["LambdaFunctionsVersion", "S3Bucket", "S3Prefix"]
        .into_iter()
        .fold(component, |component, name| {
            component.bind(name, Binding::parameter(name))
        })
}

fn http_api() -> Component {
    Component::new("httpapi", api_gateway::NAME).bind(
        api_gateway::FUNCTION_ARN_PARAMETER,
        cfout("lambda", "GetAmiArn"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalogue_names_match_compositions() {
        for name in names() {
            let composition = stack(name).unwrap();
            assert_eq!(composition.name(), name);
        }
        assert!(stack("unknown").is_none());
    }

    #[test]
    fn variant_drops_table_binding() {
        let full = amis();
        let lean = amis_without_table();

        let bound = |composition: &Composition| {
            composition
                .component("lambda")
                .unwrap()
                .bindings()
                .contains_key(lambda::TABLE_PARAMETER)
        };
        assert!(bound(&full));
        assert!(!bound(&lean));
        assert!(lean.component("dynamodb").is_none());
    }
}
