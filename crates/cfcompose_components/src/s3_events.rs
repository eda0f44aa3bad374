//! The `s3_events` template: bucket-to-Lambda notifications via a custom
//! resource.
//!
//! Config `notifications` maps a notification name to an entry:
//!
//! | key | type | |
//! |-----|------|---|
//! | `enabled` | bool | entries not explicitly enabled are skipped |
//! | `bucket` | string | `Fn::Sub` template naming the bucket |
//! | `function` | string | `Fn::Sub` template naming the function |
//! | `prefix` | string | optional key prefix filter |
//! | `suffix` | string | optional key suffix filter |
//!
//! Each enabled entry becomes one `Custom::S3LambdaNotification` handled by
//! the function behind `S3EventsFunctionArn`.

use cfcompose_model::{
    Expansion, ExpansionContext, Parameter, Resource, Template, TemplateConfig, TemplateDocument,
    TemplateError, Value,
};

use crate::common::{environment_name, environment_type, pascal_case};

/// Template name.
pub const NAME: &str = "s3_events";

/// Parameter carrying the custom resource's service token.
pub const SERVICE_TOKEN_PARAMETER: &str = "S3EventsFunctionArn";

/// Resource type of each notification.
pub const NOTIFICATION_TYPE: &str = "Custom::S3LambdaNotification";

/// One enabled notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Name from the config.
    pub name: String,
    /// `Fn::Sub` template naming the bucket.
    pub bucket: String,
    /// `Fn::Sub` template naming the function.
    pub function: String,
    /// Key prefix filter.
    pub prefix: String,
    /// Key suffix filter.
    pub suffix: String,
}

impl Notification {
    /// Logical id of the custom resource (e.g. `AmiUploadsS3LambdaNotification`).
    #[must_use]
    pub fn logical_id(&self) -> String {
        format!("{}S3LambdaNotification", pascal_case(&self.name))
    }
}

/// Reads the enabled notifications from the `notifications` config key.
///
/// # Errors
///
/// Fails on a malformed entry, a missing `bucket` or `function` on an enabled
/// entry, or two names mapping to the same logical id.
pub fn enabled_notifications(config: &TemplateConfig) -> Result<Vec<Notification>, TemplateError> {
    let Some(entries) = config.map(NAME, "notifications")? else {
        return Ok(Vec::new());
    };

    let mut notifications: Vec<Notification> = Vec::new();
    for (name, entry) in entries {
        let key = format!("notifications.{name}");
        let Value::Map(entry) = entry else {
            return Err(TemplateError::invalid_config(
                NAME,
                key,
                format!("expected a map, found {entry}"),
            ));
        };
        let entry = TemplateConfig::from(entry.clone());

        let enabled = entry
            .bool(NAME, "enabled")
            .map_err(|e| nest_key(e, &key))?
            .unwrap_or(false);
        if !enabled {
            tracing::debug!(notification = %name, "skipping disabled notification");
            continue;
        }
        if pascal_case(name).is_empty() {
            return Err(TemplateError::invalid_config(
                NAME,
                key,
                "name has no alphanumeric characters",
            ));
        }

        let notification = Notification {
            name: name.clone(),
            bucket: required_field(&entry, &key, "bucket")?,
            function: required_field(&entry, &key, "function")?,
            prefix: optional_field(&entry, &key, "prefix")?,
            suffix: optional_field(&entry, &key, "suffix")?,
        };
        if let Some(existing) = notifications
            .iter()
            .find(|n| n.logical_id() == notification.logical_id())
        {
            return Err(TemplateError::invalid_config(
                NAME,
                key,
                format!("clashes with notification '{}'", existing.name),
            ));
        }
        notifications.push(notification);
    }
    Ok(notifications)
}

fn optional_field(entry: &TemplateConfig, key: &str, field: &str) -> Result<String, TemplateError> {
    let value = entry.str(NAME, field).map_err(|e| nest_key(e, key))?;
    Ok(value.unwrap_or_default().to_string())
}

fn required_field(entry: &TemplateConfig, key: &str, field: &str) -> Result<String, TemplateError> {
    match entry.str(NAME, field).map_err(|e| nest_key(e, key))? {
        Some(value) => Ok(value.to_string()),
        None => Err(TemplateError::invalid_config(
            NAME,
            format!("{key}.{field}"),
            "is required",
        )),
    }
}

/// Prefixes the key of an entry-level config error with the entry's path.
fn nest_key(error: TemplateError, prefix: &str) -> TemplateError {
    match error {
        TemplateError::InvalidConfig {
            template,
            key,
            reason,
        } => TemplateError::InvalidConfig {
            template,
            key: format!("{prefix}.{key}"),
            reason,
        },
        other => other,
    }
}

/// Custom resources wiring bucket events to a Lambda function.
#[derive(Debug, Default, Clone, Copy)]
pub struct S3EventsTemplate;

impl Template for S3EventsTemplate {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> String {
        "s3_events - bucket notifications for Lambda functions".to_string()
    }

    fn parameters(&self, config: &TemplateConfig) -> Result<Vec<Parameter>, TemplateError> {
        enabled_notifications(config)?;
        Ok(vec![
            environment_name(),
            environment_type(),
            Parameter::new(SERVICE_TOKEN_PARAMETER),
        ])
    }

    fn expand(&self, ctx: &ExpansionContext<'_>) -> Result<Expansion, TemplateError> {
        let notifications = enabled_notifications(ctx.config)?;
        ctx.require(NAME, SERVICE_TOKEN_PARAMETER)?;

        let mut document = TemplateDocument::new();
        for notification in &notifications {
            document.add_resource(
                Resource::new(notification.logical_id(), NOTIFICATION_TYPE)
                    .property("ServiceToken", Value::reference(SERVICE_TOKEN_PARAMETER))
                    .property("Region", Value::reference("AWS::Region"))
                    .property("AccountId", Value::reference("AWS::AccountId"))
                    .property("StackName", Value::reference("AWS::StackName"))
                    .property(
                        "LambdaNotification",
                        Value::map([
                            ("Bucket", Value::sub(notification.bucket.as_str())),
                            ("Function", Value::sub(notification.function.as_str())),
                            ("Prefix", Value::from(notification.prefix.as_str())),
                            ("Suffix", Value::from(notification.suffix.as_str())),
                        ]),
                    ),
            )?;
        }

        Ok(Expansion::new(document))
    }
}
