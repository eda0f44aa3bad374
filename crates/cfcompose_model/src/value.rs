//! Template values.
//!
//! [`Value`] is the tagged union used for every property bag in a template:
//! plain JSON data plus the CloudFormation intrinsics a component may use
//! (`Ref`, `Fn::GetAtt`, `Fn::Sub`, `Fn::Join`). Intrinsics nest arbitrarily
//! inside lists and maps.
//!
//! Serialization to the target format goes through [`Value::to_json`]; the
//! scope check performed by [`TemplateDocument::validate`](crate::TemplateDocument::validate)
//! makes sure every reference is resolvable before anything is rendered.

use core::fmt;

use indexmap::IndexMap;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ModelError;

/// Pseudo parameters provided by CloudFormation in every stack.
pub const PSEUDO_PARAMETERS: &[&str] = &[
    "AWS::AccountId",
    "AWS::NotificationARNs",
    "AWS::NoValue",
    "AWS::Partition",
    "AWS::Region",
    "AWS::StackId",
    "AWS::StackName",
    "AWS::URLSuffix",
];

/// Returns true if `name` is a CloudFormation pseudo parameter.
#[must_use]
pub fn is_pseudo_parameter(name: &str) -> bool {
    PSEUDO_PARAMETERS.contains(&name)
}

/// A template value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// JSON `null`.
    Null,
    /// A boolean.
    Bool(bool),
    /// A number.
    Number(serde_json::Number),
    /// A literal string.
    String(String),
    /// An ordered list.
    List(Vec<Value>),
    /// An insertion-ordered map.
    Map(IndexMap<String, Value>),
    /// `{"Ref": name}`: a parameter, resource or pseudo parameter.
    Ref(String),
    /// `{"Fn::GetAtt": [resource, attribute]}`.
    GetAtt {
        /// Logical id of the resource.
        resource: String,
        /// Attribute name (e.g. `Arn`, `Outputs.TableName`).
        attribute: String,
    },
    /// `{"Fn::Sub": template}` with `${Name}` placeholders.
    Sub(String),
    /// `{"Fn::Join": [delimiter, values]}`.
    Join {
        /// Separator placed between values.
        delimiter: String,
        /// Values to join.
        values: Vec<Value>,
    },
}

impl Value {
    /// Creates a `Ref` to a parameter, resource or pseudo parameter.
    pub fn reference(name: impl Into<String>) -> Self {
        Self::Ref(name.into())
    }

    /// Creates an `Fn::GetAtt`.
    pub fn get_att(resource: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self::GetAtt {
            resource: resource.into(),
            attribute: attribute.into(),
        }
    }

    /// Creates an `Fn::Sub`.
    pub fn sub(template: impl Into<String>) -> Self {
        Self::Sub(template.into())
    }

    /// Creates an `Fn::Join`.
    pub fn join(delimiter: impl Into<String>, values: impl IntoIterator<Item = Value>) -> Self {
        Self::Join {
            delimiter: delimiter.into(),
            values: values.into_iter().collect(),
        }
    }

    /// Builds a map from key/value pairs, keeping their order.
    pub fn map<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        Self::Map(
            entries
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }

    /// Builds a list.
    pub fn list<V: Into<Value>>(items: impl IntoIterator<Item = V>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }

    /// An empty map.
    #[must_use]
    pub fn empty_map() -> Self {
        Self::Map(IndexMap::new())
    }

    /// Returns the string if this is a literal string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the boolean if this is a literal boolean.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the entries if this is a map.
    #[must_use]
    pub fn as_map(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Returns the items if this is a list.
    #[must_use]
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Returns true if the value contains no intrinsic function at any depth.
    #[must_use]
    pub fn is_static(&self) -> bool {
        match self {
            Self::Null | Self::Bool(_) | Self::Number(_) | Self::String(_) => true,
            Self::List(items) => items.iter().all(Value::is_static),
            Self::Map(map) => map.values().all(Value::is_static),
            Self::Ref(_) | Self::GetAtt { .. } | Self::Sub(_) | Self::Join { .. } => false,
        }
    }

    /// Converts to JSON in CloudFormation's intrinsic-function notation.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::json;

        match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Number(n) => serde_json::Value::Number(n.clone()),
            Self::String(s) => serde_json::Value::String(s.clone()),
            Self::List(items) => serde_json::Value::Array(items.iter().map(Value::to_json).collect()),
            Self::Map(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(key, value)| (key.clone(), value.to_json()))
                    .collect(),
            ),
            Self::Ref(name) => json!({ "Ref": name }),
            Self::GetAtt {
                resource,
                attribute,
            } => json!({ "Fn::GetAtt": [resource, attribute] }),
            Self::Sub(template) => json!({ "Fn::Sub": template }),
            Self::Join { delimiter, values } => {
                let values: Vec<_> = values.iter().map(Value::to_json).collect();
                json!({ "Fn::Join": [delimiter, values] })
            }
        }
    }

    /// Parses JSON, recognising intrinsic-function objects.
    ///
    /// A single-key object whose key starts with `Fn::` must be one of the
    /// supported intrinsics; anything else under that prefix is rejected.
    pub fn from_json(json: serde_json::Value) -> Result<Self, ModelError> {
        match json {
            serde_json::Value::Null => Ok(Self::Null),
            serde_json::Value::Bool(b) => Ok(Self::Bool(b)),
            serde_json::Value::Number(n) => Ok(Self::Number(n)),
            serde_json::Value::String(s) => Ok(Self::String(s)),
            serde_json::Value::Array(items) => items
                .into_iter()
                .map(Value::from_json)
                .collect::<Result<Vec<_>, _>>()
                .map(Self::List),
            serde_json::Value::Object(map) => {
                if map.len() == 1
                    && let Some((key, inner)) = map.iter().next()
                    && (key == "Ref" || key.starts_with("Fn::"))
                {
                    return Self::intrinsic_from_json(key, inner.clone());
                }
                map.into_iter()
                    .map(|(key, value)| Value::from_json(value).map(|v| (key, v)))
                    .collect::<Result<IndexMap<_, _>, _>>()
                    .map(Self::Map)
            }
        }
    }

    fn intrinsic_from_json(key: &str, inner: serde_json::Value) -> Result<Self, ModelError> {
        match (key, inner) {
            ("Ref", serde_json::Value::String(name)) => Ok(Self::Ref(name)),
            ("Fn::Sub", serde_json::Value::String(template)) => Ok(Self::Sub(template)),
            ("Fn::GetAtt", serde_json::Value::String(dotted)) => match dotted.split_once('.') {
                Some((resource, attribute)) => Ok(Self::get_att(resource, attribute)),
                None => Err(ModelError::InvalidValue(format!(
                    "Fn::GetAtt '{dotted}' must have the form Resource.Attribute"
                ))),
            },
            ("Fn::GetAtt", serde_json::Value::Array(parts)) => match parts.as_slice() {
                [serde_json::Value::String(resource), serde_json::Value::String(attribute)] => {
                    Ok(Self::get_att(resource.as_str(), attribute.as_str()))
                }
                _ => Err(ModelError::InvalidValue(
                    "Fn::GetAtt expects [resource, attribute]".to_string(),
                )),
            },
            ("Fn::Join", serde_json::Value::Array(mut parts)) if parts.len() == 2 => {
                let values = parts.pop().map(Value::from_json).transpose()?;
                let delimiter = parts.pop();
                match (delimiter, values) {
                    (Some(serde_json::Value::String(delimiter)), Some(Value::List(values))) => {
                        Ok(Self::Join { delimiter, values })
                    }
                    _ => Err(ModelError::InvalidValue(
                        "Fn::Join expects [delimiter, [values]]".to_string(),
                    )),
                }
            }
            (key, _) => Err(ModelError::InvalidValue(format!(
                "unsupported or malformed intrinsic '{key}'"
            ))),
        }
    }

    /// Renders the value as a plain string, substituting known parameter values.
    ///
    /// `Fn::Sub` placeholders found by `lookup` are replaced; unknown
    /// placeholders are kept verbatim. Literal strings render as themselves and
    /// every other value renders as compact JSON.
    pub fn render_static<F>(&self, lookup: F) -> String
    where
        F: Fn(&str) -> Option<String>,
    {
        match self {
            Self::String(s) => s.clone(),
            Self::Sub(template) => substitute(template, lookup),
            other => other.to_json().to_string(),
        }
    }

    /// Checks that every reference inside the value resolves within `scope`.
    pub fn check_references(
        &self,
        scope: &dyn ReferenceScope,
        location: &str,
    ) -> Result<(), ModelError> {
        match self {
            Self::Null | Self::Bool(_) | Self::Number(_) | Self::String(_) => Ok(()),
            Self::List(items) => {
                for (index, item) in items.iter().enumerate() {
                    item.check_references(scope, &format!("{location}[{index}]"))?;
                }
                Ok(())
            }
            Self::Map(map) => {
                for (key, value) in map {
                    value.check_references(scope, &format!("{location}.{key}"))?;
                }
                Ok(())
            }
            Self::Ref(name) => {
                if scope.resolves(name) {
                    Ok(())
                } else {
                    Err(ModelError::UnresolvedReference {
                        location: location.to_string(),
                        target: name.clone(),
                    })
                }
            }
            Self::GetAtt {
                resource,
                attribute,
            } => {
                if scope.has_resource(resource) {
                    Ok(())
                } else {
                    Err(ModelError::UnknownAttributeSource {
                        location: location.to_string(),
                        resource: resource.clone(),
                        attribute: attribute.clone(),
                    })
                }
            }
            Self::Sub(template) => {
                let placeholders =
                    placeholders(template).map_err(|reason| ModelError::MalformedSubstitution {
                        location: location.to_string(),
                        template: template.clone(),
                        reason,
                    })?;
                for placeholder in placeholders {
                    let resolved = match placeholder.split_once('.') {
                        Some((resource, _)) => scope.has_resource(resource),
                        None => scope.resolves(placeholder),
                    };
                    if !resolved {
                        return Err(ModelError::UnresolvedReference {
                            location: location.to_string(),
                            target: placeholder.to_string(),
                        });
                    }
                }
                Ok(())
            }
            Self::Join { values, .. } => {
                for (index, value) in values.iter().enumerate() {
                    value.check_references(scope, &format!("{location}.Fn::Join[{index}]"))?;
                }
                Ok(())
            }
        }
    }
}

/// Names a value may reference.
pub trait ReferenceScope {
    /// Returns true if a parameter with this name is declared.
    fn has_parameter(&self, name: &str) -> bool;

    /// Returns true if a resource with this logical id is declared.
    fn has_resource(&self, name: &str) -> bool;

    /// Returns true if `Ref name` resolves.
    fn resolves(&self, name: &str) -> bool {
        is_pseudo_parameter(name) || self.has_parameter(name) || self.has_resource(name)
    }
}

/// Extracts the placeholder names of an `Fn::Sub` string.
///
/// `${!Literal}` escapes are skipped.
pub fn placeholders(template: &str) -> Result<Vec<&str>, &'static str> {
    let mut names = Vec::new();
    let mut rest = template;
    while let Some(start) = rest.find("${") {
        let after = &rest[start + 2..];
        let end = after.find('}').ok_or("unterminated placeholder")?;
        let name = &after[..end];
        if name.is_empty() {
            return Err("empty placeholder");
        }
        if !name.starts_with('!') {
            names.push(name);
        }
        rest = &after[end + 1..];
    }
    Ok(names)
}

/// Replaces `${Name}` placeholders for which `lookup` returns a value.
///
/// Unresolved placeholders are left as written; `${!Literal}` renders as
/// `${Literal}`, matching CloudFormation.
pub fn substitute<F>(template: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return out;
        };
        let name = &after[..end];
        if let Some(literal) = name.strip_prefix('!') {
            out.push_str("${");
            out.push_str(literal);
            out.push('}');
        } else if let Some(value) = lookup(name) {
            out.push_str(&value);
        } else {
            out.push_str(&rest[start..start + 2 + end + 1]);
        }
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    out
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let json = serde_json::Value::deserialize(deserializer)?;
        Value::from_json(json).map_err(D::Error::custom)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<&String> for Value {
    fn from(s: &String) -> Self {
        Self::String(s.clone())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

macro_rules! value_from_integer {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(n: $ty) -> Self {
                    Self::Number(serde_json::Number::from(n))
                }
            }
        )*
    };
}

value_from_integer!(i32, i64, u32, u64, usize);

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::List(items)
    }
}

impl From<IndexMap<String, Value>> for Value {
    fn from(map: IndexMap<String, Value>) -> Self {
        Self::Map(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Names(&'static [&'static str], &'static [&'static str]);

    impl ReferenceScope for Names {
        fn has_parameter(&self, name: &str) -> bool {
            self.0.contains(&name)
        }

        fn has_resource(&self, name: &str) -> bool {
            self.1.contains(&name)
        }
    }

    #[test]
    fn intrinsics_serialize_in_cloudformation_notation() {
        assert_eq!(Value::reference("Api").to_json(), json!({ "Ref": "Api" }));
        assert_eq!(
            Value::get_att("LogGroup", "Arn").to_json(),
            json!({ "Fn::GetAtt": ["LogGroup", "Arn"] })
        );
        assert_eq!(
            Value::join(",", [Value::from("a"), Value::reference("B")]).to_json(),
            json!({ "Fn::Join": [",", ["a", { "Ref": "B" }]] })
        );
    }

    #[test]
    fn from_json_recognises_intrinsics_at_depth() {
        let value = Value::from_json(json!({
            "Bucket": { "Fn::Sub": "${EnvironmentName}-builds" },
            "Arn": { "Fn::GetAtt": "Function.Arn" },
            "Plain": { "Nested": [1, true, null] }
        }))
        .unwrap();

        let map = value.as_map().unwrap();
        assert_eq!(map["Bucket"], Value::sub("${EnvironmentName}-builds"));
        assert_eq!(map["Arn"], Value::get_att("Function", "Arn"));
        assert!(map["Plain"].is_static());
        assert!(!value.is_static());
    }

    #[test]
    fn from_json_rejects_unknown_intrinsic() {
        let err = Value::from_json(json!({ "Fn::ImportValue": "x" })).unwrap_err();
        assert!(matches!(err, ModelError::InvalidValue(_)));
    }

    #[test]
    fn placeholders_skip_escapes() {
        let names = placeholders("${Api}.${!Literal}.${AWS::Region}").unwrap();
        assert_eq!(names, vec!["Api", "AWS::Region"]);
        assert_eq!(placeholders("${Api").unwrap_err(), "unterminated placeholder");
        assert_eq!(placeholders("a${}b").unwrap_err(), "empty placeholder");
    }

    #[test]
    fn render_static_substitutes_known_placeholders_only() {
        let value = Value::sub("${EnvironmentName}-${Api}-${!Keep}");
        let rendered = value.render_static(|name| (name == "EnvironmentName").then(|| "dev".into()));
        assert_eq!(rendered, "dev-${Api}-${Keep}");
    }

    #[test]
    fn check_references_reports_location() {
        let scope = Names(&["EnvironmentName"], &["Api"]);
        let ok = Value::map([
            ("A", Value::reference("Api")),
            ("B", Value::sub("${EnvironmentName}-${AWS::Region}")),
            ("C", Value::sub("${Api.ApiEndpoint}")),
        ]);
        assert!(ok.check_references(&scope, "Resources.X").is_ok());

        let bad = Value::map([("List", Value::list([Value::reference("Missing")]))]);
        let err = bad.check_references(&scope, "Resources.X").unwrap_err();
        assert_eq!(
            err,
            ModelError::UnresolvedReference {
                location: "Resources.X.List[0]".to_string(),
                target: "Missing".to_string(),
            }
        );
    }

    #[test]
    fn get_att_requires_a_resource() {
        let scope = Names(&["Param"], &[]);
        let err = Value::get_att("Param", "Arn")
            .check_references(&scope, "Outputs.X")
            .unwrap_err();
        assert!(matches!(err, ModelError::UnknownAttributeSource { .. }));
    }
}
