//! Error types for template documents and values.

use thiserror::Error;

/// Errors raised while building or serializing a template document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    /// A logical id (resource, parameter, output) is not alphanumeric.
    #[error("invalid logical id '{0}': must be non-empty and alphanumeric")]
    InvalidLogicalId(String),

    /// Two resources share a logical id.
    #[error("duplicate resource '{0}'")]
    DuplicateResource(String),

    /// Two parameters share a name.
    #[error("duplicate parameter '{0}'")]
    DuplicateParameter(String),

    /// Two outputs share a name.
    #[error("duplicate output '{0}'")]
    DuplicateOutput(String),

    /// A `Ref` or `Fn::Sub` placeholder names something outside the template scope.
    #[error("{location} references '{target}', which is not a parameter, resource or pseudo parameter")]
    UnresolvedReference {
        /// Where the reference was found (e.g. `Resources.Stage.Properties.ApiId`).
        location: String,
        /// The referenced name.
        target: String,
    },

    /// An `Fn::GetAtt` names a resource that is not declared.
    #[error("{location} reads attribute '{attribute}' of unknown resource '{resource}'")]
    UnknownAttributeSource {
        /// Where the attribute read was found.
        location: String,
        /// The referenced resource.
        resource: String,
        /// The attribute being read.
        attribute: String,
    },

    /// A `DependsOn` entry names a resource that is not declared.
    #[error("resource '{resource}' depends on unknown resource '{target}'")]
    UnknownDependency {
        /// The resource declaring the dependency.
        resource: String,
        /// The missing dependency.
        target: String,
    },

    /// An `Fn::Sub` string is malformed.
    #[error("{location} has malformed substitution '{template}': {reason}")]
    MalformedSubstitution {
        /// Where the substitution was found.
        location: String,
        /// The offending string.
        template: String,
        /// What is wrong with it.
        reason: &'static str,
    },

    /// JSON could not be interpreted as a template value.
    #[error("invalid value: {0}")]
    InvalidValue(String),

    /// Serializing the document failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for ModelError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
