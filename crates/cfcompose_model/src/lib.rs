//! Template primitives for cfcompose (Layer 1).
//!
//! `cfcompose_model` defines the vocabulary every other crate speaks:
//!
//! - [`Value`] - Tagged union for property bags, including CloudFormation intrinsics
//! - [`Parameter`] - Parameter declarations with defaults, allowed values and scope
//! - [`Resource`] / [`Output`] - Typed resources and named outputs
//! - [`TemplateDocument`] - One template with a validating serializer
//! - [`Template`] - Trait implemented by every leaf template and nested composition
//!
//! # Architecture
//!
//! - **Layer 1** (`cfcompose_model`): values, documents, the `Template` trait (this crate)
//! - **Layer 2** (`cfcompose_graph`): compositions, dependency planning, resolution, expansion
//! - **Layer 3** (`cfcompose_components`): concrete templates and stacks

/// Template documents and their serializer.
pub mod document;

/// Error types.
pub mod error;

/// Parameter declarations and resolved sets.
pub mod parameter;

/// Resources and outputs.
pub mod resource;

/// The `Template` trait and expansion context.
pub mod template;

/// The `Value` tagged union.
pub mod value;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use crate::document::TemplateDocument;
    pub use crate::error::ModelError;
    pub use crate::parameter::{Parameter, ResolvedParameters, ValueSource};
    pub use crate::resource::{Output, Resource};
    pub use crate::template::{
        Expansion, ExpansionContext, Template, TemplateConfig, TemplateError, TemplateSource,
    };
    pub use crate::value::Value;
}

// Re-export key types at crate root for convenience
pub use document::{TEMPLATE_FORMAT_VERSION, TemplateDocument};
pub use error::ModelError;
pub use parameter::{Parameter, ResolvedParameter, ResolvedParameters, ValueSource};
pub use resource::{Output, Resource, is_valid_logical_id};
pub use template::{
    Expansion, ExpansionContext, NestedExport, Template, TemplateConfig, TemplateError, TemplateSource,
};
pub use value::{ReferenceScope, Value, is_pseudo_parameter};
