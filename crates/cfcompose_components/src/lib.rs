//! Templates and stacks for cfcompose (Layer 3).
//!
//! `cfcompose_components` holds the concrete content: the leaf templates that
//! expand into AWS resources, the [`TemplateRegistry`] they are looked up
//! from, and the catalogue of shipped [`stacks`].
//!
//! # Core Concepts
//!
//! - [`TemplateRegistry`] - Name to template lookup, usable as a `TemplateSource`
//! - [`DynamoDbTemplate`] - One table keyed by `id`
//! - [`LambdaTemplate`] - Functions deployed from versioned S3 artifacts
//! - [`ApiGatewayV2Template`] - HTTP API with a Lambda proxy integration
//! - [`S3EventsTemplate`] - Bucket notifications through a custom resource
//!
//! # Example
//!
//! ```ignore
//! use cfcompose_components::{TemplateRegistry, stacks};
//! use cfcompose_graph::Composer;
//!
//! let registry = TemplateRegistry::with_builtin();
//! let stack = Composer::new(&registry).build(&stacks::amis(), &IndexMap::new())?;
//! assert_eq!(stack.order(), ["dynamodb", "lambda", "httpapi"]);
//! ```
//!
//! # Architecture
//!
//! - **Layer 1** (`cfcompose_model`): values, documents, the `Template` trait
//! - **Layer 2** (`cfcompose_graph`): compositions, planning, resolution, expansion
//! - **Layer 3** (`cfcompose_components`): concrete templates and stacks (this crate)

/// The `api-gateway-v2` template.
pub mod api_gateway;

/// Parameters and helpers shared by the templates.
pub mod common;

/// The `dynamodb` template.
pub mod dynamodb;

/// The `lambda` template.
pub mod lambda;

/// Template lookup.
pub mod registry;

/// The `s3_events` template.
pub mod s3_events;

/// Shipped compositions.
pub mod stacks;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use crate::api_gateway::ApiGatewayV2Template;
    pub use crate::dynamodb::DynamoDbTemplate;
    pub use crate::lambda::{FunctionSpec, LambdaTemplate};
    pub use crate::registry::TemplateRegistry;
    pub use crate::s3_events::{Notification, S3EventsTemplate};
    pub use crate::stacks;
}

// Re-export key types at crate root for convenience
pub use api_gateway::ApiGatewayV2Template;
pub use dynamodb::DynamoDbTemplate;
pub use lambda::{FunctionSpec, LambdaTemplate};
pub use registry::TemplateRegistry;
pub use s3_events::{Notification, S3EventsTemplate};
