//! Composition graph and build pipeline for cfcompose (Layer 2).
//!
//! `cfcompose_graph` wires templates together. A [`Composition`] declares
//! parameters and components; the [`Composer`] validates it, orders the
//! components by their output dependencies, resolves every parameter and
//! expands each component into its own document.
//!
//! # Core Concepts
//!
//! - [`Composition`] - Parameters plus wired components, with a builder API
//! - [`Binding`] / [`cfout`] - How a component parameter gets its value
//! - [`ExpansionPlan`] - Deterministic topological expansion order
//! - [`GlobalParameters`] / [`OutputTable`] - Resolution state for one build
//! - [`Composer`] - Runs the pipeline and returns a [`ComposedStack`]
//! - [`ExportLedger`] - Export-name collision detection across stacks
//!
//! # Example
//!
//! ```ignore
//! use cfcompose_graph::{Binding, Component, Composer, Composition, cfout};
//!
//! let mut composition = Composition::new("amis");
//! composition
//!     .add_component(Component::new("dynamodb", "dynamodb"))
//!     .add_component(
//!         Component::new("lambda", "lambda")
//!             .bind("DynamoDbTableName", cfout("dynamodb", "TableName")),
//!     );
//!
//! let stack = Composer::new(&registry).build(&composition, &IndexMap::new())?;
//! assert_eq!(stack.order(), ["dynamodb", "lambda"]);
//! ```
//!
//! # Architecture
//!
//! - **Layer 1** (`cfcompose_model`): values, documents, the `Template` trait
//! - **Layer 2** (`cfcompose_graph`): compositions, planning, resolution, expansion (this crate)
//! - **Layer 3** (`cfcompose_components`): concrete templates and stacks

/// The build pipeline.
pub mod composer;

/// Composition structure and builder API.
pub mod composition;

/// Export-name bookkeeping.
pub mod export;

/// Compositions used as templates.
pub mod nested;

/// Dependency planning.
pub mod plan;

/// Parameter resolution.
pub mod resolve;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use crate::composer::{ComposeError, ComposedStack, Composer, ExpandedComponent};
    pub use crate::composition::{
        Binding, Component, Composition, CompositionOutput, ValidationError, cfout,
    };
    pub use crate::export::{ExportCollision, ExportLedger, ExportRecord};
    pub use crate::nested::NestedComposition;
    pub use crate::plan::{ExpansionPlan, PlanError};
    pub use crate::resolve::{GlobalParameters, OutputTable, ParameterResolver, ResolveError};
}

// Re-export key types at crate root for convenience
pub use composer::{ComposeError, ComposedStack, Composer, ExpandedComponent};
pub use composition::{Binding, Component, Composition, ValidationError, cfout};
pub use export::{ExportCollision, ExportLedger, ExportRecord};
pub use nested::NestedComposition;
pub use plan::{ExpansionPlan, PlanError};
pub use resolve::{GlobalParameters, OutputTable, ParameterResolver, ResolveError};
