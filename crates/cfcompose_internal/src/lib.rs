//! # cfcompose Internal Library
//!
//! Re-exports the cfcompose crates for convenience.

/// Layer 1: Values, documents and the `Template` trait.
pub use cfcompose_model;

/// Layer 2: Compositions, planning, resolution and expansion.
pub use cfcompose_graph;

/// Layer 3: Leaf templates, the registry and shipped stacks.
pub use cfcompose_components;

/// Logging and deployment configuration.
pub use cfcompose_core;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use cfcompose_components::prelude::*;
    pub use cfcompose_core::prelude::*;
    pub use cfcompose_graph::prelude::*;
    pub use cfcompose_model::prelude::*;
}
