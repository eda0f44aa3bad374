//! Composes parameterized CloudFormation component templates into
//! dependency-ordered stacks.
//!
//! ```ignore
//! use cfcompose::prelude::*;
//!
//! let registry = TemplateRegistry::with_builtin();
//! let stack = Composer::new(&registry).build(&stacks::amis(), &IndexMap::new())?;
//! for (file, json) in stack.render_files()? {
//!     std::fs::write(file, json)?;
//! }
//! ```

pub use cfcompose_internal::*;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use cfcompose_internal::prelude::*;
}
