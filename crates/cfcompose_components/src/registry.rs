//! Template registry.
//!
//! The [`TemplateRegistry`] stores templates by name and is the
//! [`TemplateSource`] handed to the [`Composer`](cfcompose_graph::Composer).
//! Compositions can be registered next to leaf templates, which makes them
//! usable as components of other compositions.
//!
//! # Usage
//!
//! ```
//! use cfcompose_components::registry::TemplateRegistry;
//! use cfcompose_components::stacks;
//!
//! let mut registry = TemplateRegistry::with_builtin();
//! registry.register_composition(stacks::amis());
//!
//! assert!(registry.has("dynamodb"));
//! assert!(registry.has("amis"));
//! ```

use std::sync::Arc;

use cfcompose_graph::{Composition, NestedComposition};
use cfcompose_model::{Template, TemplateSource};
use indexmap::IndexMap;

use crate::api_gateway::ApiGatewayV2Template;
use crate::dynamodb::DynamoDbTemplate;
use crate::lambda::LambdaTemplate;
use crate::s3_events::S3EventsTemplate;

/// Registry of available templates.
#[derive(Default)]
pub struct TemplateRegistry {
    templates: IndexMap<String, Arc<dyn Template>>,
}

impl core::fmt::Debug for TemplateRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TemplateRegistry")
            .field("templates", &self.names())
            .finish()
    }
}

impl TemplateRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            templates: IndexMap::new(),
        }
    }

    /// Creates a registry holding the leaf templates shipped with this crate.
    #[must_use]
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(DynamoDbTemplate);
        registry.register(LambdaTemplate);
        registry.register(ApiGatewayV2Template);
        registry.register(S3EventsTemplate);
        registry
    }

    /// Registers a template.
    ///
    /// # Panics
    ///
    /// Panics if a template with the same name is already registered.
    pub fn register(&mut self, template: impl Template) {
        let name = template.name().to_string();
        assert!(
            !self.templates.contains_key(&name),
            "Template '{name}' is already registered"
        );
        tracing::debug!(template = %name, "registered template");
        self.templates.insert(name, Arc::new(template));
    }

    /// Registers a composition under its own name.
    ///
    /// # Panics
    ///
    /// Panics if a template with the same name is already registered.
    pub fn register_composition(&mut self, composition: Composition) {
        self.register(NestedComposition::new(composition));
    }

    /// Returns a template by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&dyn Template> {
        self.templates.get(name).map(AsRef::as_ref)
    }

    /// Returns whether a template with the given name is registered.
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }

    /// Returns the names of all registered templates, in registration order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.templates.keys().map(String::as_str).collect()
    }
}

impl TemplateSource for TemplateRegistry {
    fn template(&self, name: &str) -> Option<Arc<dyn Template>> {
        self.templates.get(name).cloned()
    }
}
