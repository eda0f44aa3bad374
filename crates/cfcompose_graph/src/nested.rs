//! Compositions used as templates.
//!
//! Wrapping a [`Composition`] in a [`NestedComposition`] lets another
//! composition instantiate it as a component. The nested composition's
//! parameters become the component's parameters, and its declared outputs
//! become the component's outputs.

use cfcompose_model::{
    Expansion, ExpansionContext, Parameter, Template, TemplateConfig, TemplateError, Value,
};
use indexmap::IndexMap;

use crate::composer::Composer;
use crate::composition::Composition;

/// A [`Composition`] exposed through the [`Template`] trait.
///
/// Component config keys name child components; each value is a map merged
/// over that child's own config.
#[derive(Debug, Clone)]
pub struct NestedComposition {
    composition: Composition,
}

impl NestedComposition {
    /// Wraps a composition.
    #[must_use]
    pub fn new(composition: Composition) -> Self {
        Self { composition }
    }

    /// Returns the wrapped composition.
    #[must_use]
    pub fn composition(&self) -> &Composition {
        &self.composition
    }

    fn configured(&self, config: &TemplateConfig) -> Result<Composition, TemplateError> {
        let name = self.composition.name();
        if let Some(component) = self
            .composition
            .components()
            .iter()
            .find(|c| c.template() == name)
        {
            return Err(TemplateError::invalid_config(
                name,
                component.name(),
                "composition instantiates itself",
            ));
        }

        let mut composition = self.composition.clone();
        for (key, _) in config.iter() {
            let Some(overlay) = config.map(name, key)? else {
                continue;
            };
            let Some(component) = composition.component_mut(key) else {
                return Err(TemplateError::invalid_config(name, key, "no such component"));
            };
            component
                .config_mut()
                .merge(&TemplateConfig::from(overlay.clone()));
        }
        Ok(composition)
    }
}

impl Template for NestedComposition {
    fn name(&self) -> &str {
        self.composition.name()
    }

    fn description(&self) -> String {
        self.composition
            .description()
            .unwrap_or(self.composition.name())
            .to_string()
    }

    fn parameters(&self, config: &TemplateConfig) -> Result<Vec<Parameter>, TemplateError> {
        self.configured(config)?;
        Ok(self.composition.parameters().to_vec())
    }

    fn expand(&self, ctx: &ExpansionContext<'_>) -> Result<Expansion, TemplateError> {
        let composition = self.configured(ctx.config)?;
        let overrides: IndexMap<String, Value> = ctx
            .parameters
            .iter()
            .map(|(name, resolved)| (name.to_string(), resolved.value.clone()))
            .collect();

        let stack = Composer::new(ctx.templates)
            .with_template_url_prefix(ctx.template_url_prefix)
            .build(&composition, &overrides)
            .map_err(|err| TemplateError::Nested {
                template: self.composition.name().to_string(),
                source: Box::new(err),
            })?;

        let mut children = IndexMap::new();
        let mut exports = Vec::new();
        for (name, component) in stack.components() {
            children.insert(name.clone(), component.document.clone());
            for (stem, child) in &component.children {
                children.insert(format!("{name}.{stem}"), child.clone());
            }
            exports.extend(component.published_exports());
        }

        // Exports of the nested root are re-rendered by the outer build from
        // the returned document.
        Ok(Expansion {
            document: stack.root().clone(),
            children,
            exports,
        })
    }
}
