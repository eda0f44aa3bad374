//! Dependency planning.
//!
//! [`ExpansionPlan::build`] orders the components of a composition so that
//! every component comes after each component whose outputs it reads.
//! Components with no ordering constraint between them keep declaration
//! order, which makes the plan (and every rendered document) deterministic.

use std::collections::BTreeSet;

use thiserror::Error;

use crate::composition::Composition;

/// Errors raised while planning.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    /// The `cfout` bindings form a cycle.
    #[error("dependency cycle between components: {}", components.join(", "))]
    CyclicDependency {
        /// Components on (or trapped between) cycles, in declaration order.
        components: Vec<String>,
    },
}

/// A topological expansion order over a composition's components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpansionPlan {
    order: Vec<usize>,
    names: Vec<String>,
}

impl ExpansionPlan {
    /// Computes the expansion order.
    ///
    /// Uses Kahn's algorithm; among ready components the one declared first
    /// is always taken next. A component reading its own output is a cycle.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError::CyclicDependency`] if no valid order exists.
    pub fn build(composition: &Composition) -> Result<Self, PlanError> {
        let count = composition.components().len();
        let mut pending_producers = vec![0usize; count];
        let mut consumers: Vec<Vec<usize>> = vec![Vec::new(); count];

        for (consumer, producer) in composition.dependency_edges() {
            pending_producers[consumer] += 1;
            consumers[producer].push(consumer);
        }

        let mut ready: BTreeSet<usize> = (0..count)
            .filter(|&index| pending_producers[index] == 0)
            .collect();
        let mut order = Vec::with_capacity(count);

        while let Some(next) = ready.pop_first() {
            order.push(next);
            for &consumer in &consumers[next] {
                pending_producers[consumer] -= 1;
                if pending_producers[consumer] == 0 {
                    ready.insert(consumer);
                }
            }
        }

        if order.len() < count {
            let mut remaining: Vec<bool> = vec![true; count];
            for &index in &order {
                remaining[index] = false;
            }
            prune_downstream(&mut remaining, &consumers);
            let components = (0..count)
                .filter(|&index| remaining[index])
                .map(|index| composition.components()[index].name().to_string())
                .collect();
            return Err(PlanError::CyclicDependency { components });
        }

        let names = order
            .iter()
            .map(|&index| composition.components()[index].name().to_string())
            .collect();
        Ok(Self { order, names })
    }

    /// Returns component indices in expansion order.
    #[must_use]
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    /// Returns component names in expansion order.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Returns the number of planned components.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns true if nothing is planned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Drops remaining components that no remaining component consumes, until
/// only cycle members (and components caught between cycles) are left.
fn prune_downstream(remaining: &mut [bool], consumers: &[Vec<usize>]) {
    loop {
        let mut changed = false;
        for index in 0..remaining.len() {
            if remaining[index] && !consumers[index].iter().any(|&c| remaining[c]) {
                remaining[index] = false;
                changed = true;
            }
        }
        if !changed {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composition::{Component, cfout};

    fn names(plan: &ExpansionPlan) -> Vec<&str> {
        plan.names().iter().map(String::as_str).collect()
    }

    #[test]
    fn producers_come_before_consumers() {
        let mut composition = Composition::new("amis");
        composition
            .add_component(Component::new("httpapi", "t").bind("Fn", cfout("lambda", "GetAmiArn")))
            .add_component(Component::new("lambda", "t").bind("Table", cfout("dynamodb", "TableName")))
            .add_component(Component::new("dynamodb", "t"));

        let plan = ExpansionPlan::build(&composition).unwrap();
        assert_eq!(names(&plan), vec!["dynamodb", "lambda", "httpapi"]);
    }

    #[test]
    fn independent_components_keep_declaration_order() {
        let mut composition = Composition::new("flat");
        for name in ["c", "a", "b"] {
            composition.add_component(Component::new(name, "t"));
        }
        let plan = ExpansionPlan::build(&composition).unwrap();
        assert_eq!(names(&plan), vec!["c", "a", "b"]);
    }

    #[test]
    fn cycle_reports_only_members() {
        let mut composition = Composition::new("cycle");
        composition
            .add_component(Component::new("a", "t").bind("X", cfout("b", "Out")))
            .add_component(Component::new("b", "t").bind("Y", cfout("a", "Out")))
            .add_component(Component::new("c", "t").bind("Z", cfout("a", "Out")))
            .add_component(Component::new("d", "t"));

        let err = ExpansionPlan::build(&composition).unwrap_err();
        assert_eq!(
            err,
            PlanError::CyclicDependency {
                components: vec!["a".to_string(), "b".to_string()]
            }
        );
    }

    #[test]
    fn self_reference_is_a_cycle() {
        let mut composition = Composition::new("self");
        composition.add_component(Component::new("a", "t").bind("X", cfout("a", "Out")));
        assert!(matches!(
            ExpansionPlan::build(&composition),
            Err(PlanError::CyclicDependency { components }) if components == vec!["a".to_string()]
        ));
    }
}
