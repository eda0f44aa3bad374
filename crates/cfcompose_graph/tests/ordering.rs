//! Tests for dependency planning.
//!
//! Covers the ordering guarantees of `ExpansionPlan::build`:
//! - Producers are planned before their consumers
//! - Ties keep declaration order
//! - Cycles are rejected and name their members
//!
//! The `prop_tests` module generates random acyclic compositions by drawing a
//! random rank permutation and only adding edges from higher to lower rank.

mod test_utils;

use cfcompose_graph::composition::{Component, Composition, cfout};
use cfcompose_graph::plan::{ExpansionPlan, PlanError};
use cfcompose_graph::{ComposeError, Composer};
use test_utils::{overrides, trio_composition, trio_templates};

fn names(plan: &ExpansionPlan) -> Vec<&str> {
    plan.names().iter().map(String::as_str).collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Fixed graphs
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn trio_is_planned_producer_first() {
    let plan = ExpansionPlan::build(&trio_composition()).unwrap();
    assert_eq!(names(&plan), vec!["db", "fn", "api"]);
    assert_eq!(plan.order(), &[2, 1, 0]);
}

#[test]
fn diamond_keeps_declaration_order_between_siblings() {
    let mut composition = Composition::new("diamond");
    composition
        .add_component(Component::new("root", "t"))
        .add_component(Component::new("right", "t").bind("A", cfout("root", "Out")))
        .add_component(Component::new("left", "t").bind("A", cfout("root", "Out")))
        .add_component(
            Component::new("sink", "t")
                .bind("L", cfout("left", "Out"))
                .bind("R", cfout("right", "Out")),
        );

    let plan = ExpansionPlan::build(&composition).unwrap();
    assert_eq!(names(&plan), vec!["root", "right", "left", "sink"]);
}

#[test]
fn longer_cycle_is_rejected_with_all_members() {
    let mut composition = Composition::new("ring");
    composition
        .add_component(Component::new("a", "t").bind("X", cfout("c", "Out")))
        .add_component(Component::new("b", "t").bind("X", cfout("a", "Out")))
        .add_component(Component::new("c", "t").bind("X", cfout("b", "Out")))
        .add_component(Component::new("free", "t"));

    let err = ExpansionPlan::build(&composition).unwrap_err();
    assert_eq!(
        err,
        PlanError::CyclicDependency {
            components: vec!["a".to_string(), "b".to_string(), "c".to_string()]
        }
    );
    assert_eq!(err.to_string(), "dependency cycle between components: a, b, c");
}

#[test]
fn composer_rejects_cycles_before_expansion() {
    let mut composition = trio_composition();
    // db now reads the gateway, closing db -> fn -> api -> db.
    if let Some(db) = composition.component_mut("db") {
        *db = Component::new("db", "table").bind("EnvironmentName", cfout("api", "ApiUrl"));
    }

    let templates = trio_templates();
    let err = Composer::new(&templates)
        .build(&composition, &overrides(&[]))
        .unwrap_err();
    assert!(matches!(
        err,
        ComposeError::Plan(PlanError::CyclicDependency { ref components }) if components.len() == 3
    ));
}

// ─────────────────────────────────────────────────────────────────────────────
// Property tests
// ─────────────────────────────────────────────────────────────────────────────

mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    /// A random DAG: `ranks[i]` is the topological rank of component `i`, and
    /// `edges[a * n + b]` (for `a < b`) adds an edge from the component of rank
    /// `b` to the component of rank `a`.
    fn arb_dag() -> impl Strategy<Value = (Vec<usize>, Vec<bool>)> {
        (1..10usize).prop_flat_map(|n| {
            (
                Just((0..n).collect::<Vec<_>>()).prop_shuffle(),
                prop::collection::vec(any::<bool>(), n * n),
            )
        })
    }

    fn composition_from(ranks: &[usize], edges: &[bool]) -> Composition {
        let n = ranks.len();
        let by_rank: Vec<usize> = (0..n)
            .map(|rank| ranks.iter().position(|&r| r == rank).unwrap())
            .collect();

        let mut composition = Composition::new("random");
        for index in 0..n {
            let mut component = Component::new(format!("c{index}"), "t");
            let rank = ranks[index];
            for producer_rank in 0..rank {
                if edges[producer_rank * n + rank] {
                    let producer = by_rank[producer_rank];
                    component = component.bind(format!("In{producer}"), cfout(format!("c{producer}"), "Out"));
                }
            }
            composition.add_component(component);
        }
        composition
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        /// Every planned component comes after each component it reads from.
        #[test]
        fn prop_plan_respects_dependencies((ranks, edges) in arb_dag()) {
            let composition = composition_from(&ranks, &edges);
            let plan = ExpansionPlan::build(&composition).unwrap();

            prop_assert_eq!(plan.len(), ranks.len());
            let position = |index: usize| plan.order().iter().position(|&i| i == index).unwrap();
            for (consumer, producer) in composition.dependency_edges() {
                prop_assert!(position(producer) < position(consumer));
            }
        }

        /// Planning the same composition twice yields the same order, and the
        /// order is the lexicographically smallest valid one by declaration index.
        #[test]
        fn prop_plan_is_deterministic((ranks, edges) in arb_dag()) {
            let composition = composition_from(&ranks, &edges);
            let first = ExpansionPlan::build(&composition).unwrap();
            let second = ExpansionPlan::build(&composition.clone()).unwrap();
            prop_assert_eq!(&first, &second);

            // At each step, no smaller unplanned index was ready.
            let edges = composition.dependency_edges();
            let mut planned = vec![false; ranks.len()];
            for &next in first.order() {
                let ready = |index: usize| {
                    !planned[index]
                        && edges
                            .iter()
                            .filter(|(consumer, _)| *consumer == index)
                            .all(|(_, producer)| planned[*producer])
                };
                prop_assert!((0..next).all(|smaller| !ready(smaller)));
                planned[next] = true;
            }
        }

        /// Adding an edge from the lowest-ranked to the highest-ranked
        /// component of a dependency chain closes a cycle.
        #[test]
        fn prop_back_edge_is_rejected(n in 2..8usize) {
            let mut composition = Composition::new("chain");
            for index in 0..n {
                let mut component = Component::new(format!("c{index}"), "t");
                if index > 0 {
                    component = component.bind("Prev", cfout(format!("c{}", index - 1), "Out"));
                } else {
                    component = component.bind("Last", cfout(format!("c{}", n - 1), "Out"));
                }
                composition.add_component(component);
            }

            let err = ExpansionPlan::build(&composition).unwrap_err();
            let PlanError::CyclicDependency { components } = err;
            prop_assert_eq!(components.len(), n);
        }
    }
}
