//! Reference Graph Analysis
//!
//! Cycle detection via strongly connected components and dependency
//! ordering for catalogs handed to downstream consumers.

use petgraph::algo::{kosaraju_scc, toposort};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use super::ReferenceGraph;
use crate::datatype::TypeName;
use crate::error::{DatatypeError, Result};

/// Groups of datatypes that reference each other cyclically.
///
/// Includes multi-member SCCs and single datatypes referencing themselves.
/// Members of each group are sorted, groups are sorted by first member.
pub fn reference_cycles(graph: &ReferenceGraph) -> Vec<Vec<TypeName>> {
    let mut groups: Vec<Vec<TypeName>> = kosaraju_scc(&graph.graph)
        .into_iter()
        .filter(|scc| {
            scc.len() > 1
                || graph
                    .graph
                    .edges_directed(scc[0], Direction::Outgoing)
                    .any(|e| e.target() == scc[0])
        })
        .map(|scc| {
            let mut members: Vec<TypeName> = scc
                .into_iter()
                .filter_map(|idx| graph.graph.node_weight(idx).cloned())
                .collect();
            members.sort();
            members
        })
        .collect();
    groups.sort();
    groups
}

/// Datatype names ordered so every datatype follows the ones it references
pub fn dependency_order(graph: &ReferenceGraph) -> Result<Vec<TypeName>> {
    match toposort(&graph.graph, None) {
        Ok(sorted) => Ok(sorted
            .into_iter()
            .rev()
            .filter_map(|idx| graph.graph.node_weight(idx).cloned())
            .collect()),
        Err(cycle) => {
            let node = cycle.node_id();
            let members = reference_cycles(graph)
                .into_iter()
                .find(|group| graph.graph.node_weight(node).is_some_and(|n| group.contains(n)))
                .unwrap_or_else(|| graph.graph.node_weight(node).cloned().into_iter().collect());
            Err(DatatypeError::ReferenceCycle { members })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatype::{Catalog, FieldDescriptor, TypeDefinition};

    fn catalog(entries: Vec<(&str, Vec<&str>)>) -> Catalog {
        entries
            .into_iter()
            .map(|(name, refs)| {
                let fields = refs
                    .into_iter()
                    .enumerate()
                    .map(|(i, r)| FieldDescriptor::complex(format!("f{}", i), r))
                    .collect();
                (name.to_string(), TypeDefinition::new(fields))
            })
            .collect()
    }

    #[test]
    fn test_acyclic_has_no_cycles() {
        let graph = ReferenceGraph::from_catalog(&catalog(vec![("A", vec!["B"]), ("B", vec![])]));
        assert!(reference_cycles(&graph).is_empty());
    }

    #[test]
    fn test_self_reference_is_a_cycle() {
        let graph = ReferenceGraph::from_catalog(&catalog(vec![("Tree", vec!["Tree"]), ("Leaf", vec![])]));
        assert_eq!(reference_cycles(&graph), vec![vec!["Tree".to_string()]]);
    }

    #[test]
    fn test_mutual_recursion_group() {
        let graph = ReferenceGraph::from_catalog(&catalog(vec![
            ("A", vec!["B"]),
            ("B", vec!["C"]),
            ("C", vec!["A"]),
            ("D", vec!["A"]),
        ]));
        assert_eq!(
            reference_cycles(&graph),
            vec![vec!["A".to_string(), "B".to_string(), "C".to_string()]]
        );
    }

    #[test]
    fn test_dependency_order_puts_referenced_first() {
        let graph = ReferenceGraph::from_catalog(&catalog(vec![
            ("Odometry", vec!["Header", "Pose"]),
            ("Pose", vec!["Point"]),
            ("Point", vec![]),
            ("Header", vec![]),
        ]));
        let order = dependency_order(&graph).unwrap();
        let pos = |name: &str| order.iter().position(|n| n == name).unwrap();
        assert_eq!(order.len(), 4);
        assert!(pos("Point") < pos("Pose"));
        assert!(pos("Pose") < pos("Odometry"));
        assert!(pos("Header") < pos("Odometry"));
    }

    #[test]
    fn test_dependency_order_fails_on_cycle() {
        let graph = ReferenceGraph::from_catalog(&catalog(vec![("A", vec!["B"]), ("B", vec!["A"])]));
        assert!(matches!(
            dependency_order(&graph),
            Err(DatatypeError::ReferenceCycle { .. })
        ));
    }
}
