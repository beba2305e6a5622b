//! Datatype Reference Graph
//!
//! Closure extraction over name-indexed catalogs. Every edge between two
//! datatypes is a name lookup into a [`Catalog`]; the petgraph view in
//! [`ReferenceGraph`] is built on demand for cycle and ordering analysis.

pub mod analysis;

pub use analysis::{dependency_order, reference_cycles};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

use crate::datatype::{Catalog, TypeName};
use crate::error::{DatatypeError, Result};

/// How closure extraction treats reference cycles
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CyclePolicy {
    /// Cycles are traversed once and the full reachable set is returned
    #[default]
    Allow,
    /// A cycle inside the closure fails with `ReferenceCycle`
    Reject,
}

/// Compute the smallest sub-catalog that transitively defines `roots`.
///
/// Breadth-first over complex field references. A referenced name missing
/// from `catalog` aborts the whole call. The result map doubles as the
/// visited set, so cyclic catalogs terminate.
pub fn closure<I, S>(catalog: &Catalog, roots: I) -> Result<Catalog>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut result = Catalog::new();
    let mut frontier: BTreeSet<TypeName> = roots
        .into_iter()
        .map(|r| r.as_ref().to_string())
        .collect();

    while !frontier.is_empty() {
        let mut next = BTreeSet::new();
        for name in frontier {
            if result.contains(&name) {
                continue;
            }
            let definition = catalog
                .get(&name)
                .ok_or_else(|| DatatypeError::missing(name.as_str()))?;
            for referenced in definition.complex_refs() {
                if !result.contains(referenced) {
                    next.insert(referenced.to_string());
                }
            }
            result.insert(name, definition.clone());
        }
        frontier = next;
    }

    Ok(result)
}

/// [`closure`] with an explicit cycle policy
pub fn closure_with_policy<I, S>(catalog: &Catalog, roots: I, policy: CyclePolicy) -> Result<Catalog>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let sub_catalog = closure(catalog, roots)?;
    if policy == CyclePolicy::Reject {
        let graph = ReferenceGraph::from_catalog(&sub_catalog);
        if let Some(members) = reference_cycles(&graph).into_iter().next() {
            return Err(DatatypeError::ReferenceCycle { members });
        }
    }
    Ok(sub_catalog)
}

/// Directed graph of complex field references between catalog entries
pub struct ReferenceGraph {
    /// Edge weights are the referencing field names
    pub(crate) graph: DiGraph<TypeName, String>,
    pub(crate) node_indices: HashMap<TypeName, NodeIndex>,
    /// References to names absent from the catalog
    dangling: Vec<(TypeName, TypeName)>,
}

impl ReferenceGraph {
    /// Build the reference graph of a catalog
    pub fn from_catalog(catalog: &Catalog) -> Self {
        let mut graph = DiGraph::with_capacity(catalog.len(), catalog.len() * 2);
        let mut node_indices = HashMap::with_capacity(catalog.len());

        for name in catalog.names() {
            let idx = graph.add_node(name.clone());
            node_indices.insert(name.clone(), idx);
        }

        let mut dangling = Vec::new();
        for (name, definition) in catalog {
            let from_idx = node_indices[name];
            for field in &definition.fields {
                let Some(target) = field.referenced_type() else {
                    continue;
                };
                match node_indices.get(target) {
                    Some(&to_idx) => {
                        graph.add_edge(from_idx, to_idx, field.name.clone());
                    }
                    None => dangling.push((name.clone(), target.to_string())),
                }
            }
        }

        Self {
            graph,
            node_indices,
            dangling,
        }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// `(from, to)` pairs whose target is not defined in the catalog
    pub fn dangling_refs(&self) -> &[(TypeName, TypeName)] {
        &self.dangling
    }

    /// Datatypes directly referenced by `name`
    pub fn refs_out(&self, name: &str) -> Vec<&TypeName> {
        self.neighbors(name, Direction::Outgoing)
    }

    /// Datatypes directly referencing `name`
    pub fn refs_in(&self, name: &str) -> Vec<&TypeName> {
        self.neighbors(name, Direction::Incoming)
    }

    fn neighbors(&self, name: &str, direction: Direction) -> Vec<&TypeName> {
        let Some(&node_idx) = self.node_indices.get(name) else {
            return Vec::new();
        };

        let mut names: Vec<&TypeName> = self
            .graph
            .edges_directed(node_idx, direction)
            .filter_map(|e| {
                let other = match direction {
                    Direction::Outgoing => e.target(),
                    Direction::Incoming => e.source(),
                };
                self.graph.node_weight(other)
            })
            .collect();
        names.sort();
        names.dedup();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatype::{FieldDescriptor, TypeDefinition};

    fn def(fields: Vec<FieldDescriptor>) -> TypeDefinition {
        TypeDefinition::new(fields)
    }

    fn example_catalog() -> Catalog {
        let mut catalog = Catalog::new();
        catalog.insert("A", def(vec![FieldDescriptor::complex("x", "B")]));
        catalog.insert("B", def(vec![FieldDescriptor::primitive("y", "int32")]));
        catalog.insert("C", def(vec![FieldDescriptor::primitive("z", "string")]));
        catalog
    }

    #[test]
    fn test_closure_excludes_unreachable() {
        let catalog = example_catalog();
        let sub = closure(&catalog, ["A"]).unwrap();
        assert_eq!(sub.names().collect::<Vec<_>>(), vec!["A", "B"]);
        assert_eq!(sub.get("A"), catalog.get("A"));
    }

    #[test]
    fn test_closure_is_fixed_point() {
        let catalog = example_catalog();
        let sub = closure(&catalog, ["A"]).unwrap();
        assert_eq!(closure(&sub, ["A"]).unwrap(), sub);
    }

    #[test]
    fn test_closure_of_no_roots_is_empty() {
        let sub = closure(&example_catalog(), Vec::<String>::new()).unwrap();
        assert!(sub.is_empty());
    }

    #[test]
    fn test_missing_definition_names_type() {
        let mut catalog = example_catalog();
        catalog.insert("D", def(vec![FieldDescriptor::complex("gone", "Missing")]));
        match closure(&catalog, ["D"]) {
            Err(DatatypeError::MissingDefinition { name }) => assert_eq!(name, "Missing"),
            other => panic!("Expected MissingDefinition, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_root() {
        assert!(matches!(
            closure(&example_catalog(), ["Nope"]),
            Err(DatatypeError::MissingDefinition { .. })
        ));
    }

    #[test]
    fn test_primitive_type_named_like_catalog_entry_is_not_followed() {
        let mut catalog = Catalog::new();
        catalog.insert("A", def(vec![FieldDescriptor::primitive("c", "C")]));
        catalog.insert("C", def(vec![]));
        let sub = closure(&catalog, ["A"]).unwrap();
        assert_eq!(sub.len(), 1);
    }

    #[test]
    fn test_cyclic_catalog_terminates() {
        let mut catalog = Catalog::new();
        catalog.insert("Node", def(vec![FieldDescriptor::complex("next", "Link")]));
        catalog.insert("Link", def(vec![FieldDescriptor::complex("node", "Node")]));
        catalog.insert("Tree", def(vec![FieldDescriptor::complex("children", "Tree").array(None)]));

        let sub = closure(&catalog, ["Node"]).unwrap();
        assert_eq!(sub.len(), 2);
        let sub = closure(&catalog, ["Tree"]).unwrap();
        assert_eq!(sub.len(), 1);
    }

    #[test]
    fn test_reject_policy_reports_cycle() {
        let mut catalog = Catalog::new();
        catalog.insert("Node", def(vec![FieldDescriptor::complex("next", "Link")]));
        catalog.insert("Link", def(vec![FieldDescriptor::complex("node", "Node")]));

        match closure_with_policy(&catalog, ["Node"], CyclePolicy::Reject) {
            Err(DatatypeError::ReferenceCycle { members }) => {
                assert_eq!(members, vec!["Link".to_string(), "Node".to_string()]);
            }
            other => panic!("Expected ReferenceCycle, got {:?}", other),
        }
        assert!(closure_with_policy(&example_catalog(), ["A"], CyclePolicy::Reject).is_ok());
    }

    #[test]
    fn test_refs_in_and_out() {
        let mut catalog = example_catalog();
        catalog.insert("D", def(vec![
            FieldDescriptor::complex("b1", "B"),
            FieldDescriptor::complex("b2", "B"),
            FieldDescriptor::complex("ext", "Elsewhere"),
        ]));
        let graph = ReferenceGraph::from_catalog(&catalog);
        assert_eq!(graph.node_count(), 4);
        assert_eq!(graph.edge_count(), 3);
        assert_eq!(graph.refs_out("D"), vec!["B"]);
        assert_eq!(graph.refs_in("B"), vec!["A", "D"]);
        assert!(graph.refs_out("Unknown").is_empty());
        assert_eq!(graph.dangling_refs(), &[("D".to_string(), "Elsewhere".to_string())]);
    }
}
