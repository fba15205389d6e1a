//! Column dependency graph.
//!
//! Built per schema from the dependency lists of its formula columns.
//! Edges point from an identifier to the formula columns that consume
//! it, so a change fans out to exactly the affected computations.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt::Write as _;

use log::warn;

use crate::errors::Result;
use crate::formulas::FormulaDefinitionServiceTrait;
use crate::schemas::{ColumnSource, SchemaColumn};

/// Dependency relationships between the columns of one schema.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// Formula column identifier -> identifiers its formula reads.
    dependencies: BTreeMap<String, Vec<String>>,
    /// Identifier -> formula columns that read it.
    dependents: BTreeMap<String, BTreeSet<String>>,
}

impl DependencyGraph {
    /// Builds the graph for a set of schema columns.
    ///
    /// Implicit identifiers participate as sources (a rate change must
    /// cascade) but never as computed nodes.
    pub fn build(
        columns: &[SchemaColumn],
        definitions: &dyn FormulaDefinitionServiceTrait,
    ) -> Result<DependencyGraph> {
        let mut graph = DependencyGraph::default();

        for column in columns {
            let ColumnSource::Formula { definition_id } = &column.source else {
                continue;
            };
            let definition = definitions.get_definition(definition_id)?;
            let formula = definitions.formula_for(&definition)?;

            for dependency in &formula.dependencies {
                graph
                    .dependents
                    .entry(dependency.clone())
                    .or_default()
                    .insert(column.identifier.clone());
            }
            graph
                .dependencies
                .insert(column.identifier.clone(), formula.dependencies.clone());
        }

        Ok(graph)
    }

    pub fn is_formula_column(&self, identifier: &str) -> bool {
        self.dependencies.contains_key(identifier)
    }

    /// Identifiers the given formula column reads, in expression order.
    pub fn dependencies_of(&self, identifier: &str) -> &[String] {
        self.dependencies
            .get(identifier)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Formula columns that read the given identifier directly.
    pub fn dependents_of(&self, identifier: &str) -> Vec<&str> {
        self.dependents
            .get(identifier)
            .map(|set| set.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Formula columns transitively affected by a change to the given
    /// identifiers, in evaluation order.
    ///
    /// The changed identifiers themselves are excluded unless reached
    /// through an edge, matching cascade semantics where the source
    /// cell is written by its own mechanism.
    pub fn affected_in_order(&self, changed: &[String]) -> Vec<String> {
        let mut reachable: BTreeSet<String> = BTreeSet::new();
        let mut queue: VecDeque<&str> = changed.iter().map(String::as_str).collect();

        while let Some(identifier) = queue.pop_front() {
            if let Some(dependents) = self.dependents.get(identifier) {
                for dependent in dependents {
                    if reachable.insert(dependent.clone()) {
                        queue.push_back(dependent);
                    }
                }
            }
        }

        self.topological_order(&reachable)
    }

    /// All formula columns of the schema, in evaluation order.
    pub fn all_formula_columns_in_order(&self) -> Vec<String> {
        let nodes: BTreeSet<String> = self.dependencies.keys().cloned().collect();
        self.topological_order(&nodes)
    }

    /// Kahn's algorithm over the given node subset; ties resolve
    /// alphabetically so the order is deterministic.
    fn topological_order(&self, nodes: &BTreeSet<String>) -> Vec<String> {
        let mut indegree: BTreeMap<&str, usize> = nodes
            .iter()
            .map(|node| {
                let within = self
                    .dependencies_of(node)
                    .iter()
                    .filter(|dep| nodes.contains(*dep))
                    .count();
                (node.as_str(), within)
            })
            .collect();

        let mut ready: BTreeSet<&str> = indegree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(node, _)| *node)
            .collect();

        let mut order: Vec<String> = Vec::with_capacity(nodes.len());
        while let Some(node) = ready.iter().next().copied() {
            ready.remove(node);
            order.push(node.to_string());

            if let Some(dependents) = self.dependents.get(node) {
                for dependent in dependents {
                    if let Some(degree) = indegree.get_mut(dependent.as_str()) {
                        *degree -= 1;
                        if *degree == 0 {
                            ready.insert(dependent.as_str());
                        }
                    }
                }
            }
        }

        if order.len() < nodes.len() {
            // Cyclic remainder. Append it in name order so every cell
            // still gets one evaluation pass.
            let leftover: Vec<String> = nodes
                .iter()
                .filter(|node| !order.contains(*node))
                .cloned()
                .collect();
            warn!("dependency cycle among columns: {:?}", leftover);
            order.extend(leftover);
        }

        order
    }

    /// Graphviz rendering for diagnostics.
    pub fn as_dot(&self) -> String {
        let mut out = String::from("digraph dependencies {\n");
        for (column, dependencies) in &self.dependencies {
            for dependency in dependencies {
                let _ = writeln!(out, "  \"{}\" -> \"{}\";", dependency, column);
            }
        }
        out.push('}');
        out
    }
}
