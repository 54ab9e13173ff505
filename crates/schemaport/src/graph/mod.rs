//! Foreign-key dependency graph and creation ordering.
//!
//! An edge `A -> B` means table `A` holds a foreign key to table `B` and
//! must be created after it. Only tables inside the working set become
//! nodes; references to anything else stay on the descriptor but do not
//! constrain the order.

use std::collections::{BTreeSet, HashMap, VecDeque};
use tracing::warn;

use crate::core::schema::{ForeignKeyRef, TableDescriptor};

/// Directed dependency graph over a working set of tables.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// Node names in input order.
    nodes: Vec<String>,
    /// `depends_on[i]` holds the indices of tables node `i` references.
    depends_on: Vec<BTreeSet<usize>>,
    /// `dependents[i]` holds the indices of tables referencing node `i`.
    dependents: Vec<BTreeSet<usize>>,
}

impl DependencyGraph {
    /// Build the graph from descriptors. Self references and references to
    /// tables outside `tables` are ignored.
    pub fn build(tables: &[TableDescriptor]) -> Self {
        let index: HashMap<&str, usize> = tables
            .iter()
            .enumerate()
            .map(|(i, t)| (t.name.as_str(), i))
            .collect();

        let mut graph = Self {
            nodes: tables.iter().map(|t| t.name.clone()).collect(),
            depends_on: vec![BTreeSet::new(); tables.len()],
            dependents: vec![BTreeSet::new(); tables.len()],
        };

        for (i, table) in tables.iter().enumerate() {
            for referenced in table.referenced_tables() {
                if let Some(&j) = index.get(referenced) {
                    if i != j {
                        graph.depends_on[i].insert(j);
                        graph.dependents[j].insert(i);
                    }
                }
            }
        }
        graph
    }

    /// Build directly from `(table, referenced tables)` pairs.
    pub fn from_edges<S: AsRef<str>>(edges: &[(S, Vec<S>)]) -> Self {
        let tables: Vec<TableDescriptor> = edges
            .iter()
            .map(|(name, refs)| {
                let mut t = TableDescriptor::new(name.as_ref(), Vec::new());
                t.foreign_keys = refs
                    .iter()
                    .map(|r| ForeignKeyRef::new("", r.as_ref(), ""))
                    .collect();
                t
            })
            .collect();
        Self::build(&tables)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// In-scope tables that `table` depends on.
    pub fn dependencies(&self, table: &str) -> Vec<&str> {
        self.position(table)
            .map(|i| self.depends_on[i].iter().map(|&j| self.nodes[j].as_str()).collect())
            .unwrap_or_default()
    }

    /// In-scope tables that depend on `table`.
    pub fn dependents(&self, table: &str) -> Vec<&str> {
        self.position(table)
            .map(|i| self.dependents[i].iter().map(|&j| self.nodes[j].as_str()).collect())
            .unwrap_or_default()
    }

    fn position(&self, table: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n == table)
    }

    /// Creation order: referenced tables before referencing ones.
    ///
    /// Kahn's algorithm with a FIFO queue seeded in input order. Tables still
    /// unresolved when the queue drains (cycle members and anything that
    /// depends on them) are appended in input order, so the result always
    /// holds every node exactly once and is stable for a given input.
    pub fn topological_order(&self) -> Vec<String> {
        let mut in_degree: Vec<usize> = self.depends_on.iter().map(BTreeSet::len).collect();
        let mut queue: VecDeque<usize> = (0..self.nodes.len()).filter(|&i| in_degree[i] == 0).collect();
        let mut emitted = vec![false; self.nodes.len()];
        let mut order = Vec::with_capacity(self.nodes.len());

        while let Some(i) = queue.pop_front() {
            emitted[i] = true;
            order.push(self.nodes[i].clone());
            for &dependent in &self.dependents[i] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    queue.push_back(dependent);
                }
            }
        }

        if order.len() < self.nodes.len() {
            let unresolved: Vec<&str> = (0..self.nodes.len())
                .filter(|&i| !emitted[i])
                .map(|i| self.nodes[i].as_str())
                .collect();
            warn!(
                "Circular foreign key dependencies among {} tables, appending in input order: {}",
                unresolved.len(),
                unresolved.join(", ")
            );
            order.extend(unresolved.into_iter().map(String::from));
        }

        order
    }

    /// Drop order: dependents before their dependencies.
    pub fn reverse_order(&self) -> Vec<String> {
        let mut order = self.topological_order();
        order.reverse();
        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(order: &[String], name: &str) -> usize {
        order.iter().position(|n| n == name).unwrap()
    }

    #[test]
    fn test_independent_tables_keep_input_order() {
        let g = DependencyGraph::from_edges(&[("c", vec![]), ("a", vec![]), ("b", vec![])]);
        assert_eq!(g.topological_order(), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_parent_before_child() {
        let g = DependencyGraph::from_edges(&[("t_orders", vec!["t_users"]), ("t_users", vec![])]);
        assert_eq!(g.topological_order(), vec!["t_users", "t_orders"]);
    }

    #[test]
    fn test_chain_and_diamond() {
        let g = DependencyGraph::from_edges(&[
            ("items", vec!["orders", "products"]),
            ("orders", vec!["users"]),
            ("products", vec!["categories"]),
            ("users", vec![]),
            ("categories", vec![]),
        ]);
        let order = g.topological_order();
        assert_eq!(order.len(), 5);
        assert!(pos(&order, "users") < pos(&order, "orders"));
        assert!(pos(&order, "orders") < pos(&order, "items"));
        assert!(pos(&order, "categories") < pos(&order, "products"));
        assert!(pos(&order, "products") < pos(&order, "items"));
    }

    #[test]
    fn test_self_reference_is_not_a_cycle() {
        let g = DependencyGraph::from_edges(&[("node", vec!["node"]), ("root", vec![])]);
        assert_eq!(g.topological_order(), vec!["node", "root"]);
        assert!(g.dependencies("node").is_empty());
    }

    #[test]
    fn test_out_of_set_references_ignored() {
        let g = DependencyGraph::from_edges(&[("t_a", vec!["legacy_users"])]);
        assert_eq!(g.topological_order(), vec!["t_a"]);
    }

    #[test]
    fn test_mutual_cycle_is_appended_after_acyclic_prefix() {
        let g = DependencyGraph::from_edges(&[
            ("a", vec!["b"]),
            ("b", vec!["a"]),
            ("solo", vec![]),
        ]);
        let order = g.topological_order();
        assert_eq!(order, vec!["solo", "a", "b"]);
        assert_eq!(g.topological_order(), order);
    }

    #[test]
    fn test_dependents_of_cycle_also_resolve_once() {
        let g = DependencyGraph::from_edges(&[
            ("x", vec!["y"]),
            ("y", vec!["x"]),
            ("z", vec!["x"]),
            ("base", vec![]),
        ]);
        let order = g.topological_order();
        assert_eq!(order.len(), 4);
        assert_eq!(order[0], "base");
        let mut sorted = order.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), 4);
    }

    #[test]
    fn test_every_table_exactly_once_for_dense_graph() {
        let names: Vec<String> = (0..12).map(|i| format!("t{}", i)).collect();
        let edges: Vec<(String, Vec<String>)> = names
            .iter()
            .enumerate()
            .map(|(i, n)| (n.clone(), names.iter().take(i).step_by(2).cloned().collect()))
            .collect();
        let g = DependencyGraph::from_edges(&edges);
        let order = g.topological_order();
        assert_eq!(order.len(), 12);
        for (i, name) in names.iter().enumerate() {
            for dep in names.iter().take(i).step_by(2) {
                assert!(pos(&order, dep) < pos(&order, name));
            }
        }
    }

    #[test]
    fn test_reverse_order_drops_children_first() {
        let g = DependencyGraph::from_edges(&[("child", vec!["parent"]), ("parent", vec![])]);
        assert_eq!(g.reverse_order(), vec!["child", "parent"]);
        assert_eq!(g.dependents("parent"), vec!["child"]);
    }
}
