//! Module dependency graph.
//!
//! Nodes are module names. An edge `m -> d` means `d` must be evaluated
//! before `m`. Dependencies on names that no module declares are kept as
//! nodes without a definition; callers looking them up get `None` and carry
//! on.
//!
//! Ordering never fails. Cycles are skipped during the walk and logged.
//! Declared modules the walk from the roots did not reach (members of a
//! cycle nothing depends on) are walked next, in declaration order. The
//! result contains every node exactly once and keeps dependencies outside a
//! cycle ahead of it, but is not a valid topological order inside the cycle.

use indexmap::{IndexMap, IndexSet};
use tracing::{debug, warn};

use crate::module::Module;

#[derive(Debug, Clone, Default)]
struct Node {
    /// Whether a module with this name was declared.
    declared: bool,
    dependencies: IndexSet<String>,
    dependants: IndexSet<String>,
}

/// Directed graph of module names.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: IndexMap<String, Node>,
}

/// Outcome of one ordering walk.
struct Walk {
    order: Vec<String>,
    cycles: Vec<Vec<String>>,
}

impl DependencyGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the graph for a module set.
    ///
    /// Every module becomes a node first, in declaration order, then the
    /// dependency edges are added in declaration order.
    #[must_use]
    pub fn from_modules(modules: &[Module]) -> Self {
        let mut graph = Self::new();
        for module in modules {
            graph.add_module(module.name());
        }
        for module in modules {
            for dependency in module.dependency_names() {
                graph.add_dependency(module.name(), dependency);
            }
        }
        graph
    }

    /// Adds a declared module node. Adding the same name twice is a no-op.
    pub fn add_module(&mut self, name: &str) {
        self.nodes.entry(name.to_string()).or_default().declared = true;
    }

    /// Adds an edge meaning `dependency` must be evaluated before `module`.
    ///
    /// Either end is created as an undeclared node if missing.
    pub fn add_dependency(&mut self, module: &str, dependency: &str) {
        self.nodes
            .entry(module.to_string())
            .or_default()
            .dependencies
            .insert(dependency.to_string());
        self.nodes
            .entry(dependency.to_string())
            .or_default()
            .dependants
            .insert(module.to_string());
    }

    /// Returns whether the graph has a node with this name.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// Returns whether a module with this name was declared.
    #[must_use]
    pub fn is_declared(&self, name: &str) -> bool {
        self.nodes.get(name).is_some_and(|node| node.declared)
    }

    /// Number of nodes, undeclared dependencies included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if the graph has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Evaluation order: every dependency before its dependants.
    ///
    /// Deterministic for a given sequence of `add_*` calls. Each detected
    /// cycle is logged at `warn` level.
    #[must_use]
    pub fn order(&self) -> Vec<String> {
        let walk = self.walk();
        for cycle in &walk.cycles {
            warn!(
                cycle = %cycle.join(" -> "),
                "Circular module dependency, ordering is best effort"
            );
        }
        debug!(order = ?walk.order, "Computed module order");
        walk.order
    }

    /// Cycles found by the ordering walk, each as a closed path.
    #[must_use]
    pub fn cycles(&self) -> Vec<Vec<String>> {
        self.walk().cycles
    }

    /// Everything `name` depends on, directly or not, in evaluation order.
    #[must_use]
    pub fn dependencies_of(&self, name: &str) -> Vec<String> {
        let mut visited = IndexSet::new();
        let mut stack = Vec::new();
        let mut cycles = Vec::new();
        let mut order = Vec::new();
        if self.nodes.contains_key(name) {
            self.visit(name, &mut visited, &mut stack, &mut cycles, &mut order);
        }
        order.retain(|node| node != name);
        order
    }

    /// Modules that depend on `name` directly.
    #[must_use]
    pub fn dependants_of(&self, name: &str) -> Vec<String> {
        self.nodes
            .get(name)
            .map(|node| node.dependants.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn walk(&self) -> Walk {
        let mut visited = IndexSet::new();
        let mut stack = Vec::new();
        let mut cycles = Vec::new();
        let mut order = Vec::new();

        // Start from every node nothing depends on.
        for (name, node) in &self.nodes {
            if node.dependants.is_empty() {
                self.visit(name, &mut visited, &mut stack, &mut cycles, &mut order);
            }
        }

        // Cycles nobody depends on are never reached above. Walk them from
        // their declared members, in declaration order, so their acyclic
        // dependencies still come first.
        for (name, node) in &self.nodes {
            if node.declared && !visited.contains(name.as_str()) {
                self.visit(name, &mut visited, &mut stack, &mut cycles, &mut order);
            }
        }

        Walk { order, cycles }
    }

    /// Post-order depth-first visit. `stack` holds the nodes currently being
    /// visited; hitting one of them again closes a cycle, which is recorded
    /// and not followed.
    fn visit<'a>(
        &'a self,
        name: &'a str,
        visited: &mut IndexSet<&'a str>,
        stack: &mut Vec<&'a str>,
        cycles: &mut Vec<Vec<String>>,
        order: &mut Vec<String>,
    ) {
        if visited.contains(name) {
            return;
        }
        if let Some(start) = stack.iter().position(|entry| *entry == name) {
            let mut cycle: Vec<String> = stack[start..].iter().map(ToString::to_string).collect();
            cycle.push(name.to_string());
            cycles.push(cycle);
            return;
        }
        let Some(node) = self.nodes.get(name) else {
            return;
        };

        stack.push(name);
        for dependency in &node.dependencies {
            self.visit(dependency, visited, stack, cycles, order);
        }
        stack.pop();

        visited.insert(name);
        order.push(name.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(declarations: &[(&str, &[&str])]) -> DependencyGraph {
        let mut graph = DependencyGraph::new();
        for (name, _) in declarations {
            graph.add_module(name);
        }
        for (name, dependencies) in declarations {
            for dependency in *dependencies {
                graph.add_dependency(name, dependency);
            }
        }
        graph
    }

    fn position(order: &[String], name: &str) -> usize {
        order.iter().position(|entry| entry == name).unwrap()
    }

    #[test]
    fn test_linear_chain() {
        let graph = graph(&[("A", &[]), ("B", &["A"]), ("C", &["B"])]);
        assert_eq!(graph.order(), vec!["A", "B", "C"]);
        assert!(graph.cycles().is_empty());
    }

    #[test]
    fn test_declaration_order_does_not_matter() {
        let graph = graph(&[("C", &["B"]), ("B", &["A"]), ("A", &[])]);
        assert_eq!(graph.order(), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_every_edge_respected_in_diamond() {
        let graph = graph(&[
            ("app", &["users", "posts"]),
            ("posts", &["users", "db"]),
            ("users", &["db"]),
            ("db", &[]),
            ("standalone", &[]),
        ]);
        let order = graph.order();
        assert_eq!(order.len(), 5);
        for (module, dependency) in [
            ("app", "users"),
            ("app", "posts"),
            ("posts", "users"),
            ("posts", "db"),
            ("users", "db"),
        ] {
            assert!(position(&order, dependency) < position(&order, module));
        }
    }

    #[test]
    fn test_undeclared_dependency_is_kept_as_node() {
        let graph = graph(&[("A", &["ghost"])]);
        assert_eq!(graph.order(), vec!["ghost", "A"]);
        assert!(graph.contains("ghost"));
        assert!(!graph.is_declared("ghost"));
    }

    #[test]
    fn test_cycle_still_yields_permutation() {
        let graph = graph(&[("A", &["B"]), ("B", &["A"]), ("C", &[])]);
        let order = graph.order();

        let mut sorted = order.clone();
        sorted.sort();
        assert_eq!(sorted, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_cycle_reachable_from_root_is_recorded() {
        let graph = graph(&[("app", &["A"]), ("A", &["B"]), ("B", &["A"])]);
        let order = graph.order();

        assert_eq!(order, vec!["B", "A", "app"]);
        assert_eq!(graph.cycles(), vec![vec!["A", "B", "A"]]);
    }

    #[test]
    fn test_unreachable_cycle_walked_in_declaration_order() {
        let graph = graph(&[("X", &["Y"]), ("Y", &["X"]), ("Z", &[])]);
        assert_eq!(graph.order(), vec!["Z", "Y", "X"]);
        assert_eq!(graph.cycles(), vec![vec!["X", "Y", "X"]]);
    }

    #[test]
    fn test_unreachable_cycle_keeps_shared_dependency_first() {
        let graph = graph(&[("A", &["B", "core"]), ("B", &["A", "core"]), ("core", &[])]);
        let order = graph.order();

        assert_eq!(order, vec!["core", "B", "A"]);
        assert!(position(&order, "core") < position(&order, "A"));
        assert!(position(&order, "core") < position(&order, "B"));
    }

    #[test]
    fn test_undeclared_dependency_of_unreachable_cycle_is_kept() {
        let graph = graph(&[("X", &["Y", "ghost"]), ("Y", &["X"])]);
        let order = graph.order();

        assert_eq!(order, vec!["Y", "ghost", "X"]);
        assert!(!graph.is_declared("ghost"));
    }

    #[test]
    fn test_order_is_deterministic() {
        let graph = graph(&[("A", &["B", "C"]), ("B", &["C"]), ("C", &["A"]), ("D", &["A"])]);
        let first = graph.order();
        for _ in 0..10 {
            assert_eq!(graph.order(), first);
        }
    }

    #[test]
    fn test_self_dependency() {
        let graph = graph(&[("A", &["A"])]);
        assert_eq!(graph.order(), vec!["A"]);
    }

    #[test]
    fn test_dependencies_and_dependants() {
        let graph = graph(&[("A", &[]), ("B", &["A"]), ("C", &["B"])]);
        assert_eq!(graph.dependencies_of("C"), vec!["A", "B"]);
        assert_eq!(graph.dependants_of("A"), vec!["B"]);
        assert!(graph.dependencies_of("missing").is_empty());
    }
}
