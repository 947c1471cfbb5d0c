//! The marked graph: nodes in marking order with the reason each was first marked.

use std::collections::HashMap;
use std::fmt::{self, Write};
use std::hash::Hash;

use crate::{dependency::EdgeLabel, utils::escape_dot, Error};

/// Index of a marked node, assigned in marking order.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Returns the position of the node in marking order.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Why a node was marked the first time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkReason {
    /// Added as a root
    Root(EdgeLabel),
    /// Static dependency of `from`
    Static {
        /// The node whose expansion produced the edge
        from: NodeId,
        /// Edge label
        label: EdgeLabel,
    },
    /// Conditional dependency of `from`, released by `condition`
    Conditional {
        /// The node whose expansion produced the edge
        from: NodeId,
        /// The node whose marking released it
        condition: NodeId,
        /// Edge label
        label: EdgeLabel,
    },
    /// Found by the dynamic search of `from`
    Dynamic {
        /// The searching node
        from: NodeId,
        /// Edge label
        label: EdgeLabel,
    },
}

impl MarkReason {
    /// Returns the node responsible for the marking, `None` for roots.
    #[must_use]
    pub fn source(&self) -> Option<NodeId> {
        match *self {
            MarkReason::Root(_) => None,
            MarkReason::Static { from, .. }
            | MarkReason::Conditional { from, .. }
            | MarkReason::Dynamic { from, .. } => Some(from),
        }
    }

    /// Returns the edge label.
    #[must_use]
    pub fn label(&self) -> EdgeLabel {
        match *self {
            MarkReason::Root(label)
            | MarkReason::Static { label, .. }
            | MarkReason::Conditional { label, .. }
            | MarkReason::Dynamic { label, .. } => label,
        }
    }
}

/// An error raised while expanding a single node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeFailure<N> {
    /// The node that failed; it stays marked without dependencies
    pub node: N,
    /// What went wrong
    pub error: Error,
}

/// Counters describing one analysis run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnalyzerStats {
    /// Nodes marked
    pub marked: usize,
    /// Nodes expanded (including failed expansions)
    pub expanded: usize,
    /// Static edges reported by expansions
    pub static_edges: usize,
    /// Conditional edges reported by expansions
    pub conditional_edges: usize,
    /// Conditional edges whose condition got marked
    pub conditional_edges_released: usize,
    /// Edges found by dynamic searches
    pub dynamic_edges: usize,
    /// Batches of deferred expansions
    pub deferred_batches: usize,
    /// Fixed-point iterations
    pub iterations: usize,
    /// Node expansions that failed
    pub failures: usize,
}

/// The result of a dependency analysis.
#[derive(Debug, Clone)]
pub struct DependencyGraph<N> {
    pub(crate) nodes: Vec<N>,
    pub(crate) ids: HashMap<N, NodeId>,
    pub(crate) reasons: Vec<MarkReason>,
    pub(crate) failures: Vec<NodeFailure<N>>,
    pub(crate) stats: AnalyzerStats,
}

impl<N> Default for DependencyGraph<N> {
    fn default() -> Self {
        DependencyGraph {
            nodes: Vec::new(),
            ids: HashMap::new(),
            reasons: Vec::new(),
            failures: Vec::new(),
            stats: AnalyzerStats::default(),
        }
    }
}

impl<N: Clone + Eq + Hash> DependencyGraph<N> {
    /// Returns every marked node in marking order.
    #[must_use]
    pub fn marked_nodes(&self) -> &[N] {
        &self.nodes
    }

    /// Returns the number of marked nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if nothing was marked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns `true` if `node` is marked.
    #[must_use]
    pub fn is_marked(&self, node: &N) -> bool {
        self.ids.contains_key(node)
    }

    /// Returns the id of `node` if it is marked.
    #[must_use]
    pub fn node_id(&self, node: &N) -> Option<NodeId> {
        self.ids.get(node).copied()
    }

    /// Returns the node with id `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not handed out by this graph.
    #[must_use]
    pub fn node(&self, id: NodeId) -> &N {
        &self.nodes[id.0]
    }

    /// Returns why `node` was first marked.
    #[must_use]
    pub fn reason(&self, node: &N) -> Option<MarkReason> {
        self.node_id(node).map(|id| self.reasons[id.0])
    }

    /// Returns the first-reason chain from `node` back to the root that caused it,
    /// starting with `node` itself. Each entry carries the label of the edge that marked it.
    #[must_use]
    pub fn path_to_root(&self, node: &N) -> Option<Vec<(N, EdgeLabel)>> {
        let mut current = self.node_id(node)?;
        let mut path = Vec::new();
        loop {
            let reason = self.reasons[current.0];
            path.push((self.nodes[current.0].clone(), reason.label()));
            match reason.source() {
                Some(source) => current = source,
                None => return Some(path),
            }
        }
    }

    /// Returns the per-node failures recorded during expansion.
    #[must_use]
    pub fn failures(&self) -> &[NodeFailure<N>] {
        &self.failures
    }

    /// Returns the run counters.
    #[must_use]
    pub fn stats(&self) -> AnalyzerStats {
        self.stats
    }
}

impl<N: Clone + Eq + Hash + fmt::Display> DependencyGraph<N> {
    /// Renders the first-reason tree in Graphviz DOT format, labelling nodes with their
    /// `Display` form.
    #[must_use]
    pub fn to_dot(&self, name: &str) -> String {
        self.to_dot_with(name, ToString::to_string)
    }
}

impl<N: Clone + Eq + Hash> DependencyGraph<N> {
    /// Renders the first-reason tree in Graphviz DOT format.
    ///
    /// Every marked node appears once; each non-root node has exactly one incoming edge,
    /// the one that marked it first. Failed nodes are drawn in red.
    #[must_use]
    pub fn to_dot_with(&self, name: &str, label: impl Fn(&N) -> String) -> String {
        let failed: std::collections::HashSet<&N> =
            self.failures.iter().map(|failure| &failure.node).collect();

        let mut dot = String::new();
        let _ = writeln!(dot, "digraph \"{}\" {{", escape_dot(name));
        let _ = writeln!(dot, "  node [shape=box, fontname=\"monospace\"];");
        for (index, node) in self.nodes.iter().enumerate() {
            let id = NodeId(index);
            let style = match self.reasons[index] {
                MarkReason::Root(_) => ", style=bold",
                _ if failed.contains(node) => ", color=red",
                _ => "",
            };
            let _ = writeln!(
                dot,
                "  {id} [label=\"{}\"{style}];",
                escape_dot(&label(node))
            );
        }
        for (index, reason) in self.reasons.iter().enumerate() {
            let id = NodeId(index);
            let Some(source) = reason.source() else {
                continue;
            };
            let style = match reason {
                MarkReason::Conditional { .. } => ", style=dashed",
                MarkReason::Dynamic { .. } => ", style=dotted",
                _ => "",
            };
            let _ = writeln!(
                dot,
                "  {source} -> {id} [label=\"{}\"{style}];",
                escape_dot(reason.label())
            );
        }
        dot.push_str("}\n");
        dot
    }
}
