//! The node contract of the dependency engine.

use std::fmt::{Debug, Display};
use std::hash::Hash;

use crate::Result;

/// Label explaining why an edge exists, shown in diagnostics and DOT output.
pub type EdgeLabel = &'static str;

/// An unconditional edge to `target`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyEdge<N> {
    /// The node that becomes marked
    pub target: N,
    /// Why the edge exists
    pub label: EdgeLabel,
}

/// An edge to `target` that only takes effect once `condition` is marked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionalDependency<N> {
    /// The node that becomes marked
    pub target: N,
    /// The node whose marking releases the edge
    pub condition: N,
    /// Why the edge exists
    pub label: EdgeLabel,
}

/// Everything a node contributes when it is expanded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expansion<N> {
    /// Nodes marked as soon as the expanding node is processed
    pub static_dependencies: Vec<DependencyEdge<N>>,
    /// Nodes marked once their condition is marked
    pub conditional_dependencies: Vec<ConditionalDependency<N>>,
}

impl<N> Default for Expansion<N> {
    fn default() -> Self {
        Expansion {
            static_dependencies: Vec::new(),
            conditional_dependencies: Vec::new(),
        }
    }
}

impl<N> Expansion<N> {
    /// Creates an empty expansion.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an unconditional dependency.
    pub fn add(&mut self, target: N, label: EdgeLabel) {
        self.static_dependencies
            .push(DependencyEdge { target, label });
    }

    /// Adds a dependency on `target` that applies once `condition` is marked.
    pub fn add_conditional(&mut self, target: N, condition: N, label: EdgeLabel) {
        self.conditional_dependencies.push(ConditionalDependency {
            target,
            condition,
            label,
        });
    }

    /// Returns `true` if the expansion contributes no edges.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.static_dependencies.is_empty() && self.conditional_dependencies.is_empty()
    }
}

/// A node of the dependency graph.
///
/// Nodes are plain values with structural equality; the analyzer deduplicates them, so
/// producing the same node from many places is cheap and expected. `C` is the context
/// passed to every expansion, shared by all nodes of one analysis.
pub trait DependencyNode<C: ?Sized>: Clone + Eq + Hash + Debug + Display + Send + Sync {
    /// Computes the static and conditional dependencies of this node.
    ///
    /// # Errors
    ///
    /// An error fails only this node; the analyzer records it and carries on.
    fn expand(&self, context: &C) -> Result<Expansion<Self>>;

    /// Returns `true` if expansion is expensive and should be batched with other deferred
    /// nodes, possibly in parallel.
    fn is_expansion_deferred(&self) -> bool {
        false
    }

    /// Returns `true` if this node must be shown newly marked nodes to discover more edges.
    fn has_dynamic_dependencies(&self) -> bool {
        false
    }

    /// Inspects `marked`, the nodes marked since the previous search, and returns any edges
    /// they give rise to.
    ///
    /// # Errors
    ///
    /// An error fails only this node.
    fn search_dynamic_dependencies(
        &self,
        _marked: &[Self],
        _context: &C,
    ) -> Result<Vec<DependencyEdge<Self>>> {
        Ok(Vec::new())
    }
}
