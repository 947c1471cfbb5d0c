//! Fixed-point driver over self-expanding nodes.

use std::collections::{HashMap, VecDeque};

use rayon::prelude::*;

use crate::{
    dependency::{
        AnalyzerStats, CancellationToken, DependencyGraph, DependencyNode, EdgeLabel, Expansion,
        MarkReason, NodeFailure, NodeId,
    },
    utils::BitSet,
    Error, Result,
};

struct PendingConditional<N> {
    target: N,
    from: NodeId,
    label: EdgeLabel,
}

struct DynamicSearch {
    node: NodeId,
    searched: usize,
}

/// Computes the set of nodes reachable from a set of roots.
///
/// The analyzer owns an explicit FIFO worklist, so arbitrarily deep graphs never grow the
/// call stack. A node moves from unmarked to marked when an edge or root names it, and
/// from marked to expanded when the worklist reaches it. Marked nodes are never
/// unmarked and each node is expanded at most once.
///
/// One fixed-point iteration drains the worklist, then expands the pending deferred
/// nodes as one batch, then runs the dynamic searches. Iterations repeat until none of
/// them marks anything new.
///
/// # Examples
///
/// ```rust
/// use dotaot::dependency::{DependencyAnalyzer, DependencyNode, Expansion};
///
/// #[derive(Debug, Clone, PartialEq, Eq, Hash)]
/// struct Count(u32);
///
/// impl std::fmt::Display for Count {
///     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
///         write!(f, "{}", self.0)
///     }
/// }
///
/// impl DependencyNode<u32> for Count {
///     fn expand(&self, limit: &u32) -> dotaot::Result<Expansion<Self>> {
///         let mut expansion = Expansion::new();
///         if self.0 < *limit {
///             expansion.add(Count(self.0 + 1), "next");
///         }
///         Ok(expansion)
///     }
/// }
///
/// let limit = 10;
/// let mut analyzer = DependencyAnalyzer::new(&limit);
/// analyzer.add_root(Count(0), "start");
/// analyzer.compute_marked_nodes()?;
/// assert_eq!(analyzer.marked_nodes().len(), 11);
/// # Ok::<(), dotaot::Error>(())
/// ```
pub struct DependencyAnalyzer<'c, N, C: ?Sized> {
    context: &'c C,
    graph: DependencyGraph<N>,
    worklist: VecDeque<NodeId>,
    deferred: Vec<NodeId>,
    expanded: BitSet,
    pending_conditionals: HashMap<N, Vec<PendingConditional<N>>>,
    dynamic: Vec<DynamicSearch>,
    single_threaded: bool,
    cancellation: Option<CancellationToken>,
}

impl<'c, N, C> DependencyAnalyzer<'c, N, C>
where
    N: DependencyNode<C>,
    C: ?Sized + Sync,
{
    /// Creates an analyzer whose nodes expand against `context`.
    #[must_use]
    pub fn new(context: &'c C) -> Self {
        DependencyAnalyzer {
            context,
            graph: DependencyGraph::default(),
            worklist: VecDeque::new(),
            deferred: Vec::new(),
            expanded: BitSet::new(),
            pending_conditionals: HashMap::new(),
            dynamic: Vec::new(),
            single_threaded: false,
            cancellation: None,
        }
    }

    /// Expands deferred batches on the calling thread instead of the rayon pool.
    #[must_use]
    pub fn single_threaded(mut self, single_threaded: bool) -> Self {
        self.single_threaded = single_threaded;
        self
    }

    /// Makes [`DependencyAnalyzer::compute_marked_nodes`] observe `token`.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Marks `node` as a root. Adding a node that is already marked has no effect.
    pub fn add_root(&mut self, node: N, label: EdgeLabel) {
        self.mark(node, MarkReason::Root(label));
    }

    /// Runs the analysis to its fixed point.
    ///
    /// Roots may be added again afterwards and the analysis resumed; previously marked
    /// nodes are not revisited.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] if the cancellation token fires. Failures of individual
    /// nodes are not errors here; see [`DependencyAnalyzer::failures`].
    pub fn compute_marked_nodes(&mut self) -> Result<()> {
        loop {
            if self
                .cancellation
                .as_ref()
                .is_some_and(CancellationToken::is_cancelled)
            {
                log::info!(
                    "dependency analysis cancelled after {} nodes",
                    self.graph.nodes.len()
                );
                return Err(Error::Cancelled);
            }
            self.graph.stats.iterations += 1;

            while let Some(id) = self.worklist.pop_front() {
                self.expand_node(id);
            }
            if !self.deferred.is_empty() {
                self.expand_deferred_batch();
                continue;
            }
            if !self.search_dynamic_dependencies() {
                break;
            }
        }

        log::debug!(
            "dependency analysis reached a fixed point: {} nodes marked, {} failures, {} iterations",
            self.graph.nodes.len(),
            self.graph.failures.len(),
            self.graph.stats.iterations
        );
        Ok(())
    }

    /// Returns every marked node in marking order.
    #[must_use]
    pub fn marked_nodes(&self) -> &[N] {
        self.graph.marked_nodes()
    }

    /// Returns `true` if `node` is marked.
    #[must_use]
    pub fn is_marked(&self, node: &N) -> bool {
        self.graph.is_marked(node)
    }

    /// Returns the failures recorded so far.
    #[must_use]
    pub fn failures(&self) -> &[NodeFailure<N>] {
        self.graph.failures()
    }

    /// Returns the run counters.
    #[must_use]
    pub fn stats(&self) -> AnalyzerStats {
        self.graph.stats()
    }

    /// Returns the marked graph built so far.
    #[must_use]
    pub fn graph(&self) -> &DependencyGraph<N> {
        &self.graph
    }

    /// Consumes the analyzer and returns the marked graph.
    #[must_use]
    pub fn into_graph(self) -> DependencyGraph<N> {
        self.graph
    }

    fn mark(&mut self, node: N, reason: MarkReason) {
        let mut pending = vec![(node, reason)];
        while let Some((node, reason)) = pending.pop() {
            if self.graph.ids.contains_key(&node) {
                continue;
            }

            let id = NodeId(self.graph.nodes.len());
            log::trace!("marking {node} ({})", reason.label());
            self.graph.nodes.push(node.clone());
            self.graph.ids.insert(node.clone(), id);
            self.graph.reasons.push(reason);
            self.graph.stats.marked += 1;

            if node.has_dynamic_dependencies() {
                self.dynamic.push(DynamicSearch {
                    node: id,
                    searched: 0,
                });
            }
            if node.is_expansion_deferred() {
                self.deferred.push(id);
            } else {
                self.worklist.push_back(id);
            }

            if let Some(waiting) = self.pending_conditionals.remove(&node) {
                self.graph.stats.conditional_edges_released += waiting.len();
                pending.extend(waiting.into_iter().map(|conditional| {
                    (
                        conditional.target,
                        MarkReason::Conditional {
                            from: conditional.from,
                            condition: id,
                            label: conditional.label,
                        },
                    )
                }));
            }
        }
    }

    fn expand_node(&mut self, id: NodeId) {
        if !self.expanded.insert(id.0) {
            return;
        }
        let node = self.graph.nodes[id.0].clone();
        let result = node.expand(self.context);
        self.apply_expansion(id, result);
    }

    fn expand_deferred_batch(&mut self) {
        let batch: Vec<(NodeId, N)> = std::mem::take(&mut self.deferred)
            .into_iter()
            .filter(|id| self.expanded.insert(id.0))
            .map(|id| (id, self.graph.nodes[id.0].clone()))
            .collect();
        if batch.is_empty() {
            return;
        }

        self.graph.stats.deferred_batches += 1;
        log::debug!("expanding a deferred batch of {} nodes", batch.len());

        let context = self.context;
        let results: Vec<(NodeId, Result<Expansion<N>>)> = if self.single_threaded {
            batch
                .iter()
                .map(|(id, node)| (*id, node.expand(context)))
                .collect()
        } else {
            batch
                .par_iter()
                .map(|(id, node)| (*id, node.expand(context)))
                .collect()
        };

        for (id, result) in results {
            self.apply_expansion(id, result);
        }
    }

    fn apply_expansion(&mut self, from: NodeId, result: Result<Expansion<N>>) {
        self.graph.stats.expanded += 1;
        let expansion = match result {
            Ok(expansion) => expansion,
            Err(error) => {
                self.record_failure(from, error);
                return;
            }
        };

        self.graph.stats.static_edges += expansion.static_dependencies.len();
        self.graph.stats.conditional_edges += expansion.conditional_dependencies.len();

        for edge in expansion.static_dependencies {
            self.mark(
                edge.target,
                MarkReason::Static {
                    from,
                    label: edge.label,
                },
            );
        }
        for conditional in expansion.conditional_dependencies {
            if let Some(condition) = self.graph.node_id(&conditional.condition) {
                self.graph.stats.conditional_edges_released += 1;
                self.mark(
                    conditional.target,
                    MarkReason::Conditional {
                        from,
                        condition,
                        label: conditional.label,
                    },
                );
            } else if !self.graph.ids.contains_key(&conditional.target) {
                self.pending_conditionals
                    .entry(conditional.condition)
                    .or_default()
                    .push(PendingConditional {
                        target: conditional.target,
                        from,
                        label: conditional.label,
                    });
            }
        }
    }

    /// Runs every dynamic search over the nodes marked since its last run. Returns `true`
    /// if anything new got marked.
    fn search_dynamic_dependencies(&mut self) -> bool {
        let marked_before = self.graph.nodes.len();
        let mut found = Vec::new();
        let mut failed = Vec::new();

        for search in &mut self.dynamic {
            let end = self.graph.nodes.len();
            if search.searched == end {
                continue;
            }
            let node = &self.graph.nodes[search.node.0];
            let new_nodes = &self.graph.nodes[search.searched..end];
            search.searched = end;
            if self.graph.failures.iter().any(|failure| &failure.node == node) {
                continue;
            }
            match node.search_dynamic_dependencies(new_nodes, self.context) {
                Ok(edges) => found.push((search.node, edges)),
                Err(error) => failed.push((search.node, error)),
            }
        }

        for (id, error) in failed {
            self.record_failure(id, error);
        }
        for (from, edges) in found {
            self.graph.stats.dynamic_edges += edges.len();
            for edge in edges {
                self.mark(
                    edge.target,
                    MarkReason::Dynamic {
                        from,
                        label: edge.label,
                    },
                );
            }
        }

        self.graph.nodes.len() > marked_before
    }

    fn record_failure(&mut self, id: NodeId, error: Error) {
        let node = self.graph.nodes[id.0].clone();
        log::debug!("expansion of {node} failed: {error}");
        self.graph.stats.failures += 1;
        self.graph.failures.push(NodeFailure { node, error });
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::fmt;

    use super::*;
    use crate::dependency::DependencyEdge;

    /// Nodes of a small hand-written graph.
    #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
    enum Toy {
        Plain(&'static str),
        Deferred(&'static str),
        /// Marks `Derived(x)` for every `Plain(x)` it sees.
        Watcher,
        Derived(&'static str),
    }

    impl fmt::Display for Toy {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{self:?}")
        }
    }

    #[derive(Default)]
    struct ToyGraph {
        edges: HashMap<Toy, Vec<Toy>>,
        conditional: HashMap<Toy, Vec<(Toy, Toy)>>,
        broken: Vec<Toy>,
    }

    impl DependencyNode<ToyGraph> for Toy {
        fn expand(&self, graph: &ToyGraph) -> Result<Expansion<Self>> {
            if graph.broken.contains(self) {
                return Err(Error::Error(format!("{self} is broken")));
            }
            let mut expansion = Expansion::new();
            for target in graph.edges.get(self).into_iter().flatten() {
                expansion.add(target.clone(), "edge");
            }
            for (target, condition) in graph.conditional.get(self).into_iter().flatten() {
                expansion.add_conditional(target.clone(), condition.clone(), "conditional");
            }
            Ok(expansion)
        }

        fn is_expansion_deferred(&self) -> bool {
            matches!(self, Toy::Deferred(_))
        }

        fn has_dynamic_dependencies(&self) -> bool {
            matches!(self, Toy::Watcher)
        }

        fn search_dynamic_dependencies(
            &self,
            marked: &[Self],
            _graph: &ToyGraph,
        ) -> Result<Vec<DependencyEdge<Self>>> {
            Ok(marked
                .iter()
                .filter_map(|node| match node {
                    Toy::Plain(name) => Some(DependencyEdge {
                        target: Toy::Derived(name),
                        label: "watched",
                    }),
                    _ => None,
                })
                .collect())
        }
    }

    fn run(graph: &ToyGraph, roots: &[Toy]) -> DependencyGraph<Toy> {
        let mut analyzer = DependencyAnalyzer::new(graph);
        for root in roots {
            analyzer.add_root(root.clone(), "root");
        }
        analyzer.compute_marked_nodes().unwrap();
        analyzer.into_graph()
    }

    #[test]
    fn static_edges_and_cycles() {
        let mut graph = ToyGraph::default();
        graph
            .edges
            .insert(Toy::Plain("a"), vec![Toy::Plain("b"), Toy::Plain("c")]);
        graph.edges.insert(Toy::Plain("b"), vec![Toy::Plain("a")]);

        let result = run(&graph, &[Toy::Plain("a")]);
        assert_eq!(result.len(), 3);
        assert!(result.is_marked(&Toy::Plain("c")));
        assert!(!result.is_marked(&Toy::Plain("z")));
        assert_eq!(result.stats().expanded, 3);
    }

    #[test]
    fn conditional_edges_are_order_independent() {
        let mut graph = ToyGraph::default();
        graph.conditional.insert(
            Toy::Plain("type"),
            vec![(Toy::Plain("impl"), Toy::Plain("slot"))],
        );
        graph.edges.insert(Toy::Plain("caller"), vec![Toy::Plain("slot")]);

        let condition_first = run(&graph, &[Toy::Plain("caller"), Toy::Plain("type")]);
        let condition_last = run(&graph, &[Toy::Plain("type"), Toy::Plain("caller")]);
        let never = run(&graph, &[Toy::Plain("type")]);

        assert!(condition_first.is_marked(&Toy::Plain("impl")));
        assert!(condition_last.is_marked(&Toy::Plain("impl")));
        assert!(!never.is_marked(&Toy::Plain("impl")));

        match condition_last.reason(&Toy::Plain("impl")).unwrap() {
            MarkReason::Conditional {
                from, condition, ..
            } => {
                assert_eq!(condition_last.node(from), &Toy::Plain("type"));
                assert_eq!(condition_last.node(condition), &Toy::Plain("slot"));
            }
            other => panic!("unexpected reason {other:?}"),
        }
    }

    #[test]
    fn deferred_nodes_expand_in_batches() {
        let mut graph = ToyGraph::default();
        graph.edges.insert(
            Toy::Plain("root"),
            vec![Toy::Deferred("x"), Toy::Deferred("y")],
        );
        graph.edges.insert(Toy::Deferred("x"), vec![Toy::Deferred("z")]);
        graph.edges.insert(Toy::Deferred("z"), vec![Toy::Plain("leaf")]);

        for single_threaded in [false, true] {
            let mut analyzer =
                DependencyAnalyzer::new(&graph).single_threaded(single_threaded);
            analyzer.add_root(Toy::Plain("root"), "root");
            analyzer.compute_marked_nodes().unwrap();
            assert!(analyzer.is_marked(&Toy::Plain("leaf")));
            assert_eq!(analyzer.stats().deferred_batches, 2);
        }
    }

    #[test]
    fn dynamic_search_sees_earlier_and_later_nodes() {
        let mut graph = ToyGraph::default();
        graph.edges.insert(Toy::Plain("early"), vec![Toy::Watcher]);
        graph
            .edges
            .insert(Toy::Derived("early"), vec![Toy::Plain("late")]);

        let result = run(&graph, &[Toy::Plain("early")]);
        assert!(result.is_marked(&Toy::Derived("early")));
        assert!(result.is_marked(&Toy::Derived("late")));
        assert_eq!(result.stats().dynamic_edges, 2);
    }

    #[test]
    fn failures_are_recorded_per_node() {
        let mut graph = ToyGraph::default();
        graph.edges.insert(
            Toy::Plain("root"),
            vec![Toy::Plain("bad"), Toy::Plain("good")],
        );
        graph.edges.insert(Toy::Plain("bad"), vec![Toy::Plain("hidden")]);
        graph.edges.insert(Toy::Plain("good"), vec![Toy::Plain("leaf")]);
        graph.broken.push(Toy::Plain("bad"));

        let result = run(&graph, &[Toy::Plain("root")]);
        assert!(result.is_marked(&Toy::Plain("bad")));
        assert!(!result.is_marked(&Toy::Plain("hidden")));
        assert!(result.is_marked(&Toy::Plain("leaf")));
        assert_eq!(result.failures().len(), 1);
        assert_eq!(result.failures()[0].node, Toy::Plain("bad"));
    }

    #[test]
    fn monotonic_under_additional_roots() {
        let mut graph = ToyGraph::default();
        graph.edges.insert(Toy::Plain("a"), vec![Toy::Plain("b")]);
        graph.edges.insert(Toy::Plain("c"), vec![Toy::Plain("d")]);

        let mut analyzer = DependencyAnalyzer::new(&graph);
        analyzer.add_root(Toy::Plain("a"), "root");
        analyzer.compute_marked_nodes().unwrap();
        let before: Vec<Toy> = analyzer.marked_nodes().to_vec();

        analyzer.add_root(Toy::Plain("c"), "root");
        analyzer.add_root(Toy::Plain("a"), "root");
        analyzer.compute_marked_nodes().unwrap();
        assert!(before.iter().all(|node| analyzer.is_marked(node)));
        assert_eq!(analyzer.marked_nodes().len(), 4);
    }

    #[test]
    fn cancellation_stops_the_run() {
        let graph = ToyGraph::default();
        let token = CancellationToken::new();
        token.cancel();
        let mut analyzer = DependencyAnalyzer::new(&graph).with_cancellation(token);
        analyzer.add_root(Toy::Plain("a"), "root");
        assert_eq!(analyzer.compute_marked_nodes(), Err(Error::Cancelled));
    }

    #[test]
    fn path_to_root_and_dot() {
        let mut graph = ToyGraph::default();
        graph.edges.insert(Toy::Plain("main"), vec![Toy::Plain("helper")]);
        graph
            .edges
            .insert(Toy::Plain("helper"), vec![Toy::Plain("List<T>")]);

        let result = run(&graph, &[Toy::Plain("main")]);
        let path = result.path_to_root(&Toy::Plain("List<T>")).unwrap();
        let names: Vec<Toy> = path.into_iter().map(|(node, _)| node).collect();
        assert_eq!(
            names,
            vec![Toy::Plain("List<T>"), Toy::Plain("helper"), Toy::Plain("main")]
        );

        let dot = result.to_dot("toy");
        assert!(dot.starts_with("digraph \"toy\" {"));
        assert!(dot.contains("n0 -> n1 [label=\"edge\"];"));
        assert!(dot.contains("List\\<T\\>"));
    }
}
