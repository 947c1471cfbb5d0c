use std::collections::HashSet;

use strum::{EnumCount, IntoEnumIterator};

use crate::{
    compilation::CompilationOptions,
    dependency::{
        AnalyzerStats, CancellationToken, DependencyAnalyzer, DependencyGraph, NodeFailure,
    },
    devirtualization::{MetadataDevirtualizationManager, ScannedDevirtualizationManager},
    il::MethodBodyProvider,
    scanner::{CompilationRoot, NodeFactory, ScanNode, ScanNodeKind},
    typesystem::{MethodId, TypeId, TypeSystemContext},
    Result,
};

/// Runs one dependency analysis from `roots` to its fixed point.
///
/// Node failures are escalated here: a fatal error anywhere, or any error on the node of
/// a required root or on the canonical body behind it, fails the run. Everything else is left in the graph's failure list.
pub(crate) fn analyze(
    factory: &NodeFactory<'_>,
    roots: &[CompilationRoot],
    cancellation: Option<&CancellationToken>,
) -> Result<DependencyGraph<ScanNode>> {
    let ctx = factory.context();
    let mut analyzer =
        DependencyAnalyzer::new(factory).single_threaded(factory.options().single_threaded);
    if let Some(token) = cancellation {
        analyzer = analyzer.with_cancellation(token.clone());
    }

    let mut required = HashSet::new();
    for root in roots {
        let nodes = match root.nodes(factory) {
            Ok(nodes) => nodes,
            Err(error) if root.required => return Err(error),
            Err(error) => {
                log::warn!("skipping optional root ({}): {error}", root.reason);
                continue;
            }
        };
        for node in nodes {
            if root.required {
                required.insert(node);
                // A shared instantiation fails through the canonical body it shadows.
                if let ScanNode::ShadowConcreteMethod(method) = node {
                    required.insert(ScanNode::MethodCode(factory.canonical_method(method)));
                }
            }
            analyzer.add_root(node, root.reason);
        }
    }

    analyzer.compute_marked_nodes()?;

    for failure in analyzer.failures() {
        if failure.error.is_fatal() || required.contains(&failure.node) {
            log::error!(
                "{} failed: {}",
                failure.node.describe(ctx),
                failure.error
            );
            return Err(failure.error.clone());
        }
        log::warn!("{} failed: {}", failure.node.describe(ctx), failure.error);
    }

    Ok(analyzer.into_graph())
}

/// Whole-program reachability from a set of roots.
///
/// The scan imports every reachable method body with metadata-only devirtualization and
/// records which types are constructed, which code is needed and which virtual slots are
/// used. Its results drive the scan-informed devirtualization of the compile pass.
pub struct IlScanner<'a> {
    context: &'a TypeSystemContext,
    bodies: &'a dyn MethodBodyProvider,
    options: CompilationOptions,
    cancellation: Option<CancellationToken>,
}

impl<'a> IlScanner<'a> {
    /// Creates a scanner with default options.
    #[must_use]
    pub fn new(context: &'a TypeSystemContext, bodies: &'a dyn MethodBodyProvider) -> Self {
        IlScanner {
            context,
            bodies,
            options: CompilationOptions::default(),
            cancellation: None,
        }
    }

    /// Replaces the options.
    #[must_use]
    pub fn with_options(mut self, options: CompilationOptions) -> Self {
        self.options = options;
        self
    }

    /// Observes `token` between fixed-point iterations.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Scans everything reachable from `roots`.
    ///
    /// # Errors
    ///
    /// Returns the first fatal node failure ([`crate::Error::UnresolvedReference`],
    /// [`crate::Error::RecursiveGenericTooDeep`], [`crate::Error::TypeLoad`]), any failure of
    /// a required root, or [`crate::Error::Cancelled`].
    pub fn scan(&self, roots: &[CompilationRoot]) -> Result<ScanResults> {
        log::info!("scanning from {} roots", roots.len());
        let devirtualization = MetadataDevirtualizationManager::new(self.context);
        let factory = NodeFactory::new(
            self.context,
            self.bodies,
            &self.options,
            &devirtualization,
        );
        let graph = analyze(&factory, roots, self.cancellation.as_ref())?;
        let results = ScanResults::new(graph, roots.to_vec());
        log::info!(
            "scan marked {} nodes: {} constructed types, {} methods, {} virtual slots",
            results.graph.len(),
            results.constructed_types.len(),
            results.compiled_methods.len(),
            results.vtable_slots.len()
        );
        let counts = results.marked_counts();
        for kind in ScanNodeKind::iter() {
            log::debug!("  {kind:?}: {}", counts[kind as usize]);
        }
        Ok(results)
    }
}

/// What a scan found to be reachable.
#[derive(Debug, Clone)]
pub struct ScanResults {
    graph: DependencyGraph<ScanNode>,
    roots: Vec<CompilationRoot>,
    constructed_types: Vec<TypeId>,
    compiled_methods: Vec<MethodId>,
    vtable_slots: Vec<MethodId>,
}

impl ScanResults {
    fn new(graph: DependencyGraph<ScanNode>, roots: Vec<CompilationRoot>) -> Self {
        let mut constructed_types = Vec::new();
        let mut compiled_methods = Vec::new();
        let mut vtable_slots = Vec::new();
        for node in graph.marked_nodes() {
            match *node {
                ScanNode::ConstructedType(ty) => constructed_types.push(ty),
                ScanNode::MethodCode(method) => compiled_methods.push(method),
                ScanNode::VTableSlot(method) => vtable_slots.push(method),
                _ => {}
            }
        }
        ScanResults {
            graph,
            roots,
            constructed_types,
            compiled_methods,
            vtable_slots,
        }
    }

    /// Returns the marked graph.
    #[must_use]
    pub fn graph(&self) -> &DependencyGraph<ScanNode> {
        &self.graph
    }

    /// Returns every marked node in marking order.
    #[must_use]
    pub fn marked_nodes(&self) -> &[ScanNode] {
        self.graph.marked_nodes()
    }

    /// Returns `true` if `node` was marked.
    #[must_use]
    pub fn is_marked(&self, node: &ScanNode) -> bool {
        self.graph.is_marked(node)
    }

    /// Returns the roots the scan started from.
    #[must_use]
    pub fn roots(&self) -> &[CompilationRoot] {
        &self.roots
    }

    /// Returns the exact types proven allocated, in marking order.
    #[must_use]
    pub fn constructed_types(&self) -> &[TypeId] {
        &self.constructed_types
    }

    /// Returns the methods whose code is needed, in the form that owns the code.
    #[must_use]
    pub fn compiled_methods(&self) -> &[MethodId] {
        &self.compiled_methods
    }

    /// Returns the slot-defining methods called virtually.
    #[must_use]
    pub fn vtable_slots(&self) -> &[MethodId] {
        &self.vtable_slots
    }

    /// Returns the number of marked nodes of each kind, indexed by `ScanNodeKind as usize`.
    #[must_use]
    pub fn marked_counts(&self) -> [usize; ScanNodeKind::COUNT] {
        let mut counts = [0; ScanNodeKind::COUNT];
        for node in self.graph.marked_nodes() {
            counts[node.kind() as usize] += 1;
        }
        counts
    }

    /// Returns the non-fatal node failures.
    #[must_use]
    pub fn failures(&self) -> &[NodeFailure<ScanNode>] {
        self.graph.failures()
    }

    /// Returns the analysis counters.
    #[must_use]
    pub fn stats(&self) -> AnalyzerStats {
        self.graph.stats()
    }

    /// Builds the scan-informed devirtualization manager.
    #[must_use]
    pub fn devirtualization_manager<'c>(
        &self,
        context: &'c TypeSystemContext,
    ) -> ScannedDevirtualizationManager<'c> {
        ScannedDevirtualizationManager::new(context, self.constructed_types.iter().copied())
    }

    /// Renders the first-reason tree in Graphviz DOT format with full entity names.
    #[must_use]
    pub fn to_dot(&self, context: &TypeSystemContext, name: &str) -> String {
        self.graph
            .to_dot_with(name, |node| node.describe(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devirtualization::DevirtualizationQuery;
    use crate::il::{InMemoryMethodBodyProvider, Instruction, MethodBody, MethodRef};
    use crate::test::TestWorld;
    use crate::typesystem::{MethodBuilder, TypeBuilder};
    use crate::Error;

    struct Program {
        world: TestWorld,
        bodies: InMemoryMethodBodyProvider,
        main: MethodId,
    }

    /// `Main` allocates a `Derived` and calls `Base::Virtual` on it.
    fn program() -> Program {
        let world = TestWorld::new();
        let ctx = &world.context;
        let program = TypeBuilder::new(ctx, "App", "Program").build().unwrap();
        let main = MethodBuilder::new(ctx, program, "Main")
            .static_method()
            .build()
            .unwrap();

        let bodies = InMemoryMethodBodyProvider::new();
        bodies.insert(
            main,
            MethodBody::new(vec![
                Instruction::NewObj(world.derived_ctor.into()),
                Instruction::callvirt(world.base_virtual),
                Instruction::Ret,
            ]),
        );
        for method in [
            world.base_ctor,
            world.derived_ctor,
            world.base_virtual,
            world.derived_virtual,
            world.hiding_virtual,
        ] {
            bodies.insert(method, MethodBody::new(vec![Instruction::Ret]));
        }
        Program {
            world,
            bodies,
            main,
        }
    }

    #[test]
    fn virtual_override_needs_slot_and_allocation() {
        let Program {
            world,
            bodies,
            main,
        } = program();
        let ctx = &world.context;
        let results = IlScanner::new(ctx, &bodies)
            .scan(&[CompilationRoot::method(main, "entry point")])
            .unwrap();

        assert!(results.is_marked(&ScanNode::ConstructedType(world.derived)));
        assert!(results.is_marked(&ScanNode::VTableSlot(world.base_virtual)));
        assert!(results.compiled_methods().contains(&world.derived_virtual));
        assert!(!results.compiled_methods().contains(&world.hiding_virtual));
        assert!(!results.constructed_types().contains(&world.base));
        // Base::Virtual is not reached: only Derived is allocated
        assert!(!results.compiled_methods().contains(&world.base_virtual));
        assert!(results.failures().is_empty());

        let counts = results.marked_counts();
        assert_eq!(
            counts[ScanNodeKind::ConstructedType as usize],
            results.constructed_types().len()
        );
        assert_eq!(
            counts[ScanNodeKind::VTableSlot as usize],
            results.vtable_slots().len()
        );
        assert_eq!(counts.iter().sum::<usize>(), results.marked_nodes().len());

        let manager = results.devirtualization_manager(ctx);
        assert!(manager.is_effectively_sealed_type(world.derived));
        assert!(manager.is_effectively_sealed_method(world.derived_virtual));
    }

    #[test]
    fn unresolved_reference_is_fatal() {
        let Program {
            world,
            bodies,
            main,
        } = program();
        bodies.insert(
            world.derived_virtual,
            MethodBody::new(vec![Instruction::Call(MethodRef::unresolved(
                "Lib.Helper::Run",
            ))]),
        );
        let error = IlScanner::new(&world.context, &bodies)
            .scan(&[CompilationRoot::method(main, "entry point")])
            .unwrap_err();
        assert_eq!(
            error,
            Error::UnresolvedReference {
                symbol: "Lib.Helper::Run".to_string(),
                referenced_from: "App.Derived::Virtual".to_string(),
            }
        );
    }

    #[test]
    fn missing_body_fails_required_root_only() {
        let Program { world, main, .. } = program();
        let bodies = InMemoryMethodBodyProvider::new();
        bodies.insert(
            main,
            MethodBody::new(vec![Instruction::NewObj(world.derived_ctor.into())]),
        );

        let results = IlScanner::new(&world.context, &bodies)
            .scan(&[CompilationRoot::method(main, "entry point")])
            .unwrap();
        assert_eq!(results.failures().len(), 1);
        assert_eq!(
            results.failures()[0].error,
            Error::MethodBodyNotAvailable("App.Derived::.ctor".to_string())
        );

        let error = IlScanner::new(&world.context, &bodies)
            .scan(&[CompilationRoot::method(world.base_ctor, "export")])
            .unwrap_err();
        assert_eq!(
            error,
            Error::MethodBodyNotAvailable("App.Base::.ctor".to_string())
        );
        assert!(IlScanner::new(&world.context, &bodies)
            .scan(&[CompilationRoot::method(world.base_ctor, "export").optional()])
            .is_ok());
    }

    #[test]
    fn missing_shared_body_fails_required_instantiation() {
        let world = TestWorld::new();
        let ctx = &world.context;
        let owner = ctx
            .get_instantiated_type(world.generic_base, &[world.string])
            .unwrap();
        let get_string = ctx
            .get_method_for_instantiated_type(world.generic_base_get, owner)
            .unwrap();
        let bodies = InMemoryMethodBodyProvider::new();

        let error = IlScanner::new(ctx, &bodies)
            .scan(&[CompilationRoot::method(get_string, "export")])
            .unwrap_err();
        assert_eq!(
            error,
            Error::MethodBodyNotAvailable("App.GenericBase`1<System.__Canon>::Get".to_string())
        );

        let results = IlScanner::new(ctx, &bodies)
            .scan(&[CompilationRoot::method(get_string, "export").optional()])
            .unwrap();
        assert_eq!(results.failures().len(), 1);
    }

    #[test]
    fn cancelled_scan_returns_cancelled() {
        let Program {
            world,
            bodies,
            main,
        } = program();
        let token = CancellationToken::new();
        token.cancel();
        let error = IlScanner::new(&world.context, &bodies)
            .with_cancellation(token)
            .scan(&[CompilationRoot::method(main, "entry point")])
            .unwrap_err();
        assert_eq!(error, Error::Cancelled);
    }

    #[test]
    fn dot_output_uses_names() {
        let Program {
            world,
            bodies,
            main,
        } = program();
        let results = IlScanner::new(&world.context, &bodies)
            .with_options(CompilationOptions::single_threaded())
            .scan(&[CompilationRoot::method(main, "entry point")])
            .unwrap();
        let dot = results.to_dot(&world.context, "scan");
        assert!(dot.starts_with("digraph \"scan\""));
        assert!(dot.contains("MethodCode(App.Program::Main)"));
        assert!(dot.contains("ConstructedType(App.Derived)"));
    }
}
