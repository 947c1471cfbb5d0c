//! The compile pass: a second dependency analysis with scan-informed devirtualization,
//! followed by parallel code generation.

use std::collections::{BTreeSet, HashSet};

use crossbeam_skiplist::SkipMap;
use dashmap::DashMap;
use rayon::prelude::*;

use crate::{
    compilation::{
        CodeGenerator, CompilationOptions, NameMangler, NativeCodeBlock, ObjectSymbol,
        ObjectWriter, SymbolKind,
    },
    dependency::{CancellationToken, DependencyGraph},
    devirtualization::DevirtualizationQuery,
    il::MethodBodyProvider,
    scanner::{analyze, NodeFactory, RootKind, ScanNode, ScanResults, SiteDecision},
    typesystem::{MethodId, TypeSystemContext},
    Error, Result,
};

/// Code generated for one method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledMethod {
    /// The method, in the form that owns the code
    pub method: MethodId,
    /// Its symbol
    pub symbol: String,
    /// The generated code, or the trap stub
    pub code: NativeCodeBlock,
    /// `true` if code generation failed and `code` is the trap stub
    pub is_stub: bool,
}

/// A method that could not be compiled and was replaced by a trap stub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodFailure {
    /// The method
    pub method: MethodId,
    /// Its display name
    pub name: String,
    /// Why it failed
    pub error: Error,
}

/// The output of a compilation.
#[derive(Debug, Clone)]
pub struct CompilationResults {
    methods: Vec<CompiledMethod>,
    failures: Vec<MethodFailure>,
    sites: DashMap<MethodId, Vec<SiteDecision>>,
    graph: DependencyGraph<ScanNode>,
    metadata: Vec<u8>,
}

impl CompilationResults {
    /// Returns the compiled methods, sorted by symbol.
    #[must_use]
    pub fn methods(&self) -> &[CompiledMethod] {
        &self.methods
    }

    /// Returns the compiled form of `method`, if it was compiled.
    #[must_use]
    pub fn method(&self, method: MethodId) -> Option<&CompiledMethod> {
        self.methods.iter().find(|compiled| compiled.method == method)
    }

    /// Returns the methods replaced by trap stubs.
    #[must_use]
    pub fn failures(&self) -> &[MethodFailure] {
        &self.failures
    }

    /// Returns the call and cast decisions taken while importing `method`.
    #[must_use]
    pub fn site_decisions(&self, method: MethodId) -> Vec<SiteDecision> {
        self.sites
            .get(&method)
            .map(|sites| sites.value().clone())
            .unwrap_or_default()
    }

    /// Returns the dependency graph of the compile pass.
    #[must_use]
    pub fn graph(&self) -> &DependencyGraph<ScanNode> {
        &self.graph
    }

    /// Returns the reflection metadata blob.
    #[must_use]
    pub fn metadata(&self) -> &[u8] {
        &self.metadata
    }

    /// Hands every symbol, in order, and the metadata blob to `writer`.
    ///
    /// # Errors
    ///
    /// Propagates errors of the writer.
    pub fn emit(&self, writer: &mut dyn ObjectWriter) -> Result<()> {
        let symbols: Vec<ObjectSymbol> = self
            .methods
            .iter()
            .map(|compiled| ObjectSymbol {
                name: compiled.symbol.clone(),
                kind: if compiled.is_stub {
                    SymbolKind::TrapStub
                } else {
                    SymbolKind::Method
                },
                method: compiled.method,
                code: compiled.code.clone(),
            })
            .collect();
        log::info!(
            "emitting {} symbols and {} bytes of metadata",
            symbols.len(),
            self.metadata.len()
        );
        writer.write(&symbols, &self.metadata)
    }
}

/// Inputs of one compile pass.
pub(crate) struct CompilePass<'a> {
    pub(crate) context: &'a TypeSystemContext,
    pub(crate) bodies: &'a dyn MethodBodyProvider,
    pub(crate) options: &'a CompilationOptions,
    pub(crate) generator: &'a dyn CodeGenerator,
    pub(crate) cancellation: Option<&'a CancellationToken>,
    pub(crate) mangler: &'a NameMangler,
}

impl CompilePass<'_> {
    pub(crate) fn run(&self, scan: &ScanResults) -> Result<CompilationResults> {
        let ctx = self.context;
        let manager = scan.devirtualization_manager(ctx);
        let factory =
            NodeFactory::new(ctx, self.bodies, self.options, &manager).recording_sites();

        log::info!("compiling from {} roots", scan.roots().len());
        let graph = analyze(&factory, scan.roots(), self.cancellation)?;
        let sites = factory.into_site_decisions();

        if self.options.verify_scan {
            verify_against_scan(ctx, &graph, scan)?;
        }
        if self
            .cancellation
            .is_some_and(CancellationToken::is_cancelled)
        {
            return Err(Error::Cancelled);
        }

        let required: HashSet<MethodId> = scan
            .roots()
            .iter()
            .filter(|root| root.required)
            .filter_map(|root| match root.kind {
                RootKind::Method(method) => Some(method),
                _ => None,
            })
            .map(|method| {
                if self.options.shared_generics {
                    ctx.canonical_method(method)
                } else {
                    method
                }
            })
            .collect();

        let methods: Vec<MethodId> = graph
            .marked_nodes()
            .iter()
            .filter_map(|node| match node {
                ScanNode::MethodCode(method) => Some(*method),
                _ => None,
            })
            .collect();

        let output = SkipMap::new();
        let generate = |method: &MethodId| self.generate(*method, &manager, &output);
        let mut failures: Vec<MethodFailure> = if self.options.single_threaded {
            methods.iter().filter_map(generate).collect()
        } else {
            methods.par_iter().filter_map(generate).collect()
        };
        failures.sort_by(|a, b| a.name.cmp(&b.name));

        if let Some(fatal) = failures
            .iter()
            .find(|failure| required.contains(&failure.method))
        {
            log::error!("required method {} failed: {}", fatal.name, fatal.error);
            return Err(Error::CompilationFailed {
                cause: Box::new(fatal.error.clone()),
                method_failures: failures
                    .iter()
                    .filter(|failure| !required.contains(&failure.method))
                    .map(|failure| failure.name.clone())
                    .collect(),
            });
        }
        for failure in &failures {
            log::warn!(
                "{} replaced by a trap stub: {}",
                failure.name,
                failure.error
            );
        }

        let methods: Vec<CompiledMethod> = output
            .into_iter()
            .map(|(_, compiled)| compiled)
            .collect();
        log::info!(
            "compiled {} methods, {} replaced by trap stubs",
            methods.len(),
            failures.len()
        );

        Ok(CompilationResults {
            methods,
            failures,
            sites,
            metadata: metadata_blob(ctx, &graph),
            graph,
        })
    }

    /// Generates code for `method` into `output`, returning the failure if a trap stub
    /// was emitted instead.
    fn generate(
        &self,
        method: MethodId,
        devirtualization: &dyn DevirtualizationQuery,
        output: &SkipMap<String, CompiledMethod>,
    ) -> Option<MethodFailure> {
        let ctx = self.context;
        let result = match self.bodies.method_body(ctx, method) {
            Some(body) => self
                .generator
                .emit_code(ctx, method, &body, devirtualization)
                .map_err(|failure| Error::CodeGeneration {
                    method: ctx.method_name(method),
                    message: failure.message,
                }),
            None => Err(Error::MethodBodyNotAvailable(ctx.method_name(method))),
        };

        let symbol = self.mangler.mangle_method(ctx, method);
        let (code, failure) = match result {
            Ok(code) => (code, None),
            Err(error) => (
                NativeCodeBlock::trap(),
                Some(MethodFailure {
                    method,
                    name: ctx.method_name(method),
                    error,
                }),
            ),
        };
        output.insert(
            symbol.clone(),
            CompiledMethod {
                method,
                symbol,
                code,
                is_stub: failure.is_some(),
            },
        );
        failure
    }
}

/// Fails if the compile pass needs code the scan never saw.
fn verify_against_scan(
    context: &TypeSystemContext,
    graph: &DependencyGraph<ScanNode>,
    scan: &ScanResults,
) -> Result<()> {
    for node in graph.marked_nodes() {
        if let ScanNode::MethodCode(method) = node {
            if !scan.is_marked(node) {
                log::error!(
                    "compile pass reached {} which the scan did not",
                    context.method_name(*method)
                );
                return Err(Error::ScannerMismatch(context.method_name(*method)));
            }
        }
    }
    Ok(())
}

/// One line per reflected entity, sorted.
fn metadata_blob(context: &TypeSystemContext, graph: &DependencyGraph<ScanNode>) -> Vec<u8> {
    let entries: BTreeSet<String> = graph
        .marked_nodes()
        .iter()
        .filter(|node| matches!(node, ScanNode::Metadata(_)))
        .map(|node| node.describe(context))
        .collect();
    let mut blob = Vec::new();
    for entry in entries {
        blob.extend_from_slice(entry.as_bytes());
        blob.push(b'\n');
    }
    blob
}
