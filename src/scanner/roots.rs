//! Compilation roots: where reachability starts.

use crate::{
    dependency::EdgeLabel,
    scanner::{MetadataTarget, NodeFactory, ScanNode},
    typesystem::{MethodId, TypeId, TypeSystemContext},
    Error, Result,
};

/// What a root keeps alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RootKind {
    /// The method is compiled (entry points, exports)
    Method(MethodId),
    /// The type is treated as allocated
    ConstructedType(TypeId),
    /// The type is visible to reflection: metadata, and an allocated instance unless it is
    /// abstract or open
    ReflectedType(TypeId),
    /// The method is visible to reflection: metadata, and its code unless it is abstract
    /// or open
    ReflectedMethod(MethodId),
}

/// One root handed to the scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CompilationRoot {
    /// What is rooted
    pub kind: RootKind,
    /// A required root that cannot be honored fails the whole compilation; an optional
    /// one only fails its own node
    pub required: bool,
    /// Shown as the root's reason in graph diagnostics
    pub reason: EdgeLabel,
}

impl CompilationRoot {
    /// A required method root.
    #[must_use]
    pub fn method(method: MethodId, reason: EdgeLabel) -> Self {
        Self::required(RootKind::Method(method), reason)
    }

    /// A required constructed type root.
    #[must_use]
    pub fn constructed_type(ty: TypeId, reason: EdgeLabel) -> Self {
        Self::required(RootKind::ConstructedType(ty), reason)
    }

    /// A required reflection root for a type.
    #[must_use]
    pub fn reflected_type(ty: TypeId, reason: EdgeLabel) -> Self {
        Self::required(RootKind::ReflectedType(ty), reason)
    }

    /// A required reflection root for a method.
    #[must_use]
    pub fn reflected_method(method: MethodId, reason: EdgeLabel) -> Self {
        Self::required(RootKind::ReflectedMethod(method), reason)
    }

    /// Makes the root optional.
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    fn required(kind: RootKind, reason: EdgeLabel) -> Self {
        CompilationRoot {
            kind,
            required: true,
            reason,
        }
    }

    /// Returns the graph nodes that stand for this root.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeError`] for a method or constructed type root that is not fully
    /// instantiated, or a constructed type root naming an abstract type.
    pub(crate) fn nodes(&self, factory: &NodeFactory<'_>) -> Result<Vec<ScanNode>> {
        let ctx = factory.context();
        let mut nodes = Vec::new();
        match self.kind {
            RootKind::Method(method) => {
                if factory.is_open_method(method) {
                    return Err(Error::TypeError(format!(
                        "method root '{}' is not fully instantiated",
                        ctx.method_name(method)
                    )));
                }
                nodes.push(factory.method_code_node(method));
            }
            RootKind::ConstructedType(ty) => {
                if factory.is_open_type(ty) || ctx.is_abstract(ty) {
                    return Err(Error::TypeError(format!(
                        "type root '{}' cannot be allocated",
                        ctx.type_name(ty)
                    )));
                }
                nodes.push(ScanNode::ConstructedType(ty));
            }
            RootKind::ReflectedType(ty) => {
                nodes.push(ScanNode::Metadata(MetadataTarget::Type(ty)));
                if !factory.is_open_type(ty) && !ctx.is_abstract(ty) {
                    nodes.push(ScanNode::ConstructedType(ty));
                }
            }
            RootKind::ReflectedMethod(method) => {
                nodes.push(ScanNode::Metadata(MetadataTarget::Method(method)));
                if !factory.is_open_method(method) && !ctx.method(method).is_abstract() {
                    nodes.push(factory.method_code_node(method));
                }
            }
        }
        Ok(nodes)
    }
}

/// Produces the roots of a compilation.
pub trait RootProvider: Send + Sync {
    /// Returns the roots in the order they are added to the graph.
    ///
    /// # Errors
    ///
    /// Implementations report roots they cannot produce, e.g. a configured entry point
    /// that does not exist.
    fn roots(&self, context: &TypeSystemContext) -> Result<Vec<CompilationRoot>>;
}

/// A [`RootProvider`] over a fixed list.
#[derive(Debug, Clone, Default)]
pub struct VecRootProvider {
    roots: Vec<CompilationRoot>,
}

impl VecRootProvider {
    /// Creates an empty provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a root.
    pub fn push(&mut self, root: CompilationRoot) {
        self.roots.push(root);
    }

    /// Appends a root (builder pattern).
    #[must_use]
    pub fn with(mut self, root: CompilationRoot) -> Self {
        self.roots.push(root);
        self
    }
}

impl From<Vec<CompilationRoot>> for VecRootProvider {
    fn from(roots: Vec<CompilationRoot>) -> Self {
        VecRootProvider { roots }
    }
}

impl RootProvider for VecRootProvider {
    fn roots(&self, _context: &TypeSystemContext) -> Result<Vec<CompilationRoot>> {
        Ok(self.roots.clone())
    }
}
