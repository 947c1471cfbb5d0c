//! Dependency nodes of the compiler graph.

use std::fmt;

use strum::{EnumCount, EnumDiscriminants, EnumIter};

use crate::{
    dependency::{DependencyEdge, DependencyNode, Expansion},
    scanner::{importer::MethodImporter, NodeFactory},
    typesystem::{FieldId, MethodId, TypeId, TypeKind, TypeSystemContext},
    Error, Result,
};

/// The entity reflection metadata is generated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MetadataTarget {
    /// A type
    Type(TypeId),
    /// A method
    Method(MethodId),
    /// A field
    Field(FieldId),
}

/// A node of the compiler's dependency graph.
///
/// The same node kinds are used by the scan and by the compile pass; the two differ only
/// in the devirtualization decisions taken while importing method bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, EnumDiscriminants)]
#[strum_discriminants(
    name(ScanNodeKind),
    derive(Hash, EnumIter, EnumCount),
    doc = "The kind of a [`ScanNode`], without its payload."
)]
pub enum ScanNode {
    /// The type is proven allocated: it needs a full vtable and its overrides may run
    ConstructedType(TypeId),
    /// The type is referenced (casts, field access, base of a constructed type) but not
    /// necessarily allocated
    TypeMetadata(TypeId),
    /// Code for the method, always in the form that owns the code (canonical when
    /// generics are shared)
    MethodCode(MethodId),
    /// An exact instantiation that runs on shared code; pulls in the shared code and the
    /// exact types its body needs
    ShadowConcreteMethod(MethodId),
    /// The canonical slot-defining method is called virtually somewhere
    VTableSlot(MethodId),
    /// Storage for the type's static fields, and its class constructor
    StaticBase(TypeId),
    /// Reflection metadata
    Metadata(MetadataTarget),
}

impl ScanNode {
    /// Returns the kind of the node.
    #[must_use]
    pub fn kind(&self) -> ScanNodeKind {
        ScanNodeKind::from(self)
    }

    /// Returns a display string using type and method names from `context`.
    #[must_use]
    pub fn describe(&self, context: &TypeSystemContext) -> String {
        match self {
            ScanNode::ConstructedType(ty) => format!("ConstructedType({})", context.type_name(*ty)),
            ScanNode::TypeMetadata(ty) => format!("TypeMetadata({})", context.type_name(*ty)),
            ScanNode::MethodCode(method) => {
                format!("MethodCode({})", context.method_name(*method))
            }
            ScanNode::ShadowConcreteMethod(method) => {
                format!("ShadowConcreteMethod({})", context.method_name(*method))
            }
            ScanNode::VTableSlot(method) => {
                format!("VTableSlot({})", context.method_name(*method))
            }
            ScanNode::StaticBase(ty) => format!("StaticBase({})", context.type_name(*ty)),
            ScanNode::Metadata(MetadataTarget::Type(ty)) => {
                format!("Metadata({})", context.type_name(*ty))
            }
            ScanNode::Metadata(MetadataTarget::Method(method)) => {
                format!("Metadata({})", context.method_name(*method))
            }
            ScanNode::Metadata(MetadataTarget::Field(field)) => {
                format!("Metadata({})", context.field_name(*field))
            }
        }
    }
}

impl fmt::Display for ScanNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanNode::ConstructedType(ty) => write!(f, "ConstructedType({ty})"),
            ScanNode::TypeMetadata(ty) => write!(f, "TypeMetadata({ty})"),
            ScanNode::MethodCode(method) => write!(f, "MethodCode({method})"),
            ScanNode::ShadowConcreteMethod(method) => write!(f, "ShadowConcreteMethod({method})"),
            ScanNode::VTableSlot(method) => write!(f, "VTableSlot({method})"),
            ScanNode::StaticBase(ty) => write!(f, "StaticBase({ty})"),
            ScanNode::Metadata(MetadataTarget::Type(ty)) => write!(f, "Metadata({ty})"),
            ScanNode::Metadata(MetadataTarget::Method(method)) => write!(f, "Metadata({method})"),
            ScanNode::Metadata(MetadataTarget::Field(field)) => write!(f, "Metadata({field})"),
        }
    }
}

impl<'a> DependencyNode<NodeFactory<'a>> for ScanNode {
    fn expand(&self, factory: &NodeFactory<'a>) -> Result<Expansion<Self>> {
        match *self {
            ScanNode::ConstructedType(ty) => expand_constructed_type(factory, ty),
            ScanNode::TypeMetadata(ty) => expand_type_metadata(factory, ty),
            ScanNode::MethodCode(method) => expand_method_code(factory, method),
            ScanNode::ShadowConcreteMethod(method) => expand_shadow_method(factory, method),
            ScanNode::VTableSlot(method) => {
                factory.check_method_depth(method)?;
                Ok(Expansion::new())
            }
            ScanNode::StaticBase(ty) => expand_static_base(factory, ty),
            ScanNode::Metadata(target) => expand_metadata(factory, target),
        }
    }

    fn is_expansion_deferred(&self) -> bool {
        matches!(
            self,
            ScanNode::MethodCode(_) | ScanNode::ShadowConcreteMethod(_)
        )
    }

    // Generic virtual methods have no fixed vtable slots; their overrides are found by
    // matching each used instantiation against every constructed type.
    fn has_dynamic_dependencies(&self) -> bool {
        matches!(self, ScanNode::VTableSlot(_))
    }

    fn search_dynamic_dependencies(
        &self,
        marked: &[Self],
        factory: &NodeFactory<'a>,
    ) -> Result<Vec<DependencyEdge<Self>>> {
        let ScanNode::VTableSlot(slot) = *self else {
            return Ok(Vec::new());
        };
        let ctx = factory.context();
        if ctx.method(slot).instantiation().is_empty() {
            return Ok(Vec::new());
        }

        let owner = ctx.method(slot).owning_type();
        let mut edges = Vec::new();
        for node in marked {
            let ScanNode::ConstructedType(ty) = *node else {
                continue;
            };
            if ctx.is_abstract(ty) || !ctx.derives_from_up_to_canon(ty, owner) {
                continue;
            }
            let implementation = ctx.resolve_virtual_method(slot, ty)?;
            if ctx.method(implementation).is_abstract() {
                continue;
            }
            edges.push(DependencyEdge {
                target: factory.method_code_node(implementation),
                label: "generic virtual method override",
            });
        }
        Ok(edges)
    }
}

fn expand_constructed_type(factory: &NodeFactory<'_>, ty: TypeId) -> Result<Expansion<ScanNode>> {
    let ctx = factory.context();
    factory.check_type_depth(ty)?;

    let mut expansion = Expansion::new();
    expansion.add(ScanNode::TypeMetadata(ty), "type handle");
    if let TypeKind::Array { element, .. } = ctx.ty(ty).kind() {
        expansion.add(ScanNode::TypeMetadata(*element), "array element");
    }
    if ctx.class_constructor(ty).is_some() {
        expansion.add(ScanNode::StaticBase(ty), "class constructor before first instance");
    }
    if ctx.is_abstract(ty) {
        return Ok(expansion);
    }

    for slot in ctx.enumerate_virtual_slots(ty)? {
        let implementation = ctx.resolve_virtual_method(slot, ty)?;
        if ctx.method(implementation).is_abstract() {
            continue;
        }
        expansion.add_conditional(
            factory.method_code_node(implementation),
            factory.vtable_slot_node(slot)?,
            "virtual method override",
        );
    }

    for interface in ctx.all_interfaces(ty) {
        for interface_method in ctx.methods_of(interface) {
            let desc = ctx.method(interface_method);
            if !desc.is_virtual() || desc.is_generic_definition() {
                continue;
            }
            let Some(implementation) =
                ctx.resolve_interface_method_to_virtual_method_on_type(interface_method, ty)?
            else {
                continue;
            };
            if ctx.method(implementation).is_abstract() {
                continue;
            }
            expansion.add_conditional(
                factory.method_code_node(implementation),
                factory.vtable_slot_node(interface_method)?,
                "interface method implementation",
            );
        }
    }

    Ok(expansion)
}

fn expand_type_metadata(factory: &NodeFactory<'_>, ty: TypeId) -> Result<Expansion<ScanNode>> {
    let ctx = factory.context();
    factory.check_type_depth(ty)?;

    let mut expansion = Expansion::new();
    if let Some(base) = ctx.base_type(ty) {
        expansion.add(ScanNode::TypeMetadata(base), "base type");
    }
    match ctx.ty(ty).kind() {
        TypeKind::Array { element, .. } | TypeKind::Pointer(element) | TypeKind::ByRef(element) => {
            expansion.add(ScanNode::TypeMetadata(*element), "parameter type");
        }
        _ => {}
    }
    Ok(expansion)
}

fn expand_method_code(factory: &NodeFactory<'_>, method: MethodId) -> Result<Expansion<ScanNode>> {
    let ctx = factory.context();
    factory.check_method_depth(method)?;

    let mut expansion = Expansion::new();
    if ctx.method(method).is_abstract() {
        return Ok(expansion);
    }
    let Some(body) = factory.method_body(method) else {
        return Err(Error::MethodBodyNotAvailable(ctx.method_name(method)));
    };

    let decisions = MethodImporter::new(factory, method, true).import(&body, &mut expansion)?;
    factory.record_sites(method, decisions);
    Ok(expansion)
}

fn expand_shadow_method(
    factory: &NodeFactory<'_>,
    method: MethodId,
) -> Result<Expansion<ScanNode>> {
    let ctx = factory.context();
    factory.check_method_depth(method)?;

    let mut expansion = Expansion::new();
    expansion.add(
        ScanNode::MethodCode(factory.canonical_method(method)),
        "shared code",
    );
    // A missing body is reported once, by the shared code node
    if let Some(body) = factory.method_body(method) {
        MethodImporter::new(factory, method, false).import(&body, &mut expansion)?;
    } else {
        log::trace!("no body for {}", ctx.method_name(method));
    }
    Ok(expansion)
}

fn expand_static_base(factory: &NodeFactory<'_>, ty: TypeId) -> Result<Expansion<ScanNode>> {
    let ctx = factory.context();
    factory.check_type_depth(ty)?;

    let mut expansion = Expansion::new();
    expansion.add(ScanNode::TypeMetadata(ty), "owning type");
    if let Some(cctor) = ctx.class_constructor(ty) {
        expansion.add(factory.method_code_node(cctor), "class constructor");
    }
    Ok(expansion)
}

fn expand_metadata(
    factory: &NodeFactory<'_>,
    target: MetadataTarget,
) -> Result<Expansion<ScanNode>> {
    let ctx = factory.context();
    let mut expansion = Expansion::new();
    match target {
        MetadataTarget::Type(ty) => {
            factory.check_type_depth(ty)?;
            expansion.add(ScanNode::TypeMetadata(ty), "reflected type");
            let definition = ctx.type_definition(ty);
            if definition != ty {
                expansion.add(
                    ScanNode::Metadata(MetadataTarget::Type(definition)),
                    "generic definition",
                );
                for arg in ctx.type_instantiation(ty) {
                    expansion.add(
                        ScanNode::Metadata(MetadataTarget::Type(*arg)),
                        "generic argument",
                    );
                }
            }
        }
        MetadataTarget::Method(method) => {
            factory.check_method_depth(method)?;
            expansion.add(
                ScanNode::Metadata(MetadataTarget::Type(ctx.method(method).owning_type())),
                "declaring type",
            );
        }
        MetadataTarget::Field(field) => {
            expansion.add(
                ScanNode::Metadata(MetadataTarget::Type(ctx.field(field).owning_type)),
                "declaring type",
            );
        }
    }
    Ok(expansion)
}
