use std::sync::Arc;

use dashmap::DashMap;

use crate::{
    compilation::CompilationOptions,
    devirtualization::DevirtualizationQuery,
    il::{MethodBody, MethodBodyProvider},
    scanner::{MetadataTarget, ScanNode, SiteDecision},
    typesystem::{MethodId, TypeId, TypeKind, TypeSystemContext},
    Error, Result,
};

/// Everything node expansion needs: the type system, method bodies, options and the
/// devirtualization policy of the running pass.
///
/// The factory is also where nodes are normalized, so that every producer of a node
/// agrees on which form (exact or canonical) it takes. The scan runs it with the
/// metadata-only manager; the compile pass runs it with the scan-informed one and with
/// site recording enabled.
pub struct NodeFactory<'a> {
    context: &'a TypeSystemContext,
    bodies: &'a dyn MethodBodyProvider,
    options: &'a CompilationOptions,
    devirtualization: &'a dyn DevirtualizationQuery,
    sites: Option<DashMap<MethodId, Vec<SiteDecision>>>,
}

impl<'a> NodeFactory<'a> {
    /// Creates a factory for one analysis pass.
    #[must_use]
    pub fn new(
        context: &'a TypeSystemContext,
        bodies: &'a dyn MethodBodyProvider,
        options: &'a CompilationOptions,
        devirtualization: &'a dyn DevirtualizationQuery,
    ) -> Self {
        NodeFactory {
            context,
            bodies,
            options,
            devirtualization,
            sites: None,
        }
    }

    /// Keeps the call and cast decisions taken while importing each `MethodCode` body.
    #[must_use]
    pub fn recording_sites(mut self) -> Self {
        self.sites = Some(DashMap::new());
        self
    }

    /// Returns the type system.
    #[must_use]
    pub fn context(&self) -> &'a TypeSystemContext {
        self.context
    }

    /// Returns the options of the pass.
    #[must_use]
    pub fn options(&self) -> &'a CompilationOptions {
        self.options
    }

    /// Returns the devirtualization policy of the pass.
    #[must_use]
    pub fn devirtualization(&self) -> &'a dyn DevirtualizationQuery {
        self.devirtualization
    }

    /// Returns the recorded site decisions, empty unless recording was enabled.
    #[must_use]
    pub fn into_site_decisions(self) -> DashMap<MethodId, Vec<SiteDecision>> {
        self.sites.unwrap_or_default()
    }

    pub(crate) fn record_sites(&self, method: MethodId, decisions: Vec<SiteDecision>) {
        if let Some(sites) = &self.sites {
            sites.insert(method, decisions);
        }
    }

    pub(crate) fn method_body(&self, method: MethodId) -> Option<Arc<MethodBody>> {
        self.bodies.method_body(self.context, method)
    }

    /// Returns the method whose code `method` runs on: its canonical form when generics
    /// are shared, `method` itself otherwise.
    #[must_use]
    pub fn canonical_method(&self, method: MethodId) -> MethodId {
        if self.options.shared_generics {
            self.context.canonical_method(method)
        } else {
            method
        }
    }

    /// Returns the node for a direct call to `method`.
    #[must_use]
    pub fn method_code_node(&self, method: MethodId) -> ScanNode {
        let canonical = self.canonical_method(method);
        if canonical == method {
            ScanNode::MethodCode(method)
        } else {
            ScanNode::ShadowConcreteMethod(method)
        }
    }

    /// Returns the method identifying the vtable slot a virtual use of `method` goes
    /// through.
    ///
    /// The slot is identified by its slot-defining method on the canonical owner. Generic
    /// virtual methods keep their exact method instantiation, which is what the search
    /// for their overrides instantiates with.
    ///
    /// # Errors
    ///
    /// Propagates MethodImpl conflicts met while locating the slot.
    pub fn vtable_slot(&self, method: MethodId) -> Result<MethodId> {
        let ctx = self.context;
        let slot = ctx.find_slot_defining_method(method)?;
        if !self.options.shared_generics {
            return Ok(slot);
        }

        let method_args = ctx.method(slot).instantiation();
        if method_args.is_empty() {
            return Ok(ctx.canonical_method(slot));
        }
        let definition = ctx.canonical_method(ctx.method_definition(slot));
        ctx.get_instantiated_method(definition, method_args)
    }

    /// Returns the node for a virtual use of `method`; see [`NodeFactory::vtable_slot`].
    ///
    /// # Errors
    ///
    /// Propagates MethodImpl conflicts met while locating the slot.
    pub fn vtable_slot_node(&self, method: MethodId) -> Result<ScanNode> {
        Ok(ScanNode::VTableSlot(self.vtable_slot(method)?))
    }

    /// Fails with [`Error::RecursiveGenericTooDeep`] if `ty` nests deeper than allowed.
    ///
    /// # Errors
    ///
    /// See above.
    pub fn check_type_depth(&self, ty: TypeId) -> Result<()> {
        let depth = self.context.ty(ty).depth();
        if depth > self.options.max_generic_depth {
            return Err(Error::RecursiveGenericTooDeep {
                entity: self.context.type_name(ty),
                depth,
                limit: self.options.max_generic_depth,
            });
        }
        Ok(())
    }

    /// Fails with [`Error::RecursiveGenericTooDeep`] if `method` nests deeper than allowed.
    ///
    /// # Errors
    ///
    /// See above.
    pub fn check_method_depth(&self, method: MethodId) -> Result<()> {
        let depth = self.context.method(method).depth();
        if depth > self.options.max_generic_depth {
            return Err(Error::RecursiveGenericTooDeep {
                entity: self.context.method_name(method),
                depth,
                limit: self.options.max_generic_depth,
            });
        }
        Ok(())
    }

    /// Returns `true` if `ty` still has generic parameters to fill in.
    #[must_use]
    pub fn is_open_type(&self, ty: TypeId) -> bool {
        let desc = self.context.ty(ty);
        desc.has_generic_parameters()
            || matches!(desc.kind(), TypeKind::Defined(defined) if defined.generic_arity > 0)
    }

    /// Returns `true` if `method` cannot run without further instantiation.
    #[must_use]
    pub fn is_open_method(&self, method: MethodId) -> bool {
        let ctx = self.context;
        let desc = ctx.method(method);
        desc.is_generic_definition()
            || self.is_open_type(desc.owning_type())
            || desc
                .instantiation()
                .iter()
                .any(|arg| ctx.ty(*arg).has_generic_parameters())
    }

    /// Returns `true` if `node` refers to shared code's placeholder `__Canon`.
    ///
    /// Canonical bodies skip such nodes; the exact forms reach the graph through the
    /// shadow methods of each instantiation. Virtual slots of ordinary virtual methods
    /// are always canonical and are never skipped.
    pub(crate) fn mentions_canon(&self, node: &ScanNode) -> bool {
        let ctx = self.context;
        match node {
            ScanNode::ConstructedType(ty)
            | ScanNode::TypeMetadata(ty)
            | ScanNode::StaticBase(ty)
            | ScanNode::Metadata(MetadataTarget::Type(ty)) => {
                ctx.ty(*ty).has_canon()
            }
            ScanNode::MethodCode(method)
            | ScanNode::ShadowConcreteMethod(method)
            | ScanNode::Metadata(MetadataTarget::Method(method)) => {
                ctx.method(*method).has_canon()
            }
            ScanNode::VTableSlot(method) => ctx
                .method(*method)
                .instantiation()
                .iter()
                .any(|arg| ctx.ty(*arg).has_canon()),
            ScanNode::Metadata(MetadataTarget::Field(_)) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devirtualization::MetadataDevirtualizationManager;
    use crate::il::InMemoryMethodBodyProvider;
    use crate::test::TestWorld;

    #[test]
    fn direct_calls_to_shared_instantiations_become_shadows() {
        let world = TestWorld::new();
        let ctx = &world.context;
        let bodies = InMemoryMethodBodyProvider::new();
        let options = CompilationOptions::default();
        let devirt = MetadataDevirtualizationManager::new(ctx);
        let factory = NodeFactory::new(ctx, &bodies, &options, &devirt);

        let base_string = ctx
            .get_instantiated_type(world.generic_base, &[world.string])
            .unwrap();
        let get_string = ctx
            .get_method_for_instantiated_type(world.generic_base_get, base_string)
            .unwrap();
        assert_eq!(
            factory.method_code_node(get_string),
            ScanNode::ShadowConcreteMethod(get_string)
        );
        assert_eq!(
            factory.method_code_node(world.base_virtual),
            ScanNode::MethodCode(world.base_virtual)
        );

        let base_int = ctx
            .get_instantiated_type(world.generic_base, &[world.int32])
            .unwrap();
        let get_int = ctx
            .get_method_for_instantiated_type(world.generic_base_get, base_int)
            .unwrap();
        assert_eq!(factory.method_code_node(get_int), ScanNode::MethodCode(get_int));
    }

    #[test]
    fn unshared_factory_keeps_exact_forms() {
        let world = TestWorld::new();
        let ctx = &world.context;
        let bodies = InMemoryMethodBodyProvider::new();
        let options = CompilationOptions::unshared_generics();
        let devirt = MetadataDevirtualizationManager::new(ctx);
        let factory = NodeFactory::new(ctx, &bodies, &options, &devirt);

        let derived_string = ctx
            .get_instantiated_type(world.generic_derived, &[world.string])
            .unwrap();
        let get = ctx
            .get_method_for_instantiated_type(world.generic_derived_get, derived_string)
            .unwrap();
        assert_eq!(factory.method_code_node(get), ScanNode::MethodCode(get));
        match factory.vtable_slot_node(get).unwrap() {
            ScanNode::VTableSlot(slot) => {
                assert_eq!(ctx.typical_method_definition(slot), world.generic_base_get);
                assert!(!ctx.method(slot).has_canon());
            }
            other => panic!("unexpected {other}"),
        }
    }

    #[test]
    fn slots_are_canonical_slot_definitions() {
        let world = TestWorld::new();
        let ctx = &world.context;
        let bodies = InMemoryMethodBodyProvider::new();
        let options = CompilationOptions::default();
        let devirt = MetadataDevirtualizationManager::new(ctx);
        let factory = NodeFactory::new(ctx, &bodies, &options, &devirt);

        assert_eq!(
            factory.vtable_slot_node(world.below_hiding_virtual).unwrap(),
            ScanNode::VTableSlot(world.hiding_virtual)
        );
        assert_eq!(
            factory.vtable_slot_node(world.derived_virtual).unwrap(),
            ScanNode::VTableSlot(world.base_virtual)
        );

        let derived_string = ctx
            .get_instantiated_type(world.generic_derived, &[world.string])
            .unwrap();
        let map = ctx
            .get_method_for_instantiated_type(world.generic_derived_map, derived_string)
            .unwrap();
        let map_int = ctx.get_instantiated_method(map, &[world.int32]).unwrap();
        let ScanNode::VTableSlot(slot) = factory.vtable_slot_node(map_int).unwrap() else {
            panic!("expected a slot");
        };
        assert_eq!(ctx.typical_method_definition(slot), world.generic_base_map);
        assert_eq!(ctx.method(slot).instantiation(), &[world.int32]);
        assert!(!factory.mentions_canon(&ScanNode::VTableSlot(slot)));
    }

    #[test]
    fn depth_limit_is_exclusive() {
        let world = TestWorld::new();
        let ctx = &world.context;
        let bodies = InMemoryMethodBodyProvider::new();
        let options = CompilationOptions::default().with_max_generic_depth(2);
        let devirt = MetadataDevirtualizationManager::new(ctx);
        let factory = NodeFactory::new(ctx, &bodies, &options, &devirt);

        let one = ctx
            .get_instantiated_type(world.generic_struct, &[world.int32])
            .unwrap();
        let two = ctx.get_instantiated_type(world.generic_struct, &[one]).unwrap();
        let three = ctx.get_instantiated_type(world.generic_struct, &[two]).unwrap();
        assert!(factory.check_type_depth(two).is_ok());
        assert!(matches!(
            factory.check_type_depth(three),
            Err(Error::RecursiveGenericTooDeep { depth: 3, limit: 2, .. })
        ));
    }

    #[test]
    fn open_entities() {
        let world = TestWorld::new();
        let ctx = &world.context;
        let bodies = InMemoryMethodBodyProvider::new();
        let options = CompilationOptions::default();
        let devirt = MetadataDevirtualizationManager::new(ctx);
        let factory = NodeFactory::new(ctx, &bodies, &options, &devirt);

        assert!(factory.is_open_type(world.generic_base));
        assert!(!factory.is_open_type(world.base));
        assert!(factory.is_open_method(world.generic_base_get));
        assert!(!factory.is_open_method(world.base_virtual));
    }
}
