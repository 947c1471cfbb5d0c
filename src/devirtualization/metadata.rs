use crate::{
    devirtualization::{DevirtualizationQuery, ResolutionCache},
    typesystem::{MethodId, TypeId, TypeKind, TypeSystemContext},
    Result,
};

/// Devirtualization from declared flags only.
///
/// Used by the scanner itself, before anything is known about which types exist, and by
/// hosts that compile an open set of assemblies. A type is sealed if it is declared
/// `sealed` or is a value type; an array is sealed if its element type is; interfaces
/// never are. A method is sealed if it is `final` or its owning type is sealed.
pub struct MetadataDevirtualizationManager<'a> {
    context: &'a TypeSystemContext,
    cache: ResolutionCache,
}

impl<'a> MetadataDevirtualizationManager<'a> {
    /// Creates a manager over `context`.
    #[must_use]
    pub fn new(context: &'a TypeSystemContext) -> Self {
        MetadataDevirtualizationManager {
            context,
            cache: ResolutionCache::default(),
        }
    }
}

impl DevirtualizationQuery for MetadataDevirtualizationManager<'_> {
    fn resolve_virtual_method(
        &self,
        decl: MethodId,
        implementing_type: TypeId,
    ) -> Result<MethodId> {
        self.cache.resolve(self.context, decl, implementing_type)
    }

    fn is_effectively_sealed_type(&self, ty: TypeId) -> bool {
        let ctx = self.context;
        match ctx.ty(ty).kind() {
            TypeKind::Array { element, .. } => self.is_effectively_sealed_type(*element),
            TypeKind::Defined(_) | TypeKind::Instantiated { .. } => {
                !ctx.is_interface(ty) && (ctx.is_declared_sealed(ty) || ctx.is_value_type(ty))
            }
            TypeKind::Pointer(_)
            | TypeKind::ByRef(_)
            | TypeKind::GenericParameter { .. }
            | TypeKind::Canon => false,
        }
    }

    fn is_effectively_sealed_method(&self, method: MethodId) -> bool {
        let desc = self.context.method(method);
        desc.is_final() || self.is_effectively_sealed_type(desc.owning_type())
    }

    fn can_constructed_type_exist(&self, _ty: TypeId) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::TestWorld;
    use crate::typesystem::{MethodBuilder, TypeBuilder};

    #[test]
    fn declared_flags_only() {
        let world = TestWorld::new();
        let ctx = &world.context;
        let manager = MetadataDevirtualizationManager::new(ctx);

        assert!(!manager.is_effectively_sealed_type(world.base));
        assert!(!manager.is_effectively_sealed_type(world.derived));
        assert!(!manager.is_effectively_sealed_type(world.drawable_interface));
        assert!(manager.is_effectively_sealed_type(world.int32));
        assert!(manager.is_effectively_sealed_type(world.string));
        assert!(!manager.is_effectively_sealed_type(ctx.canon_type()));

        assert!(!manager.is_effectively_sealed_method(world.derived_virtual));
        assert!(manager.is_effectively_sealed_method(world.explicit_draw));
        assert!(manager.can_constructed_type_exist(world.base));
    }

    #[test]
    fn arrays_follow_their_element() {
        let world = TestWorld::new();
        let ctx = &world.context;
        let manager = MetadataDevirtualizationManager::new(ctx);
        assert!(manager.is_effectively_sealed_type(ctx.get_array_type(world.int32)));
        assert!(manager.is_effectively_sealed_type(ctx.get_array_type(world.string)));
        assert!(!manager.is_effectively_sealed_type(ctx.get_array_type(world.base)));
        assert!(!manager.is_effectively_sealed_type(
            ctx.get_array_type(world.drawable_interface)
        ));
    }

    #[test]
    fn sealed_owner_seals_its_methods() {
        let world = TestWorld::new();
        let ctx = &world.context;
        let leaf = TypeBuilder::new(ctx, "App", "Leaf")
            .extends(world.base)
            .sealed()
            .build()
            .unwrap();
        let leaf_virtual = MethodBuilder::new(ctx, leaf, "Virtual")
            .override_method()
            .build()
            .unwrap();
        let manager = MetadataDevirtualizationManager::new(ctx);
        assert!(manager.is_effectively_sealed_method(leaf_virtual));
        assert_eq!(
            manager.resolve_virtual_method(world.base_virtual, leaf).unwrap(),
            leaf_virtual
        );
    }
}
