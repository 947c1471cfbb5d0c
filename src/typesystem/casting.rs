//! Subtyping checks.

use crate::typesystem::{TypeId, TypeKind, TypeSystemContext};

impl TypeSystemContext {
    /// Returns `true` if `ty` is `base` or derives from it through the base type chain.
    #[must_use]
    pub fn is_subclass_of(&self, ty: TypeId, base: TypeId) -> bool {
        self.base_chain(ty).any(|current| current == base)
    }

    /// Returns `true` if `ty` implements `interface`, directly or through a base type.
    #[must_use]
    pub fn implements_interface(&self, ty: TypeId, interface: TypeId) -> bool {
        ty == interface || self.all_interfaces(ty).contains(&interface)
    }

    /// Returns `true` if a value of type `source` can be assigned to a location of type `target`.
    ///
    /// Covers identity, class inheritance, interface implementation and array covariance
    /// over reference element types.
    #[must_use]
    pub fn can_cast_to(&self, source: TypeId, target: TypeId) -> bool {
        if source == target || self.is_subclass_of(source, target) {
            return true;
        }
        if self.is_interface(target) && self.implements_interface(source, target) {
            return true;
        }

        match (self.ty(source).kind(), self.ty(target).kind()) {
            (
                TypeKind::Array {
                    element: source_element,
                    rank: source_rank,
                },
                TypeKind::Array {
                    element: target_element,
                    rank: target_rank,
                },
            ) => {
                source_rank == target_rank
                    && self.is_gc_reference(*source_element)
                    && self.can_cast_to(*source_element, *target_element)
            }
            _ => false,
        }
    }

    /// Like [`TypeSystemContext::can_cast_to`] for class and interface targets, comparing
    /// every type on the way by canonical form.
    #[must_use]
    pub fn derives_from_up_to_canon(&self, ty: TypeId, target: TypeId) -> bool {
        let target = self.convert_to_canon_form(target);
        if self.is_interface(target) {
            self.all_interfaces(ty)
                .into_iter()
                .any(|iface| self.convert_to_canon_form(iface) == target)
        } else {
            self.base_chain(ty)
                .any(|current| self.convert_to_canon_form(current) == target)
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::test::TestWorld;

    #[test]
    fn class_and_interface_casts() {
        let world = TestWorld::new();
        let ctx = &world.context;
        assert!(ctx.can_cast_to(world.derived, world.base));
        assert!(ctx.can_cast_to(world.derived, ctx.object_type()));
        assert!(!ctx.can_cast_to(world.base, world.derived));
        assert!(ctx.can_cast_to(world.derived_from_widget, world.drawable_interface));
        assert!(!ctx.can_cast_to(world.base, world.drawable_interface));
    }

    #[test]
    fn array_covariance() {
        let world = TestWorld::new();
        let ctx = &world.context;
        let derived_array = ctx.get_array_type(world.derived);
        let base_array = ctx.get_array_type(world.base);
        assert!(ctx.can_cast_to(derived_array, base_array));
        assert!(!ctx.can_cast_to(base_array, derived_array));
        let ints = ctx.get_array_type(world.int32);
        let objects = ctx.get_array_type(ctx.object_type());
        assert!(!ctx.can_cast_to(ints, objects));
    }

    #[test]
    fn canonical_derivation() {
        let world = TestWorld::new();
        let ctx = &world.context;
        let derived_string = ctx
            .get_instantiated_type(world.generic_derived, &[world.string])
            .unwrap();
        let base_canon = ctx
            .get_instantiated_type(world.generic_base, &[ctx.canon_type()])
            .unwrap();
        assert!(!ctx.can_cast_to(derived_string, base_canon));
        assert!(ctx.derives_from_up_to_canon(derived_string, base_canon));
    }
}
