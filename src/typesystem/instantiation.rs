//! Generic substitution.
//!
//! Signatures and method bodies of generic definitions are written over generic
//! parameter placeholders (`!n` for the owning type, `!!n` for the method). The
//! functions here replace those placeholders with concrete arguments. Placeholders
//! without a matching argument are left in place; callers that need a closed result
//! check [`TypeDesc::has_generic_parameters`](crate::typesystem::TypeDesc::has_generic_parameters).

use std::sync::Arc;

use crate::typesystem::{
    GenericParameterKind, Instantiation, MethodId, MethodKind, MethodSignature, TypeId, TypeKind,
    TypeSystemContext,
};

impl TypeSystemContext {
    /// Substitutes type-level and method-level generic parameters in `ty`.
    #[must_use]
    pub fn instantiate_type(
        &self,
        ty: TypeId,
        type_args: &[TypeId],
        method_args: &[TypeId],
    ) -> TypeId {
        let desc = self.ty(ty);
        if !desc.has_generic_parameters() {
            return ty;
        }

        match desc.kind() {
            TypeKind::GenericParameter { kind, index } => {
                let args = match kind {
                    GenericParameterKind::Type => type_args,
                    GenericParameterKind::Method => method_args,
                };
                args.get(*index as usize).copied().unwrap_or(ty)
            }
            TypeKind::Instantiated {
                definition,
                instantiation,
            } => {
                let args: Vec<_> = instantiation
                    .iter()
                    .map(|arg| self.instantiate_type(*arg, type_args, method_args))
                    .collect();
                self.intern_instantiated_type(*definition, Instantiation::from(args))
            }
            TypeKind::Array { element, rank } => {
                let element = self.instantiate_type(*element, type_args, method_args);
                self.intern_array_type(element, *rank)
            }
            TypeKind::Pointer(pointee) => {
                self.get_pointer_type(self.instantiate_type(*pointee, type_args, method_args))
            }
            TypeKind::ByRef(target) => {
                self.get_byref_type(self.instantiate_type(*target, type_args, method_args))
            }
            TypeKind::Defined(_) | TypeKind::Canon => ty,
        }
    }

    /// Substitutes generic parameters in every type of a signature.
    #[must_use]
    pub fn instantiate_signature(
        &self,
        signature: &MethodSignature,
        type_args: &[TypeId],
        method_args: &[TypeId],
    ) -> MethodSignature {
        let parameters: Vec<_> = signature
            .parameters
            .iter()
            .map(|param| self.instantiate_type(*param, type_args, method_args))
            .collect();
        MethodSignature {
            return_type: self.instantiate_type(signature.return_type, type_args, method_args),
            parameters: Arc::from(parameters),
            generic_arity: signature.generic_arity,
        }
    }

    /// Substitutes generic parameters in the owning type and method instantiation of `method`.
    ///
    /// A method definition on a generic type is treated as the typical instantiation
    /// of that type, so referencing it with `type_args` yields the method on the
    /// instantiated owner.
    #[must_use]
    pub fn instantiate_method(
        &self,
        method: MethodId,
        type_args: &[TypeId],
        method_args: &[TypeId],
    ) -> MethodId {
        let desc = self.method(method);
        match desc.kind() {
            MethodKind::Definition => {
                let owner = desc.owning_type();
                let arity = self
                    .ty(owner)
                    .as_defined()
                    .map_or(0, |defined| defined.generic_arity as usize);
                if arity > 0 && arity == type_args.len() {
                    let owner =
                        self.intern_instantiated_type(owner, Instantiation::from(type_args));
                    self.intern_method_for_instantiated_type(method, owner)
                } else {
                    method
                }
            }
            MethodKind::ForInstantiatedType { typical } => {
                let owner = self.instantiate_type(desc.owning_type(), type_args, method_args);
                self.intern_method_for_instantiated_type(*typical, owner)
            }
            MethodKind::Instantiated {
                definition,
                instantiation,
            } => {
                let definition = self.instantiate_method(*definition, type_args, method_args);
                let args: Vec<_> = instantiation
                    .iter()
                    .map(|arg| self.instantiate_type(*arg, type_args, method_args))
                    .collect();
                self.intern_instantiated_method(definition, Instantiation::from(args))
            }
        }
    }

    /// The (type, method) instantiation context that the body of `method` is closed over.
    #[must_use]
    pub fn instantiation_context(&self, method: MethodId) -> (Vec<TypeId>, Vec<TypeId>) {
        let desc = self.method(method);
        (
            self.type_instantiation(desc.owning_type()).to_vec(),
            desc.instantiation().to_vec(),
        )
    }
}

#[cfg(test)]
mod tests {
    use crate::test::TestWorld;
    use crate::typesystem::*;

    #[test]
    fn substitutes_nested_parameters() {
        let world = TestWorld::new();
        let ctx = &world.context;
        let t = ctx.get_generic_parameter(GenericParameterKind::Type, 0);
        let u = ctx.get_generic_parameter(GenericParameterKind::Method, 0);
        let base_t = ctx.get_instantiated_type(world.generic_base, &[t]).unwrap();
        let nested = ctx.get_array_type(base_t);

        let closed = ctx.instantiate_type(nested, &[world.int32], &[]);
        let expected = ctx.get_array_type(
            ctx.get_instantiated_type(world.generic_base, &[world.int32])
                .unwrap(),
        );
        assert_eq!(closed, expected);
        assert!(!ctx.ty(closed).has_generic_parameters());

        assert_eq!(ctx.instantiate_type(u, &[world.int32], &[world.string]), world.string);
        assert_eq!(ctx.instantiate_type(u, &[], &[]), u);
        assert_eq!(ctx.instantiate_type(world.string, &[world.int32], &[]), world.string);
    }

    #[test]
    fn instantiate_method_roundtrips_through_typical_definition() {
        let world = TestWorld::new();
        let ctx = &world.context;
        let base_string = ctx
            .get_instantiated_type(world.generic_base, &[world.string])
            .unwrap();
        let get = ctx
            .get_method_for_instantiated_type(world.generic_base_get, base_string)
            .unwrap();
        let typical = ctx.typical_method_definition(get);

        let again = ctx.instantiate_method(typical, &[world.string], &[]);
        assert_eq!(again, get);
        assert_eq!(ctx.typical_method_definition(again), typical);
    }

    #[test]
    fn instantiate_generic_method_reference() {
        let world = TestWorld::new();
        let ctx = &world.context;
        let t = ctx.get_generic_parameter(GenericParameterKind::Type, 0);
        let u = ctx.get_generic_parameter(GenericParameterKind::Method, 0);
        let base_t = ctx.get_instantiated_type(world.generic_base, &[t]).unwrap();
        let map_on_t = ctx
            .get_method_for_instantiated_type(world.generic_base_map, base_t)
            .unwrap();
        let open = ctx.get_instantiated_method(map_on_t, &[u]).unwrap();

        let closed = ctx.instantiate_method(open, &[world.int32], &[world.string]);
        let base_int = ctx
            .get_instantiated_type(world.generic_base, &[world.int32])
            .unwrap();
        let expected = ctx
            .get_instantiated_method(
                ctx.get_method_for_instantiated_type(world.generic_base_map, base_int)
                    .unwrap(),
                &[world.string],
            )
            .unwrap();
        assert_eq!(closed, expected);
        assert_eq!(
            ctx.instantiation_context(closed),
            (vec![world.int32], vec![world.string])
        );
    }
}
