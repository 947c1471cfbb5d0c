//! Virtual and interface method resolution.
//!
//! Resolution answers "which body runs when `decl` is dispatched on an object whose
//! exact type is `T`". Class virtuals are resolved by locating the vtable slot `decl`
//! occupies and walking from `T` towards the slot's owner, checking each type's
//! MethodImpl records before its name/signature matches. Interface methods first map
//! to the method that implements them on `T` (explicitly, implicitly, or through a
//! default implementation) and then resolve like a class virtual.
//!
//! Slot identity is compared on typical definitions, so the same query works whether
//! the inputs are exact instantiations or canonical forms.

use crate::{
    typesystem::{Instantiation, MethodId, TypeId, TypeSystemContext},
    Result,
};

impl TypeSystemContext {
    /// Returns the method that introduced the vtable slot `method` occupies.
    ///
    /// Walks overrides towards the base type until a `newslot` method or the root of
    /// the override chain is reached. Method-level instantiation is preserved.
    ///
    /// # Errors
    ///
    /// Propagates MethodImpl conflicts found on the way.
    pub fn find_slot_defining_method(&self, method: MethodId) -> Result<MethodId> {
        let method_args = self.method(method).instantiation().to_vec();
        let mut current = self.method_definition(method);
        loop {
            let desc = self.method(current);
            if !desc.is_virtual() || desc.is_new_slot() {
                break;
            }
            match self.find_overridden_method(current)? {
                Some(overridden) => current = overridden,
                None => break,
            }
        }
        Ok(self.with_method_instantiation(current, &method_args))
    }

    /// The base class method `method` overrides, explicitly or by name and signature.
    fn find_overridden_method(&self, method: MethodId) -> Result<Option<MethodId>> {
        let owner = self.method(method).owning_type();

        for record in self.compute_all_virtual_method_impls_for_type(owner)?.iter() {
            if record.body == method && !self.is_interface(self.method(record.decl).owning_type()) {
                return Ok(Some(self.method_definition(record.decl)));
            }
        }

        let Some(base) = self.base_type(owner) else {
            return Ok(None);
        };
        for current in self.base_chain(base) {
            let found = self.methods_of(current).into_iter().find(|candidate| {
                self.method(*candidate).is_virtual()
                    && self.has_same_name_and_signature(*candidate, method)
            });
            if found.is_some() {
                return Ok(found);
            }
        }
        Ok(None)
    }

    /// Resolves class virtual `decl` on an object of exact type `object_type`.
    ///
    /// Returns `decl` unchanged if nothing between `object_type` and the slot owner
    /// implements the slot, which includes `object_type` not deriving from it at all.
    ///
    /// # Errors
    ///
    /// Propagates MethodImpl conflicts of the types walked.
    pub fn find_virtual_function_target_method_on_object_type(
        &self,
        decl: MethodId,
        object_type: TypeId,
    ) -> Result<MethodId> {
        if !self.method(decl).is_virtual() {
            return Ok(decl);
        }

        let method_args = self.method(decl).instantiation().to_vec();
        let slot = self.find_slot_defining_method(self.method_definition(decl))?;
        let slot_typical = self.typical_method_definition(slot);

        for current in self.base_chain(object_type) {
            if let Some(found) = self.find_slot_implementation_on_type(current, slot_typical)? {
                return Ok(self.with_method_instantiation(found, &method_args));
            }
        }
        Ok(decl)
    }

    /// The method declared on `ty` that fills the slot introduced by `slot_typical`.
    fn find_slot_implementation_on_type(
        &self,
        ty: TypeId,
        slot_typical: MethodId,
    ) -> Result<Option<MethodId>> {
        for record in self.compute_all_virtual_method_impls_for_type(ty)?.iter() {
            let decl = self.method_definition(record.decl);
            if self.is_interface(self.method(decl).owning_type()) {
                continue;
            }
            let decl_slot = self.find_slot_defining_method(decl)?;
            if self.typical_method_definition(decl_slot) == slot_typical {
                return Ok(Some(self.method_definition(record.body)));
            }
        }

        let name = self.method(slot_typical).name();
        for candidate in self.methods_of(ty) {
            let desc = self.method(candidate);
            if !desc.is_virtual() || desc.name() != name {
                continue;
            }
            let candidate_slot = self.find_slot_defining_method(candidate)?;
            if self.typical_method_definition(candidate_slot) == slot_typical {
                return Ok(Some(candidate));
            }
        }
        Ok(None)
    }

    /// Maps interface method `interface_method` to the virtual method implementing it on `ty`.
    ///
    /// Each type from `ty` towards the root is checked for an explicit MethodImpl,
    /// then, if it lists the interface itself, for a virtual method with matching
    /// name and signature. Falls back to a default implementation on the interface.
    /// The result is the most derived override on `ty`.
    ///
    /// # Errors
    ///
    /// Propagates MethodImpl conflicts of the types walked.
    pub fn resolve_interface_method_to_virtual_method_on_type(
        &self,
        interface_method: MethodId,
        ty: TypeId,
    ) -> Result<Option<MethodId>> {
        let method_args = self.method(interface_method).instantiation().to_vec();
        let declaration = self.method_definition(interface_method);
        let interface = self.method(declaration).owning_type();

        for current in self.base_chain(ty) {
            for record in self.compute_all_virtual_method_impls_for_type(current)?.iter() {
                if self.same_method_up_to_canon(self.method_definition(record.decl), declaration) {
                    let body = self.with_method_instantiation(record.body, &method_args);
                    return self
                        .find_virtual_function_target_method_on_object_type(body, ty)
                        .map(Some);
                }
            }

            let listed = self
                .declared_interface_closure(current)
                .into_iter()
                .find(|listed| self.same_type_up_to_canon(*listed, interface));
            let Some(listed) = listed else {
                continue;
            };

            let expected = self.intern_method_for_instantiated_type(
                self.typical_method_definition(declaration),
                listed,
            );
            let implicit = self.methods_of(current).into_iter().find(|candidate| {
                self.method(*candidate).is_virtual()
                    && self.has_same_name_and_signature(*candidate, expected)
            });
            if let Some(implicit) = implicit {
                let body = self.with_method_instantiation(implicit, &method_args);
                return self
                    .find_virtual_function_target_method_on_object_type(body, ty)
                    .map(Some);
            }
        }

        if self.method(declaration).is_abstract() {
            Ok(None)
        } else {
            Ok(Some(interface_method))
        }
    }

    /// Resolves `decl` (class virtual or interface method) on an object of exact type `ty`.
    ///
    /// Returns `decl` unchanged when no implementation is found.
    ///
    /// # Errors
    ///
    /// Propagates MethodImpl conflicts of the types walked.
    pub fn resolve_virtual_method(&self, decl: MethodId, ty: TypeId) -> Result<MethodId> {
        if self.is_interface(self.method(decl).owning_type()) {
            Ok(self
                .resolve_interface_method_to_virtual_method_on_type(decl, ty)?
                .unwrap_or(decl))
        } else {
            self.find_virtual_function_target_method_on_object_type(decl, ty)
        }
    }

    /// Every vtable slot of `ty`, base slots first. Generic virtual methods are excluded
    /// because they are dispatched per instantiation.
    ///
    /// # Errors
    ///
    /// Propagates MethodImpl conflicts of the types walked.
    pub fn enumerate_virtual_slots(&self, ty: TypeId) -> Result<Vec<MethodId>> {
        let chain: Vec<_> = self.base_chain(ty).collect();
        let mut slots = Vec::new();
        for current in chain.into_iter().rev() {
            for method in self.methods_of(current) {
                let desc = self.method(method);
                if !desc.is_virtual() || desc.is_generic_definition() {
                    continue;
                }
                if self.find_slot_defining_method(method)? == method {
                    slots.push(method);
                }
            }
        }
        Ok(slots)
    }

    /// Returns `true` if the two methods are equal or share code.
    #[must_use]
    pub fn same_method_up_to_canon(&self, a: MethodId, b: MethodId) -> bool {
        a == b
            || (self.typical_method_definition(a) == self.typical_method_definition(b)
                && self.canonical_method(a) == self.canonical_method(b))
    }

    /// Returns `true` if the two types are equal or have the same canonical form.
    #[must_use]
    pub fn same_type_up_to_canon(&self, a: TypeId, b: TypeId) -> bool {
        a == b || self.convert_to_canon_form(a) == self.convert_to_canon_form(b)
    }

    fn with_method_instantiation(&self, method: MethodId, args: &[TypeId]) -> MethodId {
        if args.is_empty() || !self.method(method).is_generic_definition() {
            method
        } else {
            self.intern_instantiated_method(method, Instantiation::from(args))
        }
    }
}
