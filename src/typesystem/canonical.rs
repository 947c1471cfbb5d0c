//! Canonical (shared) forms of types and methods.
//!
//! Generic code is shared across all instantiations over reference types: every
//! reference type argument is replaced by `System.__Canon`, value type arguments are
//! canonicalized recursively and otherwise kept. `List<string>` and `List<object>`
//! therefore share `List<__Canon>`, while `List<int>` and `List<long>` stay distinct.
//!
//! The scanner and the compiler both obtain code targets exclusively through
//! [`TypeSystemContext::canonical_method`], so they always agree on which bodies exist.

use crate::typesystem::{Instantiation, MethodId, MethodKind, TypeId, TypeKind, TypeSystemContext};

impl TypeSystemContext {
    /// Returns the canonical form of `ty`. Memoized per type.
    #[must_use]
    pub fn convert_to_canon_form(&self, ty: TypeId) -> TypeId {
        let desc = self.ty(ty);
        if let Some(canonical) = desc.canonical.get() {
            return *canonical;
        }

        let canonical = match desc.kind() {
            TypeKind::Instantiated {
                definition,
                instantiation,
            } => {
                let args: Vec<_> = instantiation
                    .iter()
                    .map(|arg| self.canon_argument(*arg))
                    .collect();
                self.intern_instantiated_type(*definition, Instantiation::from(args))
            }
            TypeKind::Array { element, rank } => {
                self.intern_array_type(self.canon_argument(*element), *rank)
            }
            TypeKind::Pointer(pointee) => {
                self.get_pointer_type(self.convert_to_canon_form(*pointee))
            }
            TypeKind::ByRef(target) => self.get_byref_type(self.convert_to_canon_form(*target)),
            TypeKind::Defined(_) | TypeKind::GenericParameter { .. } | TypeKind::Canon => ty,
        };

        *desc.canonical.get_or_init(|| canonical)
    }

    fn canon_argument(&self, arg: TypeId) -> TypeId {
        if self.is_gc_reference(arg) {
            self.canon_type()
        } else {
            self.convert_to_canon_form(arg)
        }
    }

    /// Returns `true` if `ty` is already in canonical form.
    #[must_use]
    pub fn is_canonical(&self, ty: TypeId) -> bool {
        self.convert_to_canon_form(ty) == ty
    }

    /// Returns the method whose code is shared by `method`. Memoized per method.
    #[must_use]
    pub fn canonical_method(&self, method: MethodId) -> MethodId {
        let desc = self.method(method);
        if let Some(canonical) = desc.canonical.get() {
            return *canonical;
        }

        let canonical = match desc.kind() {
            MethodKind::Definition => method,
            MethodKind::ForInstantiatedType { typical } => {
                let owner = self.convert_to_canon_form(desc.owning_type());
                self.intern_method_for_instantiated_type(*typical, owner)
            }
            MethodKind::Instantiated {
                definition,
                instantiation,
            } => {
                let definition = self.canonical_method(*definition);
                let args: Vec<_> = instantiation
                    .iter()
                    .map(|arg| self.canon_argument(*arg))
                    .collect();
                self.intern_instantiated_method(definition, Instantiation::from(args))
            }
        };

        *desc.canonical.get_or_init(|| canonical)
    }

    /// Returns `true` if `method` is compiled as shared code (its canonical form mentions `__Canon`).
    #[must_use]
    pub fn is_shared_method(&self, method: MethodId) -> bool {
        self.method(self.canonical_method(method)).has_canon()
    }
}
