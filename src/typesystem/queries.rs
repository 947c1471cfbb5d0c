//! Structural queries over interned types and methods.

use std::collections::HashSet;

use crate::typesystem::{
    FieldId, GenericParameterKind, MethodId, MethodKind, TypeFlags, TypeId, TypeKind,
    TypeSystemContext, WellKnownType,
};

impl TypeSystemContext {
    /// The generic definition of an instantiated type, or the type itself.
    #[must_use]
    pub fn type_definition(&self, ty: TypeId) -> TypeId {
        match self.ty(ty).kind() {
            TypeKind::Instantiated { definition, .. } => *definition,
            _ => ty,
        }
    }

    /// The type arguments of an instantiated type; empty for everything else.
    #[must_use]
    pub fn type_instantiation(&self, ty: TypeId) -> &[TypeId] {
        match self.ty(ty).kind() {
            TypeKind::Instantiated { instantiation, .. } => instantiation,
            _ => &[],
        }
    }

    /// The declared flags of a defined type or of an instantiation's definition.
    #[must_use]
    pub fn type_flags(&self, ty: TypeId) -> TypeFlags {
        match self.ty(self.type_definition(ty)).kind() {
            TypeKind::Defined(defined) => defined.flags,
            _ => TypeFlags::empty(),
        }
    }

    /// Returns `true` for interfaces.
    #[must_use]
    pub fn is_interface(&self, ty: TypeId) -> bool {
        self.type_flags(ty).contains(TypeFlags::INTERFACE)
    }

    /// Returns `true` for abstract classes and interfaces.
    #[must_use]
    pub fn is_abstract(&self, ty: TypeId) -> bool {
        self.type_flags(ty)
            .intersects(TypeFlags::ABSTRACT | TypeFlags::INTERFACE)
    }

    /// Returns `true` if the type carries the `sealed` attribute.
    #[must_use]
    pub fn is_declared_sealed(&self, ty: TypeId) -> bool {
        self.type_flags(ty).contains(TypeFlags::SEALED)
    }

    /// Returns `true` for value types.
    #[must_use]
    pub fn is_value_type(&self, ty: TypeId) -> bool {
        self.type_flags(ty).contains(TypeFlags::VALUE_TYPE)
    }

    /// Returns `true` for arrays of any rank.
    #[must_use]
    pub fn is_array(&self, ty: TypeId) -> bool {
        matches!(self.ty(ty).kind(), TypeKind::Array { .. })
    }

    /// Returns `true` if values of `ty` are references to garbage collected objects.
    ///
    /// These are the types that share canonical code when used as generic arguments.
    #[must_use]
    pub fn is_gc_reference(&self, ty: TypeId) -> bool {
        match self.ty(ty).kind() {
            TypeKind::Defined(_) | TypeKind::Instantiated { .. } => !self.is_value_type(ty),
            TypeKind::Array { .. } | TypeKind::Canon => true,
            TypeKind::Pointer(_) | TypeKind::ByRef(_) | TypeKind::GenericParameter { .. } => false,
        }
    }

    /// The base type, with generic parameters of the definition substituted.
    ///
    /// Arrays derive from `System.Array`, `System.__Canon` from `System.Object`.
    #[must_use]
    pub fn base_type(&self, ty: TypeId) -> Option<TypeId> {
        match self.ty(ty).kind() {
            TypeKind::Defined(defined) => defined.base(),
            TypeKind::Instantiated {
                definition,
                instantiation,
            } => self
                .ty(*definition)
                .as_defined()
                .and_then(|defined| defined.base())
                .map(|base| self.instantiate_type(base, instantiation, &[])),
            TypeKind::Array { .. } => Some(self.well_known_type(WellKnownType::Array)),
            TypeKind::Canon => Some(self.object_type()),
            TypeKind::Pointer(_) | TypeKind::ByRef(_) | TypeKind::GenericParameter { .. } => None,
        }
    }

    /// Iterates `ty` followed by its base types.
    pub fn base_chain(&self, ty: TypeId) -> impl Iterator<Item = TypeId> + '_ {
        std::iter::successors(Some(ty), move |current| self.base_type(*current))
    }

    /// Interfaces listed directly on the type, substituted for instantiations.
    #[must_use]
    pub fn declared_interfaces(&self, ty: TypeId) -> Vec<TypeId> {
        match self.ty(ty).kind() {
            TypeKind::Defined(defined) => defined.interfaces().to_vec(),
            TypeKind::Instantiated {
                definition,
                instantiation,
            } => self
                .ty(*definition)
                .as_defined()
                .map(|defined| {
                    defined
                        .interfaces()
                        .iter()
                        .map(|iface| self.instantiate_type(*iface, instantiation, &[]))
                        .collect()
                })
                .unwrap_or_default(),
            _ => Vec::new(),
        }
    }

    /// Interfaces listed on the type together with the interfaces they inherit.
    #[must_use]
    pub fn declared_interface_closure(&self, ty: TypeId) -> Vec<TypeId> {
        let mut result = Vec::new();
        let mut seen = HashSet::new();
        let mut pending = self.declared_interfaces(ty);
        pending.reverse();
        while let Some(iface) = pending.pop() {
            if seen.insert(iface) {
                result.push(iface);
                let mut inherited = self.declared_interfaces(iface);
                inherited.reverse();
                pending.extend(inherited);
            }
        }
        result
    }

    /// Every interface implemented by the type, including through base types.
    #[must_use]
    pub fn all_interfaces(&self, ty: TypeId) -> Vec<TypeId> {
        let mut result = Vec::new();
        let mut seen = HashSet::new();
        for current in self.base_chain(ty) {
            for iface in self.declared_interface_closure(current) {
                if seen.insert(iface) {
                    result.push(iface);
                }
            }
        }
        result
    }

    /// Methods declared on the type, viewed through its instantiation.
    #[must_use]
    pub fn methods_of(&self, ty: TypeId) -> Vec<MethodId> {
        match self.ty(ty).kind() {
            TypeKind::Defined(defined) => defined.methods().collect(),
            TypeKind::Instantiated { definition, .. } => self
                .ty(*definition)
                .as_defined()
                .map(|defined| {
                    defined
                        .methods()
                        .map(|typical| self.intern_method_for_instantiated_type(typical, ty))
                        .collect()
                })
                .unwrap_or_default(),
            _ => Vec::new(),
        }
    }

    /// Fields declared on the type or on its generic definition.
    #[must_use]
    pub fn fields_of(&self, ty: TypeId) -> Vec<FieldId> {
        self.ty(self.type_definition(ty))
            .as_defined()
            .map(|defined| defined.fields().collect())
            .unwrap_or_default()
    }

    /// The first method named `name` declared on the type.
    #[must_use]
    pub fn find_method_by_name(&self, ty: TypeId, name: &str) -> Option<MethodId> {
        self.methods_of(ty)
            .into_iter()
            .find(|method| self.method(*method).name() == name)
    }

    /// The class constructor of the type, if it declares one.
    #[must_use]
    pub fn class_constructor(&self, ty: TypeId) -> Option<MethodId> {
        self.methods_of(ty)
            .into_iter()
            .find(|method| self.method(*method).is_class_constructor())
    }

    /// Strips every level of instantiation, returning the method as declared in metadata.
    #[must_use]
    pub fn typical_method_definition(&self, method: MethodId) -> MethodId {
        match self.method(method).kind() {
            MethodKind::Definition => method,
            MethodKind::ForInstantiatedType { typical } => *typical,
            MethodKind::Instantiated { definition, .. } => {
                self.typical_method_definition(*definition)
            }
        }
    }

    /// Strips the method-level instantiation only.
    #[must_use]
    pub fn method_definition(&self, method: MethodId) -> MethodId {
        match self.method(method).kind() {
            MethodKind::Instantiated { definition, .. } => *definition,
            _ => method,
        }
    }

    /// Returns `true` if name and signature of the two methods are equal.
    #[must_use]
    pub fn has_same_name_and_signature(&self, a: MethodId, b: MethodId) -> bool {
        let (a, b) = (self.method(a), self.method(b));
        a.name() == b.name() && a.signature() == b.signature()
    }

    /// Display name of a type, e.g. `System.Collections.Generic.List`1<System.Int32>`.
    #[must_use]
    pub fn type_name(&self, ty: TypeId) -> String {
        match self.ty(ty).kind() {
            TypeKind::Defined(defined) => defined.fullname(),
            TypeKind::Instantiated {
                definition,
                instantiation,
            } => format!(
                "{}<{}>",
                self.type_name(*definition),
                self.type_list_name(instantiation)
            ),
            TypeKind::Array { element, rank } => match rank {
                None => format!("{}[]", self.type_name(*element)),
                Some(1) => format!("{}[*]", self.type_name(*element)),
                Some(rank) => format!(
                    "{}[{}]",
                    self.type_name(*element),
                    ",".repeat(*rank as usize - 1)
                ),
            },
            TypeKind::Pointer(pointee) => format!("{}*", self.type_name(*pointee)),
            TypeKind::ByRef(target) => format!("{}&", self.type_name(*target)),
            TypeKind::GenericParameter { kind, index } => match kind {
                GenericParameterKind::Type => format!("!{index}"),
                GenericParameterKind::Method => format!("!!{index}"),
            },
            TypeKind::Canon => "System.__Canon".to_string(),
        }
    }

    /// Display name of a method, e.g. `App.Base::Virtual` or `App.Util::Map<System.Int32>`.
    #[must_use]
    pub fn method_name(&self, method: MethodId) -> String {
        let desc = self.method(method);
        let owner = self.type_name(desc.owning_type());
        if desc.instantiation().is_empty() {
            format!("{owner}::{}", desc.name())
        } else {
            format!(
                "{owner}::{}<{}>",
                desc.name(),
                self.type_list_name(desc.instantiation())
            )
        }
    }

    /// Display name of a field, e.g. `App.Counter::value`.
    #[must_use]
    pub fn field_name(&self, field: FieldId) -> String {
        let desc = self.field(field);
        format!("{}::{}", self.type_name(desc.owning_type), desc.name)
    }

    pub(crate) fn type_list_name(&self, types: &[TypeId]) -> String {
        types
            .iter()
            .map(|ty| self.type_name(*ty))
            .collect::<Vec<_>>()
            .join(",")
    }
}
