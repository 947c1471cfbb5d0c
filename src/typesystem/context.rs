//! The type system context: arenas plus interning tables for one compilation run.
//!
//! [`TypeSystemContext`] owns every type, method and field created during a run. All
//! factories are interning factories: two requests with structurally equal arguments
//! return the identical handle. The tables are concurrent maps; a first-time request
//! builds its entity outside the shard lock and then races to insert it, the loser
//! dropping its speculative copy and returning the winner's handle.
//!
//! There is no global instance. Each compilation (and each test) creates its own
//! context and passes it by reference; entities live until the context is dropped.

use std::hash::Hash;

use dashmap::{mapref::entry::Entry, DashMap};
use strum::{EnumCount, IntoEnumIterator};

use crate::{
    typesystem::{
        DefinedType, FieldDesc, FieldFlags, FieldId, GenericParameterKind, Instantiation,
        MethodDesc, MethodFlags, MethodId, MethodImplRecord, MethodKind, MethodSignature,
        TypeDesc, TypeFlags, TypeId, TypeKind, WellKnownType,
    },
    Error::TypeError,
    Result,
};

/// Owner of all type-system entities for one compilation run.
pub struct TypeSystemContext {
    types: boxcar::Vec<TypeDesc>,
    methods: boxcar::Vec<MethodDesc>,
    fields: boxcar::Vec<FieldDesc>,
    defined: DashMap<String, TypeId>,
    instantiated_types: DashMap<(TypeId, Instantiation), TypeId>,
    array_types: DashMap<(TypeId, Option<u32>), TypeId>,
    pointer_types: DashMap<TypeId, TypeId>,
    byref_types: DashMap<TypeId, TypeId>,
    generic_parameters: DashMap<(GenericParameterKind, u32), TypeId>,
    methods_for_instantiated_types: DashMap<(MethodId, TypeId), MethodId>,
    instantiated_methods: DashMap<(MethodId, Instantiation), MethodId>,
    well_known: Vec<TypeId>,
    canon: TypeId,
}

/// Looks `key` up in `map`, materializing and inserting a new arena entry on a miss.
///
/// `make` runs without holding the shard lock; if another thread inserted the same
/// key in the meantime its handle wins and the speculative value is dropped.
fn intern<K, V, I>(
    map: &DashMap<K, I>,
    arena: &boxcar::Vec<V>,
    key: K,
    make: impl FnOnce() -> V,
) -> I
where
    K: Eq + Hash,
    I: Copy + From<usize>,
{
    if let Some(existing) = map.get(&key) {
        return *existing;
    }

    let speculative = make();
    match map.entry(key) {
        Entry::Occupied(winner) => *winner.get(),
        Entry::Vacant(slot) => *slot.insert(I::from(arena.push(speculative))),
    }
}

impl TypeSystemContext {
    /// Creates a context containing the well-known `System` types and `System.__Canon`.
    #[must_use]
    pub fn new() -> Self {
        let mut context = TypeSystemContext {
            types: boxcar::Vec::new(),
            methods: boxcar::Vec::new(),
            fields: boxcar::Vec::new(),
            defined: DashMap::new(),
            instantiated_types: DashMap::new(),
            array_types: DashMap::new(),
            pointer_types: DashMap::new(),
            byref_types: DashMap::new(),
            generic_parameters: DashMap::new(),
            methods_for_instantiated_types: DashMap::new(),
            instantiated_methods: DashMap::new(),
            well_known: Vec::with_capacity(WellKnownType::COUNT),
            canon: TypeId(0),
        };

        for well_known in WellKnownType::iter() {
            let id = context.push_defined("System", well_known.name(), well_known.flags(), 0);
            let base = well_known
                .base()
                .map(|base| context.well_known[base as usize]);
            if let Some(defined) = context.ty(id).as_defined() {
                let _ = defined.base.set(base);
                let _ = defined.interfaces.set(Vec::new());
            }
            context.well_known.push(id);
        }

        let canon = context
            .types
            .push(TypeDesc::new(TypeKind::Canon, 0, false, true));
        context.canon = TypeId::from(canon);
        context
    }

    fn push_defined(&self, namespace: &str, name: &str, flags: TypeFlags, arity: u32) -> TypeId {
        let defined = DefinedType::new(namespace, name, flags, arity);
        let fullname = defined.fullname();
        let id = TypeId::from(
            self.types
                .push(TypeDesc::new(TypeKind::Defined(defined), 0, false, false)),
        );
        self.defined.insert(fullname, id);
        id
    }

    // --------------------------------------------------------------------------------------
    // Arena access
    // --------------------------------------------------------------------------------------

    /// Returns the type behind `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not created by this context.
    #[must_use]
    pub fn ty(&self, id: TypeId) -> &TypeDesc {
        &self.types[id.index()]
    }

    /// Returns the method behind `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not created by this context.
    #[must_use]
    pub fn method(&self, id: MethodId) -> &MethodDesc {
        &self.methods[id.index()]
    }

    /// Returns the field behind `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not created by this context.
    #[must_use]
    pub fn field(&self, id: FieldId) -> &FieldDesc {
        &self.fields[id.index()]
    }

    /// Number of types materialized so far.
    #[must_use]
    pub fn type_count(&self) -> usize {
        self.types.count()
    }

    /// Number of methods materialized so far.
    #[must_use]
    pub fn method_count(&self) -> usize {
        self.methods.count()
    }

    /// Returns one of the types every context starts with.
    #[must_use]
    pub fn well_known_type(&self, well_known: WellKnownType) -> TypeId {
        self.well_known[well_known as usize]
    }

    /// `System.Object`.
    #[must_use]
    pub fn object_type(&self) -> TypeId {
        self.well_known_type(WellKnownType::Object)
    }

    /// `System.Void`.
    #[must_use]
    pub fn void_type(&self) -> TypeId {
        self.well_known_type(WellKnownType::Void)
    }

    /// `System.__Canon`, the shared stand-in for reference type arguments.
    #[must_use]
    pub fn canon_type(&self) -> TypeId {
        self.canon
    }

    /// Looks up a defined type by its full name (`Namespace.Name`).
    #[must_use]
    pub fn lookup_type(&self, fullname: &str) -> Option<TypeId> {
        self.defined.get(fullname).map(|entry| *entry)
    }

    pub(crate) fn defined(&self, id: TypeId) -> Result<&DefinedType> {
        self.ty(id)
            .as_defined()
            .ok_or_else(|| TypeError(format!("'{}' is not a defined type", self.type_name(id))))
    }

    // --------------------------------------------------------------------------------------
    // Definitions
    // --------------------------------------------------------------------------------------

    /// Declares a new type. Interfaces are always abstract.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::TypeError`] if a type with the same full name exists.
    pub fn define_type(
        &self,
        namespace: &str,
        name: &str,
        mut flags: TypeFlags,
        generic_arity: u32,
    ) -> Result<TypeId> {
        if flags.contains(TypeFlags::INTERFACE) {
            flags |= TypeFlags::ABSTRACT;
        }

        let defined = DefinedType::new(namespace, name, flags, generic_arity);
        match self.defined.entry(defined.fullname()) {
            Entry::Occupied(existing) => Err(TypeError(format!(
                "type '{}' is already defined",
                existing.key()
            ))),
            Entry::Vacant(slot) => {
                let id = TypeId::from(
                    self.types
                        .push(TypeDesc::new(TypeKind::Defined(defined), 0, false, false)),
                );
                slot.insert(id);
                Ok(id)
            }
        }
    }

    /// Sets the base type of a defined type. May be called once per type.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::TypeError`] if `ty` is not a defined type or its base was already set.
    pub fn set_base_type(&self, ty: TypeId, base: Option<TypeId>) -> Result<()> {
        self.defined(ty)?
            .base
            .set(base)
            .map_err(|_| TypeError(format!("base type of '{}' already set", self.type_name(ty))))
    }

    /// Sets the directly implemented interfaces of a defined type. May be called once per type.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::TypeError`] if `ty` is not a defined type or its interfaces were already set.
    pub fn set_interfaces(&self, ty: TypeId, interfaces: Vec<TypeId>) -> Result<()> {
        self.defined(ty)?
            .interfaces
            .set(interfaces)
            .map_err(|_| TypeError(format!("interfaces of '{}' already set", self.type_name(ty))))
    }

    /// Declares a method on a defined type.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::TypeError`] if `owner` is not a defined type or the flags are
    /// inconsistent (abstract but not virtual).
    pub fn add_method(
        &self,
        owner: TypeId,
        name: &str,
        signature: MethodSignature,
        flags: MethodFlags,
    ) -> Result<MethodId> {
        let defined = self.defined(owner)?;
        if flags.contains(MethodFlags::ABSTRACT) && !flags.contains(MethodFlags::VIRTUAL) {
            return Err(TypeError(format!(
                "abstract method '{}::{name}' must be virtual",
                defined.fullname()
            )));
        }

        let id = MethodId::from(self.methods.push(MethodDesc {
            kind: MethodKind::Definition,
            owning_type: owner,
            name: name.into(),
            signature,
            flags,
            depth: 0,
            has_canon: false,
            canonical: std::sync::OnceLock::new(),
        }));
        defined.methods.push(id);
        Ok(id)
    }

    /// Declares a field on a defined type.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::TypeError`] if `owner` is not a defined type.
    pub fn add_field(
        &self,
        owner: TypeId,
        name: &str,
        field_type: TypeId,
        flags: FieldFlags,
    ) -> Result<FieldId> {
        let defined = self.defined(owner)?;
        let id = FieldId::from(self.fields.push(FieldDesc {
            owning_type: owner,
            name: name.to_string(),
            field_type,
            flags,
        }));
        defined.fields.push(id);
        Ok(id)
    }

    /// Declares an explicit override (`.override decl with body`) on a defined type.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::TypeError`] if `owner` is not a defined type, either method
    /// is not virtual, or the records of `owner` were already computed.
    pub fn add_method_impl(&self, owner: TypeId, decl: MethodId, body: MethodId) -> Result<()> {
        let defined = self.defined(owner)?;
        // Instantiations compute their records through the definition's, so this covers them.
        if self.ty(owner).virtual_method_impls.get().is_some() {
            return Err(TypeError(format!(
                "method impls of '{}' were already computed",
                defined.fullname()
            )));
        }
        if !self.method(decl).is_virtual() || !self.method(body).is_virtual() {
            return Err(TypeError(format!(
                "method impl {} -> {} on '{}' requires virtual methods",
                self.method_name(decl),
                self.method_name(body),
                defined.fullname()
            )));
        }
        defined.method_impls.push(MethodImplRecord { decl, body });
        Ok(())
    }

    // --------------------------------------------------------------------------------------
    // Interning factories
    // --------------------------------------------------------------------------------------

    /// Returns the instantiation of generic definition `definition` over `args`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::TypeError`] if `definition` is not a generic definition of
    /// arity `args.len()`.
    pub fn get_instantiated_type(&self, definition: TypeId, args: &[TypeId]) -> Result<TypeId> {
        let defined = self.defined(definition)?;
        if defined.generic_arity == 0 || defined.generic_arity as usize != args.len() {
            return Err(TypeError(format!(
                "'{}' expects {} type arguments, got {}",
                defined.fullname(),
                defined.generic_arity,
                args.len()
            )));
        }
        Ok(self.intern_instantiated_type(definition, Instantiation::from(args)))
    }

    pub(crate) fn intern_instantiated_type(
        &self,
        definition: TypeId,
        instantiation: Instantiation,
    ) -> TypeId {
        intern(
            &self.instantiated_types,
            &self.types,
            (definition, instantiation.clone()),
            || {
                let depth = 1 + instantiation
                    .iter()
                    .map(|arg| self.ty(*arg).depth())
                    .max()
                    .unwrap_or(0);
                let has_generic_parameters = instantiation
                    .iter()
                    .any(|arg| self.ty(*arg).has_generic_parameters());
                let has_canon = instantiation.iter().any(|arg| self.ty(*arg).has_canon());
                TypeDesc::new(
                    TypeKind::Instantiated {
                        definition,
                        instantiation,
                    },
                    depth,
                    has_generic_parameters,
                    has_canon,
                )
            },
        )
    }

    /// Returns the single-dimensional zero-based array of `element`.
    #[must_use]
    pub fn get_array_type(&self, element: TypeId) -> TypeId {
        self.intern_array_type(element, None)
    }

    /// Returns the multi-dimensional array of `element` with `rank` dimensions.
    ///
    /// A rank 1 multi-dimensional array is distinct from the single-dimensional array.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::TypeError`] for ranks outside `1..=32`.
    pub fn get_md_array_type(&self, element: TypeId, rank: u32) -> Result<TypeId> {
        if !(1..=32).contains(&rank) {
            return Err(TypeError(format!("invalid array rank {rank}")));
        }
        Ok(self.intern_array_type(element, Some(rank)))
    }

    pub(crate) fn intern_array_type(&self, element: TypeId, rank: Option<u32>) -> TypeId {
        intern(&self.array_types, &self.types, (element, rank), || {
            self.parameterized(TypeKind::Array { element, rank }, element)
        })
    }

    /// Returns the unmanaged pointer to `pointee`.
    #[must_use]
    pub fn get_pointer_type(&self, pointee: TypeId) -> TypeId {
        intern(&self.pointer_types, &self.types, pointee, || {
            self.parameterized(TypeKind::Pointer(pointee), pointee)
        })
    }

    /// Returns the managed reference to `target`.
    #[must_use]
    pub fn get_byref_type(&self, target: TypeId) -> TypeId {
        intern(&self.byref_types, &self.types, target, || {
            self.parameterized(TypeKind::ByRef(target), target)
        })
    }

    fn parameterized(&self, kind: TypeKind, parameter: TypeId) -> TypeDesc {
        let parameter = self.ty(parameter);
        TypeDesc::new(
            kind,
            parameter.depth() + 1,
            parameter.has_generic_parameters(),
            parameter.has_canon(),
        )
    }

    /// Returns the generic parameter placeholder `!index` or `!!index`.
    #[must_use]
    pub fn get_generic_parameter(&self, kind: GenericParameterKind, index: u32) -> TypeId {
        intern(&self.generic_parameters, &self.types, (kind, index), || {
            TypeDesc::new(TypeKind::GenericParameter { kind, index }, 0, true, false)
        })
    }

    /// Returns method definition `typical` viewed through instantiated owner `owner`.
    ///
    /// Passing the generic definition itself as owner returns `typical` unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::TypeError`] if `typical` is not a method definition or `owner`
    /// is not an instantiation of its declaring type.
    pub fn get_method_for_instantiated_type(
        &self,
        typical: MethodId,
        owner: TypeId,
    ) -> Result<MethodId> {
        let method = self.method(typical);
        if method.kind != MethodKind::Definition {
            return Err(TypeError(format!(
                "'{}' is not a method definition",
                self.method_name(typical)
            )));
        }
        if self.type_definition(owner) != method.owning_type {
            return Err(TypeError(format!(
                "'{}' is not an instantiation of '{}'",
                self.type_name(owner),
                self.type_name(method.owning_type)
            )));
        }
        Ok(self.intern_method_for_instantiated_type(typical, owner))
    }

    pub(crate) fn intern_method_for_instantiated_type(
        &self,
        typical: MethodId,
        owner: TypeId,
    ) -> MethodId {
        if self.method(typical).owning_type == owner {
            return typical;
        }

        intern(
            &self.methods_for_instantiated_types,
            &self.methods,
            (typical, owner),
            || {
                let definition = self.method(typical);
                let owner_desc = self.ty(owner);
                let signature = self.instantiate_signature(
                    &definition.signature,
                    self.type_instantiation(owner),
                    &[],
                );
                MethodDesc {
                    kind: MethodKind::ForInstantiatedType { typical },
                    owning_type: owner,
                    name: definition.name.clone(),
                    signature,
                    flags: definition.flags,
                    depth: owner_desc.depth(),
                    has_canon: owner_desc.has_canon(),
                    canonical: std::sync::OnceLock::new(),
                }
            },
        )
    }

    /// Returns generic method `definition` instantiated over method-level `args`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::TypeError`] if `definition` is already instantiated or its
    /// generic arity differs from `args.len()`.
    pub fn get_instantiated_method(&self, definition: MethodId, args: &[TypeId]) -> Result<MethodId> {
        let method = self.method(definition);
        if !method.is_generic_definition()
            || method.signature.generic_arity as usize != args.len()
        {
            return Err(TypeError(format!(
                "'{}' expects {} method type arguments, got {}",
                self.method_name(definition),
                method.signature.generic_arity,
                args.len()
            )));
        }
        Ok(self.intern_instantiated_method(definition, Instantiation::from(args)))
    }

    pub(crate) fn intern_instantiated_method(
        &self,
        definition: MethodId,
        instantiation: Instantiation,
    ) -> MethodId {
        intern(
            &self.instantiated_methods,
            &self.methods,
            (definition, instantiation.clone()),
            || {
                let generic = self.method(definition);
                let signature =
                    self.instantiate_signature(&generic.signature, &[], &instantiation);
                let args_depth = instantiation
                    .iter()
                    .map(|arg| self.ty(*arg).depth())
                    .max()
                    .unwrap_or(0);
                let has_canon = generic.has_canon
                    || instantiation.iter().any(|arg| self.ty(*arg).has_canon());
                MethodDesc {
                    kind: MethodKind::Instantiated {
                        definition,
                        instantiation,
                    },
                    owning_type: generic.owning_type,
                    name: generic.name.clone(),
                    signature: MethodSignature {
                        generic_arity: 0,
                        ..signature
                    },
                    flags: generic.flags,
                    depth: generic.depth.max(args_depth + 1),
                    has_canon,
                    canonical: std::sync::OnceLock::new(),
                }
            },
        )
    }
}

impl Default for TypeSystemContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn well_known_types_exist() {
        let context = TypeSystemContext::new();
        let object = context.object_type();
        assert_eq!(context.lookup_type("System.Object"), Some(object));
        let int32 = context.well_known_type(WellKnownType::Int32);
        assert!(context.is_value_type(int32));
        assert_eq!(
            context.base_type(int32),
            Some(context.well_known_type(WellKnownType::ValueType))
        );
        assert!(context.ty(context.canon_type()).has_canon());
    }

    #[test]
    fn duplicate_definition_rejected() {
        let context = TypeSystemContext::new();
        context.define_type("App", "Foo", TypeFlags::empty(), 0).unwrap();
        assert!(context.define_type("App", "Foo", TypeFlags::empty(), 0).is_err());
    }

    #[test]
    fn interface_is_abstract() {
        let context = TypeSystemContext::new();
        let iface = context
            .define_type("App", "IFoo", TypeFlags::INTERFACE, 0)
            .unwrap();
        assert!(context.is_interface(iface));
        assert!(context.is_abstract(iface));
    }

    #[test]
    fn array_interning() {
        let context = TypeSystemContext::new();
        let int32 = context.well_known_type(WellKnownType::Int32);
        let a = context.get_array_type(int32);
        let b = context.get_array_type(int32);
        assert_eq!(a, b);
        let md1 = context.get_md_array_type(int32, 1).unwrap();
        assert_ne!(a, md1);
        assert_eq!(md1, context.get_md_array_type(int32, 1).unwrap());
        assert!(context.get_md_array_type(int32, 0).is_err());
        assert_eq!(context.ty(a).depth(), 1);
    }

    #[test]
    fn pointer_and_byref_interning() {
        let context = TypeSystemContext::new();
        let byte = context.well_known_type(WellKnownType::Byte);
        assert_eq!(context.get_pointer_type(byte), context.get_pointer_type(byte));
        assert_eq!(context.get_byref_type(byte), context.get_byref_type(byte));
        assert_ne!(context.get_pointer_type(byte), context.get_byref_type(byte));
    }

    #[test]
    fn instantiated_type_arity_checked() {
        let context = TypeSystemContext::new();
        let list = context
            .define_type("System.Collections.Generic", "List`1", TypeFlags::empty(), 1)
            .unwrap();
        let int32 = context.well_known_type(WellKnownType::Int32);
        assert!(context.get_instantiated_type(list, &[]).is_err());
        assert!(context.get_instantiated_type(list, &[int32, int32]).is_err());
        assert!(context
            .get_instantiated_type(context.object_type(), &[int32])
            .is_err());
        let list_int = context.get_instantiated_type(list, &[int32]).unwrap();
        assert_eq!(list_int, context.get_instantiated_type(list, &[int32]).unwrap());
        assert_eq!(context.ty(list_int).depth(), 1);
    }

    #[test]
    fn concurrent_interning_converges() {
        let context = Arc::new(TypeSystemContext::new());
        let list = context
            .define_type("System.Collections.Generic", "List`1", TypeFlags::empty(), 1)
            .unwrap();
        let string = context.well_known_type(WellKnownType::String);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let context = Arc::clone(&context);
                std::thread::spawn(move || {
                    let list_string = context.get_instantiated_type(list, &[string]).unwrap();
                    (list_string, context.get_array_type(list_string))
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(results.windows(2).all(|pair| pair[0] == pair[1]));
    }

    #[test]
    fn method_for_instantiated_type_substitutes_signature() {
        let context = TypeSystemContext::new();
        let list = context
            .define_type("System.Collections.Generic", "List`1", TypeFlags::empty(), 1)
            .unwrap();
        let t = context.get_generic_parameter(GenericParameterKind::Type, 0);
        let add = context
            .add_method(
                list,
                "Add",
                MethodSignature::new(context.void_type(), vec![t]),
                MethodFlags::empty(),
            )
            .unwrap();
        let int32 = context.well_known_type(WellKnownType::Int32);
        let list_int = context.get_instantiated_type(list, &[int32]).unwrap();

        let add_int = context.get_method_for_instantiated_type(add, list_int).unwrap();
        assert_eq!(add_int, context.get_method_for_instantiated_type(add, list_int).unwrap());
        assert_eq!(&*context.method(add_int).signature().parameters, &[int32]);
        assert_eq!(context.get_method_for_instantiated_type(add, list).unwrap(), add);
        assert!(context
            .get_method_for_instantiated_type(add, context.object_type())
            .is_err());
    }

    #[test]
    fn abstract_method_must_be_virtual() {
        let context = TypeSystemContext::new();
        let ty = context
            .define_type("App", "Base", TypeFlags::ABSTRACT, 0)
            .unwrap();
        let signature = MethodSignature::new(context.void_type(), vec![]);
        assert!(context
            .add_method(ty, "M", signature, MethodFlags::ABSTRACT)
            .is_err());
    }
}
