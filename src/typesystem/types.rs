//! Type entities and their per-kind data.
//!
//! A [`TypeDesc`] is the arena representation of one interned type. The closed
//! [`TypeKind`] enumeration replaces an open class hierarchy: every per-kind behavior
//! (base type computation, MethodImpl computation, canonicalization) is a `match` over
//! this enum in one place.

use std::{
    ops::Deref,
    sync::{Arc, OnceLock},
};

use bitflags::bitflags;
use strum::{EnumCount, EnumIter};

use crate::{
    typesystem::{FieldId, MethodId, MethodImplRecord, TypeId},
    Result,
};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    /// Declared attributes of a defined type.
    pub struct TypeFlags: u32 {
        /// The type is an interface
        const INTERFACE = 0x0001;
        /// The type is abstract and cannot be instantiated directly
        const ABSTRACT = 0x0002;
        /// The type is declared sealed and cannot be derived from
        const SEALED = 0x0004;
        /// The type is a value type (derives from `System.ValueType`)
        const VALUE_TYPE = 0x0008;
    }
}

/// Distinguishes type-level (`!n`) from method-level (`!!n`) generic parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GenericParameterKind {
    /// A parameter of the owning generic type
    Type,
    /// A parameter of a generic method
    Method,
}

/// An ordered tuple of generic arguments.
///
/// Cheap to clone; used both as interning key and as stored instantiation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Instantiation(Arc<[TypeId]>);

impl Instantiation {
    /// Creates an empty instantiation.
    #[must_use]
    pub fn empty() -> Self {
        Instantiation(Arc::from(Vec::new()))
    }
}

impl Deref for Instantiation {
    type Target = [TypeId];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Vec<TypeId>> for Instantiation {
    fn from(args: Vec<TypeId>) -> Self {
        Instantiation(Arc::from(args))
    }
}

impl From<&[TypeId]> for Instantiation {
    fn from(args: &[TypeId]) -> Self {
        Instantiation(Arc::from(args))
    }
}

/// A type declared in metadata.
///
/// Defined types own their methods, fields and declared MethodImpl records. The
/// base type and interface list are set once after the type itself has been created,
/// which allows self-referential declarations such as `class Foo : IComparable<Foo>`.
pub struct DefinedType {
    /// The namespace, empty for the global namespace
    pub namespace: String,
    /// The type name including a generic arity suffix if any (e.g. ``List`1``)
    pub name: String,
    /// Declared attributes
    pub flags: TypeFlags,
    /// Number of type-level generic parameters
    pub generic_arity: u32,
    pub(crate) base: OnceLock<Option<TypeId>>,
    pub(crate) interfaces: OnceLock<Vec<TypeId>>,
    pub(crate) methods: boxcar::Vec<MethodId>,
    pub(crate) fields: boxcar::Vec<FieldId>,
    pub(crate) method_impls: boxcar::Vec<MethodImplRecord>,
}

impl DefinedType {
    pub(crate) fn new(namespace: &str, name: &str, flags: TypeFlags, generic_arity: u32) -> Self {
        DefinedType {
            namespace: namespace.to_string(),
            name: name.to_string(),
            flags,
            generic_arity,
            base: OnceLock::new(),
            interfaces: OnceLock::new(),
            methods: boxcar::Vec::new(),
            fields: boxcar::Vec::new(),
            method_impls: boxcar::Vec::new(),
        }
    }

    /// Returns the fully qualified name (`Namespace.Name`).
    #[must_use]
    pub fn fullname(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }

    /// The declared base type, possibly expressed over this type's generic parameters.
    #[must_use]
    pub fn base(&self) -> Option<TypeId> {
        self.base.get().copied().flatten()
    }

    /// The interfaces declared directly on this type.
    #[must_use]
    pub fn interfaces(&self) -> &[TypeId] {
        self.interfaces.get().map_or(&[], Vec::as_slice)
    }

    /// The methods declared on this type, in declaration order.
    pub fn methods(&self) -> impl Iterator<Item = MethodId> + '_ {
        self.methods.iter().map(|(_, method)| *method)
    }

    /// The fields declared on this type, in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = FieldId> + '_ {
        self.fields.iter().map(|(_, field)| *field)
    }

    /// The MethodImpl records declared on this type, in declaration order.
    pub fn declared_method_impls(&self) -> impl Iterator<Item = MethodImplRecord> + '_ {
        self.method_impls.iter().map(|(_, record)| *record)
    }
}

/// The closed set of type shapes.
pub enum TypeKind {
    /// A type declared in metadata
    Defined(DefinedType),
    /// A generic definition applied to type arguments
    Instantiated {
        /// The generic type definition
        definition: TypeId,
        /// The type arguments
        instantiation: Instantiation,
    },
    /// An array; `rank` is `None` for single-dimensional zero-based vectors
    Array {
        /// The element type
        element: TypeId,
        /// Rank of a multi-dimensional array
        rank: Option<u32>,
    },
    /// An unmanaged pointer
    Pointer(TypeId),
    /// A managed reference
    ByRef(TypeId),
    /// A generic parameter placeholder in signatures and bodies of generic definitions
    GenericParameter {
        /// Type-level or method-level
        kind: GenericParameterKind,
        /// Zero-based position
        index: u32,
    },
    /// `System.__Canon`, standing for any reference type in shared code
    Canon,
}

/// An interned type.
pub struct TypeDesc {
    kind: TypeKind,
    depth: u32,
    has_generic_parameters: bool,
    has_canon: bool,
    pub(crate) canonical: OnceLock<TypeId>,
    pub(crate) virtual_method_impls: OnceLock<Result<Arc<[MethodImplRecord]>>>,
}

impl TypeDesc {
    pub(crate) fn new(kind: TypeKind, depth: u32, has_generic_parameters: bool, has_canon: bool) -> Self {
        TypeDesc {
            kind,
            depth,
            has_generic_parameters,
            has_canon,
            canonical: OnceLock::new(),
            virtual_method_impls: OnceLock::new(),
        }
    }

    /// The shape of this type.
    #[must_use]
    pub fn kind(&self) -> &TypeKind {
        &self.kind
    }

    /// Instantiation nesting depth; zero for non-generic leaf types.
    #[must_use]
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Whether any generic parameter occurs in this type.
    #[must_use]
    pub fn has_generic_parameters(&self) -> bool {
        self.has_generic_parameters
    }

    /// Whether `System.__Canon` occurs in this type (the type is runtime determined).
    #[must_use]
    pub fn has_canon(&self) -> bool {
        self.has_canon
    }

    /// The defined-type data, if this is a defined type.
    #[must_use]
    pub fn as_defined(&self) -> Option<&DefinedType> {
        match &self.kind {
            TypeKind::Defined(defined) => Some(defined),
            _ => None,
        }
    }
}

/// Types every context creates up front.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumCount)]
pub enum WellKnownType {
    /// `System.Object`
    Object,
    /// `System.ValueType`
    ValueType,
    /// `System.Array`
    Array,
    /// `System.String`
    String,
    /// `System.Void`
    Void,
    /// `System.Boolean`
    Boolean,
    /// `System.Char`
    Char,
    /// `System.SByte`
    SByte,
    /// `System.Byte`
    Byte,
    /// `System.Int16`
    Int16,
    /// `System.UInt16`
    UInt16,
    /// `System.Int32`
    Int32,
    /// `System.UInt32`
    UInt32,
    /// `System.Int64`
    Int64,
    /// `System.UInt64`
    UInt64,
    /// `System.IntPtr`
    IntPtr,
    /// `System.UIntPtr`
    UIntPtr,
    /// `System.Single`
    Single,
    /// `System.Double`
    Double,
}

impl WellKnownType {
    /// The simple name within the `System` namespace.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            WellKnownType::Object => "Object",
            WellKnownType::ValueType => "ValueType",
            WellKnownType::Array => "Array",
            WellKnownType::String => "String",
            WellKnownType::Void => "Void",
            WellKnownType::Boolean => "Boolean",
            WellKnownType::Char => "Char",
            WellKnownType::SByte => "SByte",
            WellKnownType::Byte => "Byte",
            WellKnownType::Int16 => "Int16",
            WellKnownType::UInt16 => "UInt16",
            WellKnownType::Int32 => "Int32",
            WellKnownType::UInt32 => "UInt32",
            WellKnownType::Int64 => "Int64",
            WellKnownType::UInt64 => "UInt64",
            WellKnownType::IntPtr => "IntPtr",
            WellKnownType::UIntPtr => "UIntPtr",
            WellKnownType::Single => "Single",
            WellKnownType::Double => "Double",
        }
    }

    pub(crate) fn flags(self) -> TypeFlags {
        match self {
            WellKnownType::Object => TypeFlags::empty(),
            WellKnownType::ValueType | WellKnownType::Array => TypeFlags::ABSTRACT,
            WellKnownType::String => TypeFlags::SEALED,
            _ => TypeFlags::SEALED | TypeFlags::VALUE_TYPE,
        }
    }

    pub(crate) fn base(self) -> Option<WellKnownType> {
        match self {
            WellKnownType::Object => None,
            WellKnownType::ValueType | WellKnownType::Array | WellKnownType::String => {
                Some(WellKnownType::Object)
            }
            _ => Some(WellKnownType::ValueType),
        }
    }
}
