//! Method and field entities.

use std::sync::{Arc, OnceLock};

use bitflags::bitflags;

use crate::typesystem::{Instantiation, MethodId, TypeId};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    /// Declared attributes of a method.
    pub struct MethodFlags: u32 {
        /// Static method, no `this`
        const STATIC = 0x0001;
        /// Virtual method, dispatched through a vtable slot
        const VIRTUAL = 0x0002;
        /// Abstract method, has no body
        const ABSTRACT = 0x0004;
        /// Final (`sealed override`), cannot be overridden further
        const FINAL = 0x0008;
        /// Introduces a new vtable slot instead of reusing the base slot
        const NEW_SLOT = 0x0010;
        /// Instance constructor (`.ctor`)
        const CONSTRUCTOR = 0x0020;
        /// Class constructor (`.cctor`)
        const CLASS_CONSTRUCTOR = 0x0040;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    /// Declared attributes of a field.
    pub struct FieldFlags: u32 {
        /// Static field, stored in the owning type's static base
        const STATIC = 0x0001;
        /// Compile-time constant, has no storage
        const LITERAL = 0x0002;
    }
}

/// Return and parameter types of a method.
///
/// Signatures of methods on generic definitions are expressed over generic parameter
/// types; views through instantiated owners carry the substituted signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodSignature {
    /// The return type (`System.Void` for none)
    pub return_type: TypeId,
    /// Parameter types, excluding `this`
    pub parameters: Arc<[TypeId]>,
    /// Number of method-level generic parameters
    pub generic_arity: u32,
}

impl MethodSignature {
    /// Creates a non-generic signature.
    #[must_use]
    pub fn new(return_type: TypeId, parameters: Vec<TypeId>) -> Self {
        MethodSignature {
            return_type,
            parameters: Arc::from(parameters),
            generic_arity: 0,
        }
    }

    /// Sets the number of method-level generic parameters.
    #[must_use]
    pub fn with_generic_arity(mut self, generic_arity: u32) -> Self {
        self.generic_arity = generic_arity;
        self
    }
}

/// The closed set of method shapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodKind {
    /// Declared on a defined type
    Definition,
    /// A definition viewed through an instantiated owning type
    ForInstantiatedType {
        /// The method as declared on the generic definition
        typical: MethodId,
    },
    /// A generic method applied to method-level type arguments
    Instantiated {
        /// The uninstantiated generic method
        definition: MethodId,
        /// The method-level type arguments
        instantiation: Instantiation,
    },
}

/// An interned method.
pub struct MethodDesc {
    pub(crate) kind: MethodKind,
    pub(crate) owning_type: TypeId,
    pub(crate) name: Arc<str>,
    pub(crate) signature: MethodSignature,
    pub(crate) flags: MethodFlags,
    pub(crate) depth: u32,
    pub(crate) has_canon: bool,
    pub(crate) canonical: OnceLock<MethodId>,
}

impl MethodDesc {
    /// The shape of this method.
    #[must_use]
    pub fn kind(&self) -> &MethodKind {
        &self.kind
    }

    /// The type this method is declared on (or viewed through).
    #[must_use]
    pub fn owning_type(&self) -> TypeId {
        self.owning_type
    }

    /// The method name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The (possibly substituted) signature.
    #[must_use]
    pub fn signature(&self) -> &MethodSignature {
        &self.signature
    }

    /// Declared attributes.
    #[must_use]
    pub fn flags(&self) -> MethodFlags {
        self.flags
    }

    /// Deepest instantiation nesting over the owner and method arguments.
    #[must_use]
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Whether the owner or method arguments mention `System.__Canon`.
    #[must_use]
    pub fn has_canon(&self) -> bool {
        self.has_canon
    }

    /// Returns `true` for virtual methods.
    #[must_use]
    pub fn is_virtual(&self) -> bool {
        self.flags.contains(MethodFlags::VIRTUAL)
    }

    /// Returns `true` for abstract methods.
    #[must_use]
    pub fn is_abstract(&self) -> bool {
        self.flags.contains(MethodFlags::ABSTRACT)
    }

    /// Returns `true` for final methods.
    #[must_use]
    pub fn is_final(&self) -> bool {
        self.flags.contains(MethodFlags::FINAL)
    }

    /// Returns `true` for static methods.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.flags.contains(MethodFlags::STATIC)
    }

    /// Returns `true` if the method introduces a new vtable slot.
    #[must_use]
    pub fn is_new_slot(&self) -> bool {
        self.flags.contains(MethodFlags::NEW_SLOT)
    }

    /// Returns `true` for instance constructors.
    #[must_use]
    pub fn is_constructor(&self) -> bool {
        self.flags.contains(MethodFlags::CONSTRUCTOR)
    }

    /// Returns `true` for class constructors.
    #[must_use]
    pub fn is_class_constructor(&self) -> bool {
        self.flags.contains(MethodFlags::CLASS_CONSTRUCTOR)
    }

    /// Returns `true` if this is a generic method definition that has not been instantiated.
    #[must_use]
    pub fn is_generic_definition(&self) -> bool {
        self.signature.generic_arity > 0 && !matches!(self.kind, MethodKind::Instantiated { .. })
    }

    /// The method-level type arguments, empty unless this is an instantiated method.
    #[must_use]
    pub fn instantiation(&self) -> &[TypeId] {
        match &self.kind {
            MethodKind::Instantiated { instantiation, .. } => instantiation,
            _ => &[],
        }
    }
}

/// A field declared on a defined type.
#[derive(Debug, Clone)]
pub struct FieldDesc {
    /// The declaring type definition
    pub owning_type: TypeId,
    /// The field name
    pub name: String,
    /// The field type
    pub field_type: TypeId,
    /// Declared attributes
    pub flags: FieldFlags,
}

impl FieldDesc {
    /// Returns `true` for static fields.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.flags.contains(FieldFlags::STATIC)
    }
}
