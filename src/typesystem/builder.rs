//! Fluent builders for declaring types and methods.
//!
//! The metadata reader (and tests) describe the closed world through these builders
//! rather than calling the raw [`TypeSystemContext`] definition methods.
//!
//! # Example
//!
//! ```rust
//! use dotaot::typesystem::{MethodBuilder, TypeBuilder, TypeSystemContext};
//!
//! let context = TypeSystemContext::new();
//! let base = TypeBuilder::new(&context, "App", "Base").build()?;
//! let virt = MethodBuilder::new(&context, base, "Virtual")
//!     .virtual_method()
//!     .build()?;
//! let derived = TypeBuilder::new(&context, "App", "Derived")
//!     .extends(base)
//!     .build()?;
//! let over = MethodBuilder::new(&context, derived, "Virtual")
//!     .override_method()
//!     .build()?;
//! assert_eq!(context.resolve_virtual_method(virt, derived)?, over);
//! # Ok::<(), dotaot::Error>(())
//! ```

use crate::{
    typesystem::{
        MethodFlags, MethodId, MethodSignature, TypeFlags, TypeId, TypeSystemContext,
        WellKnownType,
    },
    Result,
};

/// Provides a fluent API for declaring a type
pub struct TypeBuilder<'a> {
    context: &'a TypeSystemContext,
    namespace: String,
    name: String,
    flags: TypeFlags,
    generic_arity: u32,
    base: Option<Option<TypeId>>,
    interfaces: Vec<TypeId>,
}

impl<'a> TypeBuilder<'a> {
    /// Starts declaring a class `namespace.name` deriving from `System.Object`.
    #[must_use]
    pub fn new(context: &'a TypeSystemContext, namespace: &str, name: &str) -> Self {
        TypeBuilder {
            context,
            namespace: namespace.to_string(),
            name: name.to_string(),
            flags: TypeFlags::empty(),
            generic_arity: 0,
            base: None,
            interfaces: Vec::new(),
        }
    }

    /// Declares an interface (no base type).
    #[must_use]
    pub fn interface(mut self) -> Self {
        self.flags |= TypeFlags::INTERFACE | TypeFlags::ABSTRACT;
        self.base = Some(None);
        self
    }

    /// Declares a value type deriving from `System.ValueType`. Value types are sealed.
    #[must_use]
    pub fn value_type(mut self) -> Self {
        self.flags |= TypeFlags::VALUE_TYPE | TypeFlags::SEALED;
        self
    }

    /// Marks the type abstract.
    #[must_use]
    pub fn abstract_type(mut self) -> Self {
        self.flags |= TypeFlags::ABSTRACT;
        self
    }

    /// Marks the type sealed.
    #[must_use]
    pub fn sealed(mut self) -> Self {
        self.flags |= TypeFlags::SEALED;
        self
    }

    /// Declares `arity` type-level generic parameters.
    #[must_use]
    pub fn generic(mut self, arity: u32) -> Self {
        self.generic_arity = arity;
        self
    }

    /// Sets the base type, which may be expressed over this type's generic parameters.
    #[must_use]
    pub fn extends(mut self, base: TypeId) -> Self {
        self.base = Some(Some(base));
        self
    }

    /// Adds a directly implemented interface.
    #[must_use]
    pub fn implements(mut self, interface: TypeId) -> Self {
        self.interfaces.push(interface);
        self
    }

    /// Declares the type in the context.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::TypeError`] if the full name is already taken.
    pub fn build(self) -> Result<TypeId> {
        let base = self.base.unwrap_or_else(|| {
            Some(if self.flags.contains(TypeFlags::VALUE_TYPE) {
                self.context.well_known_type(WellKnownType::ValueType)
            } else {
                self.context.object_type()
            })
        });

        let ty = self.context.define_type(
            &self.namespace,
            &self.name,
            self.flags,
            self.generic_arity,
        )?;
        self.context.set_base_type(ty, base)?;
        self.context.set_interfaces(ty, self.interfaces)?;
        Ok(ty)
    }
}

/// Provides a fluent API for declaring a method
pub struct MethodBuilder<'a> {
    context: &'a TypeSystemContext,
    owner: TypeId,
    name: String,
    flags: MethodFlags,
    return_type: TypeId,
    parameters: Vec<TypeId>,
    generic_arity: u32,
}

impl<'a> MethodBuilder<'a> {
    /// Starts declaring an instance method returning `System.Void`.
    #[must_use]
    pub fn new(context: &'a TypeSystemContext, owner: TypeId, name: &str) -> Self {
        MethodBuilder {
            context,
            owner,
            name: name.to_string(),
            flags: MethodFlags::empty(),
            return_type: context.void_type(),
            parameters: Vec::new(),
            generic_arity: 0,
        }
    }

    /// Starts declaring an instance constructor (`.ctor`).
    #[must_use]
    pub fn constructor(context: &'a TypeSystemContext, owner: TypeId) -> Self {
        Self::new(context, owner, ".ctor").with_flags(MethodFlags::CONSTRUCTOR)
    }

    /// Starts declaring a class constructor (`.cctor`).
    #[must_use]
    pub fn class_constructor(context: &'a TypeSystemContext, owner: TypeId) -> Self {
        Self::new(context, owner, ".cctor")
            .with_flags(MethodFlags::CLASS_CONSTRUCTOR | MethodFlags::STATIC)
    }

    /// Introduces a new virtual slot.
    #[must_use]
    pub fn virtual_method(self) -> Self {
        self.with_flags(MethodFlags::VIRTUAL | MethodFlags::NEW_SLOT)
    }

    /// Introduces a new abstract virtual slot.
    #[must_use]
    pub fn abstract_method(self) -> Self {
        self.with_flags(MethodFlags::VIRTUAL | MethodFlags::NEW_SLOT | MethodFlags::ABSTRACT)
    }

    /// Overrides a base slot with matching name and signature.
    #[must_use]
    pub fn override_method(self) -> Self {
        self.with_flags(MethodFlags::VIRTUAL)
    }

    /// Marks the method final.
    #[must_use]
    pub fn final_method(self) -> Self {
        self.with_flags(MethodFlags::FINAL)
    }

    /// Marks the method static.
    #[must_use]
    pub fn static_method(self) -> Self {
        self.with_flags(MethodFlags::STATIC)
    }

    /// Adds arbitrary flags.
    #[must_use]
    pub fn with_flags(mut self, flags: MethodFlags) -> Self {
        self.flags |= flags;
        self
    }

    /// Sets the return type.
    #[must_use]
    pub fn returns(mut self, return_type: TypeId) -> Self {
        self.return_type = return_type;
        self
    }

    /// Appends a parameter.
    #[must_use]
    pub fn param(mut self, parameter: TypeId) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Declares `arity` method-level generic parameters.
    #[must_use]
    pub fn generic(mut self, arity: u32) -> Self {
        self.generic_arity = arity;
        self
    }

    /// Declares the method on its owner.
    ///
    /// # Errors
    ///
    /// See [`TypeSystemContext::add_method`].
    pub fn build(self) -> Result<MethodId> {
        let signature = MethodSignature::new(self.return_type, self.parameters)
            .with_generic_arity(self.generic_arity);
        self.context
            .add_method(self.owner, &self.name, signature, self.flags)
    }
}
