//! Interned model of the .NET type system for whole-program analysis.
//!
//! This module gives every type, method and field of the closed world a canonical,
//! hashable identity. Entities are owned by a [`TypeSystemContext`] and referenced
//! through copyable handles ([`TypeId`], [`MethodId`], [`FieldId`]); structurally
//! equal entities always have the same handle, so handles can be compared directly
//! and used as keys in the dependency graph.
//!
//! # Key Components
//!
//! - [`TypeSystemContext`]: arena owner and interning factories
//! - [`TypeKind`] / [`MethodKind`]: closed variants of types and methods
//! - [`TypeBuilder`] / [`MethodBuilder`]: fluent declaration of the closed world
//! - [`MethodImplRecord`]: explicit overrides, computed lazily per type
//!
//! # Type System Features
//!
//! - **Interning**: instantiated, array, pointer and byref types, methods on
//!   instantiated types and instantiated methods are unique per shape
//! - **Shared generics**: canonical forms over `System.__Canon`
//! - **Virtual resolution**: slot lookup, class overrides, interface dispatch
//! - **Substitution**: closing signatures and bodies over generic arguments
//!
//! # Examples
//!
//! ```rust
//! use dotaot::typesystem::{TypeBuilder, TypeSystemContext, WellKnownType};
//!
//! let context = TypeSystemContext::new();
//! let list = TypeBuilder::new(&context, "System.Collections.Generic", "List`1")
//!     .generic(1)
//!     .build()?;
//! let string = context.well_known_type(WellKnownType::String);
//! let int32 = context.well_known_type(WellKnownType::Int32);
//!
//! let list_string = context.get_instantiated_type(list, &[string])?;
//! let list_object = context.get_instantiated_type(list, &[context.object_type()])?;
//! let list_int = context.get_instantiated_type(list, &[int32])?;
//!
//! // Same shape, same handle
//! assert_eq!(list_string, context.get_instantiated_type(list, &[string])?);
//! // Reference instantiations share code, value instantiations do not
//! assert_eq!(
//!     context.convert_to_canon_form(list_string),
//!     context.convert_to_canon_form(list_object)
//! );
//! assert_eq!(context.convert_to_canon_form(list_int), list_int);
//! # Ok::<(), dotaot::Error>(())
//! ```

mod builder;
mod canonical;
mod casting;
mod context;
mod handles;
mod instantiation;
mod method_impl;
mod methods;
mod queries;
mod resolution;
mod types;

pub use builder::{MethodBuilder, TypeBuilder};
pub use context::TypeSystemContext;
pub use handles::{FieldId, MethodId, TypeId};
pub use method_impl::MethodImplRecord;
pub use methods::{FieldDesc, FieldFlags, MethodDesc, MethodFlags, MethodKind, MethodSignature};
pub use types::{
    DefinedType, GenericParameterKind, Instantiation, TypeDesc, TypeFlags, TypeKind,
    WellKnownType,
};
