//! Method body model consumed by the scanner and the compiler.
//!
//! Reading and decoding CIL is the job of the metadata reader; this module only defines
//! the shape the analysis works on. A [`MethodBody`] is a list of [`Instruction`]s whose
//! operands are [`EntityRef`]s: either a handle into the
//! [`crate::typesystem::TypeSystemContext`] or the name of a symbol the reader failed to
//! resolve. Bodies are supplied on demand by a [`MethodBodyProvider`].
//!
//! # Examples
//!
//! ```rust
//! use dotaot::il::{InMemoryMethodBodyProvider, Instruction, MethodBody, MethodBodyProvider};
//! use dotaot::typesystem::{MethodBuilder, TypeBuilder, TypeSystemContext};
//!
//! let context = TypeSystemContext::new();
//! let program = TypeBuilder::new(&context, "App", "Program").build()?;
//! let main = MethodBuilder::new(&context, program, "Main").static_method().build()?;
//!
//! let bodies = InMemoryMethodBodyProvider::new();
//! bodies.insert(main, MethodBody::new(vec![Instruction::Ret]));
//! assert!(bodies.method_body(&context, main).is_some());
//! # Ok::<(), dotaot::Error>(())
//! ```

mod instruction;
mod provider;

pub use instruction::{
    EntityRef, FieldRef, Instruction, MethodBody, MethodRef, TokenRef, TypeRef,
};
pub use provider::{InMemoryMethodBodyProvider, MethodBodyProvider};
