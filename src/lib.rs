// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![deny(unsafe_code)]

//! # dotaot
//!
//! The analysis core of an ahead-of-time compiler for .NET programs.
//!
//! Given a set of roots, `dotaot` computes the closed world of types and methods a
//! program can reach, decides which virtual calls can be made direct, and hands every
//! reachable method body to a code generator. Output is deterministic: the same input
//! produces the same symbols in the same order regardless of thread count.
//!
//! ## Features
//!
//! - **🧬 Type system** - Interned types and methods, generic instantiation, canonical
//!   forms for shared generic code, virtual and interface method resolution
//! - **🕸️ Dependency analysis** - A generic fixed-point engine with conditional and
//!   dynamic dependencies, failure isolation and cancellation
//! - **🔍 IL scanning** - Whole-program reachability over method bodies
//! - **🎯 Devirtualization** - Metadata-only and scan-informed sealing queries
//! - **⚡ Parallel compilation** - Code generation for reachable methods on `rayon`
//!
//! ## Quick Start
//!
//! ```rust
//! use dotaot::prelude::*;
//!
//! let context = TypeSystemContext::new();
//! let shape = TypeBuilder::new(&context, "App", "Shape").abstract_type().build()?;
//! let area = MethodBuilder::new(&context, shape, "Area").abstract_method().build()?;
//! let circle = TypeBuilder::new(&context, "App", "Circle").extends(shape).build()?;
//! let circle_ctor = MethodBuilder::constructor(&context, circle).build()?;
//! let circle_area = MethodBuilder::new(&context, circle, "Area").override_method().build()?;
//! let program = TypeBuilder::new(&context, "App", "Program").build()?;
//! let main = MethodBuilder::new(&context, program, "Main").static_method().build()?;
//!
//! let bodies = InMemoryMethodBodyProvider::new();
//! bodies.insert(main, MethodBody::new(vec![
//!     Instruction::NewObj(circle_ctor.into()),
//!     Instruction::callvirt(area),
//!     Instruction::Ret,
//! ]));
//! bodies.insert(circle_ctor, MethodBody::new(vec![Instruction::Ret]));
//! bodies.insert(circle_area, MethodBody::new(vec![Instruction::Ret]));
//!
//! let roots = VecRootProvider::from(vec![CompilationRoot::method(main, "entry point")]);
//! let compilation = CompilationBuilder::new(&context)
//!     .method_bodies(&bodies)
//!     .roots(&roots)
//!     .build()?;
//!
//! let scan = compilation.scan()?;
//! assert!(scan.compiled_methods().contains(&circle_area));
//!
//! let results = compilation.compile(&scan)?;
//! assert_eq!(results.methods().len(), 3);
//! assert!(results.failures().is_empty());
//! # Ok::<(), dotaot::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`typesystem`] - Types, methods, fields and the queries over them
//! - [`il`] - The instruction model and the method-body seam
//! - [`dependency`] - The fixed-point dependency analyzer
//! - [`scanner`] - Compiler graph nodes and the scan pass
//! - [`devirtualization`] - Sealing and resolution queries for code generators
//! - [`compilation`] - The compile pass, code generation and output
//! - [`prelude`] - Convenient re-exports
//!
//! ## Logging
//!
//! Progress and decisions are reported through the [`log`](https://docs.rs/log) facade:
//! pass summaries at `info`, skipped roots and stubbed methods at `warn`, node expansion
//! detail at `debug` and `trace`. Install any logger, e.g. `env_logger`, to see them.
//!
//! ## Error Handling
//!
//! All operations return [`Result<T, Error>`](Result). Failures while expanding a single
//! node are recorded and isolated; fatal ones abort the run:
//!
//! ```rust,ignore
//! use dotaot::prelude::*;
//!
//! match compilation.run() {
//!     Ok(results) => println!("{} methods", results.methods().len()),
//!     Err(Error::RecursiveGenericTooDeep { entity, .. }) => eprintln!("{entity} does not converge"),
//!     Err(e) => eprintln!("error: {e}"),
//! }
//! ```

#[macro_use]
pub(crate) mod error;
pub(crate) mod utils;

/// Shared functionality which is used in unit-tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust
/// use dotaot::prelude::*;
///
/// let context = TypeSystemContext::new();
/// let ty = TypeBuilder::new(&context, "App", "Program").build()?;
/// assert_eq!(context.type_name(ty), "App.Program");
/// # Ok::<(), dotaot::Error>(())
/// ```
pub mod prelude;

pub mod compilation;
pub mod dependency;
pub mod devirtualization;
pub mod il;
pub mod scanner;
pub mod typesystem;

/// `dotaot` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `dotaot` Error type
///
/// The main error type for all operations in this crate.
pub use error::Error;
