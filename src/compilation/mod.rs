//! Turning a scanned program into compiled output.
//!
//! A compilation runs in two passes. The scan (see [`crate::scanner`]) finds everything
//! reachable from the roots using only declared metadata for devirtualization. The
//! compile pass then rebuilds the graph from the same roots with a
//! [`crate::devirtualization::ScannedDevirtualizationManager`] built from the scan, so
//! calls on types without constructed subtypes become direct. It never reaches more
//! code than the scan did; with [`CompilationOptions::verify_scan`] set, doing so is an
//! [`crate::Error::ScannerMismatch`].
//!
//! Code generation for the marked methods runs in parallel through a [`CodeGenerator`].
//! Methods that fail are replaced by trap stubs unless they are required roots.
//! Results are sorted by symbol, so output is identical across runs and thread counts.
//!
//! # Key Components
//!
//! - [`CompilationBuilder`] / [`Compilation`]: configuration and the two passes
//! - [`CompilationResults`]: compiled methods, failures, site decisions and metadata
//! - [`CodeGenerator`]: the backend seam, with [`ListingCodeGenerator`] as default
//! - [`ObjectWriter`]: the output seam
//! - [`NameMangler`]: deterministic symbol names

mod builder;
mod codegen;
mod compiler;
mod mangling;
mod options;
mod writer;

pub use builder::{Compilation, CompilationBuilder};
pub use codegen::{
    CodeGenerator, EmitFailure, ListingCodeGenerator, NativeCodeBlock, Relocation, TRAP_STUB,
};
pub use compiler::{CompilationResults, CompiledMethod, MethodFailure};
pub use mangling::NameMangler;
pub use options::{CompilationOptions, DEFAULT_MAX_GENERIC_DEPTH};
pub use writer::{InMemoryObjectWriter, ObjectSymbol, ObjectWriter, SymbolKind};
