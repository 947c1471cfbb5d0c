//! # dotaot Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! from the dotaot library. Import this module to build a type system, describe method
//! bodies and run a compilation without spelling out individual module paths.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all dotaot operations
pub use crate::Error;

/// The result type used throughout dotaot
pub use crate::Result;

// ================================================================================================
// Type System
// ================================================================================================

/// The owning context and its handles
pub use crate::typesystem::{FieldId, MethodId, TypeId, TypeSystemContext};

/// Builders for defining types and methods
pub use crate::typesystem::{MethodBuilder, TypeBuilder};

/// Descriptors and flags of types, methods and fields
pub use crate::typesystem::{
    FieldDesc, FieldFlags, GenericParameterKind, MethodDesc, MethodFlags, MethodImplRecord,
    MethodSignature, TypeDesc, TypeFlags, TypeKind, WellKnownType,
};

// ================================================================================================
// Intermediate Language
// ================================================================================================

/// Instructions and the references they carry
pub use crate::il::{FieldRef, Instruction, MethodBody, MethodRef, TokenRef, TypeRef};

/// Sources of method bodies
pub use crate::il::{InMemoryMethodBodyProvider, MethodBodyProvider};

// ================================================================================================
// Dependency Analysis
// ================================================================================================

/// The generic fixed-point engine
pub use crate::dependency::{
    CancellationToken, DependencyAnalyzer, DependencyGraph, DependencyNode, EdgeLabel, Expansion,
};

// ================================================================================================
// Scanning
// ================================================================================================

/// Roots and where they come from
pub use crate::scanner::{CompilationRoot, RootKind, RootProvider, VecRootProvider};

/// The scan pass and its results
pub use crate::scanner::{Dispatch, IlScanner, ScanNode, ScanResults, SiteDecision};

// ================================================================================================
// Devirtualization
// ================================================================================================

/// Sealing and resolution queries
pub use crate::devirtualization::{
    DevirtualizationQuery, MetadataDevirtualizationManager, ScannedDevirtualizationManager,
};

// ================================================================================================
// Compilation
// ================================================================================================

/// Configuring and running a compilation
pub use crate::compilation::{
    Compilation, CompilationBuilder, CompilationOptions, CompilationResults,
};

/// Backend and output seams
pub use crate::compilation::{
    CodeGenerator, EmitFailure, InMemoryObjectWriter, ListingCodeGenerator, NativeCodeBlock,
    ObjectWriter,
};
