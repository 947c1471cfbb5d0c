//! Whole-program reachability over IL method bodies.
//!
//! The scanner drives the [`crate::dependency`] engine with [`ScanNode`]s. Method bodies
//! are imported lazily as their `MethodCode` nodes are expanded, and every instruction
//! that references a type, method or field becomes a dependency. Virtual methods are
//! modelled with conditional dependencies, so an override is only compiled when its type
//! is allocated *and* its slot is called somewhere.
//!
//! # Key Components
//!
//! - [`IlScanner`] / [`ScanResults`]: the scan pass and what it found
//! - [`ScanNode`]: the node kinds of the compiler graph
//! - [`NodeFactory`]: node normalization and the context of every expansion
//! - [`CompilationRoot`] / [`RootProvider`]: where reachability starts
//! - [`SiteDecision`]: per-instruction call and cast decisions
//!
//! # Examples
//!
//! ```rust
//! use dotaot::il::{InMemoryMethodBodyProvider, Instruction, MethodBody};
//! use dotaot::scanner::{CompilationRoot, IlScanner, ScanNode};
//! use dotaot::typesystem::{MethodBuilder, TypeBuilder, TypeSystemContext};
//!
//! let context = TypeSystemContext::new();
//! let shape = TypeBuilder::new(&context, "App", "Shape").build()?;
//! let area = MethodBuilder::new(&context, shape, "Area").virtual_method().build()?;
//! let ctor = MethodBuilder::constructor(&context, shape).build()?;
//! let program = TypeBuilder::new(&context, "App", "Program").build()?;
//! let main = MethodBuilder::new(&context, program, "Main").static_method().build()?;
//!
//! let bodies = InMemoryMethodBodyProvider::new();
//! bodies.insert(main, MethodBody::new(vec![
//!     Instruction::NewObj(ctor.into()),
//!     Instruction::callvirt(area),
//!     Instruction::Ret,
//! ]));
//! bodies.insert(ctor, MethodBody::new(vec![Instruction::Ret]));
//! bodies.insert(area, MethodBody::new(vec![Instruction::Ret]));
//!
//! let results = IlScanner::new(&context, &bodies)
//!     .scan(&[CompilationRoot::method(main, "entry point")])?;
//! assert!(results.is_marked(&ScanNode::ConstructedType(shape)));
//! assert!(results.compiled_methods().contains(&area));
//! # Ok::<(), dotaot::Error>(())
//! ```

mod factory;
mod importer;
mod nodes;
mod roots;
mod scan;

pub use factory::NodeFactory;
pub use importer::{Dispatch, SiteDecision};
pub use nodes::{MetadataTarget, ScanNode, ScanNodeKind};
pub use roots::{CompilationRoot, RootKind, RootProvider, VecRootProvider};
pub use scan::{IlScanner, ScanResults};

pub(crate) use scan::analyze;
