//! Generic dependency analysis over self-expanding nodes.
//!
//! The engine knows nothing about types or methods. A node type implements
//! [`DependencyNode`] and reports, when expanded, which other nodes it needs. Three
//! kinds of edges are supported:
//!
//! - **static**: the target is needed as soon as the source is
//! - **conditional**: the target is needed once both the source and a condition node are
//!   marked, which is how "compile this override if the type is allocated *and* the slot is
//!   called" is expressed
//! - **dynamic**: the source inspects nodes marked later and may add edges for them
//!
//! [`DependencyAnalyzer`] runs the analysis to a fixed point and produces a
//! [`DependencyGraph`] recording, for every marked node, why it was marked first.
//! Expansion errors are attributed to the failing node as a [`NodeFailure`]; whether a
//! failure is fatal is decided by the caller.

mod analyzer;
mod cancellation;
mod graph;
mod node;

pub use analyzer::DependencyAnalyzer;
pub use cancellation::CancellationToken;
pub use graph::{AnalyzerStats, DependencyGraph, MarkReason, NodeFailure, NodeId};
pub use node::{ConditionalDependency, DependencyEdge, DependencyNode, EdgeLabel, Expansion};
