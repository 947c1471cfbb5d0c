//! Small data structures and formatting helpers shared across the crate.

mod bitset;
mod dot;

pub(crate) use bitset::BitSet;
pub(crate) use dot::escape_dot;
