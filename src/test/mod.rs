//! Shared fixtures for unit tests.

mod world;

pub use world::TestWorld;
