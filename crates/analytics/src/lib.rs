//! Snapshot input: reads the orders, order items and customers tables a
//! report run works on, from JSON or CSV files or from memory.

pub mod decode;
pub mod loader;
pub mod source;

pub use loader::SnapshotLoader;
pub use source::{FileSnapshotSource, InMemorySource, SnapshotPaths, SnapshotSource};
