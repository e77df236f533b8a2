// meridian/core/state/src/lib.rs

// State access layer: the store seam, an in-memory store, and the
// per-execution write-set overlay
pub mod access;
pub mod keys;
pub mod store;
pub mod visitor;

pub use access::AccessSet;
pub use store::{MemoryStore, StateError, Store, WriteSet};
pub use visitor::{Snapshot, Visitor};
