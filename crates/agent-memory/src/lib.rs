//! Shared memory for money-agent
//!
//! Two kinds of durable notes survive between runs:
//!
//! - **Memory entries**: principles, patterns and cases that bias future
//!   reasoning. Entries are never deleted by the engine.
//! - **Stock notes**: per-stock context such as the latest price snapshot or
//!   a past analysis summary.
//!
//! Stores are shared by concurrent runs; each implementation serialises its
//! own writes.

pub mod brief;
pub mod entry;
pub mod error;
pub mod file;
pub mod store;

pub use brief::build_brief;
pub use entry::{Category, MemoryEntry, MemoryFilter, Provenance, StockNote};
pub use error::{MemoryError, Result};
pub use file::JsonFileMemoryStore;
pub use store::{InMemoryMemoryStore, MemoryStore};
