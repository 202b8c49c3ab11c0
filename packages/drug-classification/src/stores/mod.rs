//! Cache store implementations.
//!
//! Available backends:
//! - `MemoryCacheStore` - In-memory storage (always available)
//! - `SqliteCacheStore` - SQLite storage (requires `sqlite` feature)

pub mod memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use memory::MemoryCacheStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteCacheStore;
