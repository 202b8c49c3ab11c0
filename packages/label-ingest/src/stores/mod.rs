//! Document store implementations.
//!
//! Available backends:
//! - `MemoryDocumentStore` - In-memory storage (always available)
//! - `SqliteDocumentStore` - SQLite storage (requires `sqlite` feature)

pub mod memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use memory::MemoryDocumentStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDocumentStore;
