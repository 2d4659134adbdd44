//! Storage traits and implementations
//!
//! This module defines the storage abstraction layer for score
//! entities. The trait-based design allows swapping between in-memory
//! and SQLite-backed storage implementations.

mod memory;
mod sqlite;
mod traits;

pub use memory::InMemoryScoreStore;
pub use sqlite::SqliteScoreStore;
pub use traits::ScoreStore;
