//! # Connections Module
//!
//! External collaborators of the core: the PostgreSQL bind store, the
//! OneBot broadcast sink, and an in-memory directory for tests and dry runs.

/// Module for the PostgreSQL group-bind store.
pub mod db_postgres;

/// Module for an in-memory subscriber directory.
pub mod memory;

/// Module for the OneBot HTTP broadcast sink.
pub mod onebot;

// --- Public API Re-exports ---
pub use db_postgres::{BindStore, DbError};
pub use memory::MemoryDirectory;
pub use onebot::OneBotSink;
