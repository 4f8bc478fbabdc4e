//! Persistence layer for governance snapshots.

pub mod libsql_backend;
pub mod memory;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlStateStore;
pub use memory::InMemoryStateStore;
pub use traits::StateStore;
