// carddock Infrastructure - SQLite Adapter
// Implements: ContactStore

mod connection;
mod contact_store;
mod migration;

pub use connection::create_pool;
pub use contact_store::SqliteContactStore;
pub use migration::run_migrations;

// Note: sqlx::Error conversion is handled by helper functions
// due to Rust's orphan rules (cannot implement From<sqlx::Error> for StoreError here)
