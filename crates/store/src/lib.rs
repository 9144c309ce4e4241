//! SQLite-backed durable message log and CRM directory access.

mod directory;
mod sqlite;

pub use {directory::SqliteDirectory, sqlite::SqliteMessageStore};
