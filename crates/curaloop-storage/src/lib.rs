//! Curaloop Storage crate - session and chatbot persistence.
//!
//! Provides the [`SessionStore`] and [`ChatbotStore`] traits with two
//! backends: a process-local [`MemoryStore`] and a WAL-mode SQLite
//! [`SqliteStore`] with migrations.

pub mod db;
pub mod memory;
pub mod migrations;
pub mod sqlite;
pub mod store;

pub use db::Database;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use store::{ChatbotStore, SessionStore, Store};
