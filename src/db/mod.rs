//! Database module for SQLite operations.
//!
//! This module provides:
//! - Database initialization and migrations
//! - SQLite pragma configuration
//! - The [`StateStore`] seam with SQLite and in-memory implementations

pub mod memory;
pub mod migrations;
pub mod repo;
pub mod store;

pub use memory::MemoryStore;
pub use migrations::init_db;
pub use repo::Repository;
pub use store::{StateStore, StoreError};
