//! Repository implementations module.
//!
//! This module contains the implementations of the repository traits:
//! - `local`: In-memory implementation for unit testing and local development
//! - `sqlite`: SQLite implementation with sqlx (feature `sqlite-repo`)
pub mod local;
#[cfg(feature = "sqlite-repo")]
pub mod sqlite;

pub use local::LocalRepository;
#[cfg(feature = "sqlite-repo")]
pub use sqlite::{SqliteConfig, SqliteRepository};
