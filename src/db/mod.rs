//! SQLite event journal.
//!
//! This module provides:
//! - Connection setup and the events table with its indexes
//! - Repository for appending and querying committed protocol events

pub mod repo;
pub mod schema;

pub use repo::Repository;
