//! Database module: pool setup and SQL repositories.
//!
//! - `repo`: SQL-only functions that map rows into `crate::model` entities.
//!
//! External modules should import from `certvault::db` — we re-export the
//! repository API for convenience.

pub mod repo;

pub use repo::*;
