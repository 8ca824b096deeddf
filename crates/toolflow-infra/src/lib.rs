//! Infrastructure layer for Toolflow.
//!
//! Implementations of the ports defined in `toolflow-core`: SQLite workflow and
//! execution repositories, a SQLite lock service, the HTTP tool executor, and
//! the `config.toml` loader.

pub mod config;
pub mod sqlite;
pub mod tool;
