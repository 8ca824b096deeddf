//! Shared domain types for Toolflow.
//!
//! Workflow definitions, execution records, circuit breaker snapshots, engine
//! configuration, and the repository error type shared by every crate.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, semver, thiserror.

pub mod circuit;
pub mod config;
pub mod error;
pub mod execution;
pub mod workflow;
