//! Orchestration core and port definitions for Toolflow.
//!
//! This crate defines the "ports" (tool executor, cache, lock, and repository
//! traits) that the infrastructure layer implements, plus the engine that
//! drives workflows through them. It depends only on `toolflow-types` --
//! never on `toolflow-infra` or any database/IO crate.

pub mod repository;
pub mod storage;
pub mod tool;
pub mod workflow;
