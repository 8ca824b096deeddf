//! Workflow engine core.
//!
//! - `definition` -- YAML/JSON parsing, validation, registration metadata
//! - `interpolate` -- `${context.*}` / `${steps.*}` parameter templates
//! - `registry` -- versioned, cached workflow storage
//! - `retry` -- per-step retry/backoff/timeout loop
//! - `circuit` -- per-workflow circuit breaker
//! - `dag` -- dependency tracking, cycle reports, critical path
//! - `scheduler` -- bounded-concurrency DAG scheduler
//! - `state` -- cached execution state store and run locks
//! - `orchestrator` -- the public entry point wiring it all together

pub mod circuit;
pub mod dag;
pub mod definition;
pub mod error;
pub mod interpolate;
pub mod orchestrator;
pub mod registry;
pub mod retry;
pub mod scheduler;
pub mod state;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::{DefinitionError, OrchestrationError, ValidationErrors};
pub use orchestrator::{ExecuteOptions, ExecutionOutcome, Orchestrator, RegistrationOutcome};
pub use registry::RegisterOptions;
