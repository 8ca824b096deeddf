//! Repository trait definitions (ports).
//!
//! These traits define the durable storage interface that the infrastructure
//! layer (toolflow-infra) implements. `memory` provides in-process
//! implementations for embedding and tests.

pub mod execution;
pub mod memory;
pub mod workflow;

pub use execution::ExecutionRepository;
pub use memory::{InMemoryExecutionRepository, InMemoryWorkflowRepository};
pub use workflow::WorkflowRepository;
