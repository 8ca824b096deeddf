//! Tool executor port.
//!
//! The engine has no knowledge of what a tool does: it hands a tool ID and a
//! JSON parameter object to a `ToolExecutor` and gets a JSON result or a
//! `ToolError` back.

pub mod box_executor;
pub mod executor;

pub use box_executor::BoxToolExecutor;
pub use executor::{ToolError, ToolExecutor};
