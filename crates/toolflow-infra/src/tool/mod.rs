//! Tool executor adapters.

pub mod http;

pub use http::HttpToolExecutor;
