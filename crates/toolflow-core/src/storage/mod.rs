//! Cache and lock ports, plus the in-process `MemoryCache` implementation.

pub mod cache;
pub mod memory;

pub use cache::{CacheStore, LockService};
pub use memory::MemoryCache;
