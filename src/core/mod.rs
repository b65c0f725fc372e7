//! Core engine modules
//!
//! Foundational pieces shared by the precompute and scheduling subsystems.

pub mod cancel;
pub mod worker_pool;

pub use cancel::CancelToken;
pub use worker_pool::WorkerPool;
