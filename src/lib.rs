//! Scheduling and statistical core of an interactive GPU path tracer.
//! Rust: wgpu 0.19. Progressive chunked accumulation, environment alias
//! tables, and Monte-Carlo energy-compensation LUTs with CPU and GPU delivery.
//! All GPU work is bounded submit-and-wait; no submission is ever large enough
//! to trip a driver watchdog.

pub mod compute;
pub mod core;
pub mod error;
pub mod gpu;
pub mod path_tracing;
pub mod pbr;
pub mod volume;

pub use error::{RenderError, RenderResult};
