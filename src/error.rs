//! Central error handling for the ember3d core.
//!
//! Provides a unified RenderError enum with consistent categorization across
//! device work, precompute orchestration, and lookup-table IO.

use std::path::PathBuf;

/// Centralized error type for all core operations
#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    #[error("Device error: {0}")]
    Device(String),

    #[error("Upload error: {0}")]
    Upload(String),

    #[error("Render error: {0}")]
    Render(String),

    #[error("Readback error: {0}")]
    Readback(String),

    #[error("Worker pool error: {0}")]
    Pool(String),

    #[error("Lookup table error: {0}")]
    Table(String),

    #[error("Lookup table not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Volume grid missing: {0}")]
    GridMissing(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RenderError {
    /// Convenience constructors for common error types
    pub fn device<T: ToString>(msg: T) -> Self {
        RenderError::Device(msg.to_string())
    }

    pub fn upload<T: ToString>(msg: T) -> Self {
        RenderError::Upload(msg.to_string())
    }

    pub fn render<T: ToString>(msg: T) -> Self {
        RenderError::Render(msg.to_string())
    }

    pub fn readback<T: ToString>(msg: T) -> Self {
        RenderError::Readback(msg.to_string())
    }

    pub fn pool<T: ToString>(msg: T) -> Self {
        RenderError::Pool(msg.to_string())
    }

    pub fn table<T: ToString>(msg: T) -> Self {
        RenderError::Table(msg.to_string())
    }
}

/// Result type alias for core operations
pub type RenderResult<T> = Result<T, RenderError>;
