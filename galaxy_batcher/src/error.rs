//! Error types for the Galaxy batcher
//!
//! Only resource exhaustion and device failures are reported as values.
//! Contract violations (bad topology/index counts, cursor overruns, stale
//! arena spans) are programmer errors and panic instead.

use std::fmt;

/// Result type for batcher operations
pub type Result<T> = std::result::Result<T, Error>;

/// Batcher errors
#[derive(Debug, Clone)]
pub enum Error {
    /// Backend-specific error reported by the render device
    BackendError(String),

    /// Out of GPU or arena memory
    OutOfMemory,

    /// Invalid resource (buffer too large, unknown constant, etc.)
    InvalidResource(String),

    /// Initialization failed (device, queue, subsystems)
    InitializationFailed(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::OutOfMemory => write!(f, "Out of GPU memory"),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
