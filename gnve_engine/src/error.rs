//! Error types for the GNVE engine
//!
//! This module defines the error taxonomy used throughout the engine:
//! device errors, asset errors, configuration errors and resource errors.
//! Presentation staleness is NOT an error; it is reported through
//! [`crate::frame::AcquireOutcome`] and [`crate::frame::PresentOutcome`].

use std::fmt;

use crate::asset::ImportError;

/// Result type for GNVE engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// GNVE engine errors
#[derive(Debug, Clone)]
pub enum Error {
    /// Unrecoverable device-level failure (numeric backend result code)
    Device {
        /// What the engine was doing when the call failed
        context: String,
        /// Raw backend result code (e.g. `VkResult`)
        code: i32,
    },

    /// Fatal asset import failure
    Asset(ImportError),

    /// Invalid static configuration (capacity exceeded, no suitable GPU, missing feature)
    Configuration(String),

    /// Initialization failed (instance, surface, subsystems)
    InitializationFailed(String),

    /// Out of GPU memory
    OutOfMemory,

    /// Invalid resource or misuse of a resource (buffer, image, descriptor)
    InvalidResource(String),
}

impl Error {
    /// Whether the error belongs to the device class (always fatal)
    pub fn is_device_error(&self) -> bool {
        matches!(self, Error::Device { .. })
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Device { context, code } => {
                write!(f, "Device error while {} (code {})", context, code)
            }
            Error::Asset(err) => write!(f, "Asset error: {}", err),
            Error::Configuration(msg) => write!(f, "Configuration error: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            Error::OutOfMemory => write!(f, "Out of GPU memory"),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Asset(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ImportError> for Error {
    fn from(err: ImportError) -> Self {
        Error::Asset(err)
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
