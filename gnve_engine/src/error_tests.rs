//! Unit tests for error.rs
//!
//! Tests all Error variants and their implementations (Display, Debug, Clone, std::error::Error).

use crate::asset::ImportError;
use crate::error::{Error, Result};

// ============================================================================
// ERROR DISPLAY TESTS
// ============================================================================

#[test]
fn test_device_error_display_carries_numeric_code() {
    let err = Error::Device {
        context: "submitting frame".to_string(),
        code: -4,
    };
    let display = format!("{}", err);
    assert!(display.contains("Device error"));
    assert!(display.contains("submitting frame"));
    assert!(display.contains("-4"));
}

#[test]
fn test_out_of_memory_display() {
    let err = Error::OutOfMemory;
    assert_eq!(format!("{}", err), "Out of GPU memory");
}

#[test]
fn test_configuration_display() {
    let err = Error::Configuration("texture table full (1024 slots)".to_string());
    let display = format!("{}", err);
    assert!(display.contains("Configuration error"));
    assert!(display.contains("1024 slots"));
}

#[test]
fn test_initialization_failed_display() {
    let err = Error::InitializationFailed("Window creation failed".to_string());
    let display = format!("{}", err);
    assert!(display.contains("Initialization failed"));
    assert!(display.contains("Window creation failed"));
}

#[test]
fn test_asset_error_display_wraps_import_error() {
    let err: Error = ImportError::MissingAccessor {
        mesh: "Cube".to_string(),
        attribute: "POSITION".to_string(),
    }
    .into();
    let display = format!("{}", err);
    assert!(display.starts_with("Asset error"));
    assert!(display.contains("POSITION"));
    assert!(display.contains("Cube"));
}

// ============================================================================
// ERROR TRAIT IMPLEMENTATIONS
// ============================================================================

#[test]
fn test_error_is_std_error() {
    let err = Error::OutOfMemory;
    let _: &dyn std::error::Error = &err;
}

#[test]
fn test_asset_error_exposes_source() {
    use std::error::Error as _;
    let err = Error::Asset(ImportError::FileNotFound("scene.glb".into()));
    assert!(err.source().is_some());
    assert!(Error::OutOfMemory.source().is_none());
}

#[test]
fn test_is_device_error() {
    assert!(Error::Device { context: "x".into(), code: -3 }.is_device_error());
    assert!(!Error::Configuration("x".into()).is_device_error());
}

#[test]
fn test_error_clone() {
    let err1 = Error::InvalidResource("buffer".to_string());
    let err2 = err1.clone();
    assert_eq!(format!("{}", err1), format!("{}", err2));
}

// ============================================================================
// RESULT TYPE TESTS
// ============================================================================

#[test]
fn test_result_question_mark_propagation() {
    fn inner() -> Result<u32> {
        Err(Error::OutOfMemory)
    }
    fn outer() -> Result<u32> {
        let value = inner()?;
        Ok(value + 1)
    }
    assert!(matches!(outer(), Err(Error::OutOfMemory)));
}

#[test]
fn test_import_error_question_mark_conversion() {
    fn load() -> Result<()> {
        Err(ImportError::MalformedDocument("bad json".to_string()))?;
        Ok(())
    }
    assert!(matches!(load(), Err(Error::Asset(ImportError::MalformedDocument(_)))));
}
