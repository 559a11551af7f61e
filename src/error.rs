use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use thiserror::Error;

/// Error types that can occur while configuring, reshaping or running a cell
///
/// # Variants
///
/// - `ConfigurationError` - A structural setting is invalid (hidden size, weight shape, dropout rate, initial state)
/// - `ShapeMismatch` - An input extent is inconsistent with the configured sizes
/// - `BackendUnsupported` - The numeric backend lacks a requested primitive; callers inside the crate recover from it
/// - `InputValidationError` - Input data or operator attributes do not meet the expected format
/// - `ProcessingError` - Something went wrong while processing (e.g. running before `reshape`)
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),
    #[error("Backend unsupported: {0}")]
    BackendUnsupported(String),
    #[error("Input validation error: {0}")]
    InputValidationError(String),
    #[error("Processing error: {0}")]
    ProcessingError(String),
}

/// Input/Output error types that can occur during cell serialization and file operations
///
/// # Variants
///
/// - `StdIoError` - Wraps standard I/O errors from file system operations
/// - `JsonError` - Wraps JSON serialization/deserialization errors
/// - `ModelError` - The loaded data was readable but describes an invalid cell
#[derive(Debug, Error)]
pub enum IoError {
    #[error("IO error: {0}")]
    StdIoError(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Model error: {0}")]
    ModelError(#[from] ModelError),
}

impl IoError {
    /// Opens a file for buffered reading.
    pub fn load_in_buf_reader<P: AsRef<Path>>(path: P) -> Result<BufReader<File>, IoError> {
        let file = File::open(path).map_err(IoError::StdIoError)?;
        Ok(BufReader::new(file))
    }
}
