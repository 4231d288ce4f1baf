//! Error types for the printer library

use thiserror::Error;

/// Errors raised while decoding a captured command stream
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// A command header ends before its fixed-size parameters
    #[error("truncated {command} header at offset {offset}")]
    TruncatedHeader {
        command: &'static str,
        offset: usize,
    },

    /// Raster payload declared by the header runs past the end of the buffer
    #[error("raster image {width}x{height} at offset {offset} needs {needed} bytes, {available} available")]
    ImageOverrun {
        offset: usize,
        width: u32,
        height: u32,
        needed: usize,
        available: usize,
    },
}

/// Result type for decoding
pub type DecodeResult<T> = Result<T, DecodeError>;

/// Network client error types
#[derive(Debug, Error)]
pub enum PrintError {
    /// Network connection error
    #[error("Connection failed: {0}")]
    Connection(String),

    /// IO error during printing
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Timeout waiting for printer
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Invalid printer configuration
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

/// Result type for printer operations
pub type PrintResult<T> = Result<T, PrintError>;
