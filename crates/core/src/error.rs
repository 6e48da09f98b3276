//! Error types for document conversion.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the docmorph library.
#[derive(Error, Debug)]
pub enum ConversionError {
    /// LibreOffice is not installed or not found in PATH.
    #[error("LibreOffice not found. Please install LibreOffice and ensure 'soffice' is in PATH")]
    LibreOfficeNotFound,

    /// pandoc is not installed or not found in PATH.
    #[error("pandoc not found. Please install pandoc and ensure it is in PATH")]
    PandocNotFound,

    /// A converter process failed to start.
    #[error("Failed to start converter process: {0}")]
    ProcessStartFailed(#[source] std::io::Error),

    /// A backend ran but did not produce the requested output.
    #[error("Conversion failed for '{path}': {message}")]
    ConversionFailed { path: PathBuf, message: String },

    /// A converter process timed out.
    #[error("Conversion timed out after {timeout_secs} seconds for '{path}'")]
    Timeout { path: PathBuf, timeout_secs: u64 },

    /// Input file or directory not found.
    #[error("Input not found: {0}")]
    InputNotFound(PathBuf),

    /// The extension or format name is not one we know about.
    #[error("Unknown document format: '{0}'")]
    UnknownFormat(String),

    /// The format pair is absent from the support matrix.
    #[error("Unsupported conversion from {from} to {to}")]
    UnsupportedConversion { from: String, to: String },

    /// Spreadsheet reading or CSV writing failed.
    #[error("Spreadsheet error: {0}")]
    SpreadsheetError(String),

    /// Pdfium library error.
    #[error("Pdfium error: {0}")]
    PdfiumError(String),

    /// Output directory creation or output write failed.
    #[error("Failed to write output '{path}': {message}")]
    OutputDirError { path: PathBuf, message: String },

    /// Pool shutdown.
    #[error("LibreOffice pool has been shut down")]
    PoolShutdown,

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Channel communication error.
    #[error("Internal channel error: {0}")]
    ChannelError(String),

    /// Generic I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConversionError {
    /// True for the "format pair not in the matrix" condition.
    pub fn is_unsupported(&self) -> bool {
        matches!(
            self,
            ConversionError::UnsupportedConversion { .. } | ConversionError::UnknownFormat(_)
        )
    }

    /// True when the failure is an absent external tool rather than a bad input.
    pub fn is_missing_backend(&self) -> bool {
        matches!(
            self,
            ConversionError::LibreOfficeNotFound
                | ConversionError::PandocNotFound
                | ConversionError::PdfiumError(_)
        )
    }
}

/// Result type alias for convenience.
pub type Result<T> = std::result::Result<T, ConversionError>;

impl From<async_channel::RecvError> for ConversionError {
    fn from(_: async_channel::RecvError) -> Self {
        ConversionError::ChannelError("Channel closed".to_string())
    }
}

impl<T> From<async_channel::SendError<T>> for ConversionError {
    fn from(_: async_channel::SendError<T>) -> Self {
        ConversionError::ChannelError("Channel closed".to_string())
    }
}

impl From<calamine::Error> for ConversionError {
    fn from(err: calamine::Error) -> Self {
        ConversionError::SpreadsheetError(err.to_string())
    }
}

impl From<calamine::XlsxError> for ConversionError {
    fn from(err: calamine::XlsxError) -> Self {
        ConversionError::SpreadsheetError(err.to_string())
    }
}

impl From<csv::Error> for ConversionError {
    fn from(err: csv::Error) -> Self {
        ConversionError::SpreadsheetError(err.to_string())
    }
}
