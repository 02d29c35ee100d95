use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EdfError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Malformed header: {0}")]
    MalformedHeader(String),

    #[error("EDF+ file has no 'EDF Annotations' signal")]
    MissingAnnotationSignal,

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// Recoverable: only affects one record's annotation span.
    #[error("Malformed annotation: {0}")]
    MalformedAnnotation(String),

    #[error("Data record {0} out of range")]
    InvalidRecordIndex(u64),

    #[error("Export failed: {0}")]
    Export(String),
}

pub type Result<T> = std::result::Result<T, EdfError>;
