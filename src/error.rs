use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PackagingError {
    #[error("Missing input: {0}")]
    MissingInput(String),

    #[error("Ambiguous input: {count} files match '{pattern}' in {directory}, expected exactly one")]
    AmbiguousInput {
        pattern: String,
        directory: String,
        count: usize,
    },

    #[error("Channel '{channel}' has {timestamps} timestamps but {values} values")]
    LengthMismatch {
        channel: String,
        timestamps: usize,
        values: usize,
    },

    #[error("Frame index {index} out of range for stimulus data with {len} samples")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("No meaning or HED tag registered for event label '{0}'")]
    UnmappedEventLabel(String),

    #[error("Derived channel name '{0}' is produced by more than one column")]
    DuplicateChannel(String),

    #[error("Column '{column}' not found in {file}")]
    MissingColumn { file: String, column: String },

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    #[error("Invalid session metadata: {0}")]
    InvalidMetadata(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PackagingError>;
