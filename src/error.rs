use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LblmError {
    // --- I/O ---
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write file {path}: {source}")]
    FileWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    // --- Data ---
    #[error("Dataset empty: {path}")]
    DatasetEmpty { path: PathBuf },

    #[error("Vocabulary load failed: {0}")]
    VocabLoad(String),

    // --- Canvas / objective invariants ---
    #[error("Blank run of length {run} exceeds max_len {max_len}")]
    BlankRunTooLong { run: usize, max_len: usize },

    #[error("Row {row} has no pending blank to fill")]
    NoPendingBlank { row: usize },

    #[error("Sequence lengths differ within batch: expected {expected}, got {got} at row {row}")]
    LengthMismatch {
        expected: usize,
        got: usize,
        row: usize,
    },

    #[error("Shape mismatch: expected {expected}, got {got}")]
    ShapeMismatch { expected: String, got: String },

    #[error("Row {row}: position {position} is not a pending target of the canvas")]
    TargetNotFound { row: usize, position: usize },

    #[error("Cannot split {m} into {k} positive parts")]
    InvalidSplit { m: usize, k: usize },

    // --- Model ---
    #[error("Checkpoint load failed: {0}")]
    CheckpointLoad(String),

    // --- Config ---
    #[error("Invalid config: {0}")]
    ConfigError(String),
}

pub type Result<T> = std::result::Result<T, LblmError>;
