use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PaylensError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Required column '{column}' not found in {}", .path.display())]
    MissingColumn { column: String, path: PathBuf },

    #[error("Could not decode {} as {encoding}", .path.display())]
    Decode { encoding: String, path: PathBuf },

    #[error("Unknown encoding: {0} (expected utf-8 or latin-1)")]
    UnknownEncoding(String),

    #[error("Unknown interval: {0} (expected 10m, 15m, 30m, 1h or 2h)")]
    UnknownInterval(String),

    #[error("Unknown weekday: {0}")]
    UnknownWeekday(String),

    #[error("Invalid date: {0} (expected YYYY-MM-DD)")]
    InvalidDate(String),

    #[error("Invalid range: {0}")]
    InvalidRange(String),

    #[error("Settings error: {0}")]
    Settings(String),
}

pub type Result<T> = std::result::Result<T, PaylensError>;
