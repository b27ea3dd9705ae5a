use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("'{path}' is not a valid file or directory")]
    InvalidInput { path: String },

    #[error("'{pattern}' is not a valid regular expression")]
    InvalidPattern { pattern: String },

    #[error("Snapshot at {path} is corrupt")]
    CorruptSnapshot { path: String },

    #[error("No pending data found for backup '{name}'")]
    NoPendingData { name: String },

    #[error("Unable to derive a destination mapping: {0}")]
    AmbiguousRoot(String),

    #[error("Task '{task}' failed: {message}")]
    IoTask { task: String, message: String },

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
