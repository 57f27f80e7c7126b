use std::path::PathBuf;

use thiserror::Error;

/// Fatal problems with the shape of an input source.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SourceFormatError {
    #[error("{source_name} source is missing required column '{column}'")]
    MissingColumn { source_name: String, column: String },

    #[error("{source_name} source has no header row")]
    Empty { source_name: String },
}

#[derive(Error, Debug)]
pub enum SourceError {
    #[error(transparent)]
    Format(#[from] SourceFormatError),

    #[error("failed to read CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}
