use polars::prelude::PolarsError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error reading config file {path}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to parse JSON configuration in {path}: {source}")]
    JsonParseError {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Configuration file not found at {path}")]
    NotFound { path: PathBuf },
    #[error("Invalid parameter grid: {0}")]
    InvalidGrid(String),
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("DataFrame operation failed: {0}")]
    Polars(#[from] PolarsError),
    #[error("Required column '{column}' not found in {table}")]
    MissingColumn { column: String, table: String },
    #[error("Null value in required column '{column}' at row {row}")]
    NullValue { column: String, row: usize },
    #[error("Timestamp parsing error in column '{column}' at row {row} for value '{value}'")]
    TimestampParse {
        column: String,
        row: usize,
        value: String,
    },
    #[error("Empty dataset: {0}")]
    EmptyDataset(String),
    #[error("Training record at row {row} has no target value")]
    MissingTarget { row: usize },
    #[error("Feature matrix shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
    #[error("Failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("Failed to serialize run report: {0}")]
    Report(#[from] serde_json::Error),
}

impl PipelineError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        PipelineError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
