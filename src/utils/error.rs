use thiserror::Error;

#[derive(Error, Debug)]
pub enum ForgeError {
    #[error("Empty dataset: at least one record is required")]
    EmptyDataset,

    #[error("Unsupported input format: {0}")]
    UnsupportedFormat(String),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },
}

pub type Result<T> = std::result::Result<T, ForgeError>;
