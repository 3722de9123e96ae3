//! Error type for fitting, transforming and persisting models.

use thiserror::Error;

use crate::Pollutant;

pub type Result<T> = std::result::Result<T, ModelError>;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Computation error: {0}")]
    ComputationError(String),

    #[error("Not enough rows for {target}: {rows} available, {required} required")]
    InsufficientRows {
        target: Pollutant,
        rows: usize,
        required: usize,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}
