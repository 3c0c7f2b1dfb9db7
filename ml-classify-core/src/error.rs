//! Error types for classification pipelines

use std::io;
use thiserror::Error;

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for pipeline operations
#[derive(Error, Debug)]
pub enum Error {
    /// IO error during file operations
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Invalid configuration detected eagerly at construction time
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Row or column shape violates the declared schema
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// Column value has a different type than the schema declares
    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    /// A stage's required input column is absent, detected at fit time
    #[error("Stage '{stage}' requires input column '{column}' which is not present")]
    PipelineSchema {
        /// Name of the stage whose input is missing
        stage: String,
        /// Name of the missing column
        column: String,
    },

    /// A contract name could not be re-bound to a function at load time
    #[error("Unresolved contract name '{0}'")]
    UnknownContract(String),

    /// A stage failed while mapping a row; the whole pass fails
    #[error("Transform error in stage '{stage}': {message}")]
    Transform {
        /// Name of the failing stage
        stage: String,
        /// What went wrong
        message: String,
    },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Persisted model artifact is unreadable
    #[error("Corrupt model artifact: {0}")]
    CorruptModel(String),
}
