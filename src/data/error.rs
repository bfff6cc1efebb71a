//! Data container error types

use crate::data::ValueType;
use thiserror::Error;

/// Errors raised by the data container and its codecs
#[derive(Debug, Error)]
pub enum DataError {
    #[error("Key not found: \"{0}\"")]
    KeyNotFound(String),

    #[error("Key \"{key}\" has type {actual}, requested {expected}")]
    TypeMismatch {
        key: String,
        expected: ValueType,
        actual: ValueType,
    },

    #[error("Key \"{key}\" already holds a value of type {existing}, cannot write {attempted}")]
    TypeChange {
        key: String,
        existing: ValueType,
        attempted: ValueType,
    },

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type DataResult<T> = std::result::Result<T, DataError>;
