//! Error types for the SproutDB engine

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SproutError>;

#[derive(Error, Debug)]
pub enum SproutError {
    /// Grammar or lexical violation, with the offending token's source offset
    #[error("{message} at position {position}")]
    Parse { message: String, position: usize },

    #[error("No database selected")]
    NoDatabaseSelected,

    #[error("Database '{0}' already exists")]
    DatabaseExists(String),

    #[error("Database '{0}' does not exist")]
    DatabaseNotFound(String),

    #[error("Table '{0}' already exists")]
    TableExists(String),

    #[error("Table '{0}' does not exist")]
    TableNotFound(String),

    #[error("Column '{column}' does not exist in table '{table}'")]
    ColumnNotFound { table: String, column: String },

    #[error("{0}")]
    MissingArgument(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Query execution failed: {0}")]
    Query(String),

    #[error("Type error: {0}")]
    TypeError(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SproutError {
    pub fn parse(message: impl Into<String>, position: usize) -> Self {
        SproutError::Parse {
            message: message.into(),
            position,
        }
    }

    /// Source offset for parse failures
    pub fn position(&self) -> Option<usize> {
        match self {
            SproutError::Parse { position, .. } => Some(*position),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for SproutError {
    fn from(err: serde_json::Error) -> Self {
        SproutError::Serialization(err.to_string())
    }
}

impl From<bincode::Error> for SproutError {
    fn from(err: bincode::Error) -> Self {
        SproutError::Serialization(err.to_string())
    }
}
