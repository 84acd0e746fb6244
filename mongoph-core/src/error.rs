//! Error types and result types for record store operations.
//!
//! Every failure raised by this workspace is one of the [`MongophError`] kinds.
//! Backend failures are caught at the operation boundary and wrapped, never retried.
//! Use [`MongophResult<T>`] as the return type for fallible operations.

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Represents all possible errors that can occur when working with a record store.
#[derive(Error, Debug)]
pub enum MongophError {
    /// Required configuration is missing or empty.
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// The endpoint could not be parsed, reached, or authenticated against.
    #[error("Connection error: {0}")]
    Connection(String),
    /// Caller input is malformed, for example an incomplete pager.
    #[error("Validation error: {0}")]
    Validation(String),
    /// A read, write, index or aggregate call failed in the backing store.
    /// The first field names the collection the operation targeted.
    #[error("Database operation failure on {collection}: {message}")]
    DatabaseOperation {
        collection: String,
        message: String,
    },
    /// Conversion between document formats (BSON, JSON) failed.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl MongophError {
    /// Wraps a backend failure for the given collection.
    pub fn operation(collection: impl Into<String>, cause: impl ToString) -> Self {
        MongophError::DatabaseOperation {
            collection: collection.into(),
            message: cause.to_string(),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, MongophError::Validation(_))
    }

    pub fn is_connection(&self) -> bool {
        matches!(self, MongophError::Connection(_))
    }

    pub fn is_database_operation(&self) -> bool {
        matches!(self, MongophError::DatabaseOperation { .. })
    }
}

/// A specialized `Result` type for record store operations.
pub type MongophResult<T> = Result<T, MongophError>;

impl From<BsonError> for MongophError {
    fn from(err: BsonError) -> Self {
        MongophError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for MongophError {
    fn from(err: SerdeJsonError) -> Self {
        MongophError::Serialization(err.to_string())
    }
}

impl From<std::convert::Infallible> for MongophError {
    fn from(err: std::convert::Infallible) -> Self {
        match err {}
    }
}
