//! Error types and result types for document mapping operations.
//!
//! Every fallible operation in this crate returns [`MapperResult<T>`]. Mapping-layer
//! failures (unknown fields, read-only documents, detached documents, ...) are raised
//! locally and are never retried. Failures reported by a connection provider are
//! wrapped by the owning collection into [`MapperError::Provider`] so the operation
//! and target collection are always part of the message.

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Represents all possible errors that can occur while mapping documents.
#[derive(Error, Debug)]
pub enum MapperError {
    /// The collection metadata yields no usable primary key.
    #[error("Collection {0} must have its object id or a pseudo primary key defined, but none was found")]
    MissingPrimaryKey(String),
    /// No connection provider was configured and no process-wide default is set.
    #[error("No connection provider found for collection {0}")]
    MissingProvider(String),
    /// A field that is not present in the document was accessed.
    #[error("Specified field \"{0}\" is not in the document")]
    UnknownField(String),
    /// A collection information key that is not recognized was requested.
    #[error("There is no collection information for the key \"{0}\"")]
    UnknownKey(String),
    /// An attempt was made to remove a primary key field from a connected document.
    #[error("Specified field \"{0}\" is a primary key and should not be unset")]
    PrimaryKeyProtected(String),
    /// The document does not carry a value for one of its primary key fields.
    #[error("The document has no value for primary key field \"{0}\"")]
    PrimaryKeyValueMissing(String),
    /// A save or delete was attempted on a read-only document.
    #[error("This document has been marked read-only")]
    ReadOnlyViolation,
    /// An operation requiring a live collection was attempted on a detached object.
    /// The argument names the operation.
    #[error("Cannot {0} unless connected to a collection")]
    Disconnected(&'static str),
    /// The reattachment target does not match the collection the object came from.
    #[error("Incompatible collection: {0}")]
    IncompatibleCollection(String),
    /// A documentset position outside of `0..count` was requested.
    #[error("Illegal index {index}, documentset holds {count} documents")]
    IndexOutOfRange {
        /// The requested position.
        index: usize,
        /// The total count of the documentset.
        count: usize,
    },
    /// The persisted record backing a document could not be found.
    /// The argument is the collection name.
    #[error("Cannot refresh document as its record is missing from collection {0}")]
    DocumentNotFound(String),
    /// A record with the same identifier already exists.
    /// The first argument is the identifier, the second is the collection name.
    #[error("Duplicate key {0} in collection {1}")]
    DuplicateKey(String, String),
    /// The provider does not know how to run the given command.
    #[error("Unsupported command: {0}")]
    UnsupportedCommand(String),
    /// Provider configuration is incomplete or malformed.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    /// Serialization/deserialization error when converting between formats (BSON, JSON).
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// An error reported by the underlying driver or storage.
    #[error("Backend error: {0}")]
    Backend(String),
    /// A provider failure wrapped with the operation and collection it happened in.
    #[error("{operation} on collection {collection} failed: {source}")]
    Provider {
        /// The collection operation that failed (`insert`, `update`, ...).
        operation: &'static str,
        /// The target collection name.
        collection: String,
        /// The error reported by the provider.
        #[source]
        source: Box<MapperError>,
    },
}

impl MapperError {
    /// Wraps this error with the operation and collection it was raised from.
    pub fn context(self, operation: &'static str, collection: &str) -> Self {
        MapperError::Provider {
            operation,
            collection: collection.to_string(),
            source: Box::new(self),
        }
    }

    /// Returns the innermost error, looking through provider context wrappers.
    pub fn root(&self) -> &MapperError {
        match self {
            MapperError::Provider { source, .. } => source.root(),
            other => other,
        }
    }
}

/// A specialized `Result` type for document mapping operations.
pub type MapperResult<T> = Result<T, MapperError>;

impl From<BsonError> for MapperError {
    fn from(err: BsonError) -> Self {
        MapperError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for MapperError {
    fn from(err: SerdeJsonError) -> Self {
        MapperError::Serialization(err.to_string())
    }
}
