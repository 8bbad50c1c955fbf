//! Error types and result types for mapping and store operations.
//!
//! Two layers of errors exist:
//!
//! - [`MappingError`] is raised by the pure encode/decode machinery (rule table,
//!   record mapper, variants). Use [`MappingResult<T>`] for those operations.
//! - [`DocumentStoreError`] is raised by everything that touches a store backend or
//!   the binding registry, and wraps [`MappingError`] transparently.

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Errors raised while converting between native values and BSON.
///
/// Decode errors abort the whole conversion; no partially decoded record is ever
/// returned.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MappingError {
    /// A value has no applicable rule, or the stored BSON has an incompatible type.
    #[error("Mapping error: {0}")]
    Mapping(String),
    /// A binary field's stored byte count does not fit its fixed-size target.
    #[error("Binary length error: expected {expected} bytes, found {found}")]
    BinaryLength {
        /// Byte count required by the target type.
        expected: usize,
        /// Byte count found in the stored binary.
        found: usize,
    },
    /// A fixed-arity tuple or array was decoded from an array of another length.
    #[error("Array length mismatch: expected {expected} elements, found {found}")]
    ArrayLengthMismatch {
        /// Arity of the target type.
        expected: usize,
        /// Length of the stored array.
        found: usize,
    },
    /// Typed access to a variant whose live alternative has another label.
    #[error("Variant label error: expected `{expected}`, held `{held}`")]
    VariantLabel {
        /// Label of the requested alternative.
        expected: &'static str,
        /// Label of the alternative actually held.
        held: &'static str,
    },
    /// A variant document is malformed or names an unknown alternative.
    #[error("Structural error: {0}")]
    Structural(String),
    /// Wraps an error with the document key where it happened.
    #[error("field `{field}`: {source}")]
    Field {
        /// Document key of the offending field.
        field: String,
        /// The underlying failure.
        #[source]
        source: Box<MappingError>,
    },
}

impl MappingError {
    /// Builds a [`MappingError::Mapping`] describing a type mismatch.
    pub fn unexpected(expected: &str, found: &bson::Bson) -> Self {
        MappingError::Mapping(format!(
            "expected {expected}, found {}",
            crate::value::kind_name(found)
        ))
    }

    /// Attaches the document key of the field being processed.
    pub fn in_field(self, field: impl Into<String>) -> Self {
        MappingError::Field { field: field.into(), source: Box::new(self) }
    }

    /// Returns the innermost error, looking through field context.
    pub fn root(&self) -> &MappingError {
        match self {
            MappingError::Field { source, .. } => source.root(),
            other => other,
        }
    }
}

/// A specialized `Result` type for encode/decode operations.
pub type MappingResult<T> = Result<T, MappingError>;

impl From<BsonError> for MappingError {
    fn from(err: BsonError) -> Self {
        MappingError::Mapping(err.to_string())
    }
}

/// Errors raised by the binding registry.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BindingError {
    /// The record type already has a collection binding.
    #[error("{record} is already bound to collection {collection}")]
    AlreadyBound {
        /// Name of the record type.
        record: &'static str,
        /// Collection the type is bound to.
        collection: String,
    },
    /// The record type has no collection binding.
    #[error("{0} is not bound to a collection")]
    Unbound(&'static str),
    /// An index names a key the record never writes.
    #[error("index on {record} names unknown key {key}")]
    UnknownIndexKey {
        /// Name of the record type.
        record: &'static str,
        /// The offending index key.
        key: String,
    },
}

/// Represents all possible errors that can occur when interacting with a document store.
#[derive(Error, Debug)]
pub enum DocumentStoreError {
    /// Conversion between a record and its document failed.
    #[error(transparent)]
    Mapping(#[from] MappingError),
    /// The record type's collection binding is missing or conflicting.
    #[error(transparent)]
    Binding(#[from] BindingError),
    /// Serialization/deserialization error when converting between document formats (BSON, JSON).
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// A document with the given ID already exists in the collection.
    /// The first argument is the document ID, the second is the collection name.
    #[error("Document {0} already exists in collection {1}")]
    DocumentAlreadyExists(String, String),
    /// A lookup that must find a document found nothing.
    /// The first argument is the filter, the second is the collection name.
    #[error("No document matching {0} in collection {1}")]
    NotFound(String, String),
    /// An error occurred in the underlying storage backend.
    #[error("Backend error: {0}")]
    Backend(String),
}

/// A specialized `Result` type for document store operations.
pub type DocumentStoreResult<T> = Result<T, DocumentStoreError>;

impl From<BsonError> for DocumentStoreError {
    fn from(err: BsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for DocumentStoreError {
    fn from(err: SerdeJsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}
