//! The document value model.
//!
//! A document value is a [`bson::Bson`]; an object is an ordered [`bson::Document`].
//! This module re-exports the BSON types the rule table maps onto and adds a few
//! helpers used across the crate for diagnostics and JSON views.

pub use bson::{
    Binary, Bson as Value, DateTime, Document, Regex, Timestamp,
    oid::ObjectId,
    spec::{BinarySubtype, ElementType},
};

use bson::Bson;
use serde::{Deserialize, Serialize};

/// Reserved key holding a record's identity.
pub const ID_KEY: &str = "_id";

/// Explicit null wrapper. Always encodes to [`Bson::Null`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Null;

/// Returns a short, human readable name of the value's BSON type.
pub fn kind_name(value: &Bson) -> &'static str {
    match value {
        Bson::Null => "null",
        Bson::Undefined => "undefined",
        Bson::Boolean(_) => "bool",
        Bson::Int32(_) => "int32",
        Bson::Int64(_) => "int64",
        Bson::Double(_) => "double",
        Bson::Decimal128(_) => "decimal128",
        Bson::String(_) => "string",
        Bson::Symbol(_) => "symbol",
        Bson::Binary(_) => "binary",
        Bson::DateTime(_) => "datetime",
        Bson::Timestamp(_) => "timestamp",
        Bson::ObjectId(_) => "objectId",
        Bson::RegularExpression(_) => "regex",
        Bson::Array(_) => "array",
        Bson::Document(_) => "object",
        Bson::JavaScriptCode(_) | Bson::JavaScriptCodeWithScope(_) => "javascript",
        Bson::DbPointer(_) => "dbPointer",
        Bson::MinKey => "minKey",
        Bson::MaxKey => "maxKey",
        #[allow(unreachable_patterns)]
        _ => "unknown",
    }
}

/// Whether a stored value is the explicit "undefined" marker.
///
/// The record mapper treats such keys exactly like absent ones.
pub fn is_undefined(value: &Bson) -> bool {
    matches!(value, Bson::Undefined)
}

/// Renders a value as extended JSON.
///
/// # Errors
///
/// Returns an error if the value cannot be represented as JSON.
pub fn to_json(value: &Bson) -> Result<serde_json::Value, serde_json::Error> {
    serde_json::to_value(value)
}

/// Reads a value back from (extended) JSON.
///
/// # Errors
///
/// Returns an error if the JSON uses a malformed extended-JSON wrapper.
pub fn from_json(value: serde_json::Value) -> Result<Bson, serde_json::Error> {
    serde_json::from_value(value)
}
