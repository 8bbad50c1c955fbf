//! Records: application types whose fields map to document keys.
//!
//! A record is normally declared with `#[derive(Record)]`, which builds a static
//! [`RecordDescriptor`] table and the encode/decode code for the type at compile
//! time. Every field annotation problem (duplicate renames or hooks, clashing
//! document names, binary fields with wide elements, records with no mapped
//! fields) is therefore a compile error rather than a per-call failure.
//!
//! # Example
//!
//! ```ignore
//! use docmodel::prelude::*;
//!
//! #[derive(Debug, Default, Record)]
//! pub struct User {
//!     #[record(id)]
//!     pub id: Option<ObjectId>,
//!     #[record(rename = "n")]
//!     pub name: String,
//!     #[record(ignore)]
//!     pub session: Option<String>,
//! }
//!
//! let document = User { name: "Alice".into(), ..Default::default() }.to_document()?;
//! assert_eq!(document, doc! { "n": "Alice" });
//! ```
//!
//! The helpers in this module are what the generated code calls; they can also be
//! used to implement [`Record`] by hand.

use bson::{Bson, Document, oid::ObjectId, spec::BinarySubtype};
use serde::{Serialize, de::DeserializeOwned};

use crate::{
    error::{DocumentStoreResult, MappingError, MappingResult},
    query::QueryExpression,
    rules::{ByteSequence, FieldValue, decode_binary, encode_binary, structural_decode, structural_encode},
    value::{ID_KEY, from_json, is_undefined, to_json},
};

/// Mapping metadata for one field of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Name of the field in the Rust type.
    pub source_name: &'static str,
    /// Key of the field in the document.
    pub document_name: &'static str,
    /// Whether the field is excluded from mapping.
    pub ignored: bool,
    /// Path of the custom encode hook, if any.
    pub custom_encode: Option<&'static str>,
    /// Path of the custom decode hook, if any.
    pub custom_decode: Option<&'static str>,
    /// Binary subtype code for fields stored as raw binary.
    pub binary_subtype: Option<u8>,
    /// Whether the field goes through the structural serializer.
    pub structural: bool,
    /// Declared type of the field, as written in the source.
    pub type_name: &'static str,
}

impl FieldDescriptor {
    /// Whether the field takes part in mapping.
    pub fn is_eligible(&self) -> bool {
        !self.ignored
    }

    /// The binary subtype this field is stored with, if it is a binary field.
    pub fn binary_subtype(&self) -> Option<BinarySubtype> {
        self.binary_subtype.map(BinarySubtype::from)
    }
}

/// The full field table of a record type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordDescriptor {
    /// Name of the record type.
    pub type_name: &'static str,
    /// Source name of the identity field, if the record has one.
    pub identity: Option<&'static str>,
    /// Every declared field, in declaration order, including ignored ones.
    pub fields: &'static [FieldDescriptor],
}

impl RecordDescriptor {
    /// Looks up a field by its Rust name.
    pub fn field(&self, source_name: &str) -> Option<&'static FieldDescriptor> {
        self.fields.iter().find(|field| field.source_name == source_name)
    }

    /// Looks up a field by its document key.
    pub fn field_by_key(&self, document_name: &str) -> Option<&'static FieldDescriptor> {
        self.fields
            .iter()
            .find(|field| field.is_eligible() && field.document_name == document_name)
    }

    /// Iterates over the fields that take part in mapping.
    pub fn eligible(&self) -> impl Iterator<Item = &'static FieldDescriptor> {
        self.fields.iter().filter(|field| field.is_eligible())
    }

    /// The document keys this record writes, in order.
    pub fn document_names(&self) -> Vec<&'static str> {
        self.eligible().map(|field| field.document_name).collect()
    }
}

/// A type mapped field-by-field to a document.
///
/// Decoding starts from [`Default::default`] and overwrites every field whose key is
/// present in the document, so absent keys leave the default in place.
pub trait Record: Default + Sized + 'static {
    /// The typed query builder for this record.
    type Query: QueryExpression<Record = Self>;

    /// Returns the static field table of this record type.
    fn descriptor() -> &'static RecordDescriptor;

    /// Encodes this record as a document.
    ///
    /// # Errors
    ///
    /// Returns a [`MappingError`] if a field value cannot be encoded.
    fn to_document(&self) -> MappingResult<Document>;

    /// Decodes a record from a document.
    ///
    /// # Errors
    ///
    /// Returns the first [`MappingError`] met; no partially decoded record is returned.
    fn from_document(document: &Document) -> MappingResult<Self>;

    /// Returns the identity of this record, if it has an identity field and it is set.
    fn id(&self) -> Option<ObjectId> {
        None
    }

    /// Assigns the identity of this record. A no-op for records without an identity field.
    fn set_id(&mut self, _id: ObjectId) {}

    /// Starts a new, empty query over this record type.
    fn query() -> Self::Query {
        Self::Query::new()
    }
}

/// Extension trait providing extended-JSON views of records.
///
/// This trait is automatically implemented for all types that implement [`Record`].
pub trait RecordExt: Record {
    /// Converts this record to extended JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be encoded.
    fn to_json(&self) -> DocumentStoreResult<serde_json::Value>;

    /// Creates a record from (extended) JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is not an object or the record cannot be decoded.
    fn from_json(value: serde_json::Value) -> DocumentStoreResult<Self>;
}

impl<R: Record> RecordExt for R {
    fn to_json(&self) -> DocumentStoreResult<serde_json::Value> {
        Ok(to_json(&Bson::Document(self.to_document()?))?)
    }

    fn from_json(value: serde_json::Value) -> DocumentStoreResult<Self> {
        match &from_json(value)? {
            Bson::Document(document) => Ok(R::from_document(document)?),
            other => Err(MappingError::unexpected("object", other).into()),
        }
    }
}

/// Returns the stored value under `key`, treating an explicit `undefined` as absent.
pub fn stored<'d>(document: &'d Document, key: &str) -> Option<&'d Bson> {
    document.get(key).filter(|value| !is_undefined(value))
}

/// Writes the identity under the reserved key when it is set.
pub fn encode_identity(document: &mut Document, id: &Option<ObjectId>) {
    if let Some(id) = id {
        document.insert(ID_KEY, *id);
    }
}

/// Reads the identity from the reserved key when present.
pub fn decode_identity(document: &Document, slot: &mut Option<ObjectId>) -> MappingResult<()> {
    decode_field(document, ID_KEY, slot)
}

/// Encodes a field through the rule table.
pub fn encode_field<T: FieldValue>(document: &mut Document, key: &str, value: &T) -> MappingResult<()> {
    let encoded = value.encode().map_err(|err| err.in_field(key))?;
    document.insert(key, encoded);

    Ok(())
}

/// Decodes a field through the rule table, leaving `slot` untouched if the key is absent.
pub fn decode_field<T: FieldValue>(document: &Document, key: &str, slot: &mut T) -> MappingResult<()> {
    if let Some(value) = stored(document, key) {
        *slot = T::decode(value).map_err(|err| err.in_field(key))?;
    }

    Ok(())
}

/// Stores the result of a custom encode hook as-is.
pub fn encode_hooked_field(document: &mut Document, key: &str, encoded: MappingResult<Bson>) -> MappingResult<()> {
    document.insert(key, encoded.map_err(|err| err.in_field(key))?);

    Ok(())
}

/// Runs a custom decode hook, but only when the key is present.
pub fn decode_hooked_field<T>(
    document: &Document,
    key: &str,
    slot: &mut T,
    hook: impl FnOnce(&Document) -> MappingResult<T>,
) -> MappingResult<()> {
    if stored(document, key).is_some() {
        *slot = hook(document).map_err(|err| err.in_field(key))?;
    }

    Ok(())
}

/// Stores a byte sequence as binary with the declared subtype.
pub fn encode_binary_field<T: ByteSequence>(document: &mut Document, key: &str, value: &T, subtype: u8) {
    document.insert(key, encode_binary(value, BinarySubtype::from(subtype)));
}

/// Reads a binary field back, requiring the stored value to be binary.
pub fn decode_binary_field<T: ByteSequence>(document: &Document, key: &str, slot: &mut T) -> MappingResult<()> {
    if let Some(value) = stored(document, key) {
        *slot = decode_binary(value).map_err(|err| err.in_field(key))?;
    }

    Ok(())
}

/// Encodes a field through the structural serializer.
pub fn encode_structural_field<T: Serialize>(document: &mut Document, key: &str, value: &T) -> MappingResult<()> {
    encode_hooked_field(document, key, structural_encode(value))
}

/// Decodes a field through the structural deserializer.
pub fn decode_structural_field<T: DeserializeOwned>(
    document: &Document,
    key: &str,
    slot: &mut T,
) -> MappingResult<()> {
    if let Some(value) = stored(document, key) {
        *slot = structural_decode(value).map_err(|err| err.in_field(key))?;
    }

    Ok(())
}

/// Encodes a record as a BSON object, for records nested inside other values.
pub fn encode_record<R: Record>(record: &R) -> MappingResult<Bson> {
    record.to_document().map(Bson::Document)
}

/// Decodes a record nested inside another value.
pub fn decode_record<R: Record>(value: &Bson) -> MappingResult<R> {
    match value {
        Bson::Document(document) => R::from_document(document),
        other => Err(MappingError::unexpected("object", other)),
    }
}
