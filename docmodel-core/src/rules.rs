//! The type rule table: conversions between native values and BSON.
//!
//! Every mappable type implements [`FieldValue`]. Which implementation a type gets
//! decides the rule it follows, in this order of precedence:
//!
//! 1. **Own hook** - a type implementing [`FieldValue`] by hand fully controls its
//!    representation (see [`DateTimeOrNow`], and every `#[derive(Variant)]` enum).
//! 2. **Wrappers** - [`Binary`], [`ObjectId`], [`DateTime`], [`Regex`], [`Timestamp`],
//!    UUIDs, chrono datetimes and [`Null`] pass through structurally.
//! 3. **Enumerations** - `#[derive(Enumeration)]` types map to their integer value.
//! 4. **Flag sets** - [`Flags<E>`] maps to the combined integer value.
//! 5. **Tuples** - arrays with one slot per position, exact arity on decode.
//! 6. **Sequences** - arrays, element-wise; fixed-size arrays require an exact length.
//! 7. **Maps** - objects keyed by [`MapKey`] types (strings only).
//! 8. **Document values** - [`Bson`] and [`Document`] are identity.
//! 9. **Scalars** - numbers, booleans, strings, `Option<T>` and `Box<T>`.
//! 10. **Records** - `#[derive(Record)]` types recurse into the record mapper.
//! 11. **Structural fallback** - [`Structural<T>`] goes through serde and warns.
//!
//! Numeric decoding accepts `int32`, `int64` and `double` sources for every numeric
//! target and coerces with truncating/widening casts.

use bson::{
    Binary, Bson, DateTime, Document, Regex, Timestamp,
    de::deserialize_from_bson,
    oid::ObjectId,
    ser::serialize_to_bson,
    spec::BinarySubtype,
};
use serde::{Serialize, de::DeserializeOwned};
use std::{
    collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque},
    hash::Hash,
    marker::PhantomData,
    ops::BitOr,
};

use crate::{
    error::{MappingError, MappingResult},
    value::Null,
};

/// A value that can be encoded to and decoded from BSON.
///
/// Implement this by hand to take full control over a type's representation;
/// derive `Record`, `Variant` or `Enumeration` for the generated rules.
pub trait FieldValue: Sized {
    /// Encodes this value as a BSON value.
    ///
    /// # Errors
    ///
    /// Returns a [`MappingError`] if the value has no BSON representation.
    fn encode(&self) -> MappingResult<Bson>;

    /// Decodes a value from its stored BSON representation.
    ///
    /// # Errors
    ///
    /// Returns a [`MappingError`] if the stored value has an incompatible type or shape.
    fn decode(value: &Bson) -> MappingResult<Self>;
}

// Wrappers

impl FieldValue for Binary {
    fn encode(&self) -> MappingResult<Bson> {
        Ok(Bson::Binary(self.clone()))
    }

    fn decode(value: &Bson) -> MappingResult<Self> {
        match value {
            Bson::Binary(binary) => Ok(binary.clone()),
            other => Err(MappingError::unexpected("binary", other)),
        }
    }
}

impl FieldValue for ObjectId {
    fn encode(&self) -> MappingResult<Bson> {
        Ok(Bson::ObjectId(*self))
    }

    fn decode(value: &Bson) -> MappingResult<Self> {
        match value {
            Bson::ObjectId(id) => Ok(*id),
            other => Err(MappingError::unexpected("objectId", other)),
        }
    }
}

impl FieldValue for DateTime {
    fn encode(&self) -> MappingResult<Bson> {
        Ok(Bson::DateTime(*self))
    }

    fn decode(value: &Bson) -> MappingResult<Self> {
        match value {
            Bson::DateTime(dt) => Ok(*dt),
            other => Err(MappingError::unexpected("datetime", other)),
        }
    }
}

impl FieldValue for chrono::DateTime<chrono::Utc> {
    fn encode(&self) -> MappingResult<Bson> {
        Ok(Bson::DateTime(DateTime::from_chrono(*self)))
    }

    fn decode(value: &Bson) -> MappingResult<Self> {
        DateTime::decode(value).map(|dt| dt.to_chrono())
    }
}

impl FieldValue for Regex {
    fn encode(&self) -> MappingResult<Bson> {
        Ok(Bson::RegularExpression(self.clone()))
    }

    fn decode(value: &Bson) -> MappingResult<Self> {
        match value {
            Bson::RegularExpression(regex) => Ok(regex.clone()),
            other => Err(MappingError::unexpected("regex", other)),
        }
    }
}

impl FieldValue for Timestamp {
    fn encode(&self) -> MappingResult<Bson> {
        Ok(Bson::Timestamp(*self))
    }

    fn decode(value: &Bson) -> MappingResult<Self> {
        match value {
            Bson::Timestamp(ts) => Ok(*ts),
            other => Err(MappingError::unexpected("timestamp", other)),
        }
    }
}

impl FieldValue for Null {
    fn encode(&self) -> MappingResult<Bson> {
        Ok(Bson::Null)
    }

    fn decode(value: &Bson) -> MappingResult<Self> {
        match value {
            Bson::Null => Ok(Null),
            other => Err(MappingError::unexpected("null", other)),
        }
    }
}

fn uuid_bytes(value: &Bson) -> MappingResult<[u8; 16]> {
    match value {
        Bson::Binary(Binary { subtype: BinarySubtype::Uuid, bytes }) => {
            bytes
                .as_slice()
                .try_into()
                .map_err(|_| MappingError::BinaryLength { expected: 16, found: bytes.len() })
        }
        other => Err(MappingError::unexpected("uuid binary", other)),
    }
}

impl FieldValue for bson::Uuid {
    fn encode(&self) -> MappingResult<Bson> {
        Ok(Bson::Binary(Binary { subtype: BinarySubtype::Uuid, bytes: self.bytes().to_vec() }))
    }

    fn decode(value: &Bson) -> MappingResult<Self> {
        Ok(bson::Uuid::from_bytes(uuid_bytes(value)?))
    }
}

impl FieldValue for uuid::Uuid {
    fn encode(&self) -> MappingResult<Bson> {
        Ok(Bson::Binary(Binary { subtype: BinarySubtype::Uuid, bytes: self.as_bytes().to_vec() }))
    }

    fn decode(value: &Bson) -> MappingResult<Self> {
        Ok(uuid::Uuid::from_bytes(uuid_bytes(value)?))
    }
}

/// A datetime that can stand for "the moment of encoding".
///
/// [`DateTimeOrNow::Now`] encodes to the current time every time it is encoded,
/// which makes fields of this type one-way: a decoded value is always
/// [`DateTimeOrNow::At`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DateTimeOrNow {
    /// Resolved to the current time when encoded.
    #[default]
    Now,
    /// A fixed point in time.
    At(DateTime),
}

impl DateTimeOrNow {
    /// Returns the fixed datetime, or `None` for the "now" sentinel.
    pub fn fixed(&self) -> Option<DateTime> {
        match self {
            DateTimeOrNow::Now => None,
            DateTimeOrNow::At(dt) => Some(*dt),
        }
    }
}

impl FieldValue for DateTimeOrNow {
    fn encode(&self) -> MappingResult<Bson> {
        Ok(Bson::DateTime(self.fixed().unwrap_or_else(DateTime::now)))
    }

    fn decode(value: &Bson) -> MappingResult<Self> {
        DateTime::decode(value).map(DateTimeOrNow::At)
    }
}

// Enumerations and flag sets

/// A fieldless enum mapped through its integer discriminant.
///
/// Derive it with `#[derive(Enumeration)]`; the derive also provides the
/// [`FieldValue`] implementation.
pub trait Enumeration: Sized + Copy {
    /// Whether the representation needs 64 bits (stored as `int64` instead of `int32`).
    const WIDE: bool;

    /// Returns the discriminant of this variant.
    fn to_repr(&self) -> i64;

    /// Returns the variant with the given discriminant, if any.
    fn from_repr(repr: i64) -> Option<Self>;
}

/// Encodes an enumeration as its integer discriminant.
pub fn encode_enumeration<E: Enumeration>(value: &E) -> MappingResult<Bson> {
    Ok(integer_bson(value.to_repr(), E::WIDE))
}

/// Decodes an enumeration from a stored integer discriminant.
pub fn decode_enumeration<E: Enumeration>(value: &Bson) -> MappingResult<E> {
    let repr = i64::decode(value)?;

    E::from_repr(repr).ok_or_else(|| {
        MappingError::Mapping(format!(
            "{} has no variant with value {repr}",
            std::any::type_name::<E>()
        ))
    })
}

fn integer_bson(value: i64, wide: bool) -> Bson {
    match i32::try_from(value) {
        Ok(narrow) if !wide => Bson::Int32(narrow),
        _ => Bson::Int64(value),
    }
}

/// A set of [`Enumeration`] flags, stored as their combined integer value.
pub struct Flags<E> {
    bits: i64,
    _marker: PhantomData<E>,
}

impl<E: Enumeration> Flags<E> {
    /// Creates an empty flag set.
    pub fn empty() -> Self {
        Self::from_bits(0)
    }

    /// Creates a flag set from a raw combined value.
    pub fn from_bits(bits: i64) -> Self {
        Self { bits, _marker: PhantomData }
    }

    /// Returns the raw combined value.
    pub fn bits(&self) -> i64 {
        self.bits
    }

    /// Adds a flag.
    pub fn insert(&mut self, flag: E) {
        self.bits |= flag.to_repr();
    }

    /// Removes a flag.
    pub fn remove(&mut self, flag: E) {
        self.bits &= !flag.to_repr();
    }

    /// Whether every bit of `flag` is set.
    pub fn contains(&self, flag: E) -> bool {
        let repr = flag.to_repr();
        self.bits & repr == repr
    }

    /// Whether no bit is set.
    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }
}

impl<E> Clone for Flags<E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E> Copy for Flags<E> {}

impl<E> PartialEq for Flags<E> {
    fn eq(&self, other: &Self) -> bool {
        self.bits == other.bits
    }
}

impl<E> Eq for Flags<E> {}

impl<E> Default for Flags<E> {
    fn default() -> Self {
        Self { bits: 0, _marker: PhantomData }
    }
}

impl<E> std::fmt::Debug for Flags<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Flags({:#b})", self.bits)
    }
}

impl<E: Enumeration> FromIterator<E> for Flags<E> {
    fn from_iter<I: IntoIterator<Item = E>>(iter: I) -> Self {
        let mut flags = Self::empty();
        for flag in iter {
            flags.insert(flag);
        }
        flags
    }
}

impl<E: Enumeration> BitOr<E> for Flags<E> {
    type Output = Self;

    fn bitor(mut self, flag: E) -> Self {
        self.insert(flag);
        self
    }
}

impl<E: Enumeration> FieldValue for Flags<E> {
    fn encode(&self) -> MappingResult<Bson> {
        Ok(integer_bson(self.bits, E::WIDE))
    }

    fn decode(value: &Bson) -> MappingResult<Self> {
        i64::decode(value).map(Self::from_bits)
    }
}

// Tuples

fn expect_array<'a>(value: &'a Bson) -> MappingResult<&'a Vec<Bson>> {
    match value {
        Bson::Array(items) => Ok(items),
        other => Err(MappingError::unexpected("array", other)),
    }
}

fn element_error(index: usize) -> impl FnOnce(MappingError) -> MappingError {
    move |err| err.in_field(format!("[{index}]"))
}

macro_rules! tuple_rules {
    ($len:expr => $($name:ident : $idx:tt),+) => {
        impl<$($name: FieldValue),+> FieldValue for ($($name,)+) {
            fn encode(&self) -> MappingResult<Bson> {
                Ok(Bson::Array(vec![$(self.$idx.encode().map_err(element_error($idx))?),+]))
            }

            fn decode(value: &Bson) -> MappingResult<Self> {
                let items = expect_array(value)?;
                if items.len() != $len {
                    return Err(MappingError::ArrayLengthMismatch { expected: $len, found: items.len() });
                }

                Ok(($($name::decode(&items[$idx]).map_err(element_error($idx))?,)+))
            }
        }
    };
}

tuple_rules!(1 => A: 0);
tuple_rules!(2 => A: 0, B: 1);
tuple_rules!(3 => A: 0, B: 1, C: 2);
tuple_rules!(4 => A: 0, B: 1, C: 2, D: 3);
tuple_rules!(5 => A: 0, B: 1, C: 2, D: 3, E: 4);
tuple_rules!(6 => A: 0, B: 1, C: 2, D: 3, E: 4, F: 5);
tuple_rules!(7 => A: 0, B: 1, C: 2, D: 3, E: 4, F: 5, G: 6);
tuple_rules!(8 => A: 0, B: 1, C: 2, D: 3, E: 4, F: 5, G: 6, H: 7);

// Sequences

fn encode_sequence<'a, T: FieldValue + 'a>(items: impl IntoIterator<Item = &'a T>) -> MappingResult<Bson> {
    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| item.encode().map_err(element_error(index)))
        .collect::<MappingResult<Vec<_>>>()
        .map(Bson::Array)
}

fn decode_sequence<T: FieldValue, C: FromIterator<T>>(value: &Bson) -> MappingResult<C> {
    expect_array(value)?
        .iter()
        .enumerate()
        .map(|(index, item)| T::decode(item).map_err(element_error(index)))
        .collect()
}

impl<T: FieldValue> FieldValue for Vec<T> {
    fn encode(&self) -> MappingResult<Bson> {
        encode_sequence(self)
    }

    fn decode(value: &Bson) -> MappingResult<Self> {
        decode_sequence(value)
    }
}

impl<T: FieldValue> FieldValue for VecDeque<T> {
    fn encode(&self) -> MappingResult<Bson> {
        encode_sequence(self)
    }

    fn decode(value: &Bson) -> MappingResult<Self> {
        decode_sequence(value)
    }
}

impl<T: FieldValue + Ord> FieldValue for BTreeSet<T> {
    fn encode(&self) -> MappingResult<Bson> {
        encode_sequence(self)
    }

    fn decode(value: &Bson) -> MappingResult<Self> {
        decode_sequence(value)
    }
}

impl<T: FieldValue + Eq + Hash> FieldValue for HashSet<T> {
    fn encode(&self) -> MappingResult<Bson> {
        encode_sequence(self)
    }

    fn decode(value: &Bson) -> MappingResult<Self> {
        decode_sequence(value)
    }
}

impl<T: FieldValue, const N: usize> FieldValue for [T; N] {
    fn encode(&self) -> MappingResult<Bson> {
        encode_sequence(self)
    }

    fn decode(value: &Bson) -> MappingResult<Self> {
        let found = expect_array(value)?.len();
        if found != N {
            return Err(MappingError::ArrayLengthMismatch { expected: N, found });
        }

        let items: Vec<T> = decode_sequence(value)?;
        items
            .try_into()
            .map_err(|items: Vec<T>| MappingError::ArrayLengthMismatch { expected: N, found: items.len() })
    }
}

// Maps

/// A key type allowed in mapped associative containers.
///
/// Only string types implement this, so a map with any other key type is
/// rejected at compile time.
pub trait MapKey: Sized {
    /// Returns the key as a document key.
    fn as_key(&self) -> &str;

    /// Builds the key from a document key.
    fn from_key(key: &str) -> Self;
}

impl MapKey for String {
    fn as_key(&self) -> &str {
        self
    }

    fn from_key(key: &str) -> Self {
        key.to_string()
    }
}

impl MapKey for Box<str> {
    fn as_key(&self) -> &str {
        self
    }

    fn from_key(key: &str) -> Self {
        key.into()
    }
}

fn encode_map<'a, K, V>(entries: impl IntoIterator<Item = (&'a K, &'a V)>) -> MappingResult<Bson>
where
    K: MapKey + 'a,
    V: FieldValue + 'a,
{
    let mut document = Document::new();
    for (key, value) in entries {
        let key = key.as_key();
        document.insert(key, value.encode().map_err(|err| err.in_field(key))?);
    }

    Ok(Bson::Document(document))
}

fn decode_map<K, V, C>(value: &Bson) -> MappingResult<C>
where
    K: MapKey,
    V: FieldValue,
    C: FromIterator<(K, V)>,
{
    match value {
        Bson::Document(document) => document
            .iter()
            .map(|(key, item)| {
                V::decode(item)
                    .map(|item| (K::from_key(key), item))
                    .map_err(|err| err.in_field(key.as_str()))
            })
            .collect(),
        other => Err(MappingError::unexpected("object", other)),
    }
}

impl<K: MapKey + Eq + Hash, V: FieldValue> FieldValue for HashMap<K, V> {
    fn encode(&self) -> MappingResult<Bson> {
        encode_map(self)
    }

    fn decode(value: &Bson) -> MappingResult<Self> {
        decode_map(value)
    }
}

impl<K: MapKey + Ord, V: FieldValue> FieldValue for BTreeMap<K, V> {
    fn encode(&self) -> MappingResult<Bson> {
        encode_map(self)
    }

    fn decode(value: &Bson) -> MappingResult<Self> {
        decode_map(value)
    }
}

// Document values

impl FieldValue for Bson {
    fn encode(&self) -> MappingResult<Bson> {
        Ok(self.clone())
    }

    fn decode(value: &Bson) -> MappingResult<Self> {
        Ok(value.clone())
    }
}

impl FieldValue for Document {
    fn encode(&self) -> MappingResult<Bson> {
        Ok(Bson::Document(self.clone()))
    }

    fn decode(value: &Bson) -> MappingResult<Self> {
        match value {
            Bson::Document(document) => Ok(document.clone()),
            other => Err(MappingError::unexpected("object", other)),
        }
    }
}

// Scalars

impl FieldValue for bool {
    fn encode(&self) -> MappingResult<Bson> {
        Ok(Bson::Boolean(*self))
    }

    fn decode(value: &Bson) -> MappingResult<Self> {
        match value {
            Bson::Boolean(b) => Ok(*b),
            other => Err(MappingError::unexpected("bool", other)),
        }
    }
}

impl FieldValue for String {
    fn encode(&self) -> MappingResult<Bson> {
        Ok(Bson::String(self.clone()))
    }

    fn decode(value: &Bson) -> MappingResult<Self> {
        match value {
            Bson::String(s) => Ok(s.clone()),
            other => Err(MappingError::unexpected("string", other)),
        }
    }
}

impl FieldValue for char {
    fn encode(&self) -> MappingResult<Bson> {
        Ok(Bson::String(self.to_string()))
    }

    fn decode(value: &Bson) -> MappingResult<Self> {
        let s = String::decode(value)?;
        let mut chars = s.chars();

        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(c),
            _ => Err(MappingError::Mapping(format!("expected a single character, found {s:?}"))),
        }
    }
}

macro_rules! numeric_decode {
    ($ty:ty) => {
        fn decode(value: &Bson) -> MappingResult<Self> {
            match value {
                Bson::Int32(v) => Ok(*v as $ty),
                Bson::Int64(v) => Ok(*v as $ty),
                Bson::Double(v) => Ok(*v as $ty),
                other => Err(MappingError::unexpected(stringify!($ty), other)),
            }
        }
    };
}

macro_rules! int32_rules {
    ($($ty:ty),+) => {$(
        impl FieldValue for $ty {
            fn encode(&self) -> MappingResult<Bson> {
                Ok(Bson::Int32(i32::from(*self)))
            }

            numeric_decode!($ty);
        }
    )+};
}

macro_rules! int64_rules {
    ($($ty:ty),+) => {$(
        impl FieldValue for $ty {
            fn encode(&self) -> MappingResult<Bson> {
                i64::try_from(*self)
                    .map(Bson::Int64)
                    .map_err(|_| MappingError::Mapping(format!("{} does not fit in int64", self)))
            }

            numeric_decode!($ty);
        }
    )+};
}

int32_rules!(i8, i16, i32, u8, u16);
int64_rules!(i64, u32, u64, isize, usize);

impl FieldValue for f32 {
    fn encode(&self) -> MappingResult<Bson> {
        Ok(Bson::Double(f64::from(*self)))
    }

    numeric_decode!(f32);
}

impl FieldValue for f64 {
    fn encode(&self) -> MappingResult<Bson> {
        Ok(Bson::Double(*self))
    }

    numeric_decode!(f64);
}

impl<T: FieldValue> FieldValue for Option<T> {
    fn encode(&self) -> MappingResult<Bson> {
        match self {
            Some(value) => value.encode(),
            None => Ok(Bson::Null),
        }
    }

    fn decode(value: &Bson) -> MappingResult<Self> {
        match value {
            Bson::Null | Bson::Undefined => Ok(None),
            other => T::decode(other).map(Some),
        }
    }
}

impl<T: FieldValue> FieldValue for Box<T> {
    fn encode(&self) -> MappingResult<Bson> {
        (**self).encode()
    }

    fn decode(value: &Bson) -> MappingResult<Self> {
        T::decode(value).map(Box::new)
    }
}

// Structural fallback

/// Encodes any serde-serializable value through the generic BSON serializer.
///
/// Values mapped this way escape the rule table, so every use is logged.
pub fn structural_encode<T: Serialize>(value: &T) -> MappingResult<Bson> {
    tracing::warn!(
        target: "docmodel::rules",
        type_name = std::any::type_name::<T>(),
        "Encoding through the structural serializer"
    );

    Ok(serialize_to_bson(value)?)
}

/// Decodes any serde-deserializable value through the generic BSON deserializer.
pub fn structural_decode<T: DeserializeOwned>(value: &Bson) -> MappingResult<T> {
    tracing::warn!(
        target: "docmodel::rules",
        type_name = std::any::type_name::<T>(),
        "Decoding through the structural serializer"
    );

    Ok(deserialize_from_bson(value.clone())?)
}

/// Wraps a serde type so it can be used where a [`FieldValue`] is required.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Structural<T>(pub T);

impl<T: Serialize + DeserializeOwned> FieldValue for Structural<T> {
    fn encode(&self) -> MappingResult<Bson> {
        structural_encode(&self.0)
    }

    fn decode(value: &Bson) -> MappingResult<Self> {
        structural_decode(value).map(Structural)
    }
}

// Binary fields

/// A sequence of one-byte elements that can be stored as BSON binary.
///
/// Fields annotated `#[record(binary)]` must implement this trait; element types
/// wider than one byte have no implementation, so the mistake fails to compile.
pub trait ByteSequence: Sized {
    /// Returns the raw bytes.
    fn to_bytes(&self) -> Vec<u8>;

    /// Reinterprets raw bytes as this sequence.
    ///
    /// # Errors
    ///
    /// Returns [`MappingError::BinaryLength`] if a fixed-size target gets the wrong byte count.
    fn from_bytes(bytes: &[u8]) -> MappingResult<Self>;
}

impl ByteSequence for Vec<u8> {
    fn to_bytes(&self) -> Vec<u8> {
        self.clone()
    }

    fn from_bytes(bytes: &[u8]) -> MappingResult<Self> {
        Ok(bytes.to_vec())
    }
}

impl ByteSequence for Vec<i8> {
    fn to_bytes(&self) -> Vec<u8> {
        self.iter().map(|b| *b as u8).collect()
    }

    fn from_bytes(bytes: &[u8]) -> MappingResult<Self> {
        Ok(bytes.iter().map(|b| *b as i8).collect())
    }
}

impl ByteSequence for Box<[u8]> {
    fn to_bytes(&self) -> Vec<u8> {
        self.to_vec()
    }

    fn from_bytes(bytes: &[u8]) -> MappingResult<Self> {
        Ok(bytes.into())
    }
}

impl<const N: usize> ByteSequence for [u8; N] {
    fn to_bytes(&self) -> Vec<u8> {
        self.to_vec()
    }

    fn from_bytes(bytes: &[u8]) -> MappingResult<Self> {
        bytes
            .try_into()
            .map_err(|_| MappingError::BinaryLength { expected: N, found: bytes.len() })
    }
}

impl<const N: usize> ByteSequence for [i8; N] {
    fn to_bytes(&self) -> Vec<u8> {
        self.iter().map(|b| *b as u8).collect()
    }

    fn from_bytes(bytes: &[u8]) -> MappingResult<Self> {
        let raw = <[u8; N]>::from_bytes(bytes)?;
        Ok(raw.map(|b| b as i8))
    }
}

/// Stores a byte sequence as binary with the given subtype.
pub fn encode_binary<T: ByteSequence>(value: &T, subtype: BinarySubtype) -> Bson {
    Bson::Binary(Binary { subtype, bytes: value.to_bytes() })
}

/// Reads a byte sequence back from a stored binary value.
///
/// # Errors
///
/// Returns a [`MappingError::Mapping`] if the stored value is not binary.
pub fn decode_binary<T: ByteSequence>(value: &Bson) -> MappingResult<T> {
    match value {
        Bson::Binary(binary) => T::from_bytes(&binary.bytes),
        other => Err(MappingError::unexpected("binary", other)),
    }
}
