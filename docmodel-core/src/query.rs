//! Typed query construction for document stores.
//!
//! A query expression is an accumulating filter document. For every record type,
//! `#[derive(Record)]` generates a `<Name>Query` builder with one accessor per mapped
//! field; each accessor returns a [`FieldQuery`] whose operators only accept values
//! of the field's declared type (or a [`Raw`] document value).
//!
//! # Query Building
//!
//! ```ignore
//! use docmodel::prelude::*;
//!
//! let adults = User::query().build_with(|q| {
//!     q.age().greater_or_equal(18u32).name().one_of(["Alice", "Bob"]);
//! });
//!
//! let filter = docmodel::or!(adults, User::query().build_with(|q| { q.admin().equals(true); }));
//! ```
//!
//! Operators write one entry under the field's document key. Applying a second
//! operator to the same field overwrites the first (`gte(10)` then `lte(20)` leaves
//! only `{"$lte": 20}`), exactly as assigning the same key twice in a document does.
//!
//! # Logical combinators
//!
//! - [`and`], [`or`], [`nor`] (and the variadic [`and!`](crate::and), [`or!`](crate::or),
//!   [`nor!`](crate::nor) macros) wrap expressions under `$and`/`$or`/`$nor`.
//! - [`not`] takes a `Vec` of expressions and wraps them under `$not`.
//!
//! Values that fail to encode (for example a `u64` above `i64::MAX`) do not panic the
//! chain; the first such error is kept and reported by
//! [`QueryExpression::into_document`].

use bson::{Bson, Document, doc, spec::ElementType};
use std::{
    collections::{BTreeSet, HashSet, VecDeque},
    fmt,
    marker::PhantomData,
};

use crate::{
    error::{MappingError, MappingResult},
    rules::{FieldValue, Flags},
};

/// The untyped state behind every query expression: a filter document plus the
/// first operand encoding error, if any.
pub struct Query<R> {
    document: Document,
    error: Option<MappingError>,
    _record: PhantomData<fn() -> R>,
}

impl<R> Query<R> {
    /// Creates a new empty query matching every document.
    pub fn new() -> Self {
        Self::from_document(Document::new())
    }

    /// Wraps an existing filter document.
    pub fn from_document(document: Document) -> Self {
        Self { document, error: None, _record: PhantomData }
    }

    /// Returns the filter accumulated so far.
    pub fn as_document(&self) -> &Document {
        &self.document
    }

    /// Returns the first operand encoding error, if any.
    pub fn error(&self) -> Option<&MappingError> {
        self.error.as_ref()
    }

    /// Finishes the query.
    ///
    /// # Errors
    ///
    /// Returns the first error met while encoding an operand.
    pub fn into_document(self) -> MappingResult<Document> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.document),
        }
    }

    /// Sets `key` to `value`, replacing any previous entry for that key.
    pub fn set(&mut self, key: &str, value: Bson) {
        self.document.insert(key, value);
    }

    /// Records an operand encoding error; only the first one is kept.
    pub fn fail(&mut self, error: MappingError) {
        self.error.get_or_insert(error);
    }
}

impl<R> Default for Query<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> Clone for Query<R> {
    fn clone(&self) -> Self {
        Self {
            document: self.document.clone(),
            error: self.error.clone(),
            _record: PhantomData,
        }
    }
}

impl<R> PartialEq for Query<R> {
    fn eq(&self, other: &Self) -> bool {
        self.document == other.document && self.error == other.error
    }
}

impl<R> fmt::Debug for Query<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("record", &std::any::type_name::<R>())
            .field("document", &self.document)
            .field("error", &self.error)
            .finish()
    }
}

/// A filter expression over one record type.
///
/// Implemented by [`Query<R>`] and by every generated `<Name>Query` builder.
pub trait QueryExpression: Sized {
    /// The record type this expression filters.
    type Record;

    /// Wraps untyped query state.
    fn from_query(query: Query<Self::Record>) -> Self;

    /// Returns the underlying query state.
    fn query(&self) -> &Query<Self::Record>;

    /// Returns the underlying query state mutably.
    fn query_mut(&mut self) -> &mut Query<Self::Record>;

    /// Unwraps the underlying query state.
    fn into_query(self) -> Query<Self::Record>;

    /// Creates an empty expression.
    fn new() -> Self {
        Self::from_query(Query::new())
    }

    /// Wraps an existing filter document.
    fn from_document(document: Document) -> Self {
        Self::from_query(Query::from_document(document))
    }

    /// Returns the filter accumulated so far.
    fn as_document(&self) -> &Document {
        self.query().as_document()
    }

    /// Finishes the expression.
    ///
    /// # Errors
    ///
    /// Returns the first error met while encoding an operand.
    fn into_document(self) -> MappingResult<Document> {
        self.into_query().into_document()
    }

    /// Applies `build` to this expression and returns it, for one-expression construction.
    fn build_with(mut self, build: impl FnOnce(&mut Self)) -> Self {
        build(&mut self);
        self
    }

    /// Returns an untyped accessor for `key`, for keys without a generated accessor.
    fn field<T>(&mut self, key: impl Into<String>) -> FieldQuery<'_, T, Self> {
        FieldQuery::new(self, key)
    }
}

impl<R> QueryExpression for Query<R> {
    type Record = R;

    fn from_query(query: Query<R>) -> Self {
        query
    }

    fn query(&self) -> &Query<R> {
        self
    }

    fn query_mut(&mut self) -> &mut Query<R> {
        self
    }

    fn into_query(self) -> Query<R> {
        self
    }
}

/// A value accepted as an operand for a field of type `T`.
pub trait Operand<T> {
    /// Encodes the operand.
    ///
    /// # Errors
    ///
    /// Returns a [`MappingError`] if the value cannot be encoded.
    fn into_operand(self) -> MappingResult<Bson>;
}

impl<T: FieldValue> Operand<T> for T {
    fn into_operand(self) -> MappingResult<Bson> {
        self.encode()
    }
}

impl<T: FieldValue> Operand<Option<T>> for T {
    fn into_operand(self) -> MappingResult<Bson> {
        self.encode()
    }
}

impl Operand<String> for &str {
    fn into_operand(self) -> MappingResult<Bson> {
        Ok(Bson::String(self.to_string()))
    }
}

impl Operand<Option<String>> for &str {
    fn into_operand(self) -> MappingResult<Bson> {
        Ok(Bson::String(self.to_string()))
    }
}

/// A document value used verbatim as an operand, whatever the field's type.
#[derive(Debug, Clone, PartialEq)]
pub struct Raw(pub Bson);

impl<T> Operand<T> for Raw {
    fn into_operand(self) -> MappingResult<Bson> {
        Ok(self.0)
    }
}

/// Field types holding a sequence, which gain `$all` and `$size`.
pub trait SequenceField {
    /// The element type of the sequence.
    type Element;
}

impl<T> SequenceField for Vec<T> {
    type Element = T;
}

impl<T> SequenceField for VecDeque<T> {
    type Element = T;
}

impl<T> SequenceField for BTreeSet<T> {
    type Element = T;
}

impl<T> SequenceField for HashSet<T> {
    type Element = T;
}

impl<T, const N: usize> SequenceField for [T; N] {
    type Element = T;
}

impl<S: SequenceField> SequenceField for Option<S> {
    type Element = S::Element;
}

/// Integer field types, which gain the bit-test operators and `$mod`.
pub trait IntegerField {}

impl IntegerField for i8 {}
impl IntegerField for i16 {}
impl IntegerField for i32 {}
impl IntegerField for i64 {}
impl IntegerField for isize {}
impl IntegerField for u8 {}
impl IntegerField for u16 {}
impl IntegerField for u32 {}
impl IntegerField for u64 {}
impl IntegerField for usize {}
impl<E> IntegerField for Flags<E> {}
impl<I: IntegerField> IntegerField for Option<I> {}

/// Text field types, which gain `$regex`.
pub trait TextField {}

impl TextField for String {}
impl TextField for Option<String> {}

/// Operand of the bit-test operators: a numeric mask or a list of bit positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BitMask {
    /// A numeric bitmask.
    Mask(i64),
    /// Zero-based bit positions.
    Positions(Vec<u32>),
}

impl From<i64> for BitMask {
    fn from(mask: i64) -> Self {
        BitMask::Mask(mask)
    }
}

impl From<i32> for BitMask {
    fn from(mask: i32) -> Self {
        BitMask::Mask(i64::from(mask))
    }
}

impl From<Vec<u32>> for BitMask {
    fn from(positions: Vec<u32>) -> Self {
        BitMask::Positions(positions)
    }
}

impl From<&[u32]> for BitMask {
    fn from(positions: &[u32]) -> Self {
        BitMask::Positions(positions.to_vec())
    }
}

impl<const N: usize> From<[u32; N]> for BitMask {
    fn from(positions: [u32; N]) -> Self {
        BitMask::Positions(positions.to_vec())
    }
}

impl From<BitMask> for Bson {
    fn from(mask: BitMask) -> Self {
        match mask {
            BitMask::Mask(mask) => Bson::Int64(mask),
            BitMask::Positions(positions) => Bson::Array(
                positions
                    .into_iter()
                    .map(|position| Bson::Int64(i64::from(position)))
                    .collect(),
            ),
        }
    }
}

/// The operators available on one field of a query expression.
///
/// Every operator writes the field's entry in the parent expression and returns the
/// parent, so calls chain across fields.
pub struct FieldQuery<'q, T, Q> {
    parent: &'q mut Q,
    key: String,
    _field: PhantomData<fn() -> T>,
}

impl<'q, T, Q: QueryExpression> FieldQuery<'q, T, Q> {
    /// Creates an accessor for `key` on `parent`.
    pub fn new(parent: &'q mut Q, key: impl Into<String>) -> Self {
        Self { parent, key: key.into(), _field: PhantomData }
    }

    /// The document key this accessor writes.
    pub fn key(&self) -> &str {
        &self.key
    }

    fn set(self, value: MappingResult<Bson>) -> &'q mut Q {
        let query = self.parent.query_mut();
        match value {
            Ok(value) => query.set(&self.key, value),
            Err(err) => query.fail(err.in_field(self.key)),
        }
        self.parent
    }

    fn set_operator(self, operator: &str, value: MappingResult<Bson>) -> &'q mut Q {
        self.set(value.map(|value| Bson::Document(doc! { operator: value })))
    }

    fn operands<O: Operand<V>, V>(values: impl IntoIterator<Item = O>) -> MappingResult<Bson> {
        values
            .into_iter()
            .map(<O as Operand<V>>::into_operand)
            .collect::<MappingResult<Vec<_>>>()
            .map(Bson::Array)
    }

    /// Matches documents where the field equals `value`.
    pub fn equals(self, value: impl Operand<T>) -> &'q mut Q {
        self.set(value.into_operand())
    }

    /// Matches documents where the field does not equal `value` (`$ne`).
    pub fn not_equals(self, value: impl Operand<T>) -> &'q mut Q {
        self.set_operator("$ne", value.into_operand())
    }

    /// `$gt`
    pub fn greater_than(self, value: impl Operand<T>) -> &'q mut Q {
        self.set_operator("$gt", value.into_operand())
    }

    /// `$gte`
    pub fn greater_or_equal(self, value: impl Operand<T>) -> &'q mut Q {
        self.set_operator("$gte", value.into_operand())
    }

    /// `$lt`
    pub fn less_than(self, value: impl Operand<T>) -> &'q mut Q {
        self.set_operator("$lt", value.into_operand())
    }

    /// `$lte`
    pub fn less_or_equal(self, value: impl Operand<T>) -> &'q mut Q {
        self.set_operator("$lte", value.into_operand())
    }

    /// Short form of [`FieldQuery::equals`].
    pub fn eq(self, value: impl Operand<T>) -> &'q mut Q {
        self.equals(value)
    }

    /// Short form of [`FieldQuery::not_equals`].
    pub fn ne(self, value: impl Operand<T>) -> &'q mut Q {
        self.not_equals(value)
    }

    /// Short form of [`FieldQuery::greater_than`].
    pub fn gt(self, value: impl Operand<T>) -> &'q mut Q {
        self.greater_than(value)
    }

    /// Short form of [`FieldQuery::greater_or_equal`].
    pub fn gte(self, value: impl Operand<T>) -> &'q mut Q {
        self.greater_or_equal(value)
    }

    /// Short form of [`FieldQuery::less_than`].
    pub fn lt(self, value: impl Operand<T>) -> &'q mut Q {
        self.less_than(value)
    }

    /// Short form of [`FieldQuery::less_or_equal`].
    pub fn lte(self, value: impl Operand<T>) -> &'q mut Q {
        self.less_or_equal(value)
    }

    /// Matches documents where the field equals any of `values` (`$in`).
    pub fn one_of<O: Operand<T>>(self, values: impl IntoIterator<Item = O>) -> &'q mut Q {
        self.set_operator("$in", Self::operands::<O, T>(values))
    }

    /// Matches documents where the field equals none of `values` (`$nin`).
    pub fn none_of<O: Operand<T>>(self, values: impl IntoIterator<Item = O>) -> &'q mut Q {
        self.set_operator("$nin", Self::operands::<O, T>(values))
    }

    /// Matches documents where the field is present (or absent) (`$exists`).
    pub fn exists(self, exists: bool) -> &'q mut Q {
        self.set_operator("$exists", Ok(Bson::Boolean(exists)))
    }

    /// Matches documents where the field has the given BSON type (`$type`).
    pub fn type_of(self, element_type: ElementType) -> &'q mut Q {
        self.set_operator("$type", Ok(type_code(element_type)))
    }

    /// Matches documents where the field has any of the given BSON types (`$type`).
    pub fn type_of_any(self, element_types: impl IntoIterator<Item = ElementType>) -> &'q mut Q {
        let codes = element_types.into_iter().map(type_code).collect();
        self.set_operator("$type", Ok(Bson::Array(codes)))
    }
}

fn type_code(element_type: ElementType) -> Bson {
    Bson::Int32(element_type as u8 as i32)
}

impl<'q, T: SequenceField, Q: QueryExpression> FieldQuery<'q, T, Q> {
    /// Matches arrays containing every one of `values` (`$all`).
    pub fn contains_all<O: Operand<T::Element>>(self, values: impl IntoIterator<Item = O>) -> &'q mut Q {
        self.set_operator("$all", Self::operands::<O, T::Element>(values))
    }

    /// Matches arrays with exactly `length` elements (`$size`).
    pub fn of_length(self, length: usize) -> &'q mut Q {
        let length = i64::try_from(length)
            .map(Bson::Int64)
            .map_err(|_| MappingError::Mapping(format!("array length {length} does not fit in int64")));
        self.set_operator("$size", length)
    }
}

impl<'q, T: IntegerField, Q: QueryExpression> FieldQuery<'q, T, Q> {
    /// Matches values where every bit of `mask` is clear (`$bitsAllClear`).
    pub fn bits_all_clear(self, mask: impl Into<BitMask>) -> &'q mut Q {
        self.set_operator("$bitsAllClear", Ok(mask.into().into()))
    }

    /// Matches values where every bit of `mask` is set (`$bitsAllSet`).
    pub fn bits_all_set(self, mask: impl Into<BitMask>) -> &'q mut Q {
        self.set_operator("$bitsAllSet", Ok(mask.into().into()))
    }

    /// Matches values where any bit of `mask` is clear (`$bitsAnyClear`).
    pub fn bits_any_clear(self, mask: impl Into<BitMask>) -> &'q mut Q {
        self.set_operator("$bitsAnyClear", Ok(mask.into().into()))
    }

    /// Matches values where any bit of `mask` is set (`$bitsAnySet`).
    pub fn bits_any_set(self, mask: impl Into<BitMask>) -> &'q mut Q {
        self.set_operator("$bitsAnySet", Ok(mask.into().into()))
    }

    /// Matches values where `value % divisor == remainder` (`$mod`).
    pub fn remainder(self, divisor: i64, remainder: i64) -> &'q mut Q {
        self.set_operator("$mod", Ok(Bson::Array(vec![Bson::Int64(divisor), Bson::Int64(remainder)])))
    }
}

impl<'q, T: TextField, Q: QueryExpression> FieldQuery<'q, T, Q> {
    /// Matches strings against a regular expression (`$regex`, with `$options` when given).
    pub fn regex(self, pattern: &str, options: Option<&str>) -> &'q mut Q {
        let mut condition = doc! { "$regex": pattern };
        if let Some(options) = options {
            condition.insert("$options", options);
        }
        self.set(Ok(Bson::Document(condition)))
    }
}

fn combine<Q: QueryExpression>(operator: &str, exprs: impl IntoIterator<Item = Q>) -> Q {
    let mut documents = Vec::new();
    let mut error = None;

    for expr in exprs {
        match expr.into_document() {
            Ok(document) => documents.push(Bson::Document(document)),
            Err(err) => {
                error.get_or_insert(err);
            }
        }
    }

    let mut query = Query::from_document(doc! { operator: documents });
    if let Some(err) = error {
        query.fail(err);
    }

    Q::from_query(query)
}

/// Matches documents matching every expression (`$and`), in argument order.
pub fn and<Q: QueryExpression>(exprs: impl IntoIterator<Item = Q>) -> Q {
    combine("$and", exprs)
}

/// Matches documents matching any expression (`$or`), in argument order.
pub fn or<Q: QueryExpression>(exprs: impl IntoIterator<Item = Q>) -> Q {
    combine("$or", exprs)
}

/// Matches documents matching none of the expressions (`$nor`), in argument order.
pub fn nor<Q: QueryExpression>(exprs: impl IntoIterator<Item = Q>) -> Q {
    combine("$nor", exprs)
}

/// Wraps a list of expressions under `$not`.
///
/// Unlike [`and`], [`or`] and [`nor`], this takes an explicit `Vec` and has no variadic
/// macro form.
pub fn not<Q: QueryExpression>(exprs: Vec<Q>) -> Q {
    combine("$not", exprs)
}

/// Variadic form of [`and`](crate::query::and).
#[macro_export]
macro_rules! and {
    ($($expr:expr),+ $(,)?) => {
        $crate::query::and([$($expr),+])
    };
}

/// Variadic form of [`or`](crate::query::or).
#[macro_export]
macro_rules! or {
    ($($expr:expr),+ $(,)?) => {
        $crate::query::or([$($expr),+])
    };
}

/// Variadic form of [`nor`](crate::query::nor).
#[macro_export]
macro_rules! nor {
    ($($expr:expr),+ $(,)?) => {
        $crate::query::nor([$($expr),+])
    };
}
