//! Storage backend abstraction for the document store.
//!
//! The [`StoreBackend`] trait is the contract the mapping layer expects from a
//! document database: filter-document lookups, inserts, updates, removals, index
//! management and aggregation pipelines. Filters and updates are plain
//! [`Document`]s, normally produced by a typed query builder.
//!
//! # Examples
//!
//! ```ignore
//! use docmodel::backend::{FindOptions, SortDirection, StoreBackend};
//! use bson::doc;
//!
//! let backend = MyBackendImpl::new();
//! backend.insert(vec![doc! { "name": "Alice", "age": 30 }], "users").await?;
//!
//! let adults = backend
//!     .find(doc! { "age": { "$gte": 18 } }, FindOptions::new().sort("age", SortDirection::Desc), "users")
//!     .await?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::{fmt::Debug, time::Duration};

use async_trait::async_trait;
use bson::{Bson, Document};

use crate::{binding::IndexFlags, error::DocumentStoreResult};

/// Sort direction for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Ascending order (A to Z, 0 to 9, earliest to latest).
    Asc,
    /// Descending order (Z to A, 9 to 0, latest to earliest).
    Desc,
}

/// Sort specification for query results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    /// The document key to sort by.
    pub field: String,
    /// The sort direction.
    pub direction: SortDirection,
}

/// Options for [`StoreBackend::find`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FindOptions {
    /// Sort keys, most significant first.
    pub sort: Vec<Sort>,
    /// Number of matching documents to skip.
    pub skip: Option<u64>,
    /// Maximum number of documents to return.
    pub limit: Option<u64>,
}

impl FindOptions {
    /// Options returning every match in store order.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a sort key after the existing ones.
    pub fn sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.sort.push(Sort {
            field: field.into(),
            direction,
        });
        self
    }

    /// Skips the first `skip` matches.
    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    /// Returns at most `limit` matches.
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// The sort keys as a `{key: 1 | -1}` document.
    pub fn sort_document(&self) -> Document {
        self.sort
            .iter()
            .map(|sort| {
                let direction = match sort.direction {
                    SortDirection::Asc => 1,
                    SortDirection::Desc => -1,
                };
                (sort.field.clone(), Bson::Int32(direction))
            })
            .collect()
    }
}

/// Options for [`StoreBackend::update`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOptions {
    /// Insert a document when nothing matches the filter.
    pub upsert: bool,
    /// Update every matching document instead of the first.
    pub multi: bool,
}

impl UpdateOptions {
    /// Update the first match, inserting when nothing matches.
    pub fn upsert() -> Self {
        Self { upsert: true, multi: false }
    }

    /// Update every match.
    pub fn multi() -> Self {
        Self { upsert: false, multi: true }
    }
}

/// Outcome of [`StoreBackend::update`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateResult {
    /// Documents matching the filter.
    pub matched: u64,
    /// Documents actually changed.
    pub modified: u64,
    /// Identity of the inserted document when the update turned into an insert.
    pub upserted_id: Option<Bson>,
}

/// Options for [`StoreBackend::remove`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemoveOptions {
    /// Remove only the first matching document.
    pub single: bool,
}

impl RemoveOptions {
    /// Remove only the first match.
    pub fn single() -> Self {
        Self { single: true }
    }
}

/// Abstract interface for document storage backends.
///
/// Implementations must be thread-safe and support concurrent access from multiple
/// async tasks. Documents are identified by their `_id` key; backends that assign
/// identities do so only when the inserted document has none.
///
/// Filters use the query operator vocabulary (`$eq`, `$in`, `$and`, ...). A backend
/// that cannot evaluate an operator returns
/// [`DocumentStoreError::Backend`](crate::error::DocumentStoreError::Backend).
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Returns the first document matching `filter`.
    async fn find_one(&self, filter: Document, collection: &str) -> DocumentStoreResult<Option<Document>>;

    /// Returns every document matching `filter`, shaped by `options`.
    async fn find(
        &self,
        filter: Document,
        options: FindOptions,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Document>>;

    /// Inserts new documents into a collection, creating the collection if needed.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::DocumentAlreadyExists`](crate::error::DocumentStoreError::DocumentAlreadyExists)
    /// if a document collides with an existing `_id` or unique index.
    async fn insert(&self, documents: Vec<Document>, collection: &str) -> DocumentStoreResult<()>;

    /// Updates documents matching `filter`.
    ///
    /// `update` is either an operator document (`$set`, `$unset`, `$inc`) or a full
    /// replacement document. A replacement keeps the stored `_id`.
    async fn update(
        &self,
        filter: Document,
        update: Document,
        options: UpdateOptions,
        collection: &str,
    ) -> DocumentStoreResult<UpdateResult>;

    /// Removes documents matching `filter` and returns how many were removed.
    async fn remove(&self, filter: Document, options: RemoveOptions, collection: &str) -> DocumentStoreResult<u64>;

    /// Creates an index over `keys` (a `{key: 1 | -1}` document) if it does not exist.
    ///
    /// # Errors
    ///
    /// A unique index over keys that existing documents already violate is an error.
    async fn ensure_index(
        &self,
        keys: Document,
        flags: IndexFlags,
        ttl: Option<Duration>,
        collection: &str,
    ) -> DocumentStoreResult<()>;

    /// Runs an aggregation pipeline over a collection.
    async fn aggregate(&self, pipeline: Vec<Document>, collection: &str) -> DocumentStoreResult<Vec<Document>>;

    /// Cleanly shuts down the backend, releasing all resources.
    ///
    /// The default implementation is a no-op.
    async fn shutdown(self) -> DocumentStoreResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

#[async_trait]
impl<B> StoreBackend for &B
where
    B: StoreBackend,
{
    async fn find_one(&self, filter: Document, collection: &str) -> DocumentStoreResult<Option<Document>> {
        (*self).find_one(filter, collection).await
    }

    async fn find(
        &self,
        filter: Document,
        options: FindOptions,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Document>> {
        (*self).find(filter, options, collection).await
    }

    async fn insert(&self, documents: Vec<Document>, collection: &str) -> DocumentStoreResult<()> {
        (*self).insert(documents, collection).await
    }

    async fn update(
        &self,
        filter: Document,
        update: Document,
        options: UpdateOptions,
        collection: &str,
    ) -> DocumentStoreResult<UpdateResult> {
        (*self)
            .update(filter, update, options, collection)
            .await
    }

    async fn remove(&self, filter: Document, options: RemoveOptions, collection: &str) -> DocumentStoreResult<u64> {
        (*self).remove(filter, options, collection).await
    }

    async fn ensure_index(
        &self,
        keys: Document,
        flags: IndexFlags,
        ttl: Option<Duration>,
        collection: &str,
    ) -> DocumentStoreResult<()> {
        (*self)
            .ensure_index(keys, flags, ttl, collection)
            .await
    }

    async fn aggregate(&self, pipeline: Vec<Document>, collection: &str) -> DocumentStoreResult<Vec<Document>> {
        (*self).aggregate(pipeline, collection).await
    }
}

/// Factory for backends that need asynchronous setup.
#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> DocumentStoreResult<Self::Backend>;
}
