//! Collection handles over a storage backend.
//!
//! - [`Collection`] works on raw documents and filter documents.
//! - [`TypedCollection`] works on a [`Record`] type, mapping records to and from
//!   documents and taking typed queries.
//!
//! # Example
//!
//! ```ignore
//! bind::<User>(Binding::new("users"));
//!
//! let users = store.typed_collection::<User>()?;
//! let mut alice = User { name: "Alice".into(), ..Default::default() };
//! users.save(&mut alice).await?;
//! assert!(alice.id.is_some());
//!
//! let mut query = User::query();
//! query.name().equals("Alice");
//! let found = users.must_find_one(query).await?;
//! ```

use std::{marker::PhantomData, sync::Arc};

use bson::{Document, doc, oid::ObjectId};
use tracing::debug;

use crate::{
    backend::{FindOptions, RemoveOptions, StoreBackend, UpdateOptions, UpdateResult},
    binding::Binding,
    error::{DocumentStoreError, DocumentStoreResult},
    query::QueryExpression,
    record::Record,
    value::ID_KEY,
};

/// Returns `document` with `id` as its first key.
fn with_identity(id: ObjectId, document: Document) -> Document {
    let mut identified = doc! { ID_KEY: id };
    for (key, value) in document {
        if key != ID_KEY {
            identified.insert(key, value);
        }
    }

    identified
}

/// An untyped collection with a reference to a storage backend.
#[derive(Debug)]
pub struct Collection<'a, B: StoreBackend> {
    name: String,
    backend: &'a B,
}

impl<'a, B: StoreBackend> Collection<'a, B> {
    pub(crate) fn new(name: String, backend: &'a B) -> Self {
        Self { name, backend }
    }

    /// Returns the name of this collection.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn find_one(&self, filter: Document) -> DocumentStoreResult<Option<Document>> {
        self.backend.find_one(filter, self.name()).await
    }

    pub async fn find(&self, filter: Document, options: FindOptions) -> DocumentStoreResult<Vec<Document>> {
        self.backend.find(filter, options, self.name()).await
    }

    pub async fn insert(&self, documents: Vec<Document>) -> DocumentStoreResult<()> {
        self.backend.insert(documents, self.name()).await
    }

    pub async fn update(
        &self,
        filter: Document,
        update: Document,
        options: UpdateOptions,
    ) -> DocumentStoreResult<UpdateResult> {
        self.backend
            .update(filter, update, options, self.name())
            .await
    }

    pub async fn remove(&self, filter: Document, options: RemoveOptions) -> DocumentStoreResult<u64> {
        self.backend.remove(filter, options, self.name()).await
    }

    pub async fn aggregate(&self, pipeline: Vec<Document>) -> DocumentStoreResult<Vec<Document>> {
        self.backend.aggregate(pipeline, self.name()).await
    }
}

/// A collection of records of one type, resolved from the type's binding.
#[derive(Debug)]
pub struct TypedCollection<'a, B: StoreBackend, R: Record> {
    binding: Arc<Binding>,
    backend: &'a B,
    _marker: PhantomData<R>,
}

impl<'a, B: StoreBackend, R: Record> TypedCollection<'a, B, R> {
    pub(crate) fn new(binding: Arc<Binding>, backend: &'a B) -> Self {
        Self {
            binding,
            backend,
            _marker: PhantomData,
        }
    }

    /// Returns the name of this collection.
    pub fn name(&self) -> &str {
        self.binding.collection()
    }

    /// Returns the untyped view of this collection.
    pub fn untyped(&self) -> Collection<'a, B> {
        Collection::new(self.name().to_string(), self.backend)
    }

    /// Stores a record.
    ///
    /// A record without an identity is inserted under a freshly generated
    /// [`ObjectId`], which is written back into the record once the insert succeeds.
    /// A record with an identity replaces the stored document with that `_id`, or
    /// is inserted if there is none. Records whose type has no identity field are
    /// always inserted.
    ///
    /// # Errors
    ///
    /// Returns a mapping error if the record cannot be encoded, or the backend's error;
    /// the record is left untouched on failure.
    pub async fn save(&self, record: &mut R) -> DocumentStoreResult<()> {
        let document = record.to_document()?;

        match record.id() {
            Some(id) => {
                let document = with_identity(id, document);
                self.backend
                    .update(doc! { ID_KEY: id }, document, UpdateOptions::upsert(), self.name())
                    .await?;
            }
            None => {
                let id = ObjectId::new();
                let document = with_identity(id, document);
                self.backend.insert(vec![document], self.name()).await?;

                if R::descriptor().identity.is_some() {
                    debug!(
                        target: "docmodel::collection",
                        record = R::descriptor().type_name,
                        collection = self.name(),
                        %id,
                        "assigned identity"
                    );
                    record.set_id(id);
                }
            }
        }

        Ok(())
    }

    /// Returns the first record matching `query`.
    pub async fn find_one(&self, query: R::Query) -> DocumentStoreResult<Option<R>> {
        let filter = query.into_document()?;

        self.backend
            .find_one(filter, self.name())
            .await?
            .map(|document| R::from_document(&document).map_err(Into::into))
            .transpose()
    }

    /// Returns the first record matching `query`, failing if there is none.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::NotFound`] when nothing matches.
    pub async fn must_find_one(&self, query: R::Query) -> DocumentStoreResult<R> {
        let filter = query.into_document()?;
        let description = filter.to_string();

        match self.backend.find_one(filter, self.name()).await? {
            Some(document) => Ok(R::from_document(&document)?),
            None => Err(DocumentStoreError::NotFound(description, self.name().to_string())),
        }
    }

    /// Returns every record matching `query`.
    ///
    /// # Errors
    ///
    /// Fails on the first stored document that does not decode.
    pub async fn find(&self, query: R::Query, options: FindOptions) -> DocumentStoreResult<Vec<R>> {
        let filter = query.into_document()?;

        self.backend
            .find(filter, options, self.name())
            .await?
            .iter()
            .map(|document| R::from_document(document).map_err(Into::into))
            .collect()
    }

    /// Applies an update document to the records matching `query`.
    pub async fn update(
        &self,
        query: R::Query,
        update: Document,
        options: UpdateOptions,
    ) -> DocumentStoreResult<UpdateResult> {
        let filter = query.into_document()?;

        self.backend
            .update(filter, update, options, self.name())
            .await
    }

    /// Removes the records matching `query` and returns how many were removed.
    pub async fn remove(&self, query: R::Query, options: RemoveOptions) -> DocumentStoreResult<u64> {
        let filter = query.into_document()?;

        self.backend.remove(filter, options, self.name()).await
    }

    /// Creates every index declared in the type's binding.
    pub async fn ensure_indexes(&self) -> DocumentStoreResult<()> {
        for index in self.binding.indexes() {
            self.backend
                .ensure_index(index.keys(), index.flags, index.ttl, self.name())
                .await?;
        }

        Ok(())
    }

    /// Runs an aggregation pipeline over this collection.
    ///
    /// Pipeline output is not necessarily shaped like `R`, so raw documents are returned.
    pub async fn aggregate(&self, pipeline: Vec<Document>) -> DocumentStoreResult<Vec<Document>> {
        self.backend.aggregate(pipeline, self.name()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_identity_puts_id_first() {
        let id = ObjectId::new();
        let stale = ObjectId::new();

        let document = with_identity(id, doc! { "name": "a", "_id": stale, "n": 1 });
        assert_eq!(document.keys().collect::<Vec<_>>(), vec!["_id", "name", "n"]);
        assert_eq!(document.get_object_id(ID_KEY).unwrap(), id);
    }
}
