//! Main document store interface.
//!
//! # Example
//!
//! ```ignore
//! use docmodel::store::DocumentStore;
//!
//! let store = DocumentStore::new(backend);
//! let users = store.typed_collection::<User>()?;
//! users.ensure_indexes().await?;
//! ```

use crate::{
    backend::StoreBackend,
    binding::binding_of,
    collection::{Collection, TypedCollection},
    error::DocumentStoreResult,
    record::Record,
};

/// A document store bound to a specific backend implementation.
#[derive(Debug)]
pub struct DocumentStore<B: StoreBackend> {
    backend: B,
}

impl<B: StoreBackend> DocumentStore<B> {
    /// Creates a new document store with the given backend.
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Returns the underlying backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Gets the collection a record type is bound to.
    ///
    /// # Errors
    ///
    /// Returns [`BindingError::Unbound`](crate::error::BindingError::Unbound) if the
    /// type was never bound.
    pub fn typed_collection<R: Record>(&self) -> DocumentStoreResult<TypedCollection<'_, B, R>> {
        Ok(TypedCollection::new(binding_of::<R>()?, &self.backend))
    }

    /// Gets an untyped collection with the given name.
    pub fn collection(&self, name: &str) -> Collection<'_, B> {
        Collection::new(name.to_string(), &self.backend)
    }

    /// Shuts down the store and its backend.
    pub async fn shutdown(self) -> DocumentStoreResult<()> {
        self.backend.shutdown().await
    }
}
