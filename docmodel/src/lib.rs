//! Typed mapping between Rust records and BSON documents.
//!
//! This crate is the primary entry point of the docmodel framework. It re-exports the
//! runtime from `docmodel-core`, the derives from `docmodel-macros` and the in-memory
//! backend from `docmodel-memory`.
//!
//! # Features
//!
//! - **Records** - `#[derive(Record)]` maps struct fields to document keys, with renames,
//!   ignored fields, custom hooks, binary fields and an `ObjectId` identity
//! - **Type rules** - scalars, sequences, maps, tuples, enumerations, flag sets and BSON
//!   wrapper types each have one fixed representation
//! - **Variants** - `#[derive(Variant)]` stores one-of values as `{"type", "value"}`
//! - **Typed queries** - every record gets a `<Name>Query` builder with one accessor
//!   per field, producing filter documents
//! - **Stores** - collections bound per record type over any [`backend::StoreBackend`]
//!
//! # Quick Start
//!
//! ```ignore
//! use docmodel::{prelude::*, memory::InMemoryStore};
//!
//! #[derive(Debug, Default, Record)]
//! pub struct User {
//!     #[record(id)]
//!     pub id: Option<ObjectId>,
//!     #[record(rename = "n")]
//!     pub name: String,
//!     pub age: i32,
//!     pub tags: Vec<String>,
//! }
//!
//! #[tokio::main]
//! async fn main() -> DocumentStoreResult<()> {
//!     bind::<User>(Binding::new("users").index(IndexSpec::new().ascending("n").unique()));
//!
//!     let store = DocumentStore::new(InMemoryStore::builder().build().await?);
//!     let users = store.typed_collection::<User>()?;
//!     users.ensure_indexes().await?;
//!
//!     let mut user = User { name: "Alice".into(), age: 30, ..Default::default() };
//!     users.save(&mut user).await?;
//!
//!     let adults = users
//!         .find(
//!             and!(
//!                 User::query().build_with(|q| { q.age().greater_or_equal(18); }),
//!                 User::query().build_with(|q| { q.tags().of_length(0); }),
//!             ),
//!             FindOptions::new().sort("n", SortDirection::Asc),
//!         )
//!         .await?;
//!
//!     store.shutdown().await
//! }
//! ```
//!
//! # Backends
//!
//! - [`memory`] - In-memory storage for development and testing

pub mod prelude;

pub use docmodel_core::{backend, binding, collection, error, query, record, rules, store, value, variant};
pub use docmodel_core::{and, nor, or};
pub use docmodel_macros::{Enumeration, Record, Variant};

// Re-export BSON types for convenience
pub use bson;

/// In-memory storage backend implementations.
pub mod memory {
    pub use docmodel_memory::{InMemoryStore, InMemoryStoreBuilder};
}
