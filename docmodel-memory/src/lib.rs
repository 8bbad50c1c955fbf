//! In-memory document storage backend for docmodel.
//!
//! This crate provides a thread-safe, in-memory implementation of the `StoreBackend`
//! trait that evaluates the filter documents built by typed queries. It is meant for
//! development and tests.
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
//!     pub name: String,
//! }
//!
//! bind::<User>(Binding::new("users"));
//!
//! let store = DocumentStore::new(InMemoryStore::builder().build().await?);
//! let users = store.typed_collection::<User>()?;
//!
//! let mut user = User { name: "Alice".to_string(), ..Default::default() };
//! users.save(&mut user).await?;
//! ```

mod evaluator;
pub mod store;
mod update;

pub use store::{InMemoryStore, InMemoryStoreBuilder};
