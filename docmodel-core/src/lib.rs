//! Typed mapping between Rust records and BSON documents.
//!
//! This crate is the runtime of the docmodel project and provides:
//!
//! - **Document values** ([`value`]) - The BSON value model and diagnostics helpers
//! - **Type rules** ([`rules`]) - How each field type is encoded and decoded
//! - **Records** ([`record`]) - Field tables and the record mapper used by `#[derive(Record)]`
//! - **Variants** ([`variant`]) - Tagged one-of values used by `#[derive(Variant)]`
//! - **Queries** ([`query`]) - Typed filter-document builders
//! - **Bindings** ([`binding`]) - Collection names and indexes per record type
//! - **Store backend abstraction** ([`backend`]) - The contract a document database fulfils
//! - **Collections** ([`collection`]) and the **document store** ([`store`])
//! - **Error handling** ([`error`])
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
//!     pub name: String,
//!     pub age: i32,
//! }
//!
//! let mut query = User::query();
//! query.age().greater_or_equal(18);
//! assert_eq!(query.into_document()?, doc! { "age": { "$gte": 18 } });
//! ```

pub mod backend;
pub mod binding;
pub mod collection;
pub mod error;
pub mod query;
pub mod record;
pub mod rules;
pub mod store;
pub mod value;
pub mod variant;

pub use bson;
