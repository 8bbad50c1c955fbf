//! Convenient re-exports of commonly used types from docmodel.
//!
//! ```ignore
//! use docmodel::prelude::*;
//! ```

pub use bson::{Bson, Document, doc, oid::ObjectId};

pub use docmodel_core::{
    backend::{FindOptions, RemoveOptions, Sort, SortDirection, StoreBackend, StoreBackendBuilder, UpdateOptions, UpdateResult},
    binding::{Binding, IndexDirection, IndexFlags, IndexSpec, bind, binding_of, try_bind},
    collection::{Collection, TypedCollection},
    error::{BindingError, DocumentStoreError, DocumentStoreResult, MappingError, MappingResult},
    query::{BitMask, FieldQuery, Query, QueryExpression, Raw},
    record::{Record, RecordExt},
    rules::{DateTimeOrNow, Enumeration, FieldValue, Flags, Structural},
    store::DocumentStore,
    value::Null,
    variant::{Alternative, Variant, VariantExt},
};
pub use docmodel_core::{and, nor, or};
pub use docmodel_macros::{Enumeration, Record, Variant};
