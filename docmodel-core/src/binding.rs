//! Collection bindings for record types.
//!
//! Before a record type can be stored it is bound, once, to a collection name and
//! the indexes that collection should carry. Bindings live in a process-wide
//! registry keyed by the record's [`TypeId`].
//!
//! ```ignore
//! bind::<User>(
//!     Binding::new("users")
//!         .index(IndexSpec::new().ascending("email").unique())
//!         .index(IndexSpec::new().descending("created").ttl(Duration::from_secs(3600))),
//! );
//! ```

use std::{any::TypeId, collections::HashMap, sync::Arc, time::Duration};

use bson::{Bson, Document};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use tracing::debug;

use crate::{
    error::{BindingError, DocumentStoreResult},
    record::Record,
    value::ID_KEY,
};

static REGISTRY: Lazy<RwLock<HashMap<TypeId, Arc<Binding>>>> = Lazy::new(|| RwLock::new(HashMap::new()));

/// Sort direction of one index key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexDirection {
    /// Ascending order.
    Ascending,
    /// Descending order.
    Descending,
}

impl From<IndexDirection> for Bson {
    fn from(direction: IndexDirection) -> Self {
        match direction {
            IndexDirection::Ascending => Bson::Int32(1),
            IndexDirection::Descending => Bson::Int32(-1),
        }
    }
}

/// Options of an index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexFlags {
    /// No two documents may share the indexed key values.
    pub unique: bool,
    /// Documents missing the indexed keys are left out of the index.
    pub sparse: bool,
    /// The index is built without blocking the collection.
    pub background: bool,
}

/// One index over a collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexSpec {
    /// Indexed document keys with their directions, most significant first.
    pub fields: Vec<(String, IndexDirection)>,
    /// Index options.
    pub flags: IndexFlags,
    /// Expiry of documents, measured from the datetime under the first key.
    pub ttl: Option<Duration>,
}

impl IndexSpec {
    /// Creates an index with no keys.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an ascending key.
    pub fn ascending(mut self, key: impl Into<String>) -> Self {
        self.fields.push((key.into(), IndexDirection::Ascending));
        self
    }

    /// Adds a descending key.
    pub fn descending(mut self, key: impl Into<String>) -> Self {
        self.fields.push((key.into(), IndexDirection::Descending));
        self
    }

    /// Makes the index unique.
    pub fn unique(mut self) -> Self {
        self.flags.unique = true;
        self
    }

    /// Leaves documents missing every indexed key out of the index.
    pub fn sparse(mut self) -> Self {
        self.flags.sparse = true;
        self
    }

    /// Builds the index in the background.
    pub fn background(mut self) -> Self {
        self.flags.background = true;
        self
    }

    /// Documents expire this long after the time stored under the indexed key.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// The index keys as a `{key: 1 | -1}` document.
    pub fn keys(&self) -> Document {
        self.fields
            .iter()
            .map(|(key, direction)| (key.clone(), Bson::from(*direction)))
            .collect()
    }
}

/// Where a record type is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    collection: String,
    indexes: Vec<IndexSpec>,
}

impl Binding {
    /// Binds to the named collection, with no indexes.
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            indexes: Vec::new(),
        }
    }

    /// Declares an index on the collection.
    pub fn index(mut self, index: IndexSpec) -> Self {
        self.indexes.push(index);
        self
    }

    /// Name of the bound collection.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Indexes declared on the collection, in declaration order.
    pub fn indexes(&self) -> &[IndexSpec] {
        &self.indexes
    }
}

/// Binds a record type to a collection.
///
/// # Panics
///
/// Panics if the type is already bound or an index names a key the record does not
/// write. Use [`try_bind`] to handle these as errors.
pub fn bind<R: Record>(binding: Binding) {
    if let Err(err) = try_bind::<R>(binding) {
        panic!("{err}");
    }
}

/// Binds a record type to a collection, failing if it is already bound.
///
/// # Errors
///
/// Returns [`BindingError::AlreadyBound`] on a second binding and
/// [`BindingError::UnknownIndexKey`] if an index key is not one of the record's
/// document keys (or `_id`). Nested paths are checked by their first segment.
pub fn try_bind<R: Record>(binding: Binding) -> Result<(), BindingError> {
    let descriptor = R::descriptor();

    for index in &binding.indexes {
        for (key, _) in &index.fields {
            let head = key.split('.').next().unwrap_or(key);
            if head != ID_KEY && descriptor.field_by_key(head).is_none() {
                return Err(BindingError::UnknownIndexKey {
                    record: descriptor.type_name,
                    key: key.clone(),
                });
            }
        }
    }

    let mut registry = REGISTRY.write();
    if let Some(existing) = registry.get(&TypeId::of::<R>()) {
        return Err(BindingError::AlreadyBound {
            record: descriptor.type_name,
            collection: existing.collection.clone(),
        });
    }

    debug!(
        target: "docmodel::binding",
        record = descriptor.type_name,
        collection = %binding.collection,
        indexes = binding.indexes.len(),
        "bound record type"
    );
    registry.insert(TypeId::of::<R>(), Arc::new(binding));

    Ok(())
}

/// Returns the binding of a record type.
///
/// # Errors
///
/// Returns [`BindingError::Unbound`] if the type was never bound.
pub fn binding_of<R: Record>() -> DocumentStoreResult<Arc<Binding>> {
    REGISTRY
        .read()
        .get(&TypeId::of::<R>())
        .cloned()
        .ok_or_else(|| BindingError::Unbound(R::descriptor().type_name).into())
}

/// Whether a record type has been bound.
pub fn is_bound<R: Record>() -> bool {
    REGISTRY.read().contains_key(&TypeId::of::<R>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::{DocumentStoreError, MappingResult},
        query::Query,
        record::{FieldDescriptor, RecordDescriptor, decode_field, encode_field},
    };
    use bson::doc;

    macro_rules! record {
        ($name:ident) => {
            #[derive(Debug, Default)]
            struct $name {
                email: String,
            }

            impl Record for $name {
                type Query = Query<$name>;

                fn descriptor() -> &'static RecordDescriptor {
                    static DESCRIPTOR: RecordDescriptor = RecordDescriptor {
                        type_name: stringify!($name),
                        identity: None,
                        fields: &[FieldDescriptor {
                            source_name: "email",
                            document_name: "email",
                            ignored: false,
                            custom_encode: None,
                            custom_decode: None,
                            binary_subtype: None,
                            structural: false,
                            type_name: "String",
                        }],
                    };
                    &DESCRIPTOR
                }

                fn to_document(&self) -> MappingResult<Document> {
                    let mut document = Document::new();
                    encode_field(&mut document, "email", &self.email)?;
                    Ok(document)
                }

                fn from_document(document: &Document) -> MappingResult<Self> {
                    let mut record = Self::default();
                    decode_field(document, "email", &mut record.email)?;
                    Ok(record)
                }
            }
        };
    }

    record!(Subscriber);
    record!(Visitor);
    record!(Guest);
    record!(Member);

    #[test]
    fn test_bind_once() {
        bind::<Subscriber>(Binding::new("subscribers").index(IndexSpec::new().ascending("email").unique()));

        let binding = binding_of::<Subscriber>().unwrap();
        assert_eq!(binding.collection(), "subscribers");
        assert_eq!(binding.indexes()[0].keys(), doc! { "email": 1 });
        assert!(binding.indexes()[0].flags.unique);

        let err = try_bind::<Subscriber>(Binding::new("other")).unwrap_err();
        assert_eq!(
            err,
            BindingError::AlreadyBound { record: "Subscriber", collection: "subscribers".into() }
        );
    }

    #[test]
    #[should_panic(expected = "already bound")]
    fn test_rebind_panics() {
        bind::<Visitor>(Binding::new("visitors"));
        bind::<Visitor>(Binding::new("visitors"));
    }

    #[test]
    fn test_unbound() {
        assert!(!is_bound::<Guest>());
        assert!(matches!(
            binding_of::<Guest>(),
            Err(DocumentStoreError::Binding(BindingError::Unbound("Guest")))
        ));
    }

    #[test]
    fn test_unknown_index_key() {
        let err = try_bind::<Member>(Binding::new("members").index(IndexSpec::new().ascending("mail"))).unwrap_err();
        assert!(matches!(err, BindingError::UnknownIndexKey { .. }));
        assert!(!is_bound::<Member>());

        try_bind::<Member>(
            Binding::new("members")
                .index(IndexSpec::new().descending("_id"))
                .index(IndexSpec::new().ascending("email.domain").sparse().ttl(Duration::from_secs(60))),
        )
        .unwrap();
        assert!(is_bound::<Member>());
    }
}
