//! In-memory storage implementation for document stores.
//!
//! Collections are kept as insertion-ordered vectors of documents behind an
//! async-safe read-write lock, next to the indexes declared on them.

use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use bson::{Bson, DateTime, Document, oid::ObjectId};
use mea::rwlock::RwLock;
use tracing::debug;

use docmodel_core::{
    backend::{FindOptions, RemoveOptions, StoreBackend, StoreBackendBuilder, UpdateOptions, UpdateResult},
    binding::IndexFlags,
    error::{DocumentStoreError, DocumentStoreResult},
    value::ID_KEY,
};

use crate::{
    evaluator::{compare_by, lookup, matches, same_value},
    update::Update,
};

#[derive(Debug, Clone, PartialEq)]
struct Index {
    keys: Document,
    flags: IndexFlags,
    ttl: Option<Duration>,
}

impl Index {
    fn key_values<'d>(&self, document: &'d Document) -> Vec<Option<&'d Bson>> {
        self.keys.keys().map(|key| lookup(document, key)).collect()
    }

    /// Whether two documents collide under this index.
    fn collides(&self, left: &Document, right: &Document) -> bool {
        if !self.flags.unique {
            return false;
        }

        let left = self.key_values(left);
        let right = self.key_values(right);

        if self.flags.sparse && (left.iter().all(Option::is_none) || right.iter().all(Option::is_none)) {
            return false;
        }

        left.iter().zip(&right).all(|(left, right)| same_value(*left, *right))
    }

    /// Whether a TTL index has expired the document at `now`.
    fn expired(&self, document: &Document, now: DateTime) -> bool {
        let Some(ttl) = self.ttl else {
            return false;
        };

        self.keys.keys().next().and_then(|key| lookup(document, key)).is_some_and(|value| match value {
            Bson::DateTime(stamp) => {
                let ttl = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
                stamp.timestamp_millis().saturating_add(ttl) <= now.timestamp_millis()
            }
            _ => false,
        })
    }
}

#[derive(Debug, Default)]
struct CollectionState {
    documents: Vec<Document>,
    indexes: Vec<Index>,
}

impl CollectionState {
    fn is_live(&self, document: &Document, now: DateTime) -> bool {
        !self.indexes.iter().any(|index| index.expired(document, now))
    }

    fn live(&self) -> impl Iterator<Item = &Document> {
        let now = DateTime::now();
        self.documents.iter().filter(move |document| self.is_live(document, now))
    }

    fn purge_expired(&mut self) {
        let now = DateTime::now();
        let indexes = &self.indexes;
        self.documents
            .retain(|document| !indexes.iter().any(|index| index.expired(document, now)));
    }

    /// Checks `candidate` against every stored document except the one at `skip`.
    fn check_conflicts(&self, candidate: &Document, skip: Option<usize>, collection: &str) -> DocumentStoreResult<()> {
        for (position, existing) in self.documents.iter().enumerate() {
            if Some(position) == skip {
                continue;
            }

            if same_value(existing.get(ID_KEY), candidate.get(ID_KEY)) {
                return Err(DocumentStoreError::DocumentAlreadyExists(
                    describe_id(candidate),
                    collection.to_string(),
                ));
            }

            if let Some(index) = self.indexes.iter().find(|index| index.collides(existing, candidate)) {
                return Err(DocumentStoreError::DocumentAlreadyExists(
                    format!("{} (unique index {})", describe_id(candidate), index.keys),
                    collection.to_string(),
                ));
            }
        }

        Ok(())
    }

    fn positions_matching(&self, filter: &Document) -> DocumentStoreResult<Vec<usize>> {
        let now = DateTime::now();
        let mut positions = Vec::new();

        for (position, document) in self.documents.iter().enumerate() {
            if self.is_live(document, now) && matches(document, filter)? {
                positions.push(position);
            }
        }

        Ok(positions)
    }
}

fn describe_id(document: &Document) -> String {
    document
        .get(ID_KEY)
        .map(ToString::to_string)
        .unwrap_or_else(|| "<no _id>".to_string())
}

fn with_identity(mut document: Document) -> Document {
    if !document.contains_key(ID_KEY) {
        let mut identified = Document::new();
        identified.insert(ID_KEY, ObjectId::new());
        for (key, value) in document {
            identified.insert(key, value);
        }
        document = identified;
    }

    document
}

type StoreMap = HashMap<String, CollectionState>;

/// Thread-safe in-memory document storage backend.
///
/// `InMemoryStore` is cloneable and uses an `Arc`-wrapped internal state; clones
/// share the same underlying data. Queries scan every document of a collection.
///
/// Filters support the full comparison, membership, array, bitwise and logical
/// operator set except `$regex`, which is reported as a backend error. Unique
/// indexes are enforced on insert and update; TTL indexes hide expired documents
/// and drop them on the next write.
///
/// # Example
///
/// ```ignore
/// use docmodel_memory::InMemoryStore;
/// use docmodel::backend::{FindOptions, StoreBackend};
/// use bson::doc;
///
/// let store = InMemoryStore::new();
/// store.insert(vec![doc! { "name": "Alice", "age": 30 }], "users").await?;
///
/// let found = store.find(doc! { "age": { "$gt": 18 } }, FindOptions::default(), "users").await?;
/// assert_eq!(found.len(), 1);
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    store: Arc<RwLock<StoreMap>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory document store.
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(StoreMap::new())),
        }
    }

    /// Creates a builder for constructing an `InMemoryStore`.
    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }

    /// Lists the names of the collections that have been written to.
    pub async fn collections(&self) -> Vec<String> {
        let mut names = self.store.read().await.keys().cloned().collect::<Vec<_>>();
        names.sort();
        names
    }

    /// Number of live documents in a collection.
    pub async fn count(&self, collection: &str) -> usize {
        self.store
            .read()
            .await
            .get(collection)
            .map_or(0, |state| state.live().count())
    }

    async fn select(&self, filter: &Document, options: &FindOptions, collection: &str) -> DocumentStoreResult<Vec<Document>> {
        let store = self.store.read().await;
        let Some(state) = store.get(collection) else {
            return Ok(vec![]);
        };

        let mut selected = Vec::new();
        for document in state.live() {
            if matches(document, filter)? {
                selected.push(document.clone());
            }
        }

        if !options.sort.is_empty() {
            let sort = options.sort_document();
            selected.sort_by(|left, right| compare_by(left, right, &sort));
        }

        Ok(selected
            .into_iter()
            .skip(options.skip.unwrap_or(0) as usize)
            .take(options.limit.map_or(usize::MAX, |limit| limit as usize))
            .collect())
    }
}

#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn find_one(&self, filter: Document, collection: &str) -> DocumentStoreResult<Option<Document>> {
        let mut found = self
            .select(&filter, &FindOptions::new().limit(1), collection)
            .await?;

        Ok(found.pop())
    }

    async fn find(
        &self,
        filter: Document,
        options: FindOptions,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Document>> {
        self.select(&filter, &options, collection).await
    }

    async fn insert(&self, documents: Vec<Document>, collection: &str) -> DocumentStoreResult<()> {
        let mut store = self.store.write().await;
        let state = store.entry(collection.to_string()).or_default();
        state.purge_expired();

        let documents = documents.into_iter().map(with_identity).collect::<Vec<_>>();

        // Validate the whole batch before writing any of it.
        for (position, document) in documents.iter().enumerate() {
            state.check_conflicts(document, None, collection)?;

            let earlier = &documents[..position];
            if earlier.iter().any(|other| {
                same_value(other.get(ID_KEY), document.get(ID_KEY))
                    || state.indexes.iter().any(|index| index.collides(other, document))
            }) {
                return Err(DocumentStoreError::DocumentAlreadyExists(
                    describe_id(document),
                    collection.to_string(),
                ));
            }
        }

        debug!(target: "docmodel::memory", collection, count = documents.len(), "inserting documents");
        state.documents.extend(documents);

        Ok(())
    }

    async fn update(
        &self,
        filter: Document,
        update: Document,
        options: UpdateOptions,
        collection: &str,
    ) -> DocumentStoreResult<UpdateResult> {
        let update = Update::parse(&update)?;

        let mut store = self.store.write().await;
        let state = store.entry(collection.to_string()).or_default();
        state.purge_expired();

        let mut positions = state.positions_matching(&filter)?;
        if !options.multi {
            positions.truncate(1);
        }

        if positions.is_empty() {
            if !options.upsert {
                return Ok(UpdateResult::default());
            }

            let inserted = with_identity(update.seed(&filter)?);
            state.check_conflicts(&inserted, None, collection)?;

            let upserted_id = inserted.get(ID_KEY).cloned();
            state.documents.push(inserted);

            return Ok(UpdateResult {
                matched: 0,
                modified: 0,
                upserted_id,
            });
        }

        let mut result = UpdateResult {
            matched: positions.len() as u64,
            ..UpdateResult::default()
        };

        for position in positions {
            let mut updated = state.documents[position].clone();
            update.apply(&mut updated)?;
            state.check_conflicts(&updated, Some(position), collection)?;

            if updated != state.documents[position] {
                state.documents[position] = updated;
                result.modified += 1;
            }
        }

        Ok(result)
    }

    async fn remove(&self, filter: Document, options: RemoveOptions, collection: &str) -> DocumentStoreResult<u64> {
        let mut store = self.store.write().await;
        let Some(state) = store.get_mut(collection) else {
            return Ok(0);
        };
        state.purge_expired();

        let mut positions = state.positions_matching(&filter)?;
        if options.single {
            positions.truncate(1);
        }

        for position in positions.iter().rev() {
            state.documents.remove(*position);
        }

        Ok(positions.len() as u64)
    }

    async fn ensure_index(
        &self,
        keys: Document,
        flags: IndexFlags,
        ttl: Option<Duration>,
        collection: &str,
    ) -> DocumentStoreResult<()> {
        if keys.is_empty() {
            return Err(DocumentStoreError::Backend("in-memory store: an index needs at least one key".into()));
        }

        let mut store = self.store.write().await;
        let state = store.entry(collection.to_string()).or_default();

        if state.indexes.iter().any(|index| index.keys == keys) {
            return Ok(());
        }

        let index = Index { keys, flags, ttl };
        for (position, document) in state.documents.iter().enumerate() {
            if state.documents[position + 1..].iter().any(|other| index.collides(document, other)) {
                return Err(DocumentStoreError::DocumentAlreadyExists(
                    format!("{} (unique index {})", describe_id(document), index.keys),
                    collection.to_string(),
                ));
            }
        }

        debug!(target: "docmodel::memory", collection, keys = %index.keys, unique = flags.unique, "created index");
        state.indexes.push(index);

        Ok(())
    }

    async fn aggregate(&self, pipeline: Vec<Document>, collection: &str) -> DocumentStoreResult<Vec<Document>> {
        let mut documents = {
            let store = self.store.read().await;
            store
                .get(collection)
                .map(|state| state.live().cloned().collect::<Vec<_>>())
                .unwrap_or_default()
        };

        for stage in &pipeline {
            let mut entries = stage.iter();
            let (Some((name, argument)), None) = (entries.next(), entries.next()) else {
                return Err(DocumentStoreError::Backend(
                    "in-memory store: a pipeline stage needs exactly one key".into(),
                ));
            };

            documents = match (name.as_str(), argument) {
                ("$match", Bson::Document(filter)) => {
                    let mut kept = Vec::with_capacity(documents.len());
                    for document in documents {
                        if matches(&document, filter)? {
                            kept.push(document);
                        }
                    }
                    kept
                }
                ("$sort", Bson::Document(sort)) => {
                    documents.sort_by(|left, right| compare_by(left, right, sort));
                    documents
                }
                ("$skip", count) => {
                    let count = stage_count(name, count)?;
                    documents.into_iter().skip(count).collect()
                }
                ("$limit", count) => {
                    let count = stage_count(name, count)?;
                    documents.into_iter().take(count).collect()
                }
                ("$count", Bson::String(field)) => {
                    let mut counted = Document::new();
                    counted.insert(field.clone(), documents.len() as i64);
                    vec![counted]
                }
                (other, _) => {
                    return Err(DocumentStoreError::Backend(format!(
                        "in-memory store: unsupported pipeline stage {other}"
                    )));
                }
            };
        }

        Ok(documents)
    }
}

fn stage_count(stage: &str, count: &Bson) -> DocumentStoreResult<usize> {
    let count = match count {
        Bson::Int32(count) => *count as i64,
        Bson::Int64(count) => *count,
        _ => -1,
    };

    usize::try_from(count).map_err(|_| DocumentStoreError::Backend(format!("in-memory store: {stage} needs a non-negative integer")))
}

/// Builder for constructing [`InMemoryStore`] instances.
///
/// Collections can be seeded with documents before the store is handed out.
#[derive(Debug, Default)]
pub struct InMemoryStoreBuilder {
    seed: Vec<(String, Vec<Document>)>,
}

impl InMemoryStoreBuilder {
    /// Adds documents to a collection of the built store.
    pub fn with_documents(mut self, collection: impl Into<String>, documents: Vec<Document>) -> Self {
        self.seed.push((collection.into(), documents));
        self
    }
}

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        let store = InMemoryStore::new();

        for (collection, documents) in self.seed {
            store.insert(documents, &collection).await?;
        }

        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use docmodel_core::backend::SortDirection;
    use futures::executor::block_on;

    fn people() -> Vec<Document> {
        vec![
            doc! { "name": "Alice", "age": 30 },
            doc! { "name": "Bob", "age": 25 },
            doc! { "name": "Carol", "age": 35 },
        ]
    }

    #[test]
    fn test_insert_assigns_identity() {
        block_on(async {
            let store = InMemoryStore::new();
            store.insert(people(), "people").await.unwrap();

            let alice = store.find_one(doc! { "name": "Alice" }, "people").await.unwrap().unwrap();
            assert!(matches!(alice.get(ID_KEY), Some(Bson::ObjectId(_))));
            assert_eq!(alice.keys().next().map(String::as_str), Some(ID_KEY));
            assert_eq!(store.count("people").await, 3);
            assert_eq!(store.collections().await, vec!["people".to_string()]);
        });
    }

    #[test]
    fn test_duplicate_id_rejects_whole_batch() {
        block_on(async {
            let store = InMemoryStore::new();
            let id = ObjectId::new();
            store.insert(vec![doc! { "_id": id }], "things").await.unwrap();

            let err = store
                .insert(vec![doc! { "name": "fresh" }, doc! { "_id": id }], "things")
                .await
                .unwrap_err();
            assert!(matches!(err, DocumentStoreError::DocumentAlreadyExists(_, _)));
            assert_eq!(store.count("things").await, 1);
        });
    }

    #[test]
    fn test_find_sort_skip_limit() {
        block_on(async {
            let store = InMemoryStore::builder()
                .with_documents("people", people())
                .build()
                .await
                .unwrap();

            let options = FindOptions::new()
                .sort("age", SortDirection::Desc)
                .skip(1)
                .limit(1);
            let found = store.find(doc! {}, options, "people").await.unwrap();

            assert_eq!(found.len(), 1);
            assert_eq!(found[0].get_str("name").unwrap(), "Alice");
        });
    }

    #[test]
    fn test_update_operators_and_multi() {
        block_on(async {
            let store = InMemoryStore::new();
            store.insert(people(), "people").await.unwrap();

            let single = store
                .update(doc! { "age": { "$gte": 30 } }, doc! { "$inc": { "age": 1 } }, UpdateOptions::default(), "people")
                .await
                .unwrap();
            assert_eq!((single.matched, single.modified), (1, 1));

            let multi = store
                .update(doc! {}, doc! { "$set": { "active": true } }, UpdateOptions::multi(), "people")
                .await
                .unwrap();
            assert_eq!((multi.matched, multi.modified), (3, 3));

            let alice = store.find_one(doc! { "name": "Alice" }, "people").await.unwrap().unwrap();
            assert_eq!(alice.get_i32("age").unwrap(), 31);
            assert!(alice.get_bool("active").unwrap());
        });
    }

    #[test]
    fn test_upsert() {
        block_on(async {
            let store = InMemoryStore::new();
            let id = ObjectId::new();

            let result = store
                .update(doc! { "_id": id }, doc! { "name": "Dave" }, UpdateOptions::upsert(), "people")
                .await
                .unwrap();
            assert_eq!(result.upserted_id, Some(Bson::ObjectId(id)));

            let result = store
                .update(doc! { "_id": id }, doc! { "name": "David" }, UpdateOptions::upsert(), "people")
                .await
                .unwrap();
            assert_eq!((result.matched, result.upserted_id), (1, None));

            let stored = store.find(doc! {}, FindOptions::default(), "people").await.unwrap();
            assert_eq!(stored, vec![doc! { "_id": id, "name": "David" }]);
        });
    }

    #[test]
    fn test_remove() {
        block_on(async {
            let store = InMemoryStore::new();
            store.insert(people(), "people").await.unwrap();

            let removed = store
                .remove(doc! { "age": { "$lt": 40 } }, RemoveOptions::single(), "people")
                .await
                .unwrap();
            assert_eq!(removed, 1);

            let removed = store.remove(doc! {}, RemoveOptions::default(), "people").await.unwrap();
            assert_eq!(removed, 2);
            assert_eq!(store.remove(doc! {}, RemoveOptions::default(), "missing").await.unwrap(), 0);
        });
    }

    #[test]
    fn test_unique_index() {
        block_on(async {
            let store = InMemoryStore::new();
            store.insert(people(), "people").await.unwrap();

            let unique = IndexFlags { unique: true, ..IndexFlags::default() };
            store.ensure_index(doc! { "name": 1 }, unique, None, "people").await.unwrap();
            store.ensure_index(doc! { "name": 1 }, unique, None, "people").await.unwrap();

            let err = store.insert(vec![doc! { "name": "Bob" }], "people").await.unwrap_err();
            assert!(matches!(err, DocumentStoreError::DocumentAlreadyExists(_, _)));

            let err = store
                .update(doc! { "name": "Carol" }, doc! { "$set": { "name": "Alice" } }, UpdateOptions::default(), "people")
                .await
                .unwrap_err();
            assert!(matches!(err, DocumentStoreError::DocumentAlreadyExists(_, _)));

            let err = store
                .ensure_index(doc! { "flag": 1 }, unique, None, "people")
                .await
                .unwrap_err();
            assert!(matches!(err, DocumentStoreError::DocumentAlreadyExists(_, _)));

            let sparse = IndexFlags { unique: true, sparse: true, ..IndexFlags::default() };
            store.ensure_index(doc! { "flag": 1 }, sparse, None, "people").await.unwrap();
        });
    }

    #[test]
    fn test_ttl_index_hides_expired() {
        block_on(async {
            let store = InMemoryStore::new();
            let old = DateTime::from_millis(DateTime::now().timestamp_millis() - 10_000);
            store
                .insert(vec![doc! { "at": old }, doc! { "at": DateTime::now() }], "events")
                .await
                .unwrap();

            store
                .ensure_index(doc! { "at": 1 }, IndexFlags::default(), Some(Duration::from_secs(5)), "events")
                .await
                .unwrap();

            assert_eq!(store.count("events").await, 1);
        });
    }

    #[test]
    fn test_huge_ttl_never_expires() {
        let index = Index {
            keys: doc! { "at": 1 },
            flags: IndexFlags::default(),
            ttl: Some(Duration::MAX),
        };
        let document = doc! { "at": DateTime::from_millis(0) };

        assert!(!index.expired(&document, DateTime::now()));
        assert!(!index.expired(&doc! { "at": DateTime::MAX }, DateTime::now()));
    }

    #[test]
    fn test_aggregate() {
        block_on(async {
            let store = InMemoryStore::new();
            store.insert(people(), "people").await.unwrap();

            let pipeline = vec![
                doc! { "$match": { "age": { "$gt": 26 } } },
                doc! { "$sort": { "age": 1 } },
                doc! { "$limit": 1 },
            ];
            let result = store.aggregate(pipeline, "people").await.unwrap();
            assert_eq!(result.len(), 1);
            assert_eq!(result[0].get_str("name").unwrap(), "Alice");

            let counted = store
                .aggregate(vec![doc! { "$count": "total" }], "people")
                .await
                .unwrap();
            assert_eq!(counted, vec![doc! { "total": 3_i64 }]);

            let err = store
                .aggregate(vec![doc! { "$group": { "_id": "$age" } }], "people")
                .await
                .unwrap_err();
            assert!(matches!(err, DocumentStoreError::Backend(_)));
        });
    }

    #[test]
    fn test_regex_is_a_backend_error() {
        block_on(async {
            let store = InMemoryStore::new();
            store.insert(people(), "people").await.unwrap();

            let err = store
                .find(doc! { "name": { "$regex": "^A" } }, FindOptions::default(), "people")
                .await
                .unwrap_err();
            assert!(matches!(err, DocumentStoreError::Backend(_)));
        });
    }
}
