use docmodel::memory::InMemoryStore;
use docmodel::prelude::*;
use futures::executor::block_on;

#[derive(Debug, Clone, Default, PartialEq, Record)]
struct Customer {
    #[record(id)]
    id: Option<ObjectId>,
    email: String,
    visits: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Record)]
struct Event {
    name: String,
}

#[derive(Debug, Default, Record)]
struct Orphan {
    name: String,
}

async fn customers() -> DocumentStore<InMemoryStore> {
    if !docmodel::binding::is_bound::<Customer>() {
        match try_bind::<Customer>(Binding::new("customers").index(IndexSpec::new().ascending("email").unique())) {
            Ok(()) | Err(BindingError::AlreadyBound { .. }) => {}
            Err(other) => panic!("unexpected binding error: {other}"),
        }
    }

    DocumentStore::new(InMemoryStore::builder().build().await.unwrap())
}

fn by_email(email: &str) -> CustomerQuery {
    Customer::query().build_with(|q| {
        q.email().equals(email);
    })
}

#[test]
fn test_save_assigns_identity_and_finds_by_query() {
    block_on(async {
        let store = customers().await;
        let collection = store.typed_collection::<Customer>().unwrap();
        assert_eq!(collection.name(), "customers");

        let mut customer = Customer { email: "a@example.com".into(), visits: 1, ..Default::default() };
        collection.save(&mut customer).await.unwrap();
        assert!(customer.id.is_some());

        let found = collection.must_find_one(by_email("a@example.com")).await.unwrap();
        assert_eq!(found, customer);
    });
}

#[test]
fn test_save_with_identity_replaces_the_stored_record() {
    block_on(async {
        let store = customers().await;
        let collection = store.typed_collection::<Customer>().unwrap();

        let mut customer = Customer { email: "b@example.com".into(), ..Default::default() };
        collection.save(&mut customer).await.unwrap();
        let id = customer.id;

        customer.visits = 7;
        collection.save(&mut customer).await.unwrap();
        assert_eq!(customer.id, id);

        let all = collection.find(Customer::query(), FindOptions::new()).await.unwrap();
        assert_eq!(all, vec![customer]);
    });
}

#[test]
fn test_must_find_one_reports_not_found() {
    block_on(async {
        let store = customers().await;
        let collection = store.typed_collection::<Customer>().unwrap();

        let err = collection.must_find_one(by_email("nobody@example.com")).await.unwrap_err();
        match err {
            DocumentStoreError::NotFound(filter, name) => {
                assert!(filter.contains("nobody@example.com"));
                assert_eq!(name, "customers");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        assert_eq!(collection.find_one(by_email("nobody@example.com")).await.unwrap(), None);
    });
}

#[test]
fn test_unique_index_rejects_duplicates() {
    block_on(async {
        let store = customers().await;
        let collection = store.typed_collection::<Customer>().unwrap();
        collection.ensure_indexes().await.unwrap();

        let mut first = Customer { email: "dup@example.com".into(), ..Default::default() };
        collection.save(&mut first).await.unwrap();

        let mut second = Customer { email: "dup@example.com".into(), ..Default::default() };
        let err = collection.save(&mut second).await.unwrap_err();
        assert!(matches!(err, DocumentStoreError::DocumentAlreadyExists(..)));
        assert!(second.id.is_none());
    });
}

#[test]
fn test_update_find_and_remove() {
    block_on(async {
        let store = customers().await;
        let collection = store.typed_collection::<Customer>().unwrap();

        for (email, visits) in [("x@example.com", 3), ("y@example.com", 1), ("z@example.com", 2)] {
            let mut customer = Customer { email: email.into(), visits, ..Default::default() };
            collection.save(&mut customer).await.unwrap();
        }

        let result = collection
            .update(
                Customer::query().build_with(|q| {
                    q.visits().less_than(3);
                }),
                doc! { "$inc": { "visits": 10 } },
                UpdateOptions::multi(),
            )
            .await
            .unwrap();
        assert_eq!(result.matched, 2);
        assert_eq!(result.modified, 2);

        let sorted = collection
            .find(Customer::query(), FindOptions::new().sort("visits", SortDirection::Desc).limit(2))
            .await
            .unwrap();
        let visits: Vec<i32> = sorted.iter().map(|customer| customer.visits).collect();
        assert_eq!(visits, vec![12, 11]);

        let removed = collection
            .remove(
                Customer::query().build_with(|q| {
                    q.visits().greater_than(10);
                }),
                RemoveOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(removed, 2);

        let counted = collection
            .aggregate(vec![doc! { "$count": "total" }])
            .await
            .unwrap();
        assert_eq!(counted, vec![doc! { "total": 1i64 }]);
    });
}

#[test]
fn test_records_without_identity_are_always_inserted() {
    bind::<Event>(Binding::new("events"));

    block_on(async {
        let store = DocumentStore::new(InMemoryStore::new());
        let collection = store.typed_collection::<Event>().unwrap();

        let mut event = Event { name: "login".into() };
        collection.save(&mut event).await.unwrap();
        collection.save(&mut event).await.unwrap();

        let stored = collection.untyped().find(doc! {}, FindOptions::new()).await.unwrap();
        assert_eq!(stored.len(), 2);
        assert!(stored.iter().all(|document| document.get_object_id("_id").is_ok()));
        assert!(stored.iter().all(|document| document.keys().next().map(String::as_str) == Some("_id")));
        assert_eq!(store.backend().count("events").await, 2);
    });
}

#[test]
fn test_unbound_record_type() {
    let store = DocumentStore::new(InMemoryStore::new());

    let err = store.typed_collection::<Orphan>().unwrap_err();
    assert!(matches!(err, DocumentStoreError::Binding(BindingError::Unbound("Orphan"))));
}

#[test]
fn test_decode_failure_from_stored_document() {
    block_on(async {
        let store = customers().await;
        store
            .collection("customers")
            .insert(vec![doc! { "email": 5 }])
            .await
            .unwrap();

        let collection = store.typed_collection::<Customer>().unwrap();
        let err = collection.find(Customer::query(), FindOptions::new()).await.unwrap_err();
        assert!(matches!(err, DocumentStoreError::Mapping(_)));
    });
}
