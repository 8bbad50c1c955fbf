use std::collections::BTreeMap;

use docmodel::prelude::*;
use docmodel::bson::{Binary, spec::BinarySubtype};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Enumeration)]
enum Status {
    #[default]
    Draft = 0,
    Published = 1,
    Archived = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Enumeration)]
#[repr(i64)]
enum Permission {
    Read = 1,
    Write = 2,
    Admin = 4,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct Geometry {
    kind: String,
    points: Vec<(f64, f64)>,
}

#[derive(Debug, Clone, Default, PartialEq, Record)]
struct Address {
    street: String,
    #[record(rename = "zip")]
    postal_code: String,
}

#[derive(Debug, Clone, Default, PartialEq, Record)]
struct Article {
    #[record(id)]
    id: Option<ObjectId>,
    #[record(rename = "t")]
    title: String,
    views: u64,
    tags: Vec<String>,
    status: Status,
    permissions: Flags<Permission>,
    #[record(binary)]
    digest: [u8; 4],
    #[record(binary = 5)]
    thumbnail: Vec<u8>,
    #[record(structural)]
    shape: Geometry,
    address: Address,
    scores: BTreeMap<String, i32>,
    #[record(ignore)]
    cached_summary: Option<String>,
}

fn sample() -> Article {
    Article {
        title: "Mapping records".into(),
        views: 42,
        tags: vec!["rust".into(), "bson".into()],
        status: Status::Published,
        permissions: Flags::empty() | Permission::Read | Permission::Admin,
        digest: [1, 2, 3, 4],
        thumbnail: vec![9, 9],
        shape: Geometry { kind: "line".into(), points: vec![(0.0, 0.0), (1.0, 1.0)] },
        address: Address { street: "Main St".into(), postal_code: "12345".into() },
        scores: BTreeMap::from([("a".to_string(), 1), ("b".to_string(), 2)]),
        cached_summary: Some("never stored".into()),
        ..Default::default()
    }
}

#[test]
fn test_encodes_every_mapped_field() {
    let document = sample().to_document().unwrap();

    assert_eq!(
        document,
        doc! {
            "t": "Mapping records",
            "views": 42i64,
            "tags": ["rust", "bson"],
            "status": 1,
            "permissions": 5i64,
            "digest": Binary { subtype: BinarySubtype::Generic, bytes: vec![1, 2, 3, 4] },
            "thumbnail": Binary { subtype: BinarySubtype::from(5u8), bytes: vec![9, 9] },
            "shape": { "kind": "line", "points": [[0.0, 0.0], [1.0, 1.0]] },
            "address": { "street": "Main St", "zip": "12345" },
            "scores": { "a": 1, "b": 2 },
        }
    );
}

#[test]
fn test_decode_restores_all_but_ignored_fields() {
    let original = sample();
    let decoded = Article::from_document(&original.to_document().unwrap()).unwrap();

    assert_eq!(decoded.cached_summary, None);
    assert_eq!(decoded, Article { cached_summary: None, ..original });
}

#[test]
fn test_identity_is_written_under_reserved_key() {
    let id = ObjectId::new();
    let article = Article { id: Some(id), ..Default::default() };

    let document = article.to_document().unwrap();
    assert_eq!(document.get_object_id("_id").unwrap(), id);
    assert_eq!(Article::from_document(&document).unwrap().id(), Some(id));
}

#[test]
fn test_absent_keys_keep_defaults() {
    let decoded = Article::from_document(&doc! { "t": "only a title" }).unwrap();

    assert_eq!(decoded.title, "only a title");
    assert_eq!(decoded.views, 0);
    assert_eq!(decoded.status, Status::Draft);
    assert!(decoded.id.is_none());
}

#[test]
fn test_decode_error_names_the_field() {
    let err = Article::from_document(&doc! { "views": "many" }).unwrap_err();

    assert!(matches!(&err, MappingError::Field { field, .. } if field == "views"));
    assert!(matches!(err.root(), MappingError::Mapping(_)));
}

#[test]
fn test_binary_length_mismatch() {
    let document = doc! { "digest": Binary { subtype: BinarySubtype::Generic, bytes: vec![1, 2] } };
    let err = Article::from_document(&document).unwrap_err();

    assert_eq!(err.root(), &MappingError::BinaryLength { expected: 4, found: 2 });
}

#[test]
fn test_unknown_enumeration_value() {
    let err = Article::from_document(&doc! { "status": 7 }).unwrap_err();
    assert!(matches!(&err, MappingError::Field { field, .. } if field == "status"));
}

#[test]
fn test_descriptor_lists_fields_in_order() {
    let descriptor = Article::descriptor();

    assert_eq!(descriptor.type_name, "Article");
    assert_eq!(descriptor.identity, Some("id"));
    assert_eq!(
        descriptor.document_names(),
        vec![
            "_id", "t", "views", "tags", "status", "permissions", "digest", "thumbnail", "shape", "address",
            "scores"
        ]
    );

    let ignored = descriptor.field("cached_summary").unwrap();
    assert!(ignored.ignored);
    assert_eq!(ignored.type_name, "Option<String>");

    let thumbnail = descriptor.field_by_key("thumbnail").unwrap();
    assert_eq!(thumbnail.binary_subtype, Some(5));
    assert!(descriptor.field_by_key("shape").unwrap().structural);
    assert!(descriptor.field_by_key("cached_summary").is_none());
}

fn encode_initials(person: &Person) -> MappingResult<Bson> {
    let initials: String = person.name.split_whitespace().filter_map(|part| part.chars().next()).collect();
    Ok(Bson::String(initials))
}

fn decode_initials(document: &Document) -> MappingResult<String> {
    let initials = document
        .get_str("initials")
        .map_err(|_| MappingError::Mapping("initials must be a string".into()))?;
    Ok(initials.to_lowercase())
}

#[derive(Debug, Default, PartialEq, Record)]
struct Person {
    name: String,
    #[record(encode_with = encode_initials, decode_with = "decode_initials")]
    initials: String,
}

#[test]
fn test_custom_hooks() {
    let person = Person { name: "Ada King Lovelace".into(), initials: String::new() };
    let document = person.to_document().unwrap();
    assert_eq!(document, doc! { "name": "Ada King Lovelace", "initials": "AKL" });

    let decoded = Person::from_document(&document).unwrap();
    assert_eq!(decoded.initials, "akl");

    let descriptor = Person::descriptor();
    let field = descriptor.field("initials").unwrap();
    assert_eq!(field.custom_encode, Some("encode_initials"));
    assert_eq!(field.custom_decode, Some("decode_initials"));
}

#[test]
fn test_nested_record_errors_carry_the_path() {
    let err = Article::from_document(&doc! { "address": { "zip": 12345 } }).unwrap_err();

    match err {
        MappingError::Field { field, source } => {
            assert_eq!(field, "address");
            assert!(matches!(*source, MappingError::Field { ref field, .. } if field == "zip"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_json_views() {
    let address = Address { street: "Elm".into(), postal_code: "999".into() };

    let json = address.to_json().unwrap();
    assert_eq!(json, serde_json::json!({ "street": "Elm", "zip": "999" }));
    assert_eq!(Address::from_json(json).unwrap(), address);
    assert!(Address::from_json(serde_json::json!([1, 2])).is_err());
}

#[test]
fn test_flags_membership() {
    let decoded = Article::from_document(&doc! { "permissions": 3 }).unwrap();

    assert!(decoded.permissions.contains(Permission::Read));
    assert!(decoded.permissions.contains(Permission::Write));
    assert!(!decoded.permissions.contains(Permission::Admin));
}

#[derive(Debug, Default, PartialEq, Record)]
struct Session {
    token: uuid::Uuid,
    opened: Option<chrono::DateTime<chrono::Utc>>,
    touched: DateTimeOrNow,
}

#[test]
fn test_time_and_uuid_fields() {
    let token = uuid::Uuid::new_v4();
    let opened = chrono::DateTime::from_timestamp_millis(1_700_000_000_000).unwrap();
    let session = Session { token, opened: Some(opened), touched: DateTimeOrNow::Now };

    let document = session.to_document().unwrap();
    assert!(matches!(document.get("token"), Some(Bson::Binary(binary)) if binary.subtype == BinarySubtype::Uuid));
    assert!(matches!(document.get("opened"), Some(Bson::DateTime(_))));
    assert!(matches!(document.get("touched"), Some(Bson::DateTime(_))));

    let decoded = Session::from_document(&document).unwrap();
    assert_eq!(decoded.token, token);
    assert_eq!(decoded.opened, Some(opened));
    assert!(decoded.touched.fixed().is_some());
}

#[derive(Debug, Default, PartialEq, Record)]
struct Badge {
    label: String,
    #[record(id)]
    id: Option<ObjectId>,
}

#[test]
fn test_identity_declared_last_is_written_first() {
    let id = ObjectId::new();
    let badge = Badge { label: "gold".into(), id: Some(id) };

    let document = badge.to_document().unwrap();
    assert_eq!(document.keys().collect::<Vec<_>>(), vec!["_id", "label"]);
    assert_eq!(Badge::from_document(&document).unwrap(), badge);
}
