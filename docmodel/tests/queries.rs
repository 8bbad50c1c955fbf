use docmodel::prelude::*;
use docmodel::query::not;

#[derive(Debug, Clone, Copy, Default, PartialEq, Enumeration)]
pub enum Tier {
    #[default]
    Free = 0,
    Pro = 1,
}

#[derive(Debug, Default, Record)]
pub struct Account {
    #[record(id)]
    pub id: Option<ObjectId>,
    #[record(rename = "n")]
    pub name: String,
    pub age: u32,
    pub tier: Tier,
    pub roles: Vec<String>,
    pub mask: i64,
    pub nickname: Option<String>,
    #[record(ignore)]
    pub session: Option<String>,
}

#[test]
fn test_accessors_use_document_keys() {
    let query = Account::query().build_with(|q| {
        q.name().equals("alice").age().greater_or_equal(18u32).tier().equals(Tier::Pro);
    });

    assert_eq!(
        query.into_document().unwrap(),
        doc! { "n": "alice", "age": { "$gte": 18i64 }, "tier": 1 }
    );
}

#[test]
fn test_identity_accessor() {
    let id = ObjectId::new();
    let query = Account::query().build_with(|q| {
        q.id().equals(id);
    });

    assert_eq!(query.into_document().unwrap(), doc! { "_id": id });
}

#[test]
fn test_sequence_and_text_operators() {
    let mut query = Account::query();
    query
        .roles()
        .contains_all(["admin", "ops"])
        .nickname()
        .regex("^al", Some("i"))
        .mask()
        .bits_any_set(0b11);

    assert_eq!(
        query.as_document(),
        &doc! {
            "roles": { "$all": ["admin", "ops"] },
            "nickname": { "$regex": "^al", "$options": "i" },
            "mask": { "$bitsAnySet": 3i64 },
        }
    );
}

#[test]
fn test_second_operator_on_a_field_replaces_the_first() {
    let query = Account::query().build_with(|q| {
        q.age().gte(10u32).age().lte(20u32);
    });

    assert_eq!(query.into_document().unwrap(), doc! { "age": { "$lte": 20i64 } });
}

#[test]
fn test_optional_fields_accept_bare_values_and_null() {
    let query = Account::query().build_with(|q| {
        q.nickname().equals("al").id().equals(Raw(Bson::Null));
    });

    assert_eq!(query.into_document().unwrap(), doc! { "nickname": "al", "_id": null });
}

#[test]
fn test_membership_operators() {
    let query = Account::query().build_with(|q| {
        q.tier().one_of([Tier::Free, Tier::Pro]).name().none_of(["root", "admin"]);
    });

    assert_eq!(
        query.into_document().unwrap(),
        doc! { "tier": { "$in": [0, 1] }, "n": { "$nin": ["root", "admin"] } }
    );
}

#[test]
fn test_logical_combinators() {
    let adults = Account::query().build_with(|q| {
        q.age().gte(18u32);
    });
    let pros = Account::query().build_with(|q| {
        q.tier().equals(Tier::Pro);
    });
    let named = Account::query().build_with(|q| {
        q.name().exists(true);
    });

    let either = docmodel::or!(adults.clone(), pros.clone());
    assert_eq!(
        either.into_document().unwrap(),
        doc! { "$or": [{ "age": { "$gte": 18i64 } }, { "tier": 1 }] }
    );

    let all = and!(adults, pros, named);
    assert_eq!(
        all.as_document().get_array("$and").unwrap().len(),
        3
    );

    let none = nor!(all);
    assert!(none.as_document().contains_key("$nor"));
}

#[test]
fn test_not_wraps_a_list() {
    let negated = not(vec![Account::query().build_with(|q| {
        q.name().equals("bob");
    })]);

    assert_eq!(negated.into_document().unwrap(), doc! { "$not": [{ "n": "bob" }] });
}

#[test]
fn test_untyped_field_access() {
    let query = Account::query().build_with(|q| {
        q.field::<String>("profile.city").equals("Oslo");
    });

    assert_eq!(query.into_document().unwrap(), doc! { "profile.city": "Oslo" });
}

#[test]
fn test_operand_errors_surface_on_finish() {
    let query = Account::query().build_with(|q| {
        q.field::<u64>("big").equals(u64::MAX).name().equals("ok");
    });

    assert!(query.query().error().is_some());
    let err = query.into_document().unwrap_err();
    assert!(matches!(&err, MappingError::Field { field, .. } if field == "big"));
}

#[test]
fn test_empty_query_matches_everything() {
    assert_eq!(Account::query().into_document().unwrap(), Document::new());
}
