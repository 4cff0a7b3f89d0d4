use crate::{
    engine::FilterEngine,
    filter::FilterDictionary,
    projection::Projection,
    session::Session,
    test_support::{MemoryStore, persons_dataset},
    traits::StaticCatalog,
    value::Value,
};

static CATALOG: StaticCatalog = StaticCatalog::new(&[("Person", "persons")]);

fn session(store: MemoryStore) -> Session<'static, MemoryStore> {
    Session::new(store, FilterEngine::new(&CATALOG))
}

fn dict(json: &str) -> FilterDictionary {
    FilterDictionary::from_json_str(json).unwrap()
}

fn value(json: &str) -> Value {
    serde_json::from_str(json).unwrap()
}

#[test]
fn create_commits_and_cascades_relations() {
    let session = session(MemoryStore::seeded(Vec::new()));

    let row = session
        .create(
            &value(r#"{"id": 1, "firstname": "Kossi"}"#),
            Some(&value(r#"{"addresses": [{"city": "LOME"}, {"city": "KARA"}]}"#)),
        )
        .unwrap();

    assert_eq!(row.field("id"), Some(&Value::Int(1)));

    let rows = session.store().rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].relations.get("addresses").map(Vec::len), Some(2));
    assert_eq!(session.store().journal(), ["begin", "commit"]);
}

#[test]
fn create_attaches_nested_dotted_paths() {
    let session = session(MemoryStore::seeded(Vec::new()));

    session
        .create(
            &value(r#"{"id": 1}"#),
            Some(&value(r#"{"profile.photos": {"url": "a.png"}}"#)),
        )
        .unwrap();

    let rows = session.store().rows();
    let profile = &rows[0].relations["profile"][0];
    assert_eq!(profile.relations.get("photos").map(Vec::len), Some(1));
}

#[test]
fn failed_cascade_rolls_the_transaction_back() {
    let session = session(MemoryStore::seeded(Vec::new()));

    // No id on the primary row: attachment cannot resolve it.
    let err = session
        .create(
            &value(r#"{"firstname": "Kossi"}"#),
            Some(&value(r#"{"addresses": {"city": "LOME"}}"#)),
        )
        .unwrap_err();

    assert!(err.is_builder());
    assert!(session.store().rows().is_empty());
    assert_eq!(session.store().journal(), ["begin", "rollback"]);
}

#[test]
fn malformed_attachment_specs_reject_before_the_transaction_opens() {
    let session = session(MemoryStore::seeded(Vec::new()));

    let err = session
        .create(
            &value(r#"{"id": 1}"#),
            Some(&value(r#"{"addresses": 5}"#)),
        )
        .unwrap_err();

    assert!(err.is_invalid_argument());
    assert!(session.store().journal().is_empty());
}

#[test]
fn update_applies_filters_inside_a_transaction() {
    let session = session(MemoryStore::seeded(persons_dataset()));

    let count = session
        .update(&dict(r#"{"where": ["age", 28]}"#), &value(r#"{"age": 29}"#), None)
        .unwrap();

    assert_eq!(count, 1);
    let rows = session.store().rows();
    assert_eq!(rows[0].field("age"), Some(&Value::Int(29)));
    assert_eq!(session.store().journal().first().map(String::as_str), Some("begin"));
    assert_eq!(session.store().journal().last().map(String::as_str), Some("commit"));
}

#[test]
fn delete_removes_matching_rows() {
    let session = session(MemoryStore::seeded(persons_dataset()));

    let count = session.delete(&dict(r#"{"where": ["age", 28]}"#)).unwrap();

    assert_eq!(count, 1);
    assert_eq!(session.store().rows().len(), 1);
}

#[test]
fn upsert_updates_when_a_match_exists_and_creates_otherwise() {
    let session = session(MemoryStore::seeded(persons_dataset()));

    session
        .upsert(&value(r#"{"id": 1}"#), &value(r#"{"age": 40}"#))
        .unwrap();
    assert_eq!(session.store().rows()[0].field("age"), Some(&Value::Int(40)));

    session
        .upsert(&value(r#"{"id": 9}"#), &value(r#"{"age": 50}"#))
        .unwrap();
    assert_eq!(session.store().rows().len(), 3);
}

#[test]
fn search_applies_filters_then_projection() {
    let session = session(MemoryStore::seeded(persons_dataset()));

    let projection = Projection::new(vec!["lastname".to_string()], Vec::new());
    let rows = session
        .search(&dict(r#"{"where": ["age", 28]}"#), Some(&projection))
        .unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].fields.len(), 1);
    assert_eq!(rows[0].field("lastname"), Some(&Value::Text("MENSAH".into())));
}

#[test]
fn paginate_reports_totals_over_the_filtered_set() {
    let session = session(MemoryStore::seeded(persons_dataset()));

    let page = session
        .paginate(&dict(r#"{"orderBy": "age"}"#), None, 1, 1)
        .unwrap();

    assert_eq!(page.total, 2);
    assert_eq!(page.rows.len(), 1);
    assert_eq!(page.rows[0].field("age"), Some(&Value::Int(28)));
}
