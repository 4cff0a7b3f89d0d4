use crate::{
    builder::Storage,
    engine::FilterEngine,
    filter::FilterKey,
    request,
    test_support::{MemoryBuilder, persons_dataset},
    traits::{StaticCatalog, StaticDescriptor},
    value::Value,
};

static CATALOG: StaticCatalog = StaticCatalog::new(&[
    ("Person", "persons"),
    ("Address", "addresses"),
]);

const PERSON: StaticDescriptor = StaticDescriptor::new(
    "persons",
    &["firstname", "lastname", "age"],
    &["addresses", "profile"],
);

fn bag(pairs: &[(&str, Value)]) -> Vec<(String, Value)> {
    pairs
        .iter()
        .map(|(key, value)| ((*key).to_string(), value.clone()))
        .collect()
}

#[test]
fn searchable_columns_become_or_where_tuples() {
    let filters = request::build(
        &CATALOG,
        &PERSON,
        &bag(&[("lastname", Value::Text("AZOMEDOH".into()))]),
        None,
    )
    .unwrap();

    let entry = filters.get(FilterKey::OrWhere).unwrap();
    assert_eq!(
        entry,
        &Value::List(vec![
            Value::Text("lastname".into()),
            Value::Text("like".into()),
            Value::Text("%AZOMEDOH%".into()),
        ])
    );
}

#[test]
fn numeric_text_and_prefixed_values_detect_their_operator() {
    let filters = request::build(
        &CATALOG,
        &PERSON,
        &bag(&[
            ("age", Value::Text("30".into())),
            ("firstname", Value::Text(">=:K".into())),
        ]),
        None,
    )
    .unwrap();

    let rows = filters
        .get(FilterKey::OrWhere)
        .and_then(Value::as_list)
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].as_list().unwrap()[1], Value::Text("=".into()));
    assert_eq!(rows[1].as_list().unwrap()[1], Value::Text(">=".into()));
}

#[test]
fn unknown_keys_and_empty_values_are_ignored() {
    let filters = request::build(
        &CATALOG,
        &PERSON,
        &bag(&[
            ("color", Value::Text("blue".into())),
            ("lastname", Value::Text(String::new())),
            ("age", Value::Null),
        ]),
        None,
    )
    .unwrap();

    assert!(filters.is_empty());
}

#[test]
fn relation_path_keys_become_where_has_entries() {
    let filters = request::build(
        &CATALOG,
        &PERSON,
        &bag(&[("addresses__city", Value::Text("LOME".into()))]),
        None,
    )
    .unwrap();

    let entry = filters.get(FilterKey::WhereHas).unwrap();
    assert_eq!(entry.get("column"), Some(&Value::Text("addresses".into())));

    let call = entry.get("match").unwrap();
    assert_eq!(call.get("method"), Some(&Value::Text("where".into())));
    let params = call.get("params").and_then(Value::as_list).unwrap();
    assert_eq!(params[0], Value::Text("city".into()));
    assert_eq!(params[1], Value::Text("like".into()));
    assert_eq!(params[2], Value::Text("%LOME%".into()));
}

#[test]
fn relation_path_array_values_use_where_in() {
    let filters = request::build(
        &CATALOG,
        &PERSON,
        &bag(&[(
            "addresses__city",
            Value::List(vec![Value::Text("LOME".into()), Value::Text("KARA".into())]),
        )]),
        None,
    )
    .unwrap();

    let call = filters.get(FilterKey::WhereHas).unwrap().get("match").unwrap();
    assert_eq!(call.get("method"), Some(&Value::Text("whereIn".into())));
}

#[test]
fn relation_path_separators_normalize_to_dots() {
    let filters = request::build(
        &CATALOG,
        &PERSON,
        &bag(&[("profile:photos__url", Value::Text("a.png".into()))]),
        None,
    )
    .unwrap();

    let entry = filters.get(FilterKey::WhereHas).unwrap();
    assert_eq!(
        entry.get("column"),
        Some(&Value::Text("profile.photos".into()))
    );
}

#[test]
fn unexposed_relations_are_dropped() {
    let filters = request::build(
        &CATALOG,
        &PERSON,
        &bag(&[("ghosts__name", Value::Text("casper".into()))]),
        None,
    )
    .unwrap();

    assert!(filters.is_empty());
}

#[test]
fn direct_filters_sort_where_has_before_or_where() {
    let filters = request::build(
        &CATALOG,
        &PERSON,
        &bag(&[
            ("lastname", Value::Text("AZOMEDOH".into())),
            ("addresses__city", Value::Text("LOME".into())),
        ]),
        None,
    )
    .unwrap();

    let keys: Vec<FilterKey> = filters.iter().map(|(key, _)| *key).collect();
    assert_eq!(keys, [FilterKey::WhereHas, FilterKey::OrWhere]);
}

#[test]
fn envelope_layers_append_onto_direct_filters() {
    let envelope = Value::Text(r#"{"orWhere": ["age", "=", 35], "orderBy": "age"}"#.to_string());
    let filters = request::build(
        &CATALOG,
        &PERSON,
        &bag(&[("lastname", Value::Text("AZOMEDOH".into()))]),
        Some(&envelope),
    )
    .unwrap();

    // The direct orWhere and the envelope orWhere share one entry.
    let rows = filters
        .get(FilterKey::OrWhere)
        .and_then(Value::as_list)
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert!(filters.get(FilterKey::OrderBy).is_some());
}

#[test]
fn envelope_must_be_a_json_object() {
    let envelope = Value::Text("[1, 2]".to_string());
    let err = request::build(&CATALOG, &PERSON, &[], Some(&envelope)).unwrap_err();

    assert!(err.is_invalid_argument());
}

#[test]
fn envelope_rejects_disallowed_nested_methods() {
    let envelope = Value::Text(
        r#"{"whereHas": {"column": "addresses",
            "match": {"method": "deleteEverything", "params": []}}}"#
            .to_string(),
    );
    let err = request::build(&CATALOG, &PERSON, &[], Some(&envelope)).unwrap_err();

    assert!(err.is_unsupported());
}

#[test]
fn built_filters_execute_against_seeded_rows() {
    let envelope = Value::Text(r#"{"where": ["age", 28]}"#.to_string());
    let filters = request::build(&CATALOG, &PERSON, &[], Some(&envelope)).unwrap();

    let rows = FilterEngine::new(&CATALOG)
        .apply(MemoryBuilder::over(persons_dataset()), &filters)
        .unwrap()
        .get()
        .unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].field("age"), Some(&Value::Int(28)));
}
