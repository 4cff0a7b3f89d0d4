use crate::{
    engine::tests::{dict, engine},
    test_support::{MemoryBuilder, Record, persons_dataset},
    value::Value,
};

#[test]
fn non_aggregate_keys_apply_in_declaration_order() {
    let filters = dict(r#"{"orderBy": "age", "where": ["age", 28], "limit": 5}"#);
    let builder = engine()
        .apply(MemoryBuilder::over(persons_dataset()), &filters)
        .unwrap();

    let log = builder.call_log();
    assert!(log[0].starts_with("orderBy("));
    assert!(log[1].starts_with("where("));
    assert!(log[2].starts_with("limit("));
}

#[test]
fn aggregate_applies_last_regardless_of_declared_position() {
    let filters = dict(
        r#"{"aggregate": {"count": ["id"]}, "where": ["age", 28], "orderBy": "age"}"#,
    );
    let builder = engine()
        .apply(MemoryBuilder::over(persons_dataset()), &filters)
        .unwrap();

    let log = builder.call_log();
    assert!(log.last().unwrap().starts_with("addSelectAggregate("));
    assert!(log[0].starts_with("where("));
}

#[test]
fn aggregate_subselect_observes_non_aggregate_filters() {
    // Two rows share n = 7; only one survives the flag filter. A
    // correlated count computed over the filtered shape sees one row,
    // not two.
    let rows = vec![
        Record::new(&[("id", Value::Int(1)), ("flag", Value::Int(1)), ("n", Value::Int(7))]),
        Record::new(&[("id", Value::Int(2)), ("flag", Value::Int(0)), ("n", Value::Int(7))]),
    ];

    let filters = dict(r#"{"aggregate": {"count": ["n"]}, "where": ["flag", 1]}"#);
    let result = engine()
        .apply(MemoryBuilder::over(rows), &filters)
        .unwrap();
    let rows = crate::builder::Storage::get(result).unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].field("count_n"), Some(&Value::Uint(1)));
}

#[test]
fn add_variants_self_correlate_over_the_whole_table() {
    // Same seed, but addCount ignores the current filter shape: both
    // rows sharing n = 7 are counted even though one is filtered out.
    let rows = vec![
        Record::new(&[("id", Value::Int(1)), ("flag", Value::Int(1)), ("n", Value::Int(7))]),
        Record::new(&[("id", Value::Int(2)), ("flag", Value::Int(0)), ("n", Value::Int(7))]),
    ];

    let filters = dict(r#"{"where": ["flag", 1], "aggregate": {"addCount": ["n"]}}"#);
    let result = engine()
        .apply(MemoryBuilder::over(rows), &filters)
        .unwrap();
    let rows = crate::builder::Storage::get(result).unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].field("add_count_n"), Some(&Value::Uint(2)));
}
