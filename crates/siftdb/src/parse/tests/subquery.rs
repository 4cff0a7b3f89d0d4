use crate::{
    builder::BoolOp,
    filter::FilterKey,
    parse::{ParseError, subquery},
    value::Value,
};

fn params(json: &str) -> Value {
    serde_json::from_str(json).unwrap()
}

#[test]
fn assoc_form_resolves_relation_and_calls() {
    let clauses = subquery::parse(&params(
        r#"{"column": "addresses", "match": {"method": "where", "params": ["city", "LOME"]}}"#,
    ))
    .unwrap();

    assert_eq!(clauses.len(), 1);
    assert_eq!(clauses[0].relation, "addresses");
    assert_eq!(clauses[0].calls.len(), 1);
    assert_eq!(clauses[0].calls[0].method, FilterKey::Where);
}

#[test]
fn bare_relation_name_has_no_calls() {
    let clauses = subquery::parse(&Value::Text("addresses".into())).unwrap();

    assert_eq!(clauses[0].relation, "addresses");
    assert!(clauses[0].calls.is_empty());
}

#[test]
fn match_lists_become_ordered_call_sequences() {
    let clauses = subquery::parse(&params(
        r#"{"column": "addresses", "match": [
            {"method": "where", "params": ["city", "LOME"]},
            {"method": "orderBy", "params": "city"}
        ]}"#,
    ))
    .unwrap();

    let methods: Vec<FilterKey> = clauses[0].calls.iter().map(|call| call.method).collect();
    assert_eq!(methods, [FilterKey::Where, FilterKey::OrderBy]);
}

#[test]
fn disallowed_methods_are_always_rejected() {
    let err = subquery::parse(&params(
        r#"{"column": "addresses", "match": {"method": "deleteEverything", "params": []}}"#,
    ))
    .unwrap_err();

    assert_eq!(
        err,
        ParseError::UnsupportedMethod {
            method: "deleteEverything".to_string()
        }
    );

    // Vocabulary membership is not enough; the method must be on the
    // sub-query allowlist.
    assert!(matches!(
        subquery::parse(&params(
            r#"{"column": "addresses", "match": {"method": "distinct", "params": true}}"#,
        )),
        Err(ParseError::UnsupportedMethod { .. })
    ));
}

#[test]
fn nested_query_objects_require_method_and_params() {
    assert!(matches!(
        subquery::parse(&params(r#"{"column": "addresses", "match": {"params": []}}"#)),
        Err(ParseError::MissingMethod)
    ));
    assert!(matches!(
        subquery::parse(&params(
            r#"{"column": "addresses", "match": {"method": "where"}}"#
        )),
        Err(ParseError::MissingParams)
    ));
}

#[test]
fn assoc_without_relation_is_rejected() {
    assert!(matches!(
        subquery::parse(&params(
            r#"{"match": {"method": "where", "params": ["a", 1]}}"#
        )),
        Err(ParseError::MissingKeys { .. })
    ));
}

#[test]
fn where_has_keeps_caller_operator_and_count() {
    let clauses = subquery::parse(&params(
        r#"{"column": "addresses", "operator": ">", "count": 2}"#,
    ))
    .unwrap();

    assert_eq!(clauses[0].operator.as_deref(), Some(">"));
    assert_eq!(clauses[0].count, Some(2));
}

#[test]
fn existence_variants_force_operator_and_boolean() {
    // The caller-supplied operator is ignored; only count survives.
    let spec = params(r#"{"column": "addresses", "count": 3, "operator": "!="}"#);

    for (operator, boolean) in [
        (">=", BoolOp::And),
        ("<", BoolOp::And),
        (">=", BoolOp::Or),
        ("<", BoolOp::Or),
    ] {
        let clauses = subquery::parse_existence(&spec, operator, boolean).unwrap();

        assert_eq!(clauses[0].operator, operator);
        assert_eq!(clauses[0].boolean, boolean);
        assert_eq!(clauses[0].count, 3);
    }
}

#[test]
fn existence_count_defaults_to_one() {
    let clauses =
        subquery::parse_existence(&Value::Text("addresses".into()), ">=", BoolOp::And).unwrap();

    assert_eq!(clauses[0].count, 1);
}
