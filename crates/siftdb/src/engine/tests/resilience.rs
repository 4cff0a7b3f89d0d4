use crate::{
    builder::AggregateFn,
    diagnostics::{EngineTraceEvent, RecordingSink, SkipReason, with_sink},
    engine::{EngineConfig, FilterEngine, tests::{CATALOG, dict, engine}},
    filter::FilterKey,
    test_support::{MemoryBuilder, persons_dataset},
};

#[test]
fn under_specified_where_in_leaves_the_builder_unchanged() {
    let sink = RecordingSink::new();
    let filters = dict(r#"{"whereIn": {"column": "age"}}"#);

    let builder = with_sink(sink.clone(), || {
        engine()
            .apply(MemoryBuilder::over(persons_dataset()), &filters)
            .unwrap()
    });

    assert!(builder.is_unshaped());
    assert!(builder.call_log().is_empty());
    assert!(sink.events().contains(&EngineTraceEvent::Skipped {
        key: FilterKey::WhereIn,
        reason: SkipReason::ShortTuple,
    }));
}

#[test]
fn null_values_are_skipped_without_dispatch() {
    let sink = RecordingSink::new();
    let filters = dict(r#"{"where": null, "orderBy": "age"}"#);

    let builder = with_sink(sink.clone(), || {
        engine()
            .apply(MemoryBuilder::over(persons_dataset()), &filters)
            .unwrap()
    });

    assert_eq!(builder.call_log().len(), 1);
    assert!(sink.events().contains(&EngineTraceEvent::Skipped {
        key: FilterKey::Where,
        reason: SkipReason::NullValue,
    }));
}

#[test]
fn short_between_tuples_are_skipped() {
    let filters = dict(r#"{"whereBetween": ["age"]}"#);
    let builder = engine()
        .apply(MemoryBuilder::over(persons_dataset()), &filters)
        .unwrap();

    assert!(builder.is_unshaped());
}

#[test]
fn builder_failures_in_has_handlers_are_suppressed() {
    let sink = RecordingSink::new();
    let filters = dict(
        r#"{"whereHas": {"column": "addresses",
            "match": {"method": "where", "params": ["city", "LOME"]}}}"#,
    );
    let failing = MemoryBuilder::over(persons_dataset()).failing_on("whereRelation");

    let builder = with_sink(sink.clone(), || {
        engine().apply(failing, &filters).unwrap()
    });

    // The filter is dropped, not the whole application.
    assert!(builder.is_unshaped());
    assert_eq!(sink.suppressed(), 1);
}

#[test]
fn builder_failures_outside_protected_handlers_propagate() {
    let filters = dict(r#"{"where": ["age", 28]}"#);
    let failing = MemoryBuilder::over(persons_dataset()).failing_on("where");

    let err = engine().apply(failing, &filters).unwrap_err();
    assert!(err.is_builder());
}

#[test]
fn disallowed_nested_methods_reject_before_any_builder_call() {
    // The allowlist check happens at parse time, so it is never
    // swallowed by the protective wrapper around the builder call.
    let filters = dict(
        r#"{"whereHas": {"column": "addresses",
            "match": {"method": "deleteEverything", "params": []}}}"#,
    );

    let err = engine()
        .apply(MemoryBuilder::over(persons_dataset()), &filters)
        .unwrap_err();

    assert!(err.is_unsupported());
}

#[test]
fn aggregate_names_outside_the_configured_allowlist_are_skipped() {
    let sink = RecordingSink::new();
    let filters = dict(r#"{"aggregate": {"median": ["age"]}}"#);

    let builder = with_sink(sink.clone(), || {
        engine()
            .apply(MemoryBuilder::over(persons_dataset()), &filters)
            .unwrap()
    });

    assert!(builder.is_unshaped());
    assert!(sink.events().contains(&EngineTraceEvent::Skipped {
        key: FilterKey::Aggregate,
        reason: SkipReason::UnknownAggregate,
    }));
}

#[test]
fn narrowed_aggregate_config_drops_everything_else() {
    let config = EngineConfig::with_aggregates(vec![AggregateFn::Count]);
    let narrowed = FilterEngine::with_config(&CATALOG, config);

    let filters = dict(r#"{"aggregate": {"sum": ["age"]}}"#);
    let builder = narrowed
        .apply(MemoryBuilder::over(persons_dataset()), &filters)
        .unwrap();

    assert!(builder.is_unshaped());
}
