//! Aggregate sub-dispatcher.
//!
//! Runs strictly after every non-aggregate filter so synthesized
//! columns observe the fully filtered base shape. Relation-scoped
//! entries delegate to the builder's native relation aggregate; plain
//! entries become correlated scalar subselects; `add*` entries become
//! self-correlated subqueries over the model's own table.

use crate::{
    builder::{AggregateFn, AggregateSelect, Correlation, QueryBuilder, SubqueryFn},
    diagnostics::{self, EngineTraceEvent, SkipReason},
    engine::FilterEngine,
    error::Error,
    filter::FilterKey,
    parse::is_row_list,
    statement::Statement,
    value::Value,
};

///
/// AggregateEntry
///
/// One normalized aggregate parameter: `{column, relation-or-query,
/// alias}` with missing trailing slots padded to `None`. Transient;
/// built per apply call and discarded.
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
struct AggregateEntry {
    column: String,
    relation: Option<String>,
    query: Option<String>,
    alias: Option<String>,
}

pub(super) fn apply<B: QueryBuilder>(
    engine: &FilterEngine,
    builder: B,
    spec: &Value,
) -> Result<B, Error> {
    let Some(groups) = spec.as_entries() else {
        return Err(Error::invalid_argument(
            crate::error::ErrorOrigin::Engine,
            "aggregate specification must be an object keyed by function name",
        ));
    };

    let mut builder = builder;
    for (name, params) in groups {
        let function = AggregateFn::from_name(name).filter(|f| engine.config().allows(*f));
        let Some(function) = function else {
            diagnostics::emit(&EngineTraceEvent::Skipped {
                key: FilterKey::Aggregate,
                reason: SkipReason::UnknownAggregate,
            });
            continue;
        };

        for entry in normalize_entries(params) {
            let Some(entry) = entry else {
                diagnostics::emit(&EngineTraceEvent::Skipped {
                    key: FilterKey::Aggregate,
                    reason: SkipReason::ShortTuple,
                });
                continue;
            };

            builder = apply_entry(engine, builder, function, &entry)?;
        }
    }

    Ok(builder)
}

fn apply_entry<B: QueryBuilder>(
    engine: &FilterEngine,
    builder: B,
    function: AggregateFn,
    entry: &AggregateEntry,
) -> Result<B, Error> {
    if let Some(relation) = &entry.relation {
        return Ok(FilterEngine::invoke(FilterKey::Aggregate, builder, |b| {
            b.with_aggregate(relation, function, &entry.column)
        }));
    }

    let select = AggregateSelect {
        function: function.base(),
        column: entry.column.clone(),
        alias: entry
            .alias
            .clone()
            .unwrap_or_else(|| format!("{}_{}", function.label(), entry.column)),
        correlation: match function {
            AggregateFn::AddCount | AggregateFn::AddSum => Correlation::SelfJoin,
            _ => Correlation::Filtered,
        },
    };

    // Statement chains are parsed eagerly so a malformed or disallowed
    // chain rejects the request instead of being swallowed below.
    let statements = match &entry.query {
        Some(chain) => Statement::parse_chain(chain).map_err(Error::from)?,
        None => Vec::new(),
    };

    let callback = |sub: B| engine.replay_statements(sub, &statements);
    let callback: Option<SubqueryFn<'_, B>> =
        if statements.is_empty() { None } else { Some(&callback) };

    Ok(FilterEngine::invoke(FilterKey::Aggregate, builder, |b| {
        b.add_select_aggregate(&select, callback)
    }))
}

/// Normalize the parameter list for one aggregate function.
///
/// Accepts a bare column name, a positional tuple, an assoc map, or a
/// list of any of those. Entries without a usable column yield `None`
/// for the silent-skip path.
fn normalize_entries(params: &Value) -> Vec<Option<AggregateEntry>> {
    let rows = match params {
        Value::Text(_) => vec![params.clone()],
        Value::List(items) if is_row_list(items) => items.clone(),
        Value::List(items) if items.iter().all(|item| matches!(item, Value::Text(_))) => {
            // A flat list of column names aggregates each of them.
            items.clone()
        }
        Value::List(_) => vec![params.clone()],
        other => vec![other.clone()],
    };

    rows.iter().map(normalize_entry).collect()
}

fn normalize_entry(row: &Value) -> Option<AggregateEntry> {
    match row {
        Value::Text(column) => Some(AggregateEntry {
            column: column.clone(),
            ..AggregateEntry::default()
        }),
        Value::List(items) => {
            let column = items.first()?.as_text()?.to_string();
            let (relation, query) = scope_slot(items.get(1));
            let alias = items
                .get(2)
                .and_then(Value::as_text)
                .map(str::to_string);

            Some(AggregateEntry {
                column,
                relation,
                query,
                alias,
            })
        }
        Value::Map(_) => {
            let column = row.get("column")?.as_text()?.to_string();
            let relation = row
                .get("relation")
                .and_then(Value::as_text)
                .map(str::to_string);
            let query = row
                .get("query")
                .and_then(Value::as_text)
                .map(str::to_string);
            let alias = row
                .get("alias")
                .and_then(Value::as_text)
                .map(str::to_string);

            Some(AggregateEntry {
                column,
                relation,
                query,
                alias,
            })
        }
        _ => None,
    }
}

/// Disambiguate the middle positional slot: a statement chain carries
/// parentheses, a relation name does not.
fn scope_slot(value: Option<&Value>) -> (Option<String>, Option<String>) {
    match value.and_then(Value::as_text) {
        Some(text) if text.contains('(') => (None, Some(text.to_string())),
        Some(text) => (Some(text.to_string()), None),
        None => (None, None),
    }
}
