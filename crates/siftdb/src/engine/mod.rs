//! Filter application engine.
//!
//! A single-pass fold over the filter dictionary with one deferred
//! step: every non-aggregate key is dispatched in insertion order,
//! then the `aggregate` key is applied last regardless of where it was
//! declared, so computed columns always observe the fully filtered
//! base shape.

mod aggregate;

#[cfg(test)]
mod tests;

use crate::{
    builder::{AggregateFn, BoolOp, JoinKind, OrderDirection, QueryBuilder, SubqueryFn},
    diagnostics::{self, EngineTraceEvent, SkipReason},
    error::Error,
    filter::{FilterDictionary, FilterKey},
    parse::{condition, join, membership, subquery, ConditionClause, MembershipClause},
    statement::Statement,
    traits::EntityCatalog,
    value::Value,
};

///
/// EngineConfig
///
/// Startup policy for one engine instance. The aggregate allowlist
/// bounds which aggregate names client input may request; everything
/// else in the vocabulary is fixed.
///

#[derive(Clone, Debug)]
pub struct EngineConfig {
    aggregates: Vec<AggregateFn>,
}

impl EngineConfig {
    #[must_use]
    pub fn with_aggregates(aggregates: Vec<AggregateFn>) -> Self {
        Self { aggregates }
    }

    #[must_use]
    pub fn allows(&self, function: AggregateFn) -> bool {
        self.aggregates.contains(&function)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            aggregates: AggregateFn::ALL.to_vec(),
        }
    }
}

///
/// FilterEngine
///
/// Stateless per request: holds only the catalog seam and startup
/// policy, so one engine is safe to share across independent applies.
///

pub struct FilterEngine<'a> {
    catalog: &'a dyn EntityCatalog,
    config: EngineConfig,
}

impl<'a> FilterEngine<'a> {
    #[must_use]
    pub fn new(catalog: &'a dyn EntityCatalog) -> Self {
        Self {
            catalog,
            config: EngineConfig::default(),
        }
    }

    #[must_use]
    pub const fn with_config(catalog: &'a dyn EntityCatalog, config: EngineConfig) -> Self {
        Self { catalog, config }
    }

    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Apply a filter dictionary onto a builder.
    ///
    /// Non-aggregate keys apply first, in dictionary insertion order,
    /// skipping null values. The `aggregate` key applies last.
    pub fn apply<B: QueryBuilder>(
        &self,
        builder: B,
        filters: &FilterDictionary,
    ) -> Result<B, Error> {
        let mut builder = builder;

        for (key, value) in filters.iter() {
            if *key == FilterKey::Aggregate {
                continue;
            }
            if value.is_null() {
                diagnostics::emit(&EngineTraceEvent::Skipped {
                    key: *key,
                    reason: SkipReason::NullValue,
                });
                continue;
            }

            builder = self.dispatch(builder, *key, value)?;
            diagnostics::emit(&EngineTraceEvent::Applied { key: *key });
        }

        if let Some(spec) = filters.get(FilterKey::Aggregate) {
            if !spec.is_null() {
                diagnostics::emit(&EngineTraceEvent::AggregatePhase);
                builder = aggregate::apply(self, builder, spec)?;
            }
        }

        Ok(builder)
    }

    /// Dispatch one filter key. Typed match; no string lookup.
    pub(crate) fn dispatch<B: QueryBuilder>(
        &self,
        builder: B,
        key: FilterKey,
        value: &Value,
    ) -> Result<B, Error> {
        match key {
            FilterKey::Where => self.apply_conditions(builder, value, BoolOp::And),
            FilterKey::OrWhere => self.apply_conditions(builder, value, BoolOp::Or),
            FilterKey::WhereIn => self.apply_membership(builder, key, value, false),
            FilterKey::WhereNotIn => self.apply_membership(builder, key, value, true),
            FilterKey::WhereBetween => self.apply_between(builder, key, value),
            FilterKey::WhereNull => self.apply_null(builder, key, value, false, BoolOp::And),
            FilterKey::WhereNotNull => self.apply_null(builder, key, value, true, BoolOp::And),
            FilterKey::OrWhereNull => self.apply_null(builder, key, value, false, BoolOp::Or),
            FilterKey::OrWhereNotNull => self.apply_null(builder, key, value, true, BoolOp::Or),
            FilterKey::WhereHas => self.apply_subqueries(builder, key, value, ">=", BoolOp::And),
            FilterKey::WhereDoesntHave => {
                self.apply_subqueries(builder, key, value, "<", BoolOp::And)
            }
            FilterKey::Has => self.apply_relation_counts(builder, key, value, ">="),
            FilterKey::DoesntHave => self.apply_relation_counts(builder, key, value, "<"),
            FilterKey::Exists => self.apply_existence(builder, key, value, ">=", BoolOp::And),
            FilterKey::NotExists => self.apply_existence(builder, key, value, "<", BoolOp::And),
            FilterKey::OrExists => self.apply_existence(builder, key, value, ">=", BoolOp::Or),
            FilterKey::OrNotExists => self.apply_existence(builder, key, value, "<", BoolOp::Or),
            FilterKey::WhereDate => self.apply_dates(builder, value, BoolOp::And),
            FilterKey::OrWhereDate => self.apply_dates(builder, value, BoolOp::Or),
            FilterKey::OrderBy => self.apply_order(builder, key, value),
            FilterKey::GroupBy => self.apply_grouping(builder, value),
            FilterKey::Join => self.apply_joins(builder, JoinKind::Inner, value),
            FilterKey::LeftJoin => self.apply_joins(builder, JoinKind::Left, value),
            FilterKey::RightJoin => self.apply_joins(builder, JoinKind::Right, value),
            FilterKey::Limit => self.apply_count(builder, key, value, B::limit),
            FilterKey::Skip => self.apply_count(builder, key, value, B::skip),
            FilterKey::Take => self.apply_count(builder, key, value, B::take),
            FilterKey::Distinct => Self::apply_distinct(builder, value),
            FilterKey::Aggregate => aggregate::apply(self, builder, value),
        }
    }

    /// Replay validated nested-query calls against a sub-builder.
    pub(crate) fn replay<B: QueryBuilder>(
        &self,
        builder: B,
        calls: &[subquery::SubqueryCall],
    ) -> Result<B, Error> {
        let mut builder = builder;
        for call in calls {
            builder = self.dispatch(builder, call.method, &call.params)?;
        }
        Ok(builder)
    }

    /// Replay a parsed statement chain against a sub-builder.
    pub(crate) fn replay_statements<B: QueryBuilder>(
        &self,
        builder: B,
        statements: &[Statement],
    ) -> Result<B, Error> {
        let mut builder = builder;
        for statement in statements {
            let params = Value::List(statement.args.clone());
            builder = self.dispatch(builder, statement.method, &params)?;
        }
        Ok(builder)
    }

    /// Protective wrapper for has-style and aggregate handlers.
    ///
    /// A failure inside `f` must not abort the whole filter
    /// application: the builder passes through unchanged and the error
    /// is reported to the trace sink. Parse-layer failures never run
    /// through here; they propagate from the call sites above.
    pub(crate) fn invoke<B: QueryBuilder>(
        key: FilterKey,
        builder: B,
        f: impl FnOnce(B) -> Result<B, Error>,
    ) -> B {
        let fallback = builder.clone();
        match f(builder) {
            Ok(next) => next,
            Err(err) => {
                diagnostics::emit(&EngineTraceEvent::Suppressed {
                    key,
                    error: err.to_string(),
                });
                fallback
            }
        }
    }

    // ------------------------------------------------------------------
    // Per-key handlers
    // ------------------------------------------------------------------

    fn apply_conditions<B: QueryBuilder>(
        &self,
        builder: B,
        value: &Value,
        default_boolean: BoolOp,
    ) -> Result<B, Error> {
        let mut builder = builder;
        for clause in condition::parse(self.catalog, value)? {
            builder = match clause {
                ConditionClause::Tuple(cond) => builder.where_clause(
                    &cond.column,
                    &cond.operator,
                    cond.value,
                    cond.boolean.unwrap_or(default_boolean),
                )?,
                ConditionClause::Nested { calls } => {
                    let callback = |sub: B| self.replay(sub, &calls);
                    builder.where_group(&callback, default_boolean)?
                }
            };
        }
        Ok(builder)
    }

    fn apply_membership<B: QueryBuilder>(
        &self,
        builder: B,
        key: FilterKey,
        value: &Value,
        negated: bool,
    ) -> Result<B, Error> {
        let mut builder = builder;
        for clause in membership::parse(value)? {
            match clause {
                MembershipClause::Complete { column, values } => {
                    builder = builder.where_in(&column, values, negated, BoolOp::And)?;
                }
                MembershipClause::Partial => {
                    diagnostics::emit(&EngineTraceEvent::Skipped {
                        key,
                        reason: SkipReason::ShortTuple,
                    });
                }
            }
        }
        Ok(builder)
    }

    fn apply_between<B: QueryBuilder>(
        &self,
        builder: B,
        key: FilterKey,
        value: &Value,
    ) -> Result<B, Error> {
        let rows = match value {
            Value::List(items) if crate::parse::is_row_list(items) => items.clone(),
            other => vec![other.clone()],
        };

        let mut builder = builder;
        for row in &rows {
            match between_bounds(row) {
                Some((column, low, high)) => {
                    builder = builder.where_between(column, low, high, BoolOp::And)?;
                }
                None => {
                    diagnostics::emit(&EngineTraceEvent::Skipped {
                        key,
                        reason: SkipReason::ShortTuple,
                    });
                }
            }
        }
        Ok(builder)
    }

    fn apply_null<B: QueryBuilder>(
        &self,
        builder: B,
        key: FilterKey,
        value: &Value,
        negated: bool,
        boolean: BoolOp,
    ) -> Result<B, Error> {
        let columns = match value {
            Value::List(items) => items.clone(),
            other => vec![other.clone()],
        };

        let mut builder = builder;
        for column in &columns {
            match column.as_text() {
                Some(column) => {
                    builder = builder.where_null(column, negated, boolean)?;
                }
                None => {
                    diagnostics::emit(&EngineTraceEvent::Skipped {
                        key,
                        reason: SkipReason::ShortTuple,
                    });
                }
            }
        }
        Ok(builder)
    }

    fn apply_dates<B: QueryBuilder>(
        &self,
        builder: B,
        value: &Value,
        default_boolean: BoolOp,
    ) -> Result<B, Error> {
        let mut builder = builder;
        for cond in condition::parse_date(self.catalog, value)? {
            builder = builder.where_date(
                &cond.column,
                &cond.operator,
                cond.value,
                cond.boolean.unwrap_or(default_boolean),
            )?;
        }
        Ok(builder)
    }

    fn apply_subqueries<B: QueryBuilder>(
        &self,
        builder: B,
        key: FilterKey,
        value: &Value,
        operator: &str,
        boolean: BoolOp,
    ) -> Result<B, Error> {
        let mut builder = builder;
        for clause in subquery::parse(value)? {
            let operator = clause.operator.as_deref().unwrap_or(operator);
            let count = clause.count.unwrap_or(1);
            let callback = |sub: B| self.replay(sub, &clause.calls);
            let callback: Option<SubqueryFn<'_, B>> =
                if clause.calls.is_empty() { None } else { Some(&callback) };

            builder = Self::invoke(key, builder, |b| {
                b.where_relation(&clause.relation, operator, count, boolean, callback)
            });
        }
        Ok(builder)
    }

    fn apply_relation_counts<B: QueryBuilder>(
        &self,
        builder: B,
        key: FilterKey,
        value: &Value,
        default_operator: &str,
    ) -> Result<B, Error> {
        let rows = match value {
            Value::List(items) if crate::parse::is_row_list(items) => items.clone(),
            other => vec![other.clone()],
        };

        let mut builder = builder;
        for row in &rows {
            let (relation, operator, count) = match row {
                Value::Text(relation) => (relation.clone(), default_operator.to_string(), 1),
                Value::List(items) => {
                    let Some(relation) = items.first().and_then(Value::as_text) else {
                        diagnostics::emit(&EngineTraceEvent::Skipped {
                            key,
                            reason: SkipReason::ShortTuple,
                        });
                        continue;
                    };
                    let operator = items
                        .get(1)
                        .and_then(Value::as_text)
                        .unwrap_or(default_operator);
                    let count = items.get(2).and_then(Value::as_u64).unwrap_or(1);

                    (relation.to_string(), operator.to_string(), count)
                }
                _ => {
                    diagnostics::emit(&EngineTraceEvent::Skipped {
                        key,
                        reason: SkipReason::ShortTuple,
                    });
                    continue;
                }
            };

            builder = Self::invoke(key, builder, |b| {
                b.where_relation(&relation, &operator, count, BoolOp::And, None)
            });
        }
        Ok(builder)
    }

    fn apply_existence<B: QueryBuilder>(
        &self,
        builder: B,
        key: FilterKey,
        value: &Value,
        operator: &'static str,
        boolean: BoolOp,
    ) -> Result<B, Error> {
        let mut builder = builder;
        for clause in subquery::parse_existence(value, operator, boolean)? {
            let callback = |sub: B| self.replay(sub, &clause.calls);
            let callback: Option<SubqueryFn<'_, B>> =
                if clause.calls.is_empty() { None } else { Some(&callback) };

            builder = Self::invoke(key, builder, |b| {
                b.where_relation(
                    &clause.relation,
                    clause.operator,
                    clause.count,
                    clause.boolean,
                    callback,
                )
            });
        }
        Ok(builder)
    }

    fn apply_order<B: QueryBuilder>(
        &self,
        builder: B,
        key: FilterKey,
        value: &Value,
    ) -> Result<B, Error> {
        let rows = match value {
            Value::List(items) if crate::parse::is_row_list(items) => items.clone(),
            other => vec![other.clone()],
        };

        let mut builder = builder;
        for row in &rows {
            match order_spec(row) {
                Some((column, direction)) => {
                    builder = builder.order_by(column, direction)?;
                }
                None => {
                    diagnostics::emit(&EngineTraceEvent::Skipped {
                        key,
                        reason: SkipReason::ShortTuple,
                    });
                }
            }
        }
        Ok(builder)
    }

    fn apply_grouping<B: QueryBuilder>(&self, builder: B, value: &Value) -> Result<B, Error> {
        let columns: Vec<String> = match value {
            Value::Text(column) => vec![column.clone()],
            Value::List(items) => items
                .iter()
                .filter_map(Value::as_text)
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        };

        if columns.is_empty() {
            return Ok(builder);
        }

        builder.group_by(columns)
    }

    fn apply_joins<B: QueryBuilder>(
        &self,
        builder: B,
        kind: JoinKind,
        value: &Value,
    ) -> Result<B, Error> {
        let mut builder = builder;
        for clause in join::parse(self.catalog, value)? {
            builder = builder.join(
                kind,
                clause.table.as_deref(),
                &clause.left,
                &clause.operator,
                &clause.right,
            )?;
        }
        Ok(builder)
    }

    fn apply_count<B: QueryBuilder>(
        &self,
        builder: B,
        key: FilterKey,
        value: &Value,
        f: fn(B, u64) -> Result<B, Error>,
    ) -> Result<B, Error> {
        let counts = match value {
            Value::List(items) => items.clone(),
            other => vec![other.clone()],
        };

        let mut builder = builder;
        for count in &counts {
            match as_count(count) {
                Some(count) => builder = f(builder, count)?,
                None => {
                    diagnostics::emit(&EngineTraceEvent::Skipped {
                        key,
                        reason: SkipReason::ShortTuple,
                    });
                }
            }
        }
        Ok(builder)
    }

    fn apply_distinct<B: QueryBuilder>(builder: B, value: &Value) -> Result<B, Error> {
        let falsy = matches!(
            value,
            Value::Bool(false) | Value::Int(0) | Value::Uint(0) | Value::Null
        );

        if falsy { Ok(builder) } else { builder.distinct() }
    }
}

/// Resolve one between row into `(column, low, high)`.
///
/// Accepts `[col, [low, high]]` and `[col, low, high]`; anything with
/// fewer usable elements resolves to `None` for the silent-skip path.
fn between_bounds(row: &Value) -> Option<(&str, Value, Value)> {
    let items = row.as_list()?;
    let column = items.first()?.as_text()?;

    match items {
        [_, bounds] => {
            let bounds = bounds.as_list()?;
            let [low, high] = bounds else { return None };
            Some((column, low.clone(), high.clone()))
        }
        [_, low, high] => Some((column, low.clone(), high.clone())),
        _ => None,
    }
}

/// Resolve one order row into `(column, direction)`.
fn order_spec(row: &Value) -> Option<(&str, OrderDirection)> {
    match row {
        Value::Text(column) => Some((column, OrderDirection::Asc)),
        Value::List(items) => {
            let column = items.first()?.as_text()?;
            let direction = items
                .get(1)
                .and_then(Value::as_text)
                .map_or(OrderDirection::Asc, OrderDirection::from_name);
            Some((column, direction))
        }
        Value::Map(_) => {
            let column = row.get("column")?.as_text()?;
            let direction = row
                .get("direction")
                .and_then(Value::as_text)
                .map_or(OrderDirection::Asc, OrderDirection::from_name);
            Some((column, direction))
        }
        _ => None,
    }
}

/// Numeric count from ints, uints, or numeric text.
fn as_count(value: &Value) -> Option<u64> {
    match value {
        Value::Text(text) => text.parse().ok(),
        other => other.as_u64(),
    }
}
