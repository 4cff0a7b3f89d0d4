//! The builder capability boundary.
//!
//! Everything below the filter engine is reached through these traits.
//! The engine never constructs SQL, manages connections, or opens
//! transactions; it folds validated filter clauses onto an owned
//! builder handle and hands the result back.

use crate::{error::Error, value::Value};
use std::fmt;

///
/// BoolOp
/// Conjunction selector for a condition (`and` / `or`).
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum BoolOp {
    #[default]
    And,
    Or,
}

impl BoolOp {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::And => "and",
            Self::Or => "or",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "and" => Some(Self::And),
            "or" => Some(Self::Or),
            _ => None,
        }
    }
}

impl fmt::Display for BoolOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

///
/// OrderDirection
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum OrderDirection {
    #[default]
    Asc,
    Desc,
}

impl OrderDirection {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }

    /// Case-insensitive parse; anything that is not `desc` sorts
    /// ascending, matching the permissive wire contract.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        if name.eq_ignore_ascii_case("desc") {
            Self::Desc
        } else {
            Self::Asc
        }
    }
}

impl fmt::Display for OrderDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

///
/// JoinKind
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
}

impl JoinKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Inner => "inner",
            Self::Left => "left",
            Self::Right => "right",
        }
    }
}

impl fmt::Display for JoinKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

///
/// AggregateFn
///
/// The aggregate vocabulary. The `Add*` variants build self-correlated
/// subqueries ("how many other rows share this value") instead of
/// relation- or filter-scoped ones.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AggregateFn {
    Count,
    Min,
    Max,
    Sum,
    Avg,
    AddCount,
    AddSum,
}

impl AggregateFn {
    pub const ALL: &'static [Self] = &[
        Self::Count,
        Self::Min,
        Self::Max,
        Self::Sum,
        Self::Avg,
        Self::AddCount,
        Self::AddSum,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Count => "count",
            Self::Min => "min",
            Self::Max => "max",
            Self::Sum => "sum",
            Self::Avg => "avg",
            Self::AddCount => "addCount",
            Self::AddSum => "addSum",
        }
    }

    /// Alias prefix for synthesized columns (`{label}_{column}`).
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Count => "count",
            Self::Min => "min",
            Self::Max => "max",
            Self::Sum => "sum",
            Self::Avg => "avg",
            Self::AddCount => "add_count",
            Self::AddSum => "add_sum",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|f| f.as_str() == name)
    }

    /// The scalar function the Add variants delegate to.
    #[must_use]
    pub const fn base(self) -> Self {
        match self {
            Self::AddCount => Self::Count,
            Self::AddSum => Self::Sum,
            other => other,
        }
    }
}

impl fmt::Display for AggregateFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

///
/// Correlation
///
/// How a synthesized aggregate column correlates its subselect.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Correlation {
    /// Clone of the current (fully filtered) query shape, correlated on
    /// the aggregated column.
    Filtered,

    /// The model's own table joined against itself on the aggregated
    /// column; ignores the current filter shape.
    SelfJoin,
}

///
/// AggregateSelect
///
/// One computed column added to the selection without altering row
/// selection. Transient; built per apply call and discarded.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AggregateSelect {
    pub function: AggregateFn,
    pub column: String,
    pub alias: String,
    pub correlation: Correlation,
}

/// Callback applied to a relation- or group-scoped sub-builder.
///
/// Context is explicit: the engine constructs these at the dispatch
/// site, so nothing inside a builder implementation ever needs a
/// reference back to the engine.
pub type SubqueryFn<'a, B> = &'a dyn Fn(B) -> Result<B, Error>;

///
/// QueryBuilder
///
/// The query-shaping surface of the builder capability. Handles are
/// owned values: every transformation consumes `self` and returns the
/// next handle, so no call site can alias a half-mutated builder.
///
/// Argument validation beyond the engine's own guardrails is the
/// implementation's concern; operator strings pass through verbatim.
///

pub trait QueryBuilder: Clone + Sized {
    fn where_clause(
        self,
        column: &str,
        operator: &str,
        value: Value,
        boolean: BoolOp,
    ) -> Result<Self, Error>;

    /// Parenthesized condition group applied to a sub-scope.
    fn where_group(self, callback: SubqueryFn<'_, Self>, boolean: BoolOp) -> Result<Self, Error>;

    fn where_in(
        self,
        column: &str,
        values: Vec<Value>,
        negated: bool,
        boolean: BoolOp,
    ) -> Result<Self, Error>;

    fn where_between(
        self,
        column: &str,
        low: Value,
        high: Value,
        boolean: BoolOp,
    ) -> Result<Self, Error>;

    fn where_null(self, column: &str, negated: bool, boolean: BoolOp) -> Result<Self, Error>;

    fn where_date(
        self,
        column: &str,
        operator: &str,
        value: Value,
        boolean: BoolOp,
    ) -> Result<Self, Error>;

    /// Relation-existence predicate: keep rows whose related count for
    /// `relation` satisfies `operator count`, optionally constrained by
    /// `callback` on the relation's own scope.
    fn where_relation(
        self,
        relation: &str,
        operator: &str,
        count: u64,
        boolean: BoolOp,
        callback: Option<SubqueryFn<'_, Self>>,
    ) -> Result<Self, Error>;

    fn order_by(self, column: &str, direction: OrderDirection) -> Result<Self, Error>;

    fn group_by(self, columns: Vec<String>) -> Result<Self, Error>;

    /// `table` is absent for bare `[left, op, right]` join tuples; the
    /// implementation derives the joined table from the column sides.
    fn join(
        self,
        kind: JoinKind,
        table: Option<&str>,
        left: &str,
        operator: &str,
        right: &str,
    ) -> Result<Self, Error>;

    fn limit(self, count: u64) -> Result<Self, Error>;

    fn skip(self, count: u64) -> Result<Self, Error>;

    fn take(self, count: u64) -> Result<Self, Error>;

    fn distinct(self) -> Result<Self, Error>;

    fn select(self, columns: Vec<String>) -> Result<Self, Error>;

    /// Eager-load the named relations onto returned rows.
    fn with_related(self, relations: Vec<String>) -> Result<Self, Error>;

    /// Relation-scoped aggregate column via the builder's native
    /// support (`withAggregate`-equivalent).
    fn with_aggregate(
        self,
        relation: &str,
        function: AggregateFn,
        column: &str,
    ) -> Result<Self, Error>;

    /// Synthesized correlated aggregate column; `callback` refines the
    /// subselect before aggregation.
    fn add_select_aggregate(
        self,
        select: &AggregateSelect,
        callback: Option<SubqueryFn<'_, Self>>,
    ) -> Result<Self, Error>;
}

///
/// Page
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Page<R> {
    pub rows: Vec<R>,
    pub page: u64,
    pub per_page: u64,
    pub total: u64,
}

///
/// Storage
///
/// Execution and DML surface of the collaborator. Split from
/// [`QueryBuilder`] so the filter engine can be bounded on shaping
/// alone; only the session orchestration needs this trait.
///

pub trait Storage: QueryBuilder {
    type Row: Clone;

    fn get(self) -> Result<Vec<Self::Row>, Error>;

    fn first(self) -> Result<Option<Self::Row>, Error>;

    fn paginate(self, page: u64, per_page: u64) -> Result<Page<Self::Row>, Error>;

    fn create(self, attributes: &Value) -> Result<Self::Row, Error>;

    fn update(self, attributes: &Value) -> Result<u64, Error>;

    fn delete(self) -> Result<u64, Error>;

    fn update_or_create(self, matching: &Value, attributes: &Value) -> Result<Self::Row, Error>;
}
