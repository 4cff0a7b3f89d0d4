//! Parameter parsers.
//!
//! Filter parameters arrive in heterogeneous shapes: flat tuples,
//! lists of tuples, assoc maps with `column`/`match` keys. Each parser
//! here resolves one family of shapes into a canonical clause the
//! engine can apply without any further shape branching. Parsers run
//! exactly once on raw client input; re-parsing an already-normalized
//! tuple is a no-op by construction.

pub mod condition;
pub mod join;
pub mod membership;
pub mod subquery;

#[cfg(test)]
mod tests;

pub use condition::{Condition, ConditionClause};
pub use join::JoinClause;
pub use membership::MembershipClause;
pub use subquery::{ExistenceClause, SubqueryCall, SubqueryClause};

use crate::{traits::EntityCatalog, value::Value};
use thiserror::Error as ThisError;

///
/// ParseError
///
/// Malformed filter shape detected during parsing. Propagates to the
/// caller; never swallowed at this layer.
///

#[derive(Debug, Eq, PartialEq, ThisError)]
pub enum ParseError {
    #[error("condition slot {index} is unset")]
    UnsetSlot { index: usize },

    #[error("{context}: expected {expected} elements, found {found}")]
    WrongArity {
        context: &'static str,
        expected: &'static str,
        found: usize,
    },

    #[error("{context}: missing required keys")]
    MissingKeys { context: &'static str },

    #[error("nested query object is missing its 'method' key")]
    MissingMethod,

    #[error("nested query object is missing its 'params' key")]
    MissingParams,

    #[error("method '{method}' is not allowed in nested queries")]
    UnsupportedMethod { method: String },

    #[error("join parameters are entirely unset")]
    EmptyJoin,

    #[error("unknown model reference: '{model}'")]
    UnknownModel { model: String },

    #[error("'{text}' is not a calendar date")]
    InvalidDate { text: String },

    #[error("{context}: unexpected parameter shape")]
    InvalidShape { context: &'static str },
}

///
/// QueryableRef
///
/// Structured `{model, column?}` reference to another entity's table,
/// resolved against the catalog into a dotted `table.column` string.
/// This is how cross-table column references are expressed without a
/// raw SQL fragment.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct QueryableRef<'a> {
    pub model: &'a str,
    pub column: Option<&'a str>,
}

impl<'a> QueryableRef<'a> {
    #[must_use]
    pub fn from_value(value: &'a Value) -> Option<Self> {
        let model = value.get("model")?.as_text()?;
        let column = value.get("column").and_then(Value::as_text);

        Some(Self { model, column })
    }

    /// Resolve to the referenced entity's table name (never its model
    /// name), optionally suffixed with the column.
    pub fn resolve(&self, catalog: &dyn EntityCatalog) -> Result<String, ParseError> {
        let table = catalog
            .table(self.model)
            .ok_or_else(|| ParseError::UnknownModel {
                model: self.model.to_string(),
            })?;

        Ok(match self.column {
            Some(column) => format!("{table}.{column}"),
            None => table.to_string(),
        })
    }
}

/// Resolve a column slot: bare text passes through, a structured
/// reference resolves via the catalog.
pub(crate) fn resolve_column(
    catalog: &dyn EntityCatalog,
    value: &Value,
    context: &'static str,
) -> Result<String, ParseError> {
    match value {
        Value::Text(text) => Ok(text.clone()),
        Value::Map(_) => QueryableRef::from_value(value)
            .ok_or(ParseError::InvalidShape { context })?
            .resolve(catalog),
        _ => Err(ParseError::InvalidShape { context }),
    }
}

/// True when a list's elements are all lists or maps, i.e. the list is
/// a row list rather than one flat positional tuple.
pub(crate) fn is_row_list(items: &[Value]) -> bool {
    !items.is_empty()
        && items
            .iter()
            .all(|item| matches!(item, Value::List(_) | Value::Map(_)))
}
