//! Result projection.
//!
//! A projection tuple (visible columns and eager-loaded relations) is
//! applied on top of the already-filtered builder, never before
//! filtering, so it can narrow the response shape without influencing
//! row selection.

use crate::{builder::QueryBuilder, error::Error, value::Value};

///
/// Projection
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Projection {
    pub columns: Vec<String>,
    pub relations: Vec<String>,
}

impl Projection {
    #[must_use]
    pub const fn new(columns: Vec<String>, relations: Vec<String>) -> Self {
        Self { columns, relations }
    }

    /// Build from wire input: a 2-tuple `[columns, relations]` or an
    /// object `{columns, relations}`. Missing slots project nothing.
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        let (columns, relations) = match value {
            Value::List(items) => (items.first(), items.get(1)),
            Value::Map(_) => (value.get("columns"), value.get("relations")),
            _ => (None, None),
        };

        Self {
            columns: names(columns),
            relations: names(relations),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty() && self.relations.is_empty()
    }

    /// Apply onto a filtered builder. Empty slots leave the builder
    /// untouched.
    pub fn apply<B: QueryBuilder>(&self, builder: B) -> Result<B, Error> {
        let mut builder = builder;

        if !self.columns.is_empty() {
            builder = builder.select(self.columns.clone())?;
        }
        if !self.relations.is_empty() {
            builder = builder.with_related(self.relations.clone())?;
        }

        Ok(builder)
    }
}

fn names(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::List(items)) => items
            .iter()
            .filter_map(Value::as_text)
            .map(str::to_string)
            .collect(),
        Some(Value::Text(name)) => vec![name.clone()],
        _ => Vec::new(),
    }
}
