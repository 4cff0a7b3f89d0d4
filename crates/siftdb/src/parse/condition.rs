use crate::{
    builder::BoolOp,
    parse::{ParseError, is_row_list, resolve_column, subquery},
    traits::EntityCatalog,
    value::Value,
};

///
/// Condition
///
/// Canonical condition tuple: 2–4 positional slots normalized into
/// named fields. Once built, slot count is never ambiguous again.
///

#[derive(Clone, Debug, PartialEq)]
pub struct Condition {
    pub column: String,
    pub operator: String,
    pub value: Value,
    /// Explicit conjunction from a 4-element tuple; `None` defers to
    /// the dispatching filter key's default.
    pub boolean: Option<BoolOp>,
}

///
/// ConditionClause
///
/// One resolved `where`/`orWhere` entry: either a plain tuple or a
/// nested condition group recursively resolved from a `match` object.
///

#[derive(Clone, Debug, PartialEq)]
pub enum ConditionClause {
    Tuple(Condition),
    /// Assoc `{column, match}` form: validated calls replayed on a
    /// sub-scope of the builder.
    Nested { calls: Vec<subquery::SubqueryCall> },
}

/// Normalize `where`/`orWhere` parameters.
///
/// - list of lists → each element normalized recursively
/// - flat 2–4 tuple → one [`Condition`]
/// - assoc map carrying `match` → one nested clause
pub fn parse(
    catalog: &dyn EntityCatalog,
    params: &Value,
) -> Result<Vec<ConditionClause>, ParseError> {
    match params {
        Value::List(items) if is_row_list(items) => {
            let mut clauses = Vec::with_capacity(items.len());
            for item in items {
                clauses.extend(parse(catalog, item)?);
            }
            Ok(clauses)
        }
        Value::List(items) => Ok(vec![ConditionClause::Tuple(parse_tuple(catalog, items)?)]),
        Value::Map(_) => {
            let match_value = params
                .get("match")
                .ok_or(ParseError::InvalidShape { context: "where" })?;

            Ok(vec![ConditionClause::Nested {
                calls: subquery::parse_calls(match_value)?,
            }])
        }
        _ => Err(ParseError::InvalidShape { context: "where" }),
    }
}

/// Normalize `whereDate` parameters: same tuple rules as [`parse`],
/// plus the value slot must hold a calendar-date literal. Nested
/// groups are not a date-filter shape.
pub fn parse_date(
    catalog: &dyn EntityCatalog,
    params: &Value,
) -> Result<Vec<Condition>, ParseError> {
    let mut conditions = Vec::new();
    for clause in parse(catalog, params)? {
        match clause {
            ConditionClause::Tuple(condition) => {
                if condition.value.as_date().is_none() {
                    return Err(ParseError::InvalidDate {
                        text: condition
                            .value
                            .as_text()
                            .unwrap_or_default()
                            .to_string(),
                    });
                }
                conditions.push(condition);
            }
            ConditionClause::Nested { .. } => {
                return Err(ParseError::InvalidShape {
                    context: "whereDate",
                });
            }
        }
    }

    Ok(conditions)
}

fn parse_tuple(catalog: &dyn EntityCatalog, items: &[Value]) -> Result<Condition, ParseError> {
    if !(2..=4).contains(&items.len()) {
        return Err(ParseError::WrongArity {
            context: "where",
            expected: "2..=4",
            found: items.len(),
        });
    }

    // Every slot of a condition tuple must be set.
    if let Some(index) = items.iter().position(Value::is_null) {
        return Err(ParseError::UnsetSlot { index });
    }

    let column = resolve_column(catalog, &items[0], "where column")?;

    let (operator, value, boolean) = match items {
        [_, value] => ("=".to_string(), value.clone(), None),
        [_, operator, value] => (operator_slot(operator)?, value.clone(), None),
        [_, operator, value, boolean] => (
            operator_slot(operator)?,
            value.clone(),
            Some(boolean_slot(boolean)?),
        ),
        _ => unreachable!("arity checked above"),
    };

    Ok(Condition {
        column,
        operator,
        value,
        boolean,
    })
}

fn operator_slot(value: &Value) -> Result<String, ParseError> {
    value
        .as_text()
        .map(str::to_string)
        .ok_or(ParseError::InvalidShape {
            context: "where operator",
        })
}

fn boolean_slot(value: &Value) -> Result<BoolOp, ParseError> {
    value
        .as_text()
        .and_then(BoolOp::from_name)
        .ok_or(ParseError::InvalidShape {
            context: "where boolean",
        })
}
