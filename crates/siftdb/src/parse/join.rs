use crate::{
    parse::{ParseError, is_row_list, resolve_column},
    traits::EntityCatalog,
    value::Value,
};

/// Operator symbols recognized in the middle slot of a 3-element join
/// tuple. Anything else makes the middle slot a join column.
const JOIN_OPERATORS: &[&str] = &["=", "<", ">", "<=", ">=", "<>", "!="];

///
/// JoinClause
///
/// Canonical join arguments. The table slot is only present in the
/// `[table, left, op, right]` forms; bare `[left, op, right]` tuples
/// leave table derivation to the builder.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct JoinClause {
    pub table: Option<String>,
    pub left: String,
    pub operator: String,
    pub right: String,
}

/// Normalize join parameters.
///
/// - 2-tuple `[left, right]` → operator `=` spliced in
/// - 3-tuple: `[left, op, right]` when the middle slot is an operator
///   symbol, otherwise `[table, left, right]` with `=` spliced in
/// - 4-tuple `[table, left, op, right]` → explicit operator
///
/// Each side may be a bare string or a structured `{model, column}`
/// reference resolved to a dotted `table.column` string.
pub fn parse(catalog: &dyn EntityCatalog, params: &Value) -> Result<Vec<JoinClause>, ParseError> {
    match params {
        Value::List(items) if is_row_list(items) => {
            let mut clauses = Vec::with_capacity(items.len());
            for item in items {
                clauses.extend(parse(catalog, item)?);
            }
            Ok(clauses)
        }
        Value::List(items) => Ok(vec![parse_tuple(catalog, items)?]),
        _ => Err(ParseError::InvalidShape { context: "join" }),
    }
}

fn parse_tuple(catalog: &dyn EntityCatalog, items: &[Value]) -> Result<JoinClause, ParseError> {
    if items.iter().all(Value::is_null) {
        return Err(ParseError::EmptyJoin);
    }

    let side = |value: &Value| resolve_column(catalog, value, "join side");

    match items {
        [left, right] => Ok(JoinClause {
            table: None,
            left: side(left)?,
            operator: "=".to_string(),
            right: side(right)?,
        }),
        [a, b, c] => {
            if b.as_text().is_some_and(|text| JOIN_OPERATORS.contains(&text)) {
                Ok(JoinClause {
                    table: None,
                    left: side(a)?,
                    operator: b.as_text().unwrap_or_default().to_string(),
                    right: side(c)?,
                })
            } else {
                Ok(JoinClause {
                    table: Some(side(a)?),
                    left: side(b)?,
                    operator: "=".to_string(),
                    right: side(c)?,
                })
            }
        }
        [table, left, operator, right] => {
            let operator = operator.as_text().ok_or(ParseError::InvalidShape {
                context: "join operator",
            })?;

            Ok(JoinClause {
                table: Some(side(table)?),
                left: side(left)?,
                operator: operator.to_string(),
                right: side(right)?,
            })
        }
        _ => Err(ParseError::WrongArity {
            context: "join",
            expected: "2..=4",
            found: items.len(),
        }),
    }
}
