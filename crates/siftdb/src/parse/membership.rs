use crate::{
    parse::{ParseError, is_row_list},
    value::Value,
};

///
/// MembershipClause
///
/// One resolved `whereIn`/`whereNotIn` entry. Under-specified assoc
/// entries are preserved as `Partial` so the engine can honor its
/// silent-skip contract instead of raising on sparse client input.
///

#[derive(Clone, Debug, PartialEq)]
pub enum MembershipClause {
    Complete { column: String, values: Vec<Value> },
    Partial,
}

/// Normalize `whereIn`/`whereNotIn` parameters.
///
/// Accepts an assoc `{column, match}` map or a positional 2-tuple
/// `[column, matchArray]`, or a list of either. A positional tuple
/// with the wrong arity is a hard error; an assoc entry missing one of
/// its two keys degrades to `Partial`.
pub fn parse(params: &Value) -> Result<Vec<MembershipClause>, ParseError> {
    match params {
        Value::List(items) if is_row_list(items) => {
            let mut clauses = Vec::with_capacity(items.len());
            for item in items {
                clauses.extend(parse(item)?);
            }
            Ok(clauses)
        }
        Value::List(items) => Ok(vec![parse_positional(items)?]),
        Value::Map(_) => Ok(vec![parse_assoc(params)?]),
        _ => Err(ParseError::WrongArity {
            context: "whereIn",
            expected: "2",
            found: 1,
        }),
    }
}

fn parse_positional(items: &[Value]) -> Result<MembershipClause, ParseError> {
    if items.len() != 2 {
        return Err(ParseError::WrongArity {
            context: "whereIn",
            expected: "2",
            found: items.len(),
        });
    }

    let Some(column) = items[0].as_text() else {
        return Err(ParseError::InvalidShape {
            context: "whereIn column",
        });
    };

    Ok(match match_values(&items[1]) {
        Some(values) => MembershipClause::Complete {
            column: column.to_string(),
            values,
        },
        None => MembershipClause::Partial,
    })
}

fn parse_assoc(params: &Value) -> Result<MembershipClause, ParseError> {
    let column = params.get("column").and_then(Value::as_text);
    let matched = params.get("match");

    match (column, matched) {
        (None, None) => Err(ParseError::MissingKeys { context: "whereIn" }),
        (Some(column), Some(matched)) => Ok(match match_values(matched) {
            Some(values) => MembershipClause::Complete {
                column: column.to_string(),
                values,
            },
            None => MembershipClause::Partial,
        }),
        // One key present, the other missing: an under-specified tuple
        // the engine skips silently.
        _ => Ok(MembershipClause::Partial),
    }
}

/// Match values for membership: a list as-is, a scalar coerced to a
/// one-element list, null as absent.
fn match_values(value: &Value) -> Option<Vec<Value>> {
    match value {
        Value::Null => None,
        Value::List(items) => Some(items.clone()),
        other => Some(vec![other.clone()]),
    }
}
