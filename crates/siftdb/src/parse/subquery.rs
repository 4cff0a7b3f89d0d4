use crate::{
    builder::BoolOp,
    filter::FilterKey,
    parse::{ParseError, is_row_list},
    value::Value,
};

///
/// SubqueryCall
///
/// One validated nested-query call: the method has already passed the
/// allowlist, the params keep their wire shape and are normalized by
/// the per-key parser when the call is replayed.
///

#[derive(Clone, Debug, PartialEq)]
pub struct SubqueryCall {
    pub method: FilterKey,
    pub params: Value,
}

///
/// SubqueryClause
///
/// One resolved `whereHas`/`whereDoesntHave` entry: the relation path
/// plus the calls its closure replays against the relation's scope.
/// Operator and count stay configurable here; the `exists` family
/// overrides them.
///

#[derive(Clone, Debug, PartialEq)]
pub struct SubqueryClause {
    pub relation: String,
    pub calls: Vec<SubqueryCall>,
    pub operator: Option<String>,
    pub count: Option<u64>,
}

///
/// ExistenceClause
///
/// The 5-slot form used by the `exists` family. Operator and boolean
/// are forced per variant so the filter name always means what it
/// says; caller-supplied values for those slots are ignored.
///

#[derive(Clone, Debug, PartialEq)]
pub struct ExistenceClause {
    pub relation: String,
    pub operator: &'static str,
    pub count: u64,
    pub boolean: BoolOp,
    pub calls: Vec<SubqueryCall>,
}

/// Normalize `whereHas`/`whereDoesntHave` parameters.
///
/// Accepts a bare relation name, an assoc `{column, match}` map, a
/// positional `[relation, match]` tuple, or a list of any of those.
pub fn parse(params: &Value) -> Result<Vec<SubqueryClause>, ParseError> {
    match params {
        Value::Text(relation) => Ok(vec![SubqueryClause {
            relation: relation.clone(),
            calls: Vec::new(),
            operator: None,
            count: None,
        }]),
        Value::Map(_) => Ok(vec![parse_assoc(params)?]),
        Value::List(items) if is_row_list(items) => {
            let mut clauses = Vec::with_capacity(items.len());
            for item in items {
                clauses.extend(parse(item)?);
            }
            Ok(clauses)
        }
        Value::List(items) => Ok(vec![parse_positional(items)?]),
        _ => Err(ParseError::InvalidShape { context: "whereHas" }),
    }
}

/// Normalize an `exists`-family entry into its forced 5-slot form.
///
/// Operator and boolean come from the variant, never from the caller;
/// only the minimum count stays configurable.
pub fn parse_existence(
    params: &Value,
    operator: &'static str,
    boolean: BoolOp,
) -> Result<Vec<ExistenceClause>, ParseError> {
    let clauses = parse(params)?;

    Ok(clauses
        .into_iter()
        .map(|clause| ExistenceClause {
            relation: clause.relation,
            operator,
            count: clause.count.unwrap_or(1),
            boolean,
            calls: clause.calls,
        })
        .collect())
}

fn parse_assoc(params: &Value) -> Result<SubqueryClause, ParseError> {
    let relation = params
        .get("column")
        .or_else(|| params.get("relation"))
        .and_then(Value::as_text)
        .ok_or(ParseError::MissingKeys { context: "whereHas" })?;

    let calls = match params.get("match") {
        Some(matched) => parse_calls(matched)?,
        None => Vec::new(),
    };

    Ok(SubqueryClause {
        relation: relation.to_string(),
        calls,
        operator: params
            .get("operator")
            .and_then(Value::as_text)
            .map(str::to_string),
        count: params.get("count").and_then(Value::as_u64),
    })
}

fn parse_positional(items: &[Value]) -> Result<SubqueryClause, ParseError> {
    let [relation, matched] = items else {
        return Err(ParseError::WrongArity {
            context: "whereHas",
            expected: "2",
            found: items.len(),
        });
    };

    let relation = relation.as_text().ok_or(ParseError::InvalidShape {
        context: "whereHas relation",
    })?;

    Ok(SubqueryClause {
        relation: relation.to_string(),
        calls: parse_calls(matched)?,
        operator: None,
        count: None,
    })
}

/// Validate a `match` object (or list of them) into replayable calls.
///
/// Every call must carry `method` and `params`, and the method must be
/// on [`FilterKey::SUBQUERY_ALLOWED`]. This is the boundary that keeps
/// untrusted filter input from invoking arbitrary builder methods.
pub(crate) fn parse_calls(value: &Value) -> Result<Vec<SubqueryCall>, ParseError> {
    match value {
        Value::Map(_) => Ok(vec![parse_call(value)?]),
        Value::List(items) if is_row_list(items) => {
            items.iter().map(parse_call).collect()
        }
        _ => Err(ParseError::InvalidShape {
            context: "match object",
        }),
    }
}

fn parse_call(value: &Value) -> Result<SubqueryCall, ParseError> {
    let method = value.get("method").ok_or(ParseError::MissingMethod)?;
    let params = value.get("params").ok_or(ParseError::MissingParams)?;

    let name = method.as_text().ok_or(ParseError::MissingMethod)?;
    let method = FilterKey::from_name(name)
        .filter(|key| key.subquery_allowed())
        .ok_or_else(|| ParseError::UnsupportedMethod {
            method: name.to_string(),
        })?;

    Ok(SubqueryCall {
        method,
        params: params.clone(),
    })
}
