use crate::{filter::FilterKey, value::Value};
use thiserror::Error as ThisError;

///
/// Statement
///
/// One parsed unit of a string-encoded method call, `method(arg,arg)`,
/// ready to be replayed against a sub-builder. Chains are written
/// `where(a,b)->orWhere(c,d)` and split on `->`.
///
/// Arguments are split on `,` with no quoting or escaping; commas
/// inside argument values are not supported. Callers who need them
/// must use the structured JSON form instead.
///

#[derive(Clone, Debug, PartialEq)]
pub struct Statement {
    pub method: FilterKey,
    pub args: Vec<Value>,
}

impl Statement {
    /// Parse one `method(arg,...)` call.
    ///
    /// The method name must be on the sub-query allowlist; statements
    /// replay client-supplied text against a builder, which is the same
    /// security boundary as a nested query object.
    pub fn parse(text: &str) -> Result<Self, StatementError> {
        let text = text.trim();
        let open = text.find('(').ok_or_else(|| StatementError::MissingParens {
            text: text.to_string(),
        })?;

        let Some(inner) = text[open + 1..].strip_suffix(')') else {
            return Err(StatementError::MissingParens {
                text: text.to_string(),
            });
        };

        let name = text[..open].trim();
        let method = FilterKey::from_name(name)
            .filter(|key| key.subquery_allowed())
            .ok_or_else(|| StatementError::UnsupportedMethod {
                method: name.to_string(),
            })?;

        let args = if inner.trim().is_empty() {
            Vec::new()
        } else {
            inner.split(',').map(parse_arg).collect()
        };

        Ok(Self { method, args })
    }

    /// Parse a `->`-separated chain into its ordered statement list.
    pub fn parse_chain(text: &str) -> Result<Vec<Self>, StatementError> {
        text.split("->").map(Self::parse).collect()
    }
}

/// Coerce one raw argument token into a typed value.
///
/// Everything on the wire is text; numeric, boolean and null literals
/// are recovered so replayed conditions compare naturally.
fn parse_arg(raw: &str) -> Value {
    let raw = raw.trim();

    if raw == "null" {
        return Value::Null;
    }
    if raw == "true" {
        return Value::Bool(true);
    }
    if raw == "false" {
        return Value::Bool(false);
    }
    if let Ok(int) = raw.parse::<i64>() {
        return Value::Int(int);
    }
    if let Ok(float) = raw.parse::<f64>() {
        return Value::float(float);
    }

    Value::Text(raw.to_string())
}

///
/// StatementError
///

#[derive(Debug, Eq, PartialEq, ThisError)]
pub enum StatementError {
    #[error("statement '{text}' has no parenthesized argument list")]
    MissingParens { text: String },

    #[error("statement method '{method}' is not allowed")]
    UnsupportedMethod { method: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_method_and_positional_args() {
        let statement = Statement::parse("where(status,1)").unwrap();

        assert_eq!(statement.method, FilterKey::Where);
        assert_eq!(
            statement.args,
            vec![Value::Text("status".into()), Value::Int(1)]
        );
    }

    #[test]
    fn parses_chains_in_order() {
        let chain = Statement::parse_chain("where(a,b)->orWhere(c,d)").unwrap();

        assert_eq!(chain.len(), 2);
        assert_eq!(chain[0].method, FilterKey::Where);
        assert_eq!(chain[1].method, FilterKey::OrWhere);
    }

    #[test]
    fn rejects_text_without_parens() {
        assert!(matches!(
            Statement::parse("where"),
            Err(StatementError::MissingParens { .. })
        ));
    }

    #[test]
    fn rejects_methods_outside_the_allowlist() {
        assert!(matches!(
            Statement::parse("deleteEverything(users)"),
            Err(StatementError::UnsupportedMethod { .. })
        ));
        // `limit` is a filter key but not a replayable sub-query method.
        assert!(matches!(
            Statement::parse("limit(5)"),
            Err(StatementError::UnsupportedMethod { .. })
        ));
    }

    #[test]
    fn literal_coercion_recovers_types() {
        let statement = Statement::parse("where(age,28)").unwrap();
        assert_eq!(statement.args[1], Value::Int(28));

        let statement = Statement::parse("where(active,true)").unwrap();
        assert_eq!(statement.args[1], Value::Bool(true));

        let statement = Statement::parse("where(name,smith)").unwrap();
        assert_eq!(statement.args[1], Value::Text("smith".into()));
    }

    #[test]
    fn commas_inside_values_split_naively() {
        // Known limitation: no escaping support.
        let statement = Statement::parse("where(name,a,b)").unwrap();
        assert_eq!(statement.args.len(), 3);
    }
}
