use crate::value::Value;

/// Recognized value prefixes, in match order, with the operator each
/// maps to. `=like` wraps the remaining value in `%…%`.
const PREFIXES: &[(&str, &str)] = &[
    (">=:", ">="),
    ("<=:", "<="),
    ("<>:", "<>"),
    ("=like:", "like"),
    ("==:", "="),
];

/// Derive `(operator, value, connector)` from one raw request value.
///
/// Text values are scanned for a prefix operator; a leading `&&:` or
/// `||:` connector marker is stripped and ignored, so the third slot
/// is always unset. Without a prefix, numeric and boolean values
/// compare with `=` and everything else falls back to a `%…%` like.
pub fn operator_value(raw: &Value) -> (String, Value, Option<String>) {
    let Some(text) = raw.as_text() else {
        return ("=".to_string(), raw.clone(), None);
    };

    let text = text
        .strip_prefix("&&:")
        .or_else(|| text.strip_prefix("||:"))
        .unwrap_or(text);

    for (prefix, operator) in PREFIXES {
        if let Some(rest) = text.strip_prefix(prefix) {
            let value = if *operator == "like" {
                format!("%{rest}%")
            } else {
                rest.to_string()
            };

            return ((*operator).to_string(), Value::Text(value), None);
        }
    }

    if Value::Text(text.to_string()).is_numeric_like() {
        return ("=".to_string(), Value::Text(text.to_string()), None);
    }

    ("like".to_string(), Value::Text(format!("%{text}%")), None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connector_marker_is_stripped_and_discarded() {
        let (op, value, connector) = operator_value(&Value::Text("&&:>=:2022-10-10".into()));

        assert_eq!(op, ">=");
        assert_eq!(value, Value::Text("2022-10-10".into()));
        assert_eq!(connector, None);
    }

    #[test]
    fn numeric_text_compares_with_equals() {
        let (op, value, connector) = operator_value(&Value::Text("30".into()));

        assert_eq!(op, "=");
        assert_eq!(value, Value::Text("30".into()));
        assert_eq!(connector, None);
    }

    #[test]
    fn plain_text_falls_back_to_like() {
        let (op, value, connector) = operator_value(&Value::Text("smith".into()));

        assert_eq!(op, "like");
        assert_eq!(value, Value::Text("%smith%".into()));
        assert_eq!(connector, None);
    }

    #[test]
    fn explicit_prefixes_map_to_their_operators() {
        let (op, value, _) = operator_value(&Value::Text("==:admin".into()));
        assert_eq!((op.as_str(), value), ("=", Value::Text("admin".into())));

        let (op, value, _) = operator_value(&Value::Text("=like:smi".into()));
        assert_eq!((op.as_str(), value), ("like", Value::Text("%smi%".into())));

        let (op, value, _) = operator_value(&Value::Text("<>:archived".into()));
        assert_eq!((op.as_str(), value), ("<>", Value::Text("archived".into())));
    }

    #[test]
    fn non_text_values_compare_with_equals() {
        let (op, value, _) = operator_value(&Value::Int(28));
        assert_eq!((op.as_str(), value), ("=", Value::Int(28)));

        let (op, value, _) = operator_value(&Value::Bool(true));
        assert_eq!((op.as_str(), value), ("=", Value::Bool(true)));
    }
}
