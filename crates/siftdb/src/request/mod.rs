//! Client query-parameter builder.
//!
//! Converts two independent untyped input sources into the canonical
//! filter dictionary: the flat request parameter bag and the nested
//! `_query` envelope. The two passes merge append-aware; direct-field
//! filters are re-sorted into the fixed priority before the envelope
//! layers on top.

mod envelope;
mod operator;

#[cfg(test)]
mod tests;

pub use operator::operator_value;

use crate::{
    error::Error,
    filter::{FilterDictionary, FilterKey},
    traits::{EntityCatalog, EntityDescriptor},
    value::Value,
};

/// Reserved request parameter carrying the nested query envelope.
pub const QUERY_ENVELOPE_KEY: &str = "_query";

/// Build the canonical filter dictionary for one request.
///
/// `bag` is the flat key/value parameter bag; `envelope` is the
/// already-extracted `_query` value (JSON text or decoded object).
pub fn build(
    catalog: &dyn EntityCatalog,
    entity: &dyn EntityDescriptor,
    bag: &[(String, Value)],
    envelope: Option<&Value>,
) -> Result<FilterDictionary, Error> {
    let mut dictionary = direct_pass(entity, bag);
    dictionary.sort_by_priority();

    if let Some(envelope) = envelope {
        envelope::merge_into(&mut dictionary, catalog, envelope)?;
    }

    Ok(dictionary)
}

/// Direct-field pass over the flat parameter bag.
///
/// Searchable columns become `orWhere` tuples with a detected
/// operator; `relation__column` keys become `whereHas` entries when
/// the entity actually exposes the relation. Everything else is
/// ignored.
fn direct_pass(entity: &dyn EntityDescriptor, bag: &[(String, Value)]) -> FilterDictionary {
    let mut dictionary = FilterDictionary::new();

    for (key, value) in bag {
        if key == QUERY_ENVELOPE_KEY || value.is_unset() {
            continue;
        }

        if entity.searchable().contains(&key.as_str()) {
            let (operator, value, _) = operator_value(value);
            dictionary.merge(
                FilterKey::OrWhere,
                Value::List(vec![
                    Value::Text(key.clone()),
                    Value::Text(operator),
                    value,
                ]),
            );
        } else if let Some((relation_raw, column)) = key.split_once("__") {
            let relation = relation_raw.replace([':', '%'], ".");

            // The relation gate checks the path root: that is the
            // relation name the entity would have to expose.
            let root = relation.split('.').next().unwrap_or(&relation);
            if !entity.has_relation(root) {
                continue;
            }

            dictionary.merge(FilterKey::WhereHas, relation_entry(&relation, column, value));
        }
    }

    dictionary
}

/// Build one `whereHas` entry for a relation-path request key.
fn relation_entry(relation: &str, column: &str, value: &Value) -> Value {
    let call = match value {
        Value::List(_) => Value::Map(vec![
            ("method".to_string(), Value::Text("whereIn".to_string())),
            (
                "params".to_string(),
                Value::List(vec![Value::Text(column.to_string()), value.clone()]),
            ),
        ]),
        scalar => {
            let (operator, value, _) = operator_value(scalar);
            Value::Map(vec![
                ("method".to_string(), Value::Text("where".to_string())),
                (
                    "params".to_string(),
                    Value::List(vec![
                        Value::Text(column.to_string()),
                        Value::Text(operator),
                        value,
                    ]),
                ),
            ])
        }
    };

    Value::Map(vec![
        ("column".to_string(), Value::Text(relation.to_string())),
        ("match".to_string(), call),
    ])
}
