use crate::{
    error::{Error, ErrorOrigin},
    filter::{FilterDictionary, FilterKey},
    parse::{condition, join, membership, subquery},
    traits::EntityCatalog,
    value::Value,
};

/// Layer a `_query` envelope onto an accumulating dictionary.
///
/// The envelope is JSON-decoded when it arrives as a string. Only the
/// fixed supported-method list is read; input key order and unknown
/// keys never influence the result. Every value passes its matching
/// normalizer before it is merged, so this is the strict validation
/// path: malformed shapes and disallowed nested methods reject the
/// request here instead of surfacing mid-application.
pub(crate) fn merge_into(
    dictionary: &mut FilterDictionary,
    catalog: &dyn EntityCatalog,
    envelope: &Value,
) -> Result<(), Error> {
    let decoded;
    let envelope = match envelope {
        Value::Text(json) => {
            decoded = serde_json::from_str::<Value>(json).map_err(|err| {
                Error::invalid_argument(
                    ErrorOrigin::Request,
                    format!("_query is not valid JSON: {err}"),
                )
            })?;
            &decoded
        }
        other => other,
    };

    if envelope.as_entries().is_none() {
        return Err(Error::invalid_argument(
            ErrorOrigin::Request,
            "_query must be a JSON object",
        ));
    }

    for key in FilterKey::ENVELOPE {
        let Some(value) = envelope.get(key.as_str()) else {
            continue;
        };
        if value.is_null() {
            continue;
        }

        validate(catalog, *key, value)?;
        dictionary.merge(*key, value.clone());
    }

    Ok(())
}

/// Shape-check one envelope value with the parser its key dispatches
/// to. Keys whose handlers are fully resilient need no pre-check.
fn validate(catalog: &dyn EntityCatalog, key: FilterKey, value: &Value) -> Result<(), Error> {
    match key {
        FilterKey::Where | FilterKey::OrWhere => {
            condition::parse(catalog, value)?;
        }
        FilterKey::WhereDate => {
            condition::parse_date(catalog, value)?;
        }
        FilterKey::WhereIn | FilterKey::WhereNotIn => {
            membership::parse(value)?;
        }
        FilterKey::WhereHas | FilterKey::WhereDoesntHave => {
            subquery::parse(value)?;
        }
        FilterKey::Join | FilterKey::LeftJoin | FilterKey::RightJoin => {
            join::parse(catalog, value)?;
        }
        _ => {}
    }

    Ok(())
}
