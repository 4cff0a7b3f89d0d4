//! Relation attachment planning.
//!
//! A create/update request may carry a relation attachment spec: a
//! mapping from relation name to one attribute set or a list of them,
//! with dotted paths (`profile.photos`) for nested attachment and a
//! `pivot`/`joining` sub-key for many-to-many payloads. The spec is
//! normalized here into a flat op list; persistence of each op belongs
//! to the storage collaborator.

use crate::{
    error::{Error, ErrorOrigin},
    value::Value,
};
use thiserror::Error as ThisError;

/// Attribute keys that carry a many-to-many pivot payload instead of
/// a column value.
const PIVOT_KEYS: &[&str] = &["pivot", "joining"];

///
/// AttachOp
///
/// One planned relation attachment: the relation path from the
/// primary entity, the attribute set to persist, and an optional
/// pivot payload. Transient; consumed once, never persisted itself.
///

#[derive(Clone, Debug, PartialEq)]
pub struct AttachOp {
    pub path: Vec<String>,
    pub attributes: Value,
    pub pivot: Option<Value>,
}

///
/// RelationError
///

#[derive(Debug, Eq, PartialEq, ThisError)]
pub enum RelationError {
    #[error("relation attachment spec must be an object keyed by relation name")]
    NotAnObject,

    #[error("relation '{relation}' must map to an attribute set or a list of them")]
    InvalidEntry { relation: String },
}

impl From<RelationError> for Error {
    fn from(err: RelationError) -> Self {
        Self::invalid_argument(ErrorOrigin::Relation, err.to_string())
    }
}

/// Normalize an attachment spec into its ordered op list.
///
/// Dotted relation names split into path segments; each attribute set
/// has its pivot payload extracted. Declaration order is preserved so
/// parent paths can be attached before their children.
pub fn plan(spec: &Value) -> Result<Vec<AttachOp>, RelationError> {
    let Some(entries) = spec.as_entries() else {
        return Err(RelationError::NotAnObject);
    };

    let mut ops = Vec::new();
    for (relation, value) in entries {
        let path: Vec<String> = relation.split('.').map(str::to_string).collect();

        let sets: Vec<&Value> = match value {
            Value::Map(_) => vec![value],
            Value::List(items) if items.iter().all(|item| matches!(item, Value::Map(_))) => {
                items.iter().collect()
            }
            _ => {
                return Err(RelationError::InvalidEntry {
                    relation: relation.clone(),
                });
            }
        };

        for set in sets {
            let (attributes, pivot) = split_pivot(set);
            ops.push(AttachOp {
                path: path.clone(),
                attributes,
                pivot,
            });
        }
    }

    Ok(ops)
}

/// Split the pivot payload out of one attribute set.
fn split_pivot(set: &Value) -> (Value, Option<Value>) {
    let Some(entries) = set.as_entries() else {
        return (set.clone(), None);
    };

    let mut attributes = Vec::with_capacity(entries.len());
    let mut pivot = None;

    for (key, value) in entries {
        if PIVOT_KEYS.contains(&key.as_str()) {
            pivot = Some(value.clone());
        } else {
            attributes.push((key.clone(), value.clone()));
        }
    }

    (Value::Map(attributes), pivot)
}
