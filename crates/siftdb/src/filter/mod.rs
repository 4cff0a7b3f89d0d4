//! Filter vocabulary and the ordered filter dictionary.
//!
//! The dictionary is the canonical in-memory form of a client filter
//! request: an insertion-ordered mapping from operator key to an
//! operator-specific parameter value. Keys come from a closed
//! vocabulary; unknown wire keys are ignored on the lenient path and
//! rejected on the strict path.


use crate::{
    error::{Error, ErrorOrigin},
    value::Value,
};
use derive_more::{Deref, IntoIterator};
use serde::{
    Deserialize,
    de::{IgnoredAny, MapAccess, Visitor},
};
use std::fmt;
use thiserror::Error as ThisError;

///
/// FilterKey
///
/// Closed operator vocabulary. Dispatch is a typed match over this
/// enum; there is no string-keyed method lookup anywhere downstream.
///

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum FilterKey {
    Where,
    OrWhere,
    WhereIn,
    WhereNotIn,
    WhereBetween,
    WhereNull,
    WhereNotNull,
    OrWhereNull,
    OrWhereNotNull,
    WhereHas,
    WhereDoesntHave,
    Has,
    DoesntHave,
    Exists,
    NotExists,
    OrExists,
    OrNotExists,
    WhereDate,
    OrWhereDate,
    OrderBy,
    GroupBy,
    Join,
    LeftJoin,
    RightJoin,
    Limit,
    Skip,
    Take,
    Distinct,
    Aggregate,
}

impl FilterKey {
    pub const ALL: &'static [Self] = &[
        Self::Where,
        Self::OrWhere,
        Self::WhereIn,
        Self::WhereNotIn,
        Self::WhereBetween,
        Self::WhereNull,
        Self::WhereNotNull,
        Self::OrWhereNull,
        Self::OrWhereNotNull,
        Self::WhereHas,
        Self::WhereDoesntHave,
        Self::Has,
        Self::DoesntHave,
        Self::Exists,
        Self::NotExists,
        Self::OrExists,
        Self::OrNotExists,
        Self::WhereDate,
        Self::OrWhereDate,
        Self::OrderBy,
        Self::GroupBy,
        Self::Join,
        Self::LeftJoin,
        Self::RightJoin,
        Self::Limit,
        Self::Skip,
        Self::Take,
        Self::Distinct,
        Self::Aggregate,
    ];

    /// Methods a nested query object may replay against a sub-builder.
    ///
    /// This is a security boundary: anything outside this list is
    /// rejected before it can reach a builder, so untrusted filter
    /// input can never invoke an arbitrary builder method.
    pub const SUBQUERY_ALLOWED: &'static [Self] = &[
        Self::Where,
        Self::WhereHas,
        Self::WhereDoesntHave,
        Self::WhereDate,
        Self::Has,
        Self::DoesntHave,
        Self::OrWhere,
        Self::WhereIn,
        Self::WhereNotIn,
        Self::OrderBy,
        Self::GroupBy,
        Self::Skip,
        Self::Take,
        Self::WhereBetween,
        Self::Join,
        Self::RightJoin,
        Self::LeftJoin,
    ];

    /// Keys the `_query` envelope pass iterates. The envelope never
    /// trusts input key order or names; only this fixed list is read.
    pub const ENVELOPE: &'static [Self] = &[
        Self::Where,
        Self::WhereHas,
        Self::WhereDoesntHave,
        Self::WhereDate,
        Self::Has,
        Self::DoesntHave,
        Self::OrWhere,
        Self::WhereIn,
        Self::WhereNotIn,
        Self::OrderBy,
        Self::GroupBy,
        Self::Skip,
        Self::Take,
        Self::WhereBetween,
        Self::Join,
        Self::RightJoin,
        Self::LeftJoin,
        Self::WhereNull,
        Self::WhereNotNull,
        Self::OrWhereNull,
        Self::OrWhereNotNull,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Where => "where",
            Self::OrWhere => "orWhere",
            Self::WhereIn => "whereIn",
            Self::WhereNotIn => "whereNotIn",
            Self::WhereBetween => "whereBetween",
            Self::WhereNull => "whereNull",
            Self::WhereNotNull => "whereNotNull",
            Self::OrWhereNull => "orWhereNull",
            Self::OrWhereNotNull => "orWhereNotNull",
            Self::WhereHas => "whereHas",
            Self::WhereDoesntHave => "whereDoesntHave",
            Self::Has => "has",
            Self::DoesntHave => "doesntHave",
            Self::Exists => "exists",
            Self::NotExists => "notExists",
            Self::OrExists => "orExists",
            Self::OrNotExists => "orNotExists",
            Self::WhereDate => "whereDate",
            Self::OrWhereDate => "orWhereDate",
            Self::OrderBy => "orderBy",
            Self::GroupBy => "groupBy",
            Self::Join => "join",
            Self::LeftJoin => "leftJoin",
            Self::RightJoin => "rightJoin",
            Self::Limit => "limit",
            Self::Skip => "skip",
            Self::Take => "take",
            Self::Distinct => "distinct",
            Self::Aggregate => "aggregate",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|key| key.as_str() == name)
    }

    #[must_use]
    pub fn subquery_allowed(self) -> bool {
        Self::SUBQUERY_ALLOWED.contains(&self)
    }

    /// Deterministic application priority: positive-match filters must
    /// not be weakened by inclusive OR filters, so `where` sorts first,
    /// `whereHas` second, everything else in between, `orWhere` last.
    #[must_use]
    pub const fn priority(self) -> u8 {
        match self {
            Self::Where => 0,
            Self::WhereHas => 1,
            Self::OrWhere => 3,
            _ => 2,
        }
    }
}

impl fmt::Display for FilterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

///
/// FilterError
///

#[derive(Debug, ThisError)]
pub enum FilterError {
    #[error("unknown filter key: '{key}'")]
    UnknownKey { key: String },

    #[error("filter dictionary must be a JSON object")]
    NotAnObject,

    #[error("filter dictionary is not valid JSON: {message}")]
    Json { message: String },
}

impl From<FilterError> for Error {
    fn from(err: FilterError) -> Self {
        Self::invalid_argument(ErrorOrigin::Parse, err.to_string())
    }
}

///
/// FilterDictionary
///
/// Insertion-ordered mapping from [`FilterKey`] to parameter value.
/// Merging the same key twice appends list-aware instead of
/// overwriting, so two input passes can layer onto one dictionary.
///

#[derive(Clone, Debug, Default, Deref, IntoIterator, PartialEq)]
pub struct FilterDictionary {
    #[deref]
    #[into_iterator(owned, ref)]
    entries: Vec<(FilterKey, Value)>,
}

impl FilterDictionary {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    #[must_use]
    pub fn get(&self, key: FilterKey) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v)
    }

    /// Append-or-merge one entry.
    ///
    /// A fresh key is appended. An existing key has both sides
    /// canonicalized to row lists and concatenated, so a single tuple
    /// merged onto a single tuple becomes a two-row list rather than a
    /// flattened four-element tuple.
    pub fn merge(&mut self, key: FilterKey, value: Value) {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => {
                let mut rows = into_rows(existing.clone());
                rows.extend(into_rows(value));
                *existing = Value::List(rows);
            }
            None => self.entries.push((key, value)),
        }
    }

    /// Stable re-sort into the fixed application priority
    /// (`where` → `whereHas` → others → `orWhere`).
    pub fn sort_by_priority(&mut self) {
        self.entries.sort_by_key(|(key, _)| key.priority());
    }

    /// Lenient construction from an already-decoded value: unknown keys
    /// are dropped, matching the engine's unknown-key no-op contract.
    pub fn from_value(value: Value) -> Result<Self, FilterError> {
        Self::from_value_inner(value, false)
    }

    /// Strict construction: any unknown key is rejected.
    pub fn from_value_strict(value: Value) -> Result<Self, FilterError> {
        Self::from_value_inner(value, true)
    }

    pub fn from_json_str(json: &str) -> Result<Self, FilterError> {
        serde_json::from_str(json).map_err(|err| FilterError::Json {
            message: err.to_string(),
        })
    }

    fn from_value_inner(value: Value, strict: bool) -> Result<Self, FilterError> {
        let Value::Map(pairs) = value else {
            return Err(FilterError::NotAnObject);
        };

        let mut dictionary = Self::new();
        for (name, value) in pairs {
            match FilterKey::from_name(&name) {
                Some(key) => dictionary.merge(key, value),
                None if strict => return Err(FilterError::UnknownKey { key: name }),
                None => {}
            }
        }

        Ok(dictionary)
    }
}

/// Canonicalize a parameter value into its row list.
///
/// A list whose elements are all lists or maps is already a row list;
/// anything else (flat tuple, map, scalar) is one row.
fn into_rows(value: Value) -> Vec<Value> {
    match value {
        Value::List(items)
            if !items.is_empty()
                && items
                    .iter()
                    .all(|item| matches!(item, Value::List(_) | Value::Map(_))) =>
        {
            items
        }
        other => vec![other],
    }
}

impl<'de> Deserialize<'de> for FilterDictionary {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(DictionaryVisitor)
    }
}

struct DictionaryVisitor;

impl<'de> Visitor<'de> for DictionaryVisitor {
    type Value = FilterDictionary;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a filter dictionary object")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<FilterDictionary, A::Error> {
        let mut dictionary = FilterDictionary::new();
        while let Some(name) = map.next_key::<String>()? {
            match FilterKey::from_name(&name) {
                Some(key) => dictionary.merge(key, map.next_value()?),
                None => {
                    // Lenient wire path: unknown keys are skipped.
                    map.next_value::<IgnoredAny>()?;
                }
            }
        }
        Ok(dictionary)
    }
}
