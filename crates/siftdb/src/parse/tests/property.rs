use crate::{
    filter::{FilterDictionary, FilterKey},
    parse::{ConditionClause, condition, tests::CATALOG},
    value::Value,
};
use proptest::prelude::*;

fn arb_column() -> impl Strategy<Value = String> {
    "[a-z][a-z_]{0,10}"
}

fn arb_operator() -> impl Strategy<Value = &'static str> {
    prop_oneof![
        Just("="),
        Just("<>"),
        Just("<"),
        Just("<="),
        Just(">"),
        Just(">="),
        Just("like"),
    ]
}

fn arb_scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i64>().prop_map(Value::Int),
        any::<bool>().prop_map(Value::Bool),
        "[a-zA-Z0-9%_]{1,12}".prop_map(Value::Text),
    ]
}

proptest! {
    /// Well-formed 2- and 3-element tuples always parse, and parsing
    /// twice over the same raw input yields identical clauses.
    #[test]
    fn well_formed_tuples_parse_deterministically(
        column in arb_column(),
        operator in arb_operator(),
        value in arb_scalar(),
        with_operator in any::<bool>(),
    ) {
        let raw = if with_operator {
            Value::List(vec![
                Value::Text(column.clone()),
                Value::Text(operator.to_string()),
                value.clone(),
            ])
        } else {
            Value::List(vec![Value::Text(column.clone()), value.clone()])
        };

        let first = condition::parse(&CATALOG, &raw).unwrap();
        let second = condition::parse(&CATALOG, &raw).unwrap();
        prop_assert_eq!(&first, &second);

        prop_assert_eq!(first.len(), 1);
        let ConditionClause::Tuple(cond) = &first[0] else {
            panic!("expected one tuple clause");
        };
        prop_assert_eq!(&cond.column, &column);
        if with_operator {
            prop_assert_eq!(&cond.operator, operator);
        } else {
            prop_assert_eq!(&cond.operator, "=");
        }
    }

    /// Normalizing a list of tuples never changes the row count.
    #[test]
    fn row_lists_preserve_their_arity(
        rows in prop::collection::vec(
            (arb_column(), any::<i64>()).prop_map(|(column, value)| {
                Value::List(vec![Value::Text(column), Value::Int(value)])
            }),
            1..8,
        ),
    ) {
        let raw = Value::List(rows.clone());
        let clauses = condition::parse(&CATALOG, &raw).unwrap();
        prop_assert_eq!(clauses.len(), rows.len());
    }

    /// Priority sort is total, stable, and idempotent for any mix of
    /// filter keys.
    #[test]
    fn priority_sort_is_idempotent(
        keys in prop::collection::vec(
            prop::sample::select(FilterKey::ALL.to_vec()),
            0..12,
        ),
    ) {
        let mut dictionary = FilterDictionary::new();
        for key in keys {
            dictionary.merge(key, Value::Bool(true));
        }

        dictionary.sort_by_priority();
        let once: Vec<FilterKey> = dictionary.iter().map(|(key, _)| *key).collect();
        dictionary.sort_by_priority();
        let twice: Vec<FilterKey> = dictionary.iter().map(|(key, _)| *key).collect();

        prop_assert_eq!(&once, &twice);

        let priorities: Vec<u8> = once.iter().map(|key| key.priority()).collect();
        prop_assert!(priorities.windows(2).all(|pair| pair[0] <= pair[1]));
    }
}
