use crate::{test_support::Record, value::Value};

/// One person row with an `addresses` relation.
pub(crate) fn person(
    id: i64,
    firstname: &str,
    lastname: &str,
    age: i64,
    cities: &[&str],
) -> Record {
    let addresses = cities
        .iter()
        .enumerate()
        .map(|(index, city)| {
            Record::new(&[
                ("id", Value::Int(id * 10 + index as i64)),
                ("person_id", Value::Int(id)),
                ("city", Value::Text((*city).to_string())),
            ])
        })
        .collect();

    Record::new(&[
        ("id", Value::Int(id)),
        ("firstname", Value::Text(firstname.to_string())),
        ("lastname", Value::Text(lastname.to_string())),
        ("age", Value::Int(age)),
    ])
    .with_relation("addresses", addresses)
}

/// The two-person seed used by the end-to-end scenarios: one matches
/// on age, the other on lastname, only the first has a LOME address.
pub(crate) fn persons_dataset() -> Vec<Record> {
    vec![
        person(1, "Kossi", "MENSAH", 28, &["LOME"]),
        person(2, "Ama", "AZOMEDOH", 35, &["KARA"]),
    ]
}
