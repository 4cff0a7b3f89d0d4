mod order;
mod resilience;

use crate::{engine::FilterEngine, filter::FilterDictionary, traits::StaticCatalog};

static CATALOG: StaticCatalog = StaticCatalog::new(&[
    ("Person", "persons"),
    ("Address", "addresses"),
]);

pub(super) fn engine() -> FilterEngine<'static> {
    FilterEngine::new(&CATALOG)
}

pub(super) fn dict(json: &str) -> FilterDictionary {
    FilterDictionary::from_json_str(json).unwrap()
}
