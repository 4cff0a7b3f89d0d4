mod property;
mod subquery;

use crate::traits::StaticCatalog;

pub(super) const CATALOG: StaticCatalog = StaticCatalog::new(&[
    ("Person", "persons"),
    ("Address", "addresses"),
]);
