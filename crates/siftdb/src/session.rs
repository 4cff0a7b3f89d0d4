//! Session orchestration.
//!
//! The thin pipeline over the filter engine and the storage
//! collaborator: reads apply filters then projection; writes run
//! inside one transaction boundary with relation attachment cascading
//! after the primary entity persists. The filter engine itself never
//! opens or manages transactions.

use crate::{
    builder::{Page, Storage},
    engine::FilterEngine,
    error::Error,
    filter::FilterDictionary,
    projection::Projection,
    relation::{self, AttachOp},
    value::Value,
};

///
/// StorageSession
///
/// Per-request storage collaborator: hands out fresh builder handles,
/// owns the transaction boundary, and persists relation attachments.
/// Not required to be thread-safe; scope one per request.
///

pub trait StorageSession {
    type Builder: Storage;

    /// A fresh builder over the session's target entity.
    fn builder(&self) -> Self::Builder;

    fn begin(&self) -> Result<(), Error>;

    fn commit(&self) -> Result<(), Error>;

    fn rollback(&self) -> Result<(), Error>;

    /// Persist one planned relation attachment for `primary`.
    fn attach(
        &self,
        primary: &<Self::Builder as Storage>::Row,
        op: &AttachOp,
    ) -> Result<(), Error>;
}

///
/// Session
///
/// One request-scoped pipeline instance.
///

pub struct Session<'a, S: StorageSession> {
    store: S,
    engine: FilterEngine<'a>,
}

impl<'a, S: StorageSession> Session<'a, S> {
    pub const fn new(store: S, engine: FilterEngine<'a>) -> Self {
        Self { store, engine }
    }

    #[must_use]
    pub const fn engine(&self) -> &FilterEngine<'a> {
        &self.engine
    }

    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    pub fn search(
        &self,
        filters: &FilterDictionary,
        projection: Option<&Projection>,
    ) -> Result<Vec<<S::Builder as Storage>::Row>, Error> {
        self.shaped(filters, projection)?.get()
    }

    pub fn first(
        &self,
        filters: &FilterDictionary,
        projection: Option<&Projection>,
    ) -> Result<Option<<S::Builder as Storage>::Row>, Error> {
        self.shaped(filters, projection)?.first()
    }

    pub fn paginate(
        &self,
        filters: &FilterDictionary,
        projection: Option<&Projection>,
        page: u64,
        per_page: u64,
    ) -> Result<Page<<S::Builder as Storage>::Row>, Error> {
        self.shaped(filters, projection)?.paginate(page, per_page)
    }

    fn shaped(
        &self,
        filters: &FilterDictionary,
        projection: Option<&Projection>,
    ) -> Result<S::Builder, Error> {
        let builder = self.engine.apply(self.store.builder(), filters)?;

        match projection {
            Some(projection) => projection.apply(builder),
            None => Ok(builder),
        }
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Create the primary entity, then cascade relation attachment.
    ///
    /// The attachment spec is planned before the transaction opens so
    /// a malformed spec rejects the request without touching storage.
    pub fn create(
        &self,
        attributes: &Value,
        relations: Option<&Value>,
    ) -> Result<<S::Builder as Storage>::Row, Error> {
        let ops = planned(relations)?;

        self.transact(|| {
            let row = self.store.builder().create(attributes)?;
            for op in &ops {
                self.store.attach(&row, op)?;
            }
            Ok(row)
        })
    }

    /// Update every matching row; when an attachment spec is present,
    /// the first matching row receives the cascade.
    pub fn update(
        &self,
        filters: &FilterDictionary,
        attributes: &Value,
        relations: Option<&Value>,
    ) -> Result<u64, Error> {
        let ops = planned(relations)?;

        self.transact(|| {
            let builder = self.engine.apply(self.store.builder(), filters)?;
            let count = builder.clone().update(attributes)?;

            if !ops.is_empty() {
                if let Some(row) = builder.first()? {
                    for op in &ops {
                        self.store.attach(&row, op)?;
                    }
                }
            }

            Ok(count)
        })
    }

    pub fn upsert(
        &self,
        matching: &Value,
        attributes: &Value,
    ) -> Result<<S::Builder as Storage>::Row, Error> {
        self.transact(|| self.store.builder().update_or_create(matching, attributes))
    }

    pub fn delete(&self, filters: &FilterDictionary) -> Result<u64, Error> {
        self.transact(|| {
            self.engine
                .apply(self.store.builder(), filters)?
                .delete()
        })
    }

    /// begin → run → commit; rollback on any raised failure. Rollback
    /// failures are secondary to the original error and discarded.
    fn transact<T>(&self, f: impl FnOnce() -> Result<T, Error>) -> Result<T, Error> {
        self.store.begin()?;

        match f() {
            Ok(value) => {
                self.store.commit()?;
                Ok(value)
            }
            Err(err) => {
                let _ = self.store.rollback();
                Err(err)
            }
        }
    }
}

fn planned(relations: Option<&Value>) -> Result<Vec<AttachOp>, Error> {
    match relations {
        Some(spec) => Ok(relation::plan(spec)?),
        None => Ok(Vec::new()),
    }
}

#[cfg(test)]
mod tests;
