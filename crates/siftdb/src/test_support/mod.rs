//! Test doubles shared across unit tests.
//!
//! `MemoryBuilder` implements the full builder capability over seeded
//! in-memory rows with named relations, so filter application can be
//! asserted end to end: shaping calls are journaled for order
//! invariants, and `get()` actually evaluates the accumulated shape.

mod fixtures;
mod memory;

pub(crate) use fixtures::{person, persons_dataset};
pub(crate) use memory::{MemoryBuilder, MemoryStore, Record};
