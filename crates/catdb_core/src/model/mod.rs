//! Domain records exchanged with the data access façade.
//!
//! # Responsibility
//! - Define the typed shapes of cats and store status markers.
//! - Keep serialization names aligned with the underlying column names.
//!
//! # Invariants
//! - Every persisted cat is identified by a store-generated `CatId`.
//! - Records are plain values; the store owns their lifecycle.

pub mod cat;
