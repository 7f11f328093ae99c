//! Domain layer types and invariants.

pub mod admission;
pub mod entities;
pub mod error;
pub mod types;
