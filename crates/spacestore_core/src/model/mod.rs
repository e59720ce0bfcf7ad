//! Domain model for document spaces.
//!
//! # Responsibility
//! - Define canonical data structures used by the space store.
//!
//! # Invariants
//! - Every space is identified by `(org_id, ref_id)`.
//! - Deletion is a hard delete; there are no tombstones.

pub mod space;
