//! # Meridian Store
//!
//! Storage collaborator contract for the authorization engine plus an
//! in-memory reference implementation.
//!
//! ## Guarantees
//!
//! - Snapshots are consistent read-only views; writes never block on them.
//! - Every natural key (see [`meridian_core::natural_key`]) is a uniqueness
//!   constraint among non-deleted resources; soft delete frees the key.
//! - Envelopes ([`ResourceStore::apply_atomically`]) commit all operations or
//!   none; a duplicate inside one envelope rejects the whole envelope.
//! - Queries outside the search capability catalogue fail with
//!   [`StoreError::UnsupportedQuery`].

#![forbid(unsafe_code)]

/// Store error types
pub mod error;

/// In-memory reference store
pub mod memory;

/// Store and snapshot traits
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use memory::{MemorySnapshot, MemoryStore, StoreState};
pub use traits::{ResourceStore, StoreSnapshot, StoredVersion, WriteOperation, WriteResult};
