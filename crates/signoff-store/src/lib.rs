//! Storage for the signoff services.
//!
//! This crate defines the persistence contract behind the signoff domain:
//! - principals (users, roles)
//! - workflow templates stored as stage chains
//! - the directory/file tree with per-user access grants
//! - approval records with compare-and-swap stage advancement
//!
//! Design stance:
//! - Every multi-entity write is one atomic unit inside the adapter; callers
//!   never compose half-transactions.
//! - PostgreSQL is the transactional source of truth. The in-memory adapter
//!   is deterministic and test-friendly, with the same observable semantics.

#![deny(unsafe_code)]
#![warn(rust_2018_idioms)]

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;
mod traits;

pub use memory::MemoryStore;
#[cfg(feature = "postgres")]
pub use postgres::PostgresStore;
pub use traits::{
    ApprovalStore, PrincipalStore, SignoffStore, TreeScope, TreeStore, WorkflowStore,
};
