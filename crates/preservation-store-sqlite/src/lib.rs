// crates/preservation-store-sqlite/src/lib.rs
// ============================================================================
// Module: SQLite Preservation Store
// Description: Durable issue and stored-object backend using SQLite.
// Purpose: Persist fixity issues and local object records across runs.
// Dependencies: preservation-core, rusqlite
// ============================================================================

//! ## Overview
//! This crate provides a SQLite-backed implementation of the
//! [`preservation_core::IssueStore`] and [`preservation_core::ObjectStateStore`]
//! collaborators. Issues are append-only and returned in insertion order;
//! object records are keyed by package and object kind and replaced on save.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::SqlitePreservationStore;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
pub use store::SqliteStoreMode;
pub use store::SqliteSyncMode;
