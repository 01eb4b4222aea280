// crates/preservation-core/src/runtime/mod.rs
// ============================================================================
// Module: Preservation Runtime
// Description: In-process collaborator implementations.
// Purpose: Expose in-memory stores and index used by tests and the CLI.
// Dependencies: crate::runtime::store
// ============================================================================

//! ## Overview
//! Runtime helpers that implement the collaborator interfaces in memory.

pub mod store;

pub use store::InMemoryIndex;
pub use store::InMemoryIssueStore;
pub use store::InMemoryObjectStateStore;
