// crates/preservation-core/src/lib.rs
// ============================================================================
// Module: Preservation Core Library
// Description: Public API surface for the preservation integrity core.
// Purpose: Expose digests, issues, object states, and collaborator interfaces.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! Preservation core holds the data model shared by fixity verification and
//! archival storage consistency: a pluggable digest registry, the fixity issue
//! taxonomy, the bucketed verification outcome, and the stored object state
//! machine. External systems plug in through [`interfaces`].

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;


// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use crate::core::*;

pub use interfaces::FormatResolver;
pub use interfaces::IndexError;
pub use interfaces::IndexNotifier;
pub use interfaces::IssueStore;
pub use interfaces::IssueStoreError;
pub use interfaces::NoFormats;
pub use interfaces::ObjectStateStore;
pub use interfaces::ObjectStoreError;
pub use runtime::InMemoryIndex;
pub use runtime::InMemoryIssueStore;
pub use runtime::InMemoryObjectStateStore;
