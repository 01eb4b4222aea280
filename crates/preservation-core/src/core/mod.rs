// crates/preservation-core/src/core/mod.rs
// ============================================================================
// Module: Preservation Core Types
// Description: Identifiers, digests, issues, outcomes, and object states.
// Purpose: Group the data model shared by every preservation crate.
// Dependencies: crate::core::*
// ============================================================================

//! ## Overview
//! Core types carry no I/O beyond digest streaming and workspace cleanup.

pub mod hashing;
pub mod identifiers;
pub mod issue;
pub mod outcome;
pub mod state;
pub mod workspace;

pub use hashing::Checksum;
pub use hashing::DigestComputer;
pub use hashing::DigestError;
pub use hashing::DigestOutcome;
pub use hashing::DigestRegistry;
pub use hashing::DigestVerdict;
pub use hashing::HashAlgorithm;
pub use identifiers::FormatRef;
pub use identifiers::PackageId;
pub use identifiers::ToolRef;
pub use identifiers::WorkflowId;
pub use issue::Issue;
pub use issue::IssueKind;
pub use outcome::FixityFinding;
pub use outcome::VerificationOutcome;
pub use state::ObjectKind;
pub use state::ObjectState;
pub use state::StoredObject;
pub use state::TransitionError;
pub use workspace::WorkspaceError;
pub use workspace::WorkspaceLayout;
