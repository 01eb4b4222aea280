// crates/preservation-storage/src/lib.rs
// ============================================================================
// Module: Preservation Storage Library
// Description: Archival storage client, store success checks, failure cleanup.
// Purpose: Keep local object records consistent with the archival storage service.
// Dependencies: base64, preservation-core, reqwest, tracing
// ============================================================================

//! ## Overview
//! [`ArchivalStorageClient`] performs the remote storage operations over HTTP
//! with Basic authentication. [`StorageSuccessVerifier`] classifies the
//! remote state of freshly stored objects against a [`RetryBudget`],
//! [`ObjectRecords`] applies remote results to local records, and
//! [`FailureHandler`] rolls back and cleans up after a failed ingest run.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod client;
pub mod failure;
pub mod records;
pub mod success;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use client::ArchivalStorageClient;
pub use client::ArchivalStorageError;
pub use client::BasicCredentials;
pub use client::DEFAULT_TIMEOUT_MS;
pub use client::StorageBody;
pub use client::StorageClientConfig;
pub use client::StorageOperation;
pub use failure::FailureHandler;
pub use failure::FailureReport;
pub use failure::RemoteRollback;
pub use records::ObjectRecords;
pub use records::StepOutcome;
pub use success::RemoteStateQuery;
pub use success::RetryBudget;
pub use success::StorageCheck;
pub use success::StorageSuccessVerifier;
