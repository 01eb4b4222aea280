// crates/preservation-fixity/src/lib.rs
// ============================================================================
// Module: Preservation Fixity Library
// Description: Manifest parsing, fixity verification, and issue policy.
// Purpose: Prove every declared package file is present and byte-identical.
// Dependencies: preservation-core, quick-xml, regex, walkdir
// ============================================================================

//! ## Overview
//! Three manifest conventions (METS, BagIt, ad-hoc checksum files) feed one
//! reconciliation that partitions declared files into unsupported, missing,
//! and invalid buckets. The [`IssuePolicyEngine`] persists an issue per file
//! and decides per bucket whether the ingest run continues, aborts, or waits
//! for human resolution. [`FixityCheckRun`] wires the pieces together for one
//! fixity-check invocation.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod bagit;
pub mod checksum_files;
pub mod error;
pub mod manifest;
pub mod mets;
pub mod policy;
pub mod run;
pub mod verifier;


// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use bagit::BagitParser;
pub use checksum_files::ChecksumFilesParser;
pub use error::FixityError;
pub use error::FixityFault;
pub use manifest::ManifestEntry;
pub use manifest::ManifestParser;
pub use manifest::PackageLocation;
pub use mets::METS_NAMESPACE;
pub use mets::MetsParser;
pub use policy::FixityContext;
pub use policy::IssuePolicyDecision;
pub use policy::IssuePolicyEngine;
pub use policy::PolicyOutcome;
pub use policy::decide;
pub use run::FixityCheckRun;
pub use run::PackageConvention;
pub use run::RunRequest;
pub use run::find_metadata_file;
pub use verifier::FixityChecker;
pub use verifier::FixityVerifier;
