// crates/preservation-fixity/src/verifier.rs
// ============================================================================
// Module: Fixity Verifier
// Description: Reconciliation of manifest entries against the workspace.
// Purpose: Partition entries into unsupported, missing, and invalid buckets and
//          route non-empty buckets through the issue policy.
// Dependencies: preservation-core, tracing
// ============================================================================

//! ## Overview
//! [`reconcile`] is the algorithm every manifest convention shares:
//! entries with an unsupported algorithm go to the unsupported bucket without
//! touching the filesystem, supported entries whose file is absent go to
//! missing, and the rest are digested and compared. All buckets are computed
//! before any policy decision.
//!
//! [`FixityChecker`] then hands the buckets to the [`IssuePolicyEngine`] in
//! the fixed order unsupported, missing, invalid. The first fault stops the
//! remaining buckets.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use preservation_core::DigestRegistry;
use preservation_core::DigestVerdict;
use preservation_core::FixityFinding;
use preservation_core::HashAlgorithm;
use preservation_core::VerificationOutcome;
use tracing::debug;

use crate::error::FixityError;
use crate::error::FixityFault;
use crate::manifest::ManifestEntry;
use crate::manifest::ManifestParser;
use crate::manifest::PackageLocation;
use crate::policy::FixityContext;
use crate::policy::IssuePolicyEngine;

// ============================================================================
// SECTION: Reconciliation
// ============================================================================

/// Partitions manifest entries into the three issue buckets.
///
/// `resolve` maps a declared algorithm string to a supported algorithm; an
/// algorithm the registry has no computer for is treated as unsupported.
///
/// # Errors
///
/// Returns [`FixityError`] when an existing file cannot be digested.
pub fn reconcile(
    convention: &str,
    resolve: impl Fn(&str) -> Option<HashAlgorithm>,
    registry: &DigestRegistry,
    entries: Vec<ManifestEntry>,
) -> Result<VerificationOutcome, FixityError> {
    let mut outcome = VerificationOutcome::new();
    let total = entries.len();
    for entry in entries {
        let algorithm = resolve(&entry.declared_algorithm).filter(|algorithm| registry.supports(*algorithm));
        let finding = FixityFinding::new(entry.manifest, entry.path);
        let Some(algorithm) = algorithm else {
            outcome.record_unsupported(entry.declared_algorithm, finding);
            continue;
        };
        if !finding.path.is_file() {
            outcome.record_missing(finding);
            continue;
        }
        match registry.verify_file(algorithm, &finding.path, &entry.declared_digest)? {
            DigestVerdict::Matches => {}
            DigestVerdict::Mismatch {
                ..
            } => outcome.record_invalid(finding),
            DigestVerdict::Unsupported => {
                outcome.record_unsupported(entry.declared_algorithm, finding);
            }
        }
    }
    debug!(
        convention,
        entries = total,
        unsupported = outcome.unsupported.values().map(Vec::len).sum::<usize>(),
        missing = outcome.missing.len(),
        invalid = outcome.invalid.len(),
        "manifest reconciled"
    );
    Ok(outcome)
}

// ============================================================================
// SECTION: Verifier
// ============================================================================

/// Runs one verification pass with a shared digest registry.
#[derive(Debug, Clone)]
pub struct FixityVerifier {
    /// Shared read-only digest registry.
    registry: Arc<DigestRegistry>,
}

impl FixityVerifier {
    /// Creates a verifier over a shared registry.
    #[must_use]
    pub const fn new(registry: Arc<DigestRegistry>) -> Self {
        Self {
            registry,
        }
    }

    /// Verifies a package with the given manifest convention.
    ///
    /// # Errors
    ///
    /// Returns [`FixityError`] when parsing or digest computation fails.
    pub fn verify(
        &self,
        parser: &dyn ManifestParser,
        location: &PackageLocation,
    ) -> Result<VerificationOutcome, FixityError> {
        debug!(convention = parser.name(), root = %location.root.display(), "verifying package fixity");
        parser.verify(location, &self.registry)
    }
}

// ============================================================================
// SECTION: Checker
// ============================================================================

/// Verifies a package and applies the issue policy to the resulting buckets.
#[derive(Clone)]
pub struct FixityChecker {
    /// Bucket computation.
    verifier: FixityVerifier,
    /// Policy application and issue persistence.
    policy: IssuePolicyEngine,
}

impl FixityChecker {
    /// Creates a checker.
    #[must_use]
    pub const fn new(verifier: FixityVerifier, policy: IssuePolicyEngine) -> Self {
        Self {
            verifier,
            policy,
        }
    }

    /// Verifies a package and resolves every non-empty bucket through policy.
    ///
    /// Returns the full outcome when every bucket was resolved by configuration
    /// to continue.
    ///
    /// # Errors
    ///
    /// Returns [`FixityFault::Escalation`] or [`FixityFault::Abort`] from the
    /// first bucket that does not continue, and [`FixityFault::Fixity`] when
    /// verification fails.
    pub fn check(
        &self,
        parser: &dyn ManifestParser,
        location: &PackageLocation,
        context: &FixityContext<'_>,
    ) -> Result<VerificationOutcome, FixityFault> {
        let outcome = self.verifier.verify(parser, location)?;
        let root = location.normalized_root()?;
        if !outcome.unsupported.is_empty() {
            self.policy.resolve_unsupported(context, &root, &outcome.unsupported)?;
        }
        if !outcome.missing.is_empty() {
            self.policy.resolve_missing(context, &root, &outcome.missing)?;
        }
        if !outcome.invalid.is_empty() {
            self.policy.resolve_invalid(context, &root, &outcome.invalid)?;
        }
        Ok(outcome)
    }
}
