// crates/preservation-fixity/src/run.rs
// ============================================================================
// Module: Fixity Check Run
// Description: One fixity-check invocation within an ingest run.
// Purpose: Select the package convention, check it, then check common checksum files.
// Dependencies: regex, serde, serde_json, tracing, walkdir
// ============================================================================

//! ## Overview
//! A run reads the optional `packageType` option of its invocation (or takes
//! an explicit convention), checks the package with that convention, and then
//! always checks ad-hoc checksum files. On success it returns the invocation
//! counter for the next fixity check of the same ingest run.
//!
//! METS packages locate their metadata file with a caller-supplied regular
//! expression over package-relative paths; exactly one file must match.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;
use tracing::info;
use walkdir::WalkDir;

use crate::bagit::BagitParser;
use crate::checksum_files::ChecksumFilesParser;
use crate::error::FixityError;
use crate::error::FixityFault;
use crate::manifest::PackageLocation;
use crate::manifest::normalize_path;
use crate::manifest::relative_to;
use crate::mets::MetsParser;
use crate::policy::FixityContext;
use crate::policy::option_pointer;
use crate::verifier::FixityChecker;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Policy option naming the package convention.
pub const PACKAGE_TYPE_OPTION: &str = "packageType";

// ============================================================================
// SECTION: Package Convention
// ============================================================================

/// Manifest convention of a package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PackageConvention {
    /// METS `fileSec`.
    Mets,
    /// BagIt manifests.
    Bagit,
}

impl PackageConvention {
    /// Returns the configured label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Mets => "METS",
            Self::Bagit => "BAGIT",
        }
    }

    /// Reads the convention configured for an invocation.
    ///
    /// # Errors
    ///
    /// Returns [`FixityError::InvalidConfig`] when the option is neither
    /// `METS` nor `BAGIT`.
    pub fn from_config(config: &Value, invocation: u32) -> Result<Option<Self>, FixityError> {
        let pointer = option_pointer(invocation, PACKAGE_TYPE_OPTION);
        let Some(value) = config.pointer(&pointer) else {
            return Ok(None);
        };
        Self::deserialize(value).map(Some).map_err(|_| {
            FixityError::InvalidConfig(format!(
                "invalid config: {value} at: {pointer} supported values: [METS, BAGIT]"
            ))
        })
    }
}

// ============================================================================
// SECTION: Metadata Discovery
// ============================================================================

/// Locates the single file whose package-relative path matches `pattern`.
///
/// The pattern must match the whole relative path, written with `/` separators.
///
/// # Errors
///
/// Returns [`FixityError::MetadataNotFound`] when nothing matches,
/// [`FixityError::AmbiguousMetadata`] when several files match, and
/// [`FixityError::Pattern`] when the pattern is invalid.
pub fn find_metadata_file(root: &Path, pattern: &str) -> Result<PathBuf, FixityError> {
    let anchored = Regex::new(&format!("^(?:{pattern})$"))
        .map_err(|err| FixityError::Pattern(err.to_string()))?;
    let root = normalize_path(root)?;
    let mut matches = Vec::new();
    for dirent in WalkDir::new(&root).sort_by_file_name() {
        let dirent = dirent.map_err(|err| FixityError::Io(err.to_string()))?;
        if dirent.file_type().is_file() && anchored.is_match(&relative_to(&root, dirent.path())) {
            matches.push(dirent.into_path());
        }
    }
    match matches.len() {
        0 => Err(FixityError::MetadataNotFound(pattern.to_string())),
        1 => Ok(matches.remove(0)),
        _ => Err(FixityError::AmbiguousMetadata(pattern.to_string())),
    }
}

// ============================================================================
// SECTION: Run
// ============================================================================

/// Inputs of one fixity-check invocation.
#[derive(Clone, Copy)]
pub struct RunRequest<'a> {
    /// Package root in the run workspace.
    pub root: &'a Path,
    /// Convention override; the `packageType` option is read when absent.
    pub convention: Option<PackageConvention>,
    /// Relative-path pattern locating the METS file.
    pub metadata_pattern: Option<&'a str>,
    /// Policy and issue context.
    pub context: FixityContext<'a>,
}

/// Fixity-check step of an ingest run.
#[derive(Clone)]
pub struct FixityCheckRun {
    /// Verification and policy.
    checker: FixityChecker,
    /// METS convention.
    mets: MetsParser,
    /// BagIt convention.
    bagit: BagitParser,
    /// Ad-hoc checksum files.
    common: ChecksumFilesParser,
}

impl FixityCheckRun {
    /// Creates a run step using `mets` for METS packages.
    #[must_use]
    pub const fn new(checker: FixityChecker, mets: MetsParser) -> Self {
        Self {
            checker,
            mets,
            bagit: BagitParser,
            common: ChecksumFilesParser,
        }
    }

    /// Executes the invocation and returns the next invocation counter.
    ///
    /// # Errors
    ///
    /// Returns [`FixityFault`] when verification fails or a bucket escalates
    /// or aborts. A METS package without a metadata pattern is an
    /// [`FixityError::InvalidArgument`].
    pub fn execute(&self, request: &RunRequest<'_>) -> Result<u32, FixityFault> {
        let context = &request.context;
        let convention = match request.convention {
            Some(convention) => Some(convention),
            None => PackageConvention::from_config(context.config, context.invocation)?,
        };
        debug!(
            workflow = %context.workflow,
            invocation = context.invocation,
            convention = convention.map_or("none", PackageConvention::as_str),
            "starting fixity check"
        );
        match convention {
            Some(PackageConvention::Mets) => {
                let Some(pattern) = request.metadata_pattern else {
                    return Err(FixityError::InvalidArgument(
                        "metadata path pattern is required for METS packages".to_string(),
                    )
                    .into());
                };
                let mets = find_metadata_file(request.root, pattern)?;
                let location = PackageLocation::with_manifest(request.root, mets);
                self.checker.check(&self.mets, &location, context)?;
            }
            Some(PackageConvention::Bagit) => {
                self.checker.check(&self.bagit, &PackageLocation::new(request.root), context)?;
            }
            None => {}
        }
        self.checker.check(&self.common, &PackageLocation::new(request.root), context)?;
        info!(workflow = %context.workflow, invocation = context.invocation, "fixity check passed");
        Ok(context.invocation.saturating_add(1))
    }
}
