// crates/preservation-fixity/src/manifest.rs
// ============================================================================
// Module: Manifest Parsing
// Description: Shared manifest entry model, parser trait, and path helpers.
// Purpose: Give the three manifest conventions one verification entry point.
// Dependencies: preservation-core, regex, tracing
// ============================================================================

//! ## Overview
//! A [`ManifestParser`] reads a package's metadata files and yields
//! [`ManifestEntry`] values in manifest order. Every parser shares the same
//! reconciliation through [`ManifestParser::verify`].
//!
//! Invariants:
//! - Entry paths are absolute and lexically normalized.
//! - Unparsable checksum lines are logged and skipped.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::File;
use std::io::BufRead;
use std::io::BufReader;
use std::path::Component;
use std::path::Path;
use std::path::PathBuf;
use std::sync::LazyLock;

use preservation_core::DigestRegistry;
use preservation_core::HashAlgorithm;
use preservation_core::VerificationOutcome;
use regex::Regex;
use tracing::warn;

use crate::error::FixityError;
use crate::verifier::reconcile;

// ============================================================================
// SECTION: Manifest Entry
// ============================================================================

/// One file declared by a manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    /// Manifest file the entry was read from.
    pub manifest: PathBuf,
    /// Absolute, normalized path of the declared file.
    pub path: PathBuf,
    /// Algorithm string exactly as declared.
    pub declared_algorithm: String,
    /// Hex digest exactly as declared.
    pub declared_digest: String,
}

/// Location of a package inside the workspace.
///
/// # Invariants
/// - `manifest` is required by conventions with a single metadata file (METS).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageLocation {
    /// Package root directory.
    pub root: PathBuf,
    /// Main metadata file, when the convention has one.
    pub manifest: Option<PathBuf>,
}

impl PackageLocation {
    /// Creates a location without a main metadata file.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            manifest: None,
        }
    }

    /// Creates a location with a main metadata file.
    #[must_use]
    pub fn with_manifest(root: impl Into<PathBuf>, manifest: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            manifest: Some(manifest.into()),
        }
    }

    /// Returns the normalized absolute package root.
    ///
    /// # Errors
    ///
    /// Returns [`FixityError::Io`] when the current directory is unavailable.
    pub fn normalized_root(&self) -> Result<PathBuf, FixityError> {
        normalize_path(&self.root)
    }
}

// ============================================================================
// SECTION: Parser Trait
// ============================================================================

/// A manifest convention.
pub trait ManifestParser: Send + Sync {
    /// Short convention name used in logs.
    fn name(&self) -> &'static str;

    /// Reads every manifest entry of the package in manifest order.
    ///
    /// # Errors
    ///
    /// Returns [`FixityError`] when a manifest cannot be read or parsed.
    fn parse(&self, location: &PackageLocation) -> Result<Vec<ManifestEntry>, FixityError>;

    /// Maps a declared algorithm string to a supported algorithm.
    fn resolve_algorithm(&self, declared: &str) -> Option<HashAlgorithm>;

    /// Parses the package and partitions its entries into issue buckets.
    ///
    /// # Errors
    ///
    /// Returns [`FixityError`] when parsing or digest computation fails.
    fn verify(
        &self,
        location: &PackageLocation,
        registry: &DigestRegistry,
    ) -> Result<VerificationOutcome, FixityError> {
        let entries = self.parse(location)?;
        reconcile(self.name(), |declared| self.resolve_algorithm(declared), registry, entries)
    }
}

// ============================================================================
// SECTION: Checksum Lines
// ============================================================================

/// A parsed `<digest> <path>` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecksumLine {
    /// Declared digest.
    pub digest: String,
    /// Declared path, verbatim.
    pub path: String,
}

/// Lazily compiled line pattern.
pub type LinePattern = LazyLock<Result<Regex, regex::Error>>;

/// Returns the compiled pattern or a pattern error.
///
/// # Errors
///
/// Returns [`FixityError::Pattern`] when the pattern failed to compile.
pub fn compiled(pattern: &'static LinePattern) -> Result<&'static Regex, FixityError> {
    pattern.as_ref().map_err(|err| FixityError::Pattern(err.to_string()))
}

/// Reads checksum lines from a manifest, skipping lines the pattern rejects.
///
/// The pattern must capture the digest in group 1 and the path in group 2.
///
/// # Errors
///
/// Returns [`FixityError::Io`] when the manifest cannot be read.
pub fn read_checksum_lines(
    manifest: &Path,
    pattern: &Regex,
) -> Result<Vec<ChecksumLine>, FixityError> {
    let file = File::open(manifest).map_err(|err| {
        FixityError::Io(format!("unable to open manifest {}: {err}", manifest.display()))
    })?;
    let mut lines = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line.map_err(|err| {
            FixityError::Io(format!("unable to read manifest {}: {err}", manifest.display()))
        })?;
        let parsed = pattern.captures(&line).and_then(|captures| {
            Some(ChecksumLine {
                digest: captures.get(1)?.as_str().to_string(),
                path: captures.get(2)?.as_str().to_string(),
            })
        });
        match parsed {
            Some(parsed) => lines.push(parsed),
            None => warn!(manifest = %manifest.display(), line = %line, "unable to parse manifest line"),
        }
    }
    Ok(lines)
}

// ============================================================================
// SECTION: Paths
// ============================================================================

/// Makes a path absolute and removes `.` and `..` components lexically.
///
/// Symbolic links are not resolved.
///
/// # Errors
///
/// Returns [`FixityError::Io`] when the current directory is unavailable.
pub fn normalize_path(path: &Path) -> Result<PathBuf, FixityError> {
    let absolute = std::path::absolute(path).map_err(|err| {
        FixityError::Io(format!("unable to make path absolute {}: {err}", path.display()))
    })?;
    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    Ok(normalized)
}

/// Joins a manifest path that may start with `/` onto a base directory.
///
/// A single leading `/` anchors the path at `base` rather than the filesystem root.
#[must_use]
pub fn join_anchored(base: &Path, declared: &str) -> PathBuf {
    base.join(declared.strip_prefix('/').unwrap_or(declared))
}

/// Renders `path` relative to `root` with `/` separators.
///
/// Paths outside `root` are rendered in full.
#[must_use]
pub fn relative_to(root: &Path, path: &Path) -> String {
    match path.strip_prefix(root) {
        Ok(relative) => relative
            .components()
            .map(|component| component.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/"),
        Err(_) => path.to_string_lossy().replace('\\', "/"),
    }
}
