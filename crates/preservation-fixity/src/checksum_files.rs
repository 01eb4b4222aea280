// crates/preservation-fixity/src/checksum_files.rs
// ============================================================================
// Module: Common Checksum Files Parser
// Description: Fixity entries from ad-hoc `*.md5`, `*.sha1`, `*.sha256`, `*.sha512` files.
// Purpose: Check checksum files found anywhere in the package.
// Dependencies: preservation-core, regex, tracing, walkdir
// ============================================================================

//! ## Overview
//! The whole package is walked for files whose extension names a supported
//! algorithm. Line paths use `/` or `\` and are resolved against the checksum
//! file's directory. A path starting with `/` is tried against the package
//! root first and the checksum file's directory second; when neither exists
//! it is reported missing at the package root. A package without checksum
//! files yields no entries.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::LazyLock;

use preservation_core::HashAlgorithm;
use regex::Regex;
use tracing::debug;
use walkdir::WalkDir;

use crate::error::FixityError;
use crate::manifest::LinePattern;
use crate::manifest::ManifestEntry;
use crate::manifest::ManifestParser;
use crate::manifest::PackageLocation;
use crate::manifest::compiled;
use crate::manifest::join_anchored;
use crate::manifest::normalize_path;
use crate::manifest::read_checksum_lines;

// ============================================================================
// SECTION: Patterns
// ============================================================================

/// Checksum lines: `<digest>[ *]<path>`.
static CHECKSUM_LINE: LinePattern = LazyLock::new(|| Regex::new(r"(\w+)[*\s]+(\S+)"));

// ============================================================================
// SECTION: Parser
// ============================================================================

/// Manifest parser for checksum files discovered by extension.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChecksumFilesParser;

impl ChecksumFilesParser {
    /// Returns the algorithm named by a checksum file's extension.
    fn algorithm_of(path: &Path) -> Option<HashAlgorithm> {
        path.extension().and_then(|ext| ext.to_str()).and_then(HashAlgorithm::from_file_suffix)
    }
}

impl ManifestParser for ChecksumFilesParser {
    fn name(&self) -> &'static str {
        "checksum-files"
    }

    fn parse(&self, location: &PackageLocation) -> Result<Vec<ManifestEntry>, FixityError> {
        let root = location.normalized_root()?;
        let line_pattern = compiled(&CHECKSUM_LINE)?;

        let mut checksum_files = Vec::new();
        for dirent in WalkDir::new(&root).sort_by_file_name() {
            let dirent = dirent.map_err(|err| FixityError::Io(err.to_string()))?;
            if !dirent.file_type().is_file() {
                continue;
            }
            if let Some(algorithm) = Self::algorithm_of(dirent.path()) {
                checksum_files.push((dirent.into_path(), algorithm));
            }
        }
        if checksum_files.is_empty() {
            return Ok(Vec::new());
        }
        debug!(count = checksum_files.len(), "found common checksum files");

        let mut entries = Vec::new();
        for (manifest, algorithm) in checksum_files {
            debug!(manifest = %manifest.display(), "reading checksum file");
            let manifest_dir = manifest.parent().map_or_else(|| root.clone(), Path::to_path_buf);
            for line in read_checksum_lines(&manifest, line_pattern)? {
                let declared = line.path.replace('\\', "/");
                entries.push(ManifestEntry {
                    path: resolve_declared(&root, &manifest_dir, &declared)?,
                    manifest: manifest.clone(),
                    declared_algorithm: algorithm.file_suffix().to_string(),
                    declared_digest: line.digest,
                });
            }
        }
        Ok(entries)
    }

    fn resolve_algorithm(&self, declared: &str) -> Option<HashAlgorithm> {
        HashAlgorithm::from_file_suffix(declared)
    }
}

/// Resolves a declared path with the root-then-directory fallback for `/` paths.
fn resolve_declared(root: &Path, manifest_dir: &Path, declared: &str) -> Result<PathBuf, FixityError> {
    if !declared.starts_with('/') {
        return normalize_path(&manifest_dir.join(declared));
    }
    let at_root = normalize_path(&join_anchored(root, declared))?;
    if at_root.is_file() {
        return Ok(at_root);
    }
    let at_manifest = normalize_path(&join_anchored(manifest_dir, declared))?;
    if at_manifest.is_file() {
        return Ok(at_manifest);
    }
    Ok(at_root)
}
