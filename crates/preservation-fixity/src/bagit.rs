// crates/preservation-fixity/src/bagit.rs
// ============================================================================
// Module: BagIt Manifest Parser
// Description: Fixity entries from BagIt payload and tag manifests.
// Purpose: Read `manifest-<alg>.txt` and `tagmanifest-<alg>.txt` at the bag root.
// Dependencies: preservation-core, regex, tracing
// ============================================================================

//! ## Overview
//! Only the package root is scanned. The algorithm comes from the manifest
//! file name; a suffix other than `md5`, `sha1`, `sha256`, or `sha512` sends
//! every path of that manifest to the unsupported bucket under the suffix.
//! Line paths are resolved against the package root.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::sync::LazyLock;

use preservation_core::HashAlgorithm;
use regex::Regex;
use tracing::debug;

use crate::error::FixityError;
use crate::manifest::LinePattern;
use crate::manifest::ManifestEntry;
use crate::manifest::ManifestParser;
use crate::manifest::PackageLocation;
use crate::manifest::compiled;
use crate::manifest::normalize_path;
use crate::manifest::read_checksum_lines;

// ============================================================================
// SECTION: Patterns
// ============================================================================

/// Manifest file names; group 1 is the algorithm suffix.
static MANIFEST_NAME: LinePattern = LazyLock::new(|| Regex::new(r"^(?:tag)?manifest-(.+)\.txt$"));
/// Manifest lines: `<digest> [*]<path>`.
static MANIFEST_LINE: LinePattern = LazyLock::new(|| Regex::new(r"(\w+)\s+\*?\s*(\S+)\s*"));

// ============================================================================
// SECTION: Parser
// ============================================================================

/// Manifest parser for BagIt packages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BagitParser;

impl ManifestParser for BagitParser {
    fn name(&self) -> &'static str {
        "bagit"
    }

    fn parse(&self, location: &PackageLocation) -> Result<Vec<ManifestEntry>, FixityError> {
        let root = location.normalized_root()?;
        let name_pattern = compiled(&MANIFEST_NAME)?;
        let line_pattern = compiled(&MANIFEST_LINE)?;
        debug!(root = %root.display(), "scanning bag root for manifests");

        let listing = fs::read_dir(&root).map_err(|err| {
            FixityError::Io(format!("unable to list package root {}: {err}", root.display()))
        })?;
        let mut manifests = Vec::new();
        for dirent in listing {
            let dirent = dirent.map_err(|err| FixityError::Io(err.to_string()))?;
            let path = dirent.path();
            if !path.is_file() {
                continue;
            }
            let file_name = dirent.file_name().to_string_lossy().into_owned();
            if let Some(captures) = name_pattern.captures(&file_name)
                && let Some(suffix) = captures.get(1)
            {
                manifests.push((path, suffix.as_str().to_string()));
            }
        }
        manifests.sort();

        let mut entries = Vec::new();
        for (manifest, suffix) in manifests {
            debug!(manifest = %manifest.display(), algorithm = %suffix, "reading bagit manifest");
            for line in read_checksum_lines(&manifest, line_pattern)? {
                entries.push(ManifestEntry {
                    manifest: manifest.clone(),
                    path: normalize_path(&root.join(&line.path))?,
                    declared_algorithm: suffix.clone(),
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
