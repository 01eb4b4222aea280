// crates/preservation-fixity/src/mets.rs
// ============================================================================
// Module: METS Manifest Parser
// Description: Fixity entries from the METS file section.
// Purpose: Read CHECKSUMTYPE, CHECKSUM, and FLocat href of every METS file element.
// Dependencies: preservation-core, quick-xml, tracing
// ============================================================================

//! ## Overview
//! Every element named `file` in the METS namespace yields one entry per
//! direct `METS:FLocat` child. The location href is resolved against the METS
//! file's directory, or against the package root when it starts with `/`.
//!
//! Invariants:
//! - `file` elements are matched by namespace URI.
//! - Location children must be literally named `METS:FLocat` (any case) and
//!   carry a literal `xlink:href` attribute; other prefixes are not recognized.
//! - Checksum types are matched case-insensitively against `MD5`, `SHA-1`,
//!   `SHA-256`, and `SHA-512`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;

use preservation_core::HashAlgorithm;
use quick_xml::NsReader;
use quick_xml::events::BytesStart;
use quick_xml::events::Event;
use quick_xml::name::ResolveResult;
use tracing::debug;

use crate::error::FixityError;
use crate::manifest::ManifestEntry;
use crate::manifest::ManifestParser;
use crate::manifest::PackageLocation;
use crate::manifest::join_anchored;
use crate::manifest::normalize_path;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default METS namespace URI.
pub const METS_NAMESPACE: &str = "http://www.loc.gov/METS/";
/// Qualified name of the file location element.
const FLOCAT_QNAME: &[u8] = b"METS:FLocat";
/// Qualified name of the location href attribute.
const HREF_QNAME: &str = "xlink:href";
/// Checksum type attribute.
const CHECKSUM_TYPE_ATTR: &str = "CHECKSUMTYPE";
/// Checksum value attribute.
const CHECKSUM_ATTR: &str = "CHECKSUM";

// ============================================================================
// SECTION: Parser
// ============================================================================

/// Manifest parser for METS `fileSec`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetsParser {
    /// Namespace URI identifying METS elements.
    namespace: String,
}

impl Default for MetsParser {
    fn default() -> Self {
        Self::new(METS_NAMESPACE)
    }
}

impl MetsParser {
    /// Creates a parser matching `file` elements in `namespace`.
    #[must_use]
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }
}

/// Checksum attributes of an open METS `file` element.
struct FileFrame {
    /// Declared checksum type.
    checksum_type: String,
    /// Declared checksum value.
    checksum: String,
}

impl ManifestParser for MetsParser {
    fn name(&self) -> &'static str {
        "mets"
    }

    fn parse(&self, location: &PackageLocation) -> Result<Vec<ManifestEntry>, FixityError> {
        let Some(mets_path) = location.manifest.as_deref() else {
            return Err(FixityError::InvalidArgument("path to mets is missing".to_string()));
        };
        let root = location.normalized_root()?;
        let mets_path = normalize_path(mets_path)?;
        let mets_dir = mets_path.parent().map_or_else(|| root.clone(), Path::to_path_buf);
        debug!(mets = %mets_path.display(), "parsing mets file section");

        let mut reader = NsReader::from_file(&mets_path).map_err(|err| {
            FixityError::Io(format!("unable to open mets {}: {err}", mets_path.display()))
        })?;
        let mut buf = Vec::new();
        let mut stack: Vec<Option<FileFrame>> = Vec::new();
        let mut entries = Vec::new();
        loop {
            match reader
                .read_resolved_event_into(&mut buf)
                .map_err(|err| FixityError::Xml(err.to_string()))?
            {
                (namespace, Event::Start(element)) => {
                    let frame = self.visit(&namespace, &element, stack.last(), &mut |href, file| {
                        entries.push(entry(&mets_path, &root, &mets_dir, href, file));
                    })?;
                    stack.push(frame);
                }
                (namespace, Event::Empty(element)) => {
                    self.visit(&namespace, &element, stack.last(), &mut |href, file| {
                        entries.push(entry(&mets_path, &root, &mets_dir, href, file));
                    })?;
                }
                (_, Event::End(_)) => {
                    stack.pop();
                }
                (_, Event::Eof) => break,
                _ => {}
            }
            buf.clear();
        }
        entries.into_iter().collect()
    }

    fn resolve_algorithm(&self, declared: &str) -> Option<HashAlgorithm> {
        HashAlgorithm::from_mets_label(declared)
    }
}

impl MetsParser {
    /// Handles one opening element.
    ///
    /// Emits a location when the element is a `METS:FLocat` child of a METS
    /// file element, and returns the frame to push when it is itself a file.
    fn visit(
        &self,
        namespace: &ResolveResult<'_>,
        element: &BytesStart<'_>,
        parent: Option<&Option<FileFrame>>,
        emit: &mut dyn FnMut(String, &FileFrame),
    ) -> Result<Option<FileFrame>, FixityError> {
        if let Some(Some(file)) = parent
            && element.name().as_ref().eq_ignore_ascii_case(FLOCAT_QNAME)
        {
            let href = required_attribute(element, HREF_QNAME)?;
            emit(href, file);
        }
        let is_file = matches!(namespace, ResolveResult::Bound(ns) if ns.as_ref() == self.namespace.as_bytes())
            && element.local_name().as_ref() == b"file";
        if !is_file {
            return Ok(None);
        }
        Ok(Some(FileFrame {
            checksum_type: required_attribute(element, CHECKSUM_TYPE_ATTR)?,
            checksum: required_attribute(element, CHECKSUM_ATTR)?,
        }))
    }
}

/// Reads and unescapes a required attribute by qualified name.
fn required_attribute(element: &BytesStart<'_>, name: &str) -> Result<String, FixityError> {
    let missing = || FixityError::MissingAttribute {
        element: String::from_utf8_lossy(element.name().as_ref()).into_owned(),
        attribute: name.to_string(),
    };
    let attribute = element
        .try_get_attribute(name)
        .map_err(|err| FixityError::Xml(err.to_string()))?
        .ok_or_else(missing)?;
    let value = attribute.unescape_value().map_err(|err| FixityError::Xml(err.to_string()))?;
    Ok(value.into_owned())
}

/// Builds an entry for one location href.
fn entry(
    mets_path: &Path,
    root: &Path,
    mets_dir: &Path,
    href: String,
    file: &FileFrame,
) -> Result<ManifestEntry, FixityError> {
    let resolved: PathBuf = if href.starts_with('/') {
        join_anchored(root, &href)
    } else {
        mets_dir.join(&href)
    };
    Ok(ManifestEntry {
        manifest: mets_path.to_path_buf(),
        path: normalize_path(&resolved)?,
        declared_algorithm: file.checksum_type.clone(),
        declared_digest: file.checksum.clone(),
    })
}
