// crates/preservation-fixity/tests/mets.rs
// ============================================================================
// Module: METS Parser Tests
// Description: Fixity checks over METS file sections with policy applied.
// Purpose: Validate href resolution, namespace matching, and escalation.
// Dependencies: preservation-fixity, preservation-core, serde_json, tempfile
// ============================================================================

//! ## Overview
//! Writes METS documents next to payload files and checks them through the
//! parser alone and through the full policy-applying checker.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use preservation_core::DigestOutcome;
use preservation_core::DigestRegistry;
use preservation_core::FormatRef;
use preservation_core::HashAlgorithm;
use preservation_core::InMemoryIssueStore;
use preservation_core::IssueKind;
use preservation_core::IssueStore;
use preservation_core::ToolRef;
use preservation_core::WorkflowId;
use preservation_fixity::FixityChecker;
use preservation_fixity::FixityContext;
use preservation_fixity::FixityError;
use preservation_fixity::FixityFault;
use preservation_fixity::FixityVerifier;
use preservation_fixity::IssuePolicyEngine;
use preservation_fixity::ManifestParser;
use preservation_fixity::MetsParser;
use preservation_fixity::PackageLocation;
use serde_json::json;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn md5_hex(data: &[u8]) -> String {
    match DigestRegistry::standard().digest_with(HashAlgorithm::Md5, &mut &data[..]).unwrap() {
        DigestOutcome::Computed(bytes) => hex::encode(bytes),
        DigestOutcome::Unsupported(id) => panic!("unexpected unsupported algorithm {id}"),
    }
}

fn write(root: &Path, relative: &str, contents: &[u8]) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn mets_document(files: &[(&str, &str, &str)]) -> String {
    let mut body = String::new();
    for (index, (checksum_type, checksum, href)) in files.iter().enumerate() {
        body.push_str(&format!(
            "      <METS:file ID=\"f{index}\" CHECKSUMTYPE=\"{checksum_type}\" CHECKSUM=\"{checksum}\">\n        <METS:FLocat LOCTYPE=\"URL\" xlink:href=\"{href}\"/>\n      </METS:file>\n"
        ));
    }
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<METS:mets xmlns:METS=\"http://www.loc.gov/METS/\" xmlns:xlink=\"http://www.w3.org/1999/xlink\">\n  <METS:fileSec>\n    <METS:fileGrp USE=\"original\">\n{body}    </METS:fileGrp>\n  </METS:fileSec>\n</METS:mets>\n"
    )
}

fn checker(store: &InMemoryIssueStore) -> FixityChecker {
    FixityChecker::new(
        FixityVerifier::new(Arc::new(DigestRegistry::standard())),
        IssuePolicyEngine::new(Arc::new(store.clone())),
    )
}

// ============================================================================
// SECTION: Parsing
// ============================================================================

/// Tests every file location yields an entry resolved against the METS directory.
#[test]
fn file_locations_resolve_against_mets_directory() {
    let dir = tempfile::tempdir().unwrap();
    let document = mets_document(&[("MD5", "aa", "data/a.txt"), ("SHA-256", "bb", "../b.txt")]);
    write(dir.path(), "meta/mets.xml", document.as_bytes());
    let location = PackageLocation::with_manifest(dir.path(), dir.path().join("meta/mets.xml"));
    let entries = MetsParser::default().parse(&location).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].path, dir.path().join("meta/data/a.txt"));
    assert_eq!(entries[0].declared_algorithm, "MD5");
    assert_eq!(entries[0].declared_digest, "aa");
    assert_eq!(entries[1].path, dir.path().join("b.txt"));
    assert_eq!(entries[1].declared_algorithm, "SHA-256");
}

/// Tests an href starting with a slash resolves against the package root.
#[test]
fn rooted_href_resolves_against_package_root() {
    let dir = tempfile::tempdir().unwrap();
    let document = mets_document(&[("MD5", "aa", "/data/a.txt")]);
    write(dir.path(), "meta/mets.xml", document.as_bytes());
    let location = PackageLocation::with_manifest(dir.path(), dir.path().join("meta/mets.xml"));
    let entries = MetsParser::default().parse(&location).unwrap();
    assert_eq!(entries[0].path, dir.path().join("data/a.txt"));
}

/// Tests file elements outside the configured namespace are ignored.
#[test]
fn foreign_namespace_file_elements_are_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let document = "<mets xmlns=\"urn:other\" xmlns:METS=\"urn:other\" xmlns:xlink=\"http://www.w3.org/1999/xlink\">\
        <file CHECKSUMTYPE=\"MD5\" CHECKSUM=\"aa\"><METS:FLocat xlink:href=\"a.txt\"/></file></mets>";
    write(dir.path(), "mets.xml", document.as_bytes());
    let location = PackageLocation::with_manifest(dir.path(), dir.path().join("mets.xml"));
    assert!(MetsParser::default().parse(&location).unwrap().is_empty());
}

/// Tests a configured namespace URI replaces the default.
#[test]
fn configured_namespace_is_matched() {
    let dir = tempfile::tempdir().unwrap();
    let document = "<METS:mets xmlns:METS=\"urn:custom\" xmlns:xlink=\"http://www.w3.org/1999/xlink\">\
        <METS:file CHECKSUMTYPE=\"MD5\" CHECKSUM=\"aa\"><METS:FLocat xlink:href=\"a.txt\"/></METS:file></METS:mets>";
    write(dir.path(), "mets.xml", document.as_bytes());
    let location = PackageLocation::with_manifest(dir.path(), dir.path().join("mets.xml"));
    assert_eq!(MetsParser::new("urn:custom").parse(&location).unwrap().len(), 1);
    assert!(MetsParser::default().parse(&location).unwrap().is_empty());
}

/// Tests location children under a prefix other than `METS` are not recognized.
#[test]
fn location_with_other_prefix_is_not_recognized() {
    let dir = tempfile::tempdir().unwrap();
    let document = "<m:mets xmlns:m=\"http://www.loc.gov/METS/\" xmlns:xlink=\"http://www.w3.org/1999/xlink\">\
        <m:file CHECKSUMTYPE=\"MD5\" CHECKSUM=\"aa\"><m:FLocat xlink:href=\"a.txt\"/></m:file></m:mets>";
    write(dir.path(), "mets.xml", document.as_bytes());
    let location = PackageLocation::with_manifest(dir.path(), dir.path().join("mets.xml"));
    assert!(MetsParser::default().parse(&location).unwrap().is_empty());
}

/// Tests the location element name is matched without regard to case.
#[test]
fn location_name_ignores_case() {
    let dir = tempfile::tempdir().unwrap();
    let document = "<METS:mets xmlns:METS=\"http://www.loc.gov/METS/\" xmlns:xlink=\"http://www.w3.org/1999/xlink\">\
        <METS:file CHECKSUMTYPE=\"MD5\" CHECKSUM=\"aa\"><mets:flocat xmlns:mets=\"urn:x\" xlink:href=\"a.txt\"/></METS:file></METS:mets>";
    write(dir.path(), "mets.xml", document.as_bytes());
    let location = PackageLocation::with_manifest(dir.path(), dir.path().join("mets.xml"));
    let entries = MetsParser::default().parse(&location).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].path, dir.path().join("a.txt"));
}

/// Tests a file element without a checksum attribute fails parsing.
#[test]
fn missing_checksum_attribute_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let document = "<METS:mets xmlns:METS=\"http://www.loc.gov/METS/\"><METS:file CHECKSUMTYPE=\"MD5\"/></METS:mets>";
    write(dir.path(), "mets.xml", document.as_bytes());
    let location = PackageLocation::with_manifest(dir.path(), dir.path().join("mets.xml"));
    let err = MetsParser::default().parse(&location).unwrap_err();
    assert_eq!(
        err,
        FixityError::MissingAttribute {
            element: "METS:file".to_string(),
            attribute: "CHECKSUM".to_string(),
        }
    );
}

/// Tests a location without a METS path is rejected.
#[test]
fn missing_mets_path_is_invalid_argument() {
    let dir = tempfile::tempdir().unwrap();
    let err = MetsParser::default().parse(&PackageLocation::new(dir.path())).unwrap_err();
    assert!(matches!(err, FixityError::InvalidArgument(_)));
}

/// Tests malformed XML surfaces as an xml error.
#[test]
fn malformed_xml_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "mets.xml",
        b"<METS:mets xmlns:METS=\"http://www.loc.gov/METS/\"><METS:fileSec></METS:mets>",
    );
    let location = PackageLocation::with_manifest(dir.path(), dir.path().join("mets.xml"));
    assert!(matches!(MetsParser::default().parse(&location), Err(FixityError::Xml(_))));
}

// ============================================================================
// SECTION: Policy
// ============================================================================

/// Tests an unsupported entry plus an altered file escalate after both buckets persist.
#[test]
fn unsupported_and_invalid_escalate_after_persisting_both() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "data/a.txt", b"alpha");
    write(dir.path(), "data/b.txt", b"bravo");
    let document = mets_document(&[
        ("CRC", "0badc0de", "data/a.txt"),
        ("MD5", &md5_hex(b"bravo"), "data/b.txt"),
    ]);
    write(dir.path(), "mets.xml", document.as_bytes());
    fs::write(dir.path().join("data/b.txt"), b"bravo, altered").unwrap();

    let location = PackageLocation::with_manifest(dir.path(), dir.path().join("mets.xml"));
    let outcome = FixityVerifier::new(Arc::new(DigestRegistry::standard()))
        .verify(&MetsParser::default(), &location)
        .unwrap();
    assert_eq!(outcome.unsupported_algorithm(&dir.path().join("data/a.txt")), Some("CRC"));
    assert!(outcome.is_invalid(&dir.path().join("data/b.txt")));
    assert!(outcome.missing.is_empty());

    let store = InMemoryIssueStore::new();
    let workflow = WorkflowId::new("wf-b");
    let tool = ToolRef::new("fixity", "1.0");
    let config = json!({"fixityCheck": {"0": {"continueOnUnsupportedChecksumType": true}}});
    let mut formats = BTreeMap::new();
    formats.insert("data/b.txt".to_string(), FormatRef::new("x-fmt/111"));
    let context = FixityContext {
        workflow: &workflow,
        tool: &tool,
        invocation: 0,
        config: &config,
        formats: &formats,
    };

    let fault = checker(&store).check(&MetsParser::default(), &location, &context).unwrap_err();
    let issues = match fault {
        FixityFault::Escalation {
            issues,
        } => issues,
        other => panic!("expected escalation, got {other:?}"),
    };
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].kind, IssueKind::InvalidChecksum);

    let stored = store.find_by_workflow(&workflow).unwrap();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].kind, IssueKind::UnsupportedChecksumType);
    assert!(stored[0].resolved_by_config);
    assert_eq!(
        stored[0].description,
        "unsupported checksum algorithm: CRC used for file: data/a.txt declared in: mets.xml. \
         used config: true at: /fixityCheck/0/continueOnUnsupportedChecksumType"
    );
    assert_eq!(stored[0].related_format, None);
    assert_eq!(stored[1].kind, IssueKind::InvalidChecksum);
    assert!(!stored[1].resolved_by_config);
    assert_eq!(
        stored[1].description,
        "invalid checksum of file: data/b.txt declared in: mets.xml. \
         missing config at: /fixityCheck/0/continueOnInvalidChecksums"
    );
    assert_eq!(stored[1].related_format, Some(FormatRef::new("x-fmt/111")));
    assert_eq!(stored[1].tool, tool);
}

/// Tests a fully matching METS package passes the checker without issues.
#[test]
fn matching_mets_package_passes() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "data/a.txt", b"alpha");
    let document = mets_document(&[("md5", &md5_hex(b"alpha"), "data/a.txt")]);
    write(dir.path(), "mets.xml", document.as_bytes());
    let location = PackageLocation::with_manifest(dir.path(), dir.path().join("mets.xml"));

    let store = InMemoryIssueStore::new();
    let workflow = WorkflowId::new("wf-clean");
    let tool = ToolRef::new("fixity", "1.0");
    let config = json!({});
    let context = FixityContext {
        workflow: &workflow,
        tool: &tool,
        invocation: 0,
        config: &config,
        formats: &preservation_core::NoFormats,
    };
    let outcome = checker(&store).check(&MetsParser::default(), &location, &context).unwrap();
    assert!(outcome.is_clean());
    assert!(store.all().unwrap().is_empty());
}
