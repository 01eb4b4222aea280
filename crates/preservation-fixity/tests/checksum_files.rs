// crates/preservation-fixity/tests/checksum_files.rs
// ============================================================================
// Module: Common Checksum Files Tests
// Description: Fixity checks over ad-hoc checksum files found by extension.
// Purpose: Validate discovery, path resolution fallbacks, and abort handling.
// Dependencies: preservation-fixity, preservation-core, serde_json, tempfile
// ============================================================================

//! ## Overview
//! Covers checksum files in nested folders, Windows separators, rooted paths,
//! and the terminal abort raised when configuration disables continuation.

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

use std::fs;
use std::path::Path;
use std::sync::Arc;

use preservation_core::DigestOutcome;
use preservation_core::DigestRegistry;
use preservation_core::HashAlgorithm;
use preservation_core::InMemoryIssueStore;
use preservation_core::IssueKind;
use preservation_core::IssueStore;
use preservation_core::NoFormats;
use preservation_core::ToolRef;
use preservation_core::WorkflowId;
use preservation_fixity::ChecksumFilesParser;
use preservation_fixity::FixityChecker;
use preservation_fixity::FixityContext;
use preservation_fixity::FixityFault;
use preservation_fixity::FixityVerifier;
use preservation_fixity::IssuePolicyEngine;
use preservation_fixity::ManifestParser;
use preservation_fixity::PackageLocation;
use serde_json::json;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn hex_of(algorithm: HashAlgorithm, data: &[u8]) -> String {
    match DigestRegistry::standard().digest_with(algorithm, &mut &data[..]).unwrap() {
        DigestOutcome::Computed(bytes) => hex::encode(bytes),
        DigestOutcome::Unsupported(id) => panic!("unexpected unsupported algorithm {id}"),
    }
}

fn write(root: &Path, relative: &str, contents: &[u8]) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn verifier() -> FixityVerifier {
    FixityVerifier::new(Arc::new(DigestRegistry::standard()))
}

// ============================================================================
// SECTION: Discovery
// ============================================================================

/// Tests a package without checksum files yields nothing.
#[test]
fn package_without_checksum_files_is_clean() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "data/a.txt", b"a");
    write(dir.path(), "data/readme.md5sum", b"ignored  a.txt\n");
    let entries = ChecksumFilesParser.parse(&PackageLocation::new(dir.path())).unwrap();
    assert!(entries.is_empty());
}

/// Tests every supported extension is discovered and paths resolve beside the file.
#[test]
fn checksum_files_resolve_beside_themselves() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a/one.txt", b"one");
    write(dir.path(), "b/two.txt", b"two");
    write(dir.path(), "a/one.txt.md5", format!("{}  one.txt\n", hex_of(HashAlgorithm::Md5, b"one")).as_bytes());
    write(
        dir.path(),
        "b/sums.sha1",
        format!("{} *two.txt\n", hex_of(HashAlgorithm::Sha1, b"two")).as_bytes(),
    );
    let entries = ChecksumFilesParser.parse(&PackageLocation::new(dir.path())).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].path, dir.path().join("a/one.txt"));
    assert_eq!(entries[0].declared_algorithm, "md5");
    assert_eq!(entries[1].path, dir.path().join("b/two.txt"));
    assert_eq!(entries[1].declared_algorithm, "sha1");
    let outcome = verifier().verify(&ChecksumFilesParser, &PackageLocation::new(dir.path())).unwrap();
    assert!(outcome.is_clean());
}

/// Tests backslash separators are accepted.
#[test]
fn backslash_paths_are_normalized() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "data/sub/file.bin", b"bytes");
    write(
        dir.path(),
        "data/sums.sha256",
        format!("{}  sub\\file.bin\n", hex_of(HashAlgorithm::Sha256, b"bytes")).as_bytes(),
    );
    let outcome = verifier().verify(&ChecksumFilesParser, &PackageLocation::new(dir.path())).unwrap();
    assert!(outcome.is_clean());
}

/// Tests a rooted path prefers the package root.
#[test]
fn rooted_path_prefers_package_root() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "data/file.txt", b"root copy");
    write(dir.path(), "nested/sums.md5", b"00  /data/file.txt\n");
    let entries = ChecksumFilesParser.parse(&PackageLocation::new(dir.path())).unwrap();
    assert_eq!(entries[0].path, dir.path().join("data/file.txt"));
}

/// Tests a rooted path falls back to the checksum file's directory.
#[test]
fn rooted_path_falls_back_to_checksum_directory() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "nested/data/file.txt", b"nested copy");
    write(dir.path(), "nested/sums.md5", b"00  /data/file.txt\n");
    let entries = ChecksumFilesParser.parse(&PackageLocation::new(dir.path())).unwrap();
    assert_eq!(entries[0].path, dir.path().join("nested/data/file.txt"));
}

/// Tests an unresolvable rooted path is missing at the package root.
#[test]
fn unresolvable_rooted_path_is_missing_at_root() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "nested/sums.md5", b"00  /data/file.txt\n");
    let outcome = verifier().verify(&ChecksumFilesParser, &PackageLocation::new(dir.path())).unwrap();
    assert!(outcome.is_missing(&dir.path().join("data/file.txt")));
}

// ============================================================================
// SECTION: Policy
// ============================================================================

/// Tests a missing file with continuation disabled persists a resolved issue and aborts.
#[test]
fn missing_file_with_continuation_disabled_aborts() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "sub/gone.txt", b"soon gone");
    write(
        dir.path(),
        "sub/checks.md5",
        format!("{}  gone.txt\n", hex_of(HashAlgorithm::Md5, b"soon gone")).as_bytes(),
    );
    fs::remove_file(dir.path().join("sub/gone.txt")).unwrap();

    let store = InMemoryIssueStore::new();
    let checker = FixityChecker::new(verifier(), IssuePolicyEngine::new(Arc::new(store.clone())));
    let workflow = WorkflowId::new("wf-c");
    let tool = ToolRef::new("fixity", "1.0");
    let config = json!({"fixityCheck": {"0": {"continueOnMissingFiles": false}}});
    let context = FixityContext {
        workflow: &workflow,
        tool: &tool,
        invocation: 0,
        config: &config,
        formats: &NoFormats,
    };

    let fault =
        checker.check(&ChecksumFilesParser, &PackageLocation::new(dir.path()), &context).unwrap_err();
    let message = match fault {
        FixityFault::Abort {
            message,
        } => message,
        other => panic!("expected abort, got {other:?}"),
    };
    assert_eq!(message, "FILE_MISSING issue occurred, files: [sub/gone.txt]");

    let stored = store.find_by_workflow(&workflow).unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].kind, IssueKind::MissingFile);
    assert!(stored[0].resolved_by_config);
    assert_eq!(
        stored[0].description,
        "missing file: sub/gone.txt declared in: sub/checks.md5. \
         used config: false at: /fixityCheck/0/continueOnMissingFiles"
    );
}

/// Tests continuation enabled for every bucket records issues and succeeds.
#[test]
fn continuation_enabled_records_and_continues() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a.txt", b"a");
    write(dir.path(), "sums.md5", b"00  a.txt\n00  absent.txt\n");

    let store = InMemoryIssueStore::new();
    let checker = FixityChecker::new(verifier(), IssuePolicyEngine::new(Arc::new(store.clone())));
    let workflow = WorkflowId::new("wf-continue");
    let tool = ToolRef::new("fixity", "1.0");
    let config = json!({"fixityCheck": {"0": {
        "continueOnMissingFiles": true,
        "continueOnInvalidChecksums": true
    }}});
    let context = FixityContext {
        workflow: &workflow,
        tool: &tool,
        invocation: 0,
        config: &config,
        formats: &NoFormats,
    };

    let outcome = checker.check(&ChecksumFilesParser, &PackageLocation::new(dir.path()), &context).unwrap();
    assert_eq!(outcome.finding_count(), 2);
    let kinds: Vec<IssueKind> = store.all().unwrap().iter().map(|issue| issue.kind).collect();
    assert_eq!(kinds, vec![IssueKind::MissingFile, IssueKind::InvalidChecksum]);
}

/// Tests a missing-file abort stops before the invalid bucket is resolved.
#[test]
fn abort_stops_later_buckets() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a.txt", b"a");
    write(dir.path(), "sums.md5", b"00  a.txt\n00  absent.txt\n");

    let store = InMemoryIssueStore::new();
    let checker = FixityChecker::new(verifier(), IssuePolicyEngine::new(Arc::new(store.clone())));
    let workflow = WorkflowId::new("wf-order");
    let tool = ToolRef::new("fixity", "1.0");
    let config = json!({"fixityCheck": {"0": {"continueOnMissingFiles": false}}});
    let context = FixityContext {
        workflow: &workflow,
        tool: &tool,
        invocation: 0,
        config: &config,
        formats: &NoFormats,
    };

    let fault = checker.check(&ChecksumFilesParser, &PackageLocation::new(dir.path()), &context).unwrap_err();
    assert!(matches!(fault, FixityFault::Abort { .. }));
    let stored = store.all().unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].kind, IssueKind::MissingFile);
}
