// crates/preservation-fixity/tests/bagit.rs
// ============================================================================
// Module: BagIt Parser Tests
// Description: Fixity checks over BagIt payload and tag manifests.
// Purpose: Validate manifest discovery, line parsing, and bucket assignment.
// Dependencies: preservation-fixity, preservation-core, tempfile
// ============================================================================

//! ## Overview
//! Builds small bags in temporary directories and verifies them with the
//! standard digest registry.

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
use preservation_fixity::BagitParser;
use preservation_fixity::FixityVerifier;
use preservation_fixity::ManifestParser;
use preservation_fixity::PackageLocation;
use tempfile::TempDir;

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

fn bag_with_payload() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let files: [(&str, &[u8]); 3] =
        [("data/one.txt", b"one"), ("data/two.txt", b"two"), ("data/nested/three.bin", b"\x00\x01\x02")];
    let mut manifest = String::new();
    for (relative, contents) in files {
        write(dir.path(), relative, contents);
        manifest.push_str(&format!("{}  {relative}\n", hex_of(HashAlgorithm::Sha512, contents)));
    }
    write(dir.path(), "manifest-sha512.txt", manifest.as_bytes());
    dir
}

// ============================================================================
// SECTION: Tests
// ============================================================================

/// Tests a bag whose payload matches its SHA-512 manifest is clean.
#[test]
fn matching_sha512_bag_is_clean() {
    let bag = bag_with_payload();
    let outcome = verifier().verify(&BagitParser, &PackageLocation::new(bag.path())).unwrap();
    assert!(outcome.is_clean());
}

/// Tests manifest entries are read in manifest order with the suffix as algorithm.
#[test]
fn parse_yields_entries_in_manifest_order() {
    let bag = bag_with_payload();
    let entries = BagitParser.parse(&PackageLocation::new(bag.path())).unwrap();
    let paths: Vec<_> = entries.iter().map(|entry| entry.path.clone()).collect();
    assert_eq!(
        paths,
        vec![
            bag.path().join("data/one.txt"),
            bag.path().join("data/two.txt"),
            bag.path().join("data/nested/three.bin"),
        ]
    );
    assert!(entries.iter().all(|entry| entry.declared_algorithm == "sha512"));
    assert!(entries.iter().all(|entry| entry.manifest == bag.path().join("manifest-sha512.txt")));
}

/// Tests altered and deleted payload files land in the invalid and missing buckets.
#[test]
fn altered_and_deleted_files_are_reported() {
    let bag = bag_with_payload();
    fs::write(bag.path().join("data/one.txt"), b"changed").unwrap();
    fs::remove_file(bag.path().join("data/two.txt")).unwrap();
    let outcome = verifier().verify(&BagitParser, &PackageLocation::new(bag.path())).unwrap();
    assert_eq!(outcome.invalid.len(), 1);
    assert!(outcome.is_invalid(&bag.path().join("data/one.txt")));
    assert_eq!(outcome.missing.len(), 1);
    assert!(outcome.is_missing(&bag.path().join("data/two.txt")));
    assert!(outcome.unsupported.is_empty());
}

/// Tests a manifest suffix outside the supported set is reported as unsupported.
#[test]
fn unknown_suffix_is_unsupported_without_touching_files() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "manifest-sha3.txt", b"abcdef  data/absent.txt\n");
    let outcome = verifier().verify(&BagitParser, &PackageLocation::new(dir.path())).unwrap();
    assert_eq!(outcome.unsupported_algorithm(&dir.path().join("data/absent.txt")), Some("sha3"));
    assert!(outcome.missing.is_empty());
}

/// Tests tag manifests are checked alongside payload manifests.
#[test]
fn tag_manifests_are_checked() {
    let bag = bag_with_payload();
    let info = b"Bag-Software-Agent: test\n";
    write(bag.path(), "bag-info.txt", info);
    write(
        bag.path(),
        "tagmanifest-md5.txt",
        format!("{} *bag-info.txt\n", hex_of(HashAlgorithm::Md5, b"tampered")).as_bytes(),
    );
    let outcome = verifier().verify(&BagitParser, &PackageLocation::new(bag.path())).unwrap();
    assert_eq!(outcome.invalid.len(), 1);
    assert!(outcome.is_invalid(&bag.path().join("bag-info.txt")));
}

/// Tests an unparsable manifest line is skipped without failing the bag.
#[test]
fn unparsable_line_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "data/a.txt", b"a");
    let manifest = format!("not-a-line\n{}  data/a.txt\n", hex_of(HashAlgorithm::Md5, b"a"));
    write(dir.path(), "manifest-md5.txt", manifest.as_bytes());
    let entries = BagitParser.parse(&PackageLocation::new(dir.path())).unwrap();
    assert_eq!(entries.len(), 1);
    let outcome = verifier().verify(&BagitParser, &PackageLocation::new(dir.path())).unwrap();
    assert!(outcome.is_clean());
}

/// Tests manifests in subdirectories are not part of the bag.
#[test]
fn nested_manifests_are_ignored() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "data/manifest-md5.txt", b"abcdef  missing.txt\n");
    let entries = BagitParser.parse(&PackageLocation::new(dir.path())).unwrap();
    assert!(entries.is_empty());
}

/// Tests digests are compared without regard to case.
#[test]
fn upper_case_digests_match() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "data/a.txt", b"payload");
    let manifest = format!("{}  data/a.txt\n", hex_of(HashAlgorithm::Sha256, b"payload").to_uppercase());
    write(dir.path(), "manifest-sha256.txt", manifest.as_bytes());
    let outcome = verifier().verify(&BagitParser, &PackageLocation::new(dir.path())).unwrap();
    assert!(outcome.is_clean());
}

/// Tests verifying the same bag twice yields the same outcome.
#[test]
fn verification_is_repeatable() {
    let bag = bag_with_payload();
    fs::write(bag.path().join("data/two.txt"), b"different").unwrap();
    let location = PackageLocation::new(bag.path());
    let first = verifier().verify(&BagitParser, &location).unwrap();
    let second = verifier().verify(&BagitParser, &location).unwrap();
    assert_eq!(first, second);
}
