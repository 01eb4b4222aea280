// crates/preservation-core/tests/proptest_digest.rs
// ============================================================================
// Module: Digest Property-Based Tests
// Description: Property tests for digest round-trips and comparison.
// Purpose: Check digest invariants across arbitrary inputs.
// ============================================================================

//! Property-based tests for digest registry invariants.

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

use std::io::Cursor;

use preservation_core::DigestOutcome;
use preservation_core::DigestRegistry;
use preservation_core::HashAlgorithm;
use preservation_core::hashing::matches;
use proptest::prelude::*;

fn algorithm_strategy() -> impl Strategy<Value = HashAlgorithm> {
    prop_oneof![
        Just(HashAlgorithm::Md5),
        Just(HashAlgorithm::Sha1),
        Just(HashAlgorithm::Sha256),
        Just(HashAlgorithm::Sha512),
        Just(HashAlgorithm::Crc32),
    ]
}

fn computed(registry: &DigestRegistry, algorithm: HashAlgorithm, bytes: &[u8]) -> Vec<u8> {
    match registry.digest_with(algorithm, &mut Cursor::new(bytes.to_vec())).unwrap() {
        DigestOutcome::Computed(digest) => digest,
        DigestOutcome::Unsupported(id) => panic!("unsupported {id}"),
    }
}

proptest! {
    #[test]
    fn digest_round_trips_through_hex(
        algorithm in algorithm_strategy(),
        bytes in prop::collection::vec(any::<u8>(), 0 .. 4096),
    ) {
        let registry = DigestRegistry::standard();
        let digest = computed(&registry, algorithm, &bytes);
        prop_assert!(matches(&hex::encode(&digest), &digest));
        prop_assert!(matches(&hex::encode_upper(&digest), &digest));
    }

    #[test]
    fn digest_is_deterministic(
        algorithm in algorithm_strategy(),
        bytes in prop::collection::vec(any::<u8>(), 0 .. 1024),
    ) {
        let registry = DigestRegistry::standard();
        prop_assert_eq!(
            computed(&registry, algorithm, &bytes),
            computed(&registry, algorithm, &bytes)
        );
    }

    #[test]
    fn registry_resolves_storage_labels(algorithm in algorithm_strategy()) {
        let registry = DigestRegistry::standard();
        prop_assert_eq!(registry.resolve(algorithm.storage_label()), Some(algorithm));
    }
}
