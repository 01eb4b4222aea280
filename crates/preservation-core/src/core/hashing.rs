// crates/preservation-core/src/core/hashing.rs
// ============================================================================
// Module: Preservation Digest Registry
// Description: Streaming digest computation keyed by hash algorithm identifier.
// Purpose: Compute and compare package member digests without whole-file buffering.
// Dependencies: crc32fast, hex, md-5, sha1, sha2, thiserror, tracing
// ============================================================================

//! ## Overview
//! The digest registry maps a [`HashAlgorithm`] to a [`DigestComputer`]. It is
//! built once at startup and shared read-only across verification runs.
//! Inputs are streamed in [`DIGEST_CHUNK_BYTES`] chunks so package members of
//! any size can be hashed.
//!
//! Invariants:
//! - An algorithm identifier the registry does not know is reported as
//!   [`DigestOutcome::Unsupported`], never as an error.
//! - Digest comparison is case-insensitive on the hex representation.
//! - Directories and empty paths are rejected with [`DigestError::InvalidArgument`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::ErrorKind;
use std::io::Read;
use std::marker::PhantomData;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use md5::Md5;
use serde::Deserialize;
use serde::Serialize;
use sha1::Sha1;
use sha2::Digest;
use sha2::Sha256;
use sha2::Sha512;
use thiserror::Error;
use tracing::debug;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Chunk size used when streaming input into a digest computer.
pub const DIGEST_CHUNK_BYTES: usize = 64 * 1024;

/// Algorithms accepted by manifest conventions for fixity checks.
pub const FIXITY_ALGORITHMS: [HashAlgorithm; 4] =
    [HashAlgorithm::Md5, HashAlgorithm::Sha1, HashAlgorithm::Sha256, HashAlgorithm::Sha512];

// ============================================================================
// SECTION: Hash Algorithm
// ============================================================================

/// Hash algorithms known to the preservation core.
///
/// # Invariants
/// - Storage labels are upper-case without separators (`SHA256`, not `SHA-256`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HashAlgorithm {
    /// MD5 (128-bit).
    #[serde(rename = "MD5")]
    Md5,
    /// SHA-1 (160-bit).
    #[serde(rename = "SHA1")]
    Sha1,
    /// SHA-256.
    #[serde(rename = "SHA256")]
    Sha256,
    /// SHA-512.
    #[serde(rename = "SHA512")]
    Sha512,
    /// CRC-32 (IEEE), big-endian digest bytes.
    #[serde(rename = "CRC32")]
    Crc32,
}

impl HashAlgorithm {
    /// Returns the label used on the archival storage wire.
    #[must_use]
    pub const fn storage_label(self) -> &'static str {
        match self {
            Self::Md5 => "MD5",
            Self::Sha1 => "SHA1",
            Self::Sha256 => "SHA256",
            Self::Sha512 => "SHA512",
            Self::Crc32 => "CRC32",
        }
    }

    /// Returns the lower-case file suffix naming this algorithm (`md5`, `sha256`).
    #[must_use]
    pub const fn file_suffix(self) -> &'static str {
        match self {
            Self::Md5 => "md5",
            Self::Sha1 => "sha1",
            Self::Sha256 => "sha256",
            Self::Sha512 => "sha512",
            Self::Crc32 => "crc32",
        }
    }

    /// Resolves a METS `CHECKSUMTYPE` value (`MD5`, `SHA-1`, `SHA-256`, `SHA-512`).
    ///
    /// Matching is case-insensitive; every other value is unsupported.
    #[must_use]
    pub fn from_mets_label(label: &str) -> Option<Self> {
        match label.to_ascii_uppercase().as_str() {
            "MD5" => Some(Self::Md5),
            "SHA-1" => Some(Self::Sha1),
            "SHA-256" => Some(Self::Sha256),
            "SHA-512" => Some(Self::Sha512),
            _ => None,
        }
    }

    /// Resolves a manifest file suffix (`md5`, `sha1`, `sha256`, `sha512`).
    #[must_use]
    pub fn from_file_suffix(suffix: &str) -> Option<Self> {
        FIXITY_ALGORITHMS.into_iter().find(|algorithm| algorithm.file_suffix() == suffix)
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.storage_label())
    }
}

/// Error returned when an algorithm identifier cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown hash algorithm: {0}")]
pub struct UnknownAlgorithm(pub String);

impl FromStr for HashAlgorithm {
    type Err = UnknownAlgorithm;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized: String = value
            .chars()
            .filter(|ch| *ch != '-' && *ch != '_')
            .map(|ch| ch.to_ascii_uppercase())
            .collect();
        match normalized.as_str() {
            "MD5" => Ok(Self::Md5),
            "SHA1" => Ok(Self::Sha1),
            "SHA256" => Ok(Self::Sha256),
            "SHA512" => Ok(Self::Sha512),
            "CRC32" => Ok(Self::Crc32),
            _ => Err(UnknownAlgorithm(value.to_string())),
        }
    }
}

// ============================================================================
// SECTION: Checksum
// ============================================================================

/// A digest value paired with the algorithm that produced it.
///
/// # Invariants
/// - `value` is lower-case hex when built by [`Checksum::from_bytes`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checksum {
    /// Algorithm used to compute the digest.
    pub algorithm: HashAlgorithm,
    /// Hex-encoded digest value.
    pub value: String,
}

impl Checksum {
    /// Creates a checksum from an already encoded hex value.
    #[must_use]
    pub fn new(algorithm: HashAlgorithm, value: impl Into<String>) -> Self {
        Self {
            algorithm,
            value: value.into(),
        }
    }

    /// Creates a checksum from raw digest bytes.
    #[must_use]
    pub fn from_bytes(algorithm: HashAlgorithm, bytes: &[u8]) -> Self {
        Self {
            algorithm,
            value: hex::encode(bytes),
        }
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.value)
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while computing digests.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DigestError {
    /// The caller supplied an unusable input (empty path, directory).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Reading the input failed.
    #[error("digest io error: {0}")]
    Io(String),
}

// ============================================================================
// SECTION: Digest Computers
// ============================================================================

/// Computes a digest over a byte stream.
pub trait DigestComputer: Send + Sync {
    /// Returns the algorithm implemented by this computer.
    fn algorithm(&self) -> HashAlgorithm;

    /// Consumes the reader to the end and returns the raw digest bytes.
    ///
    /// # Errors
    ///
    /// Returns [`DigestError::Io`] when the reader fails.
    fn digest_reader(&self, reader: &mut dyn Read) -> Result<Vec<u8>, DigestError>;
}

/// Digest computer backed by a `RustCrypto` hash implementation.
pub struct RustCryptoComputer<D> {
    /// Algorithm reported for this computer.
    algorithm: HashAlgorithm,
    /// Marker for the hasher type.
    hasher: PhantomData<fn() -> D>,
}

impl<D> RustCryptoComputer<D> {
    /// Creates a computer reporting the given algorithm.
    #[must_use]
    pub const fn new(algorithm: HashAlgorithm) -> Self {
        Self {
            algorithm,
            hasher: PhantomData,
        }
    }
}

impl<D: Digest> DigestComputer for RustCryptoComputer<D> {
    fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    fn digest_reader(&self, reader: &mut dyn Read) -> Result<Vec<u8>, DigestError> {
        let mut hasher = D::new();
        stream_chunks(reader, |chunk| hasher.update(chunk))?;
        Ok(hasher.finalize().to_vec())
    }
}

/// CRC-32 digest computer.
#[derive(Debug, Clone, Copy, Default)]
pub struct Crc32Computer;

impl DigestComputer for Crc32Computer {
    fn algorithm(&self) -> HashAlgorithm {
        HashAlgorithm::Crc32
    }

    fn digest_reader(&self, reader: &mut dyn Read) -> Result<Vec<u8>, DigestError> {
        let mut hasher = crc32fast::Hasher::new();
        stream_chunks(reader, |chunk| hasher.update(chunk))?;
        Ok(hasher.finalize().to_be_bytes().to_vec())
    }
}

/// Feeds the reader into `update` in fixed-size chunks until end of input.
fn stream_chunks(
    reader: &mut dyn Read,
    mut update: impl FnMut(&[u8]),
) -> Result<(), DigestError> {
    let mut buffer = vec![0_u8; DIGEST_CHUNK_BYTES];
    loop {
        match reader.read(&mut buffer) {
            Ok(0) => return Ok(()),
            Ok(read) => update(&buffer[.. read]),
            Err(err) if err.kind() == ErrorKind::Interrupted => {}
            Err(err) => return Err(DigestError::Io(err.to_string())),
        }
    }
}

// ============================================================================
// SECTION: Digest Registry
// ============================================================================

/// Result of a digest request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DigestOutcome {
    /// Raw digest bytes.
    Computed(Vec<u8>),
    /// The algorithm identifier is not registered.
    Unsupported(String),
}

/// Result of comparing a file against a declared digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DigestVerdict {
    /// The computed digest equals the declared digest.
    Matches,
    /// The computed digest differs; carries the computed lower-case hex.
    Mismatch {
        /// Computed digest.
        actual: String,
    },
    /// The algorithm is not registered.
    Unsupported,
}

/// Read-only map from algorithm to digest computer.
///
/// # Invariants
/// - Holds no per-call mutable state; cloning shares the computers.
#[derive(Clone)]
pub struct DigestRegistry {
    /// Registered computers keyed by algorithm.
    computers: BTreeMap<HashAlgorithm, Arc<dyn DigestComputer>>,
}

impl DigestRegistry {
    /// Creates a registry with no computers.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            computers: BTreeMap::new(),
        }
    }

    /// Creates a registry with MD5, SHA-1, SHA-256, SHA-512, and CRC-32.
    #[must_use]
    pub fn standard() -> Self {
        Self::empty()
            .with_computer(Arc::new(RustCryptoComputer::<Md5>::new(HashAlgorithm::Md5)))
            .with_computer(Arc::new(RustCryptoComputer::<Sha1>::new(HashAlgorithm::Sha1)))
            .with_computer(Arc::new(RustCryptoComputer::<Sha256>::new(HashAlgorithm::Sha256)))
            .with_computer(Arc::new(RustCryptoComputer::<Sha512>::new(HashAlgorithm::Sha512)))
            .with_computer(Arc::new(Crc32Computer))
    }

    /// Registers a computer, replacing any computer for the same algorithm.
    #[must_use]
    pub fn with_computer(mut self, computer: Arc<dyn DigestComputer>) -> Self {
        self.computers.insert(computer.algorithm(), computer);
        self
    }

    /// Returns true when the algorithm has a registered computer.
    #[must_use]
    pub fn supports(&self, algorithm: HashAlgorithm) -> bool {
        self.computers.contains_key(&algorithm)
    }

    /// Resolves an algorithm identifier to a registered algorithm.
    #[must_use]
    pub fn resolve(&self, algorithm_id: &str) -> Option<HashAlgorithm> {
        let algorithm = HashAlgorithm::from_str(algorithm_id).ok()?;
        self.supports(algorithm).then_some(algorithm)
    }

    /// Returns the registered algorithms in stable order.
    pub fn algorithms(&self) -> impl Iterator<Item = HashAlgorithm> + '_ {
        self.computers.keys().copied()
    }

    /// Computes a digest for an algorithm identifier over a byte stream.
    ///
    /// # Errors
    ///
    /// Returns [`DigestError::Io`] when the stream cannot be read.
    pub fn digest(
        &self,
        algorithm_id: &str,
        reader: &mut dyn Read,
    ) -> Result<DigestOutcome, DigestError> {
        let Some(algorithm) = self.resolve(algorithm_id) else {
            return Ok(DigestOutcome::Unsupported(algorithm_id.to_string()));
        };
        self.digest_with(algorithm, reader)
    }

    /// Computes a digest with a typed algorithm over a byte stream.
    ///
    /// # Errors
    ///
    /// Returns [`DigestError::Io`] when the stream cannot be read.
    pub fn digest_with(
        &self,
        algorithm: HashAlgorithm,
        reader: &mut dyn Read,
    ) -> Result<DigestOutcome, DigestError> {
        let Some(computer) = self.computers.get(&algorithm) else {
            return Ok(DigestOutcome::Unsupported(algorithm.storage_label().to_string()));
        };
        computer.digest_reader(reader).map(DigestOutcome::Computed)
    }

    /// Computes a digest over the contents of a regular file.
    ///
    /// # Errors
    ///
    /// Returns [`DigestError::InvalidArgument`] for an empty path or a directory,
    /// and [`DigestError::Io`] when the file cannot be opened or read.
    pub fn digest_file(
        &self,
        algorithm: HashAlgorithm,
        path: &Path,
    ) -> Result<DigestOutcome, DigestError> {
        if path.as_os_str().is_empty() {
            return Err(DigestError::InvalidArgument("path must not be empty".to_string()));
        }
        if path.is_dir() {
            return Err(DigestError::InvalidArgument(format!(
                "path is a directory: {}",
                path.display()
            )));
        }
        let mut file = File::open(path).map_err(|err| DigestError::Io(err.to_string()))?;
        let outcome = self.digest_with(algorithm, &mut file)?;
        debug!(algorithm = %algorithm, path = %path.display(), "digest computed");
        Ok(outcome)
    }

    /// Compares a file against a declared hex digest.
    ///
    /// # Errors
    ///
    /// Propagates [`DigestRegistry::digest_file`] errors.
    pub fn verify_file(
        &self,
        algorithm: HashAlgorithm,
        path: &Path,
        expected_hex: &str,
    ) -> Result<DigestVerdict, DigestError> {
        match self.digest_file(algorithm, path)? {
            DigestOutcome::Unsupported(_) => Ok(DigestVerdict::Unsupported),
            DigestOutcome::Computed(bytes) if matches(expected_hex, &bytes) => {
                Ok(DigestVerdict::Matches)
            }
            DigestOutcome::Computed(bytes) => Ok(DigestVerdict::Mismatch {
                actual: hex::encode(bytes),
            }),
        }
    }
}

impl Default for DigestRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl fmt::Debug for DigestRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DigestRegistry")
            .field("algorithms", &self.computers.keys().collect::<Vec<_>>())
            .finish()
    }
}

// ============================================================================
// SECTION: Comparison
// ============================================================================

/// Returns true when `expected_hex` equals the hex encoding of `computed`.
///
/// The comparison ignores ASCII case in `expected_hex`.
#[must_use]
pub fn matches(expected_hex: &str, computed: &[u8]) -> bool {
    hex::encode(computed) == expected_hex.to_ascii_lowercase()
}
