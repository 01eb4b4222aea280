// crates/preservation-storage/src/client.rs
// ============================================================================
// Module: Archival Storage Client
// Description: Blocking HTTP client for the archival storage service.
// Purpose: Perform one authenticated call per operation and classify the result.
// Dependencies: base64, preservation-core, reqwest, tracing
// ============================================================================

//! ## Overview
//! Every operation sends exactly one request under `{base}/storage/...` with
//! a Basic authorization header: the read credential for exports and state
//! queries, the read-write credential for everything else. Only a 2xx status
//! is accepted; transport failures and any other status become an
//! [`ArchivalStorageError`] naming the operation. There is no retry.
//!
//! State queries answer with a quoted state name. Quotes are stripped and the
//! name must parse as an [`ObjectState`]; unknown names are errors.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::io;
use std::io::Read;
use std::str::FromStr;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use preservation_core::Checksum;
use preservation_core::ObjectState;
use preservation_core::PackageId;
use reqwest::Method;
use reqwest::Url;
use reqwest::blocking::Client;
use reqwest::blocking::RequestBuilder;
use reqwest::blocking::Response;
use reqwest::blocking::multipart::Form;
use reqwest::blocking::multipart::Part;
use reqwest::header::AUTHORIZATION;
use reqwest::header::HeaderValue;
use reqwest::redirect::Policy;
use thiserror::Error;
use tracing::debug;
use tracing::warn;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default request timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

// ============================================================================
// SECTION: Operations
// ============================================================================

/// Archival storage operation, carried by every client error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageOperation {
    /// Export a package with its metadata.
    Export,
    /// Export one metadata version.
    ExportXml,
    /// Store a new package.
    Store,
    /// Store a new metadata version.
    UpdateMetadata,
    /// Query the package state.
    GetState,
    /// Query the state of one metadata version.
    GetXmlState,
    /// Physically delete a package.
    Delete,
    /// Logically remove a package.
    Remove,
    /// Roll back a package.
    Rollback,
    /// Roll back the latest metadata version.
    RollbackXml,
    /// Renew a removed package.
    Renew,
}

impl StorageOperation {
    /// Returns the operation name used in logs and errors.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Export => "export",
            Self::ExportXml => "export_xml",
            Self::Store => "store",
            Self::UpdateMetadata => "update_metadata",
            Self::GetState => "get_state",
            Self::GetXmlState => "get_xml_state",
            Self::Delete => "delete",
            Self::Remove => "remove",
            Self::Rollback => "rollback",
            Self::RollbackXml => "rollback_xml",
            Self::Renew => "renew",
        }
    }

    /// Returns true when the operation only reads remote data.
    #[must_use]
    pub const fn is_read_only(self) -> bool {
        matches!(self, Self::Export | Self::ExportXml | Self::GetState | Self::GetXmlState)
    }
}

impl fmt::Display for StorageOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Archival storage client errors.
///
/// # Invariants
/// - Every request-level variant names the failed operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArchivalStorageError {
    /// The HTTP client could not be built.
    #[error("archival storage client setup failed: {0}")]
    Setup(String),
    /// The request could not be formed from its inputs.
    #[error("{operation} rejected locally: {message}")]
    InvalidRequest {
        /// Failed operation.
        operation: StorageOperation,
        /// Failure detail.
        message: String,
    },
    /// The request did not complete.
    #[error("{operation} transport failure: {message}")]
    Transport {
        /// Failed operation.
        operation: StorageOperation,
        /// Failure detail.
        message: String,
    },
    /// The service answered with a non-2xx status.
    #[error("{operation} failed with status {status}: {body}")]
    Rejected {
        /// Failed operation.
        operation: StorageOperation,
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },
    /// A state query answered with an unknown state name.
    #[error("{operation} returned unknown object state: {value}")]
    InvalidState {
        /// Failed operation.
        operation: StorageOperation,
        /// Raw response value.
        value: String,
    },
    /// The response body could not be read.
    #[error("{operation} response body unreadable: {message}")]
    Body {
        /// Failed operation.
        operation: StorageOperation,
        /// Failure detail.
        message: String,
    },
}

impl ArchivalStorageError {
    /// Returns the failed operation, if the error came from a request.
    #[must_use]
    pub const fn operation(&self) -> Option<StorageOperation> {
        match self {
            Self::Setup(_) => None,
            Self::InvalidRequest {
                operation,
                ..
            }
            | Self::Transport {
                operation,
                ..
            }
            | Self::Rejected {
                operation,
                ..
            }
            | Self::InvalidState {
                operation,
                ..
            }
            | Self::Body {
                operation,
                ..
            } => Some(*operation),
        }
    }
}

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Username and password for Basic authentication.
#[derive(Clone, PartialEq, Eq)]
pub struct BasicCredentials {
    /// Username.
    pub username: String,
    /// Password.
    pub password: String,
}

impl BasicCredentials {
    /// Creates credentials.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Returns the `Authorization` header value.
    fn header_value(&self) -> Result<HeaderValue, ArchivalStorageError> {
        let token = STANDARD.encode(format!("{}:{}", self.username, self.password));
        let mut value = HeaderValue::from_str(&format!("Basic {token}"))
            .map_err(|err| ArchivalStorageError::Setup(err.to_string()))?;
        value.set_sensitive(true);
        Ok(value)
    }
}

impl fmt::Debug for BasicCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Immutable client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageClientConfig {
    /// Service base URL; operations live under `{base}/storage`.
    pub base_url: Url,
    /// Credential for read-only operations.
    pub read: BasicCredentials,
    /// Credential for modifying operations.
    pub read_write: BasicCredentials,
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
}

// ============================================================================
// SECTION: Response Body
// ============================================================================

/// Streaming body of an accepted response.
#[derive(Debug)]
pub struct StorageBody {
    /// Underlying response.
    response: Response,
}

impl StorageBody {
    /// Returns the HTTP status code.
    #[must_use]
    pub fn status(&self) -> u16 {
        self.response.status().as_u16()
    }
}

impl Read for StorageBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.response.read(buf)
    }
}

// ============================================================================
// SECTION: Client
// ============================================================================

/// Blocking archival storage client.
#[derive(Debug, Clone)]
pub struct ArchivalStorageClient {
    /// Service base URL.
    base_url: Url,
    /// Header value for read-only operations.
    read_auth: HeaderValue,
    /// Header value for modifying operations.
    read_write_auth: HeaderValue,
    /// HTTP client.
    client: Client,
}

impl ArchivalStorageClient {
    /// Creates a client from immutable configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ArchivalStorageError::Setup`] when the base URL cannot hold
    /// path segments, a credential is not a valid header, or the HTTP client
    /// cannot be built.
    pub fn new(config: StorageClientConfig) -> Result<Self, ArchivalStorageError> {
        if config.base_url.cannot_be_a_base() {
            return Err(ArchivalStorageError::Setup(format!(
                "base url cannot hold paths: {}",
                config.base_url
            )));
        }
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .redirect(Policy::none())
            .build()
            .map_err(|err| ArchivalStorageError::Setup(err.to_string()))?;
        Ok(Self {
            read_auth: config.read.header_value()?,
            read_write_auth: config.read_write.header_value()?,
            base_url: config.base_url,
            client,
        })
    }

    /// Exports a package with its latest metadata, or with every version.
    ///
    /// # Errors
    ///
    /// Returns [`ArchivalStorageError`] on transport failure or non-2xx status.
    pub fn export(
        &self,
        package: &PackageId,
        all_versions: bool,
    ) -> Result<StorageBody, ArchivalStorageError> {
        let operation = StorageOperation::Export;
        let mut url = self.endpoint(operation, package, &[])?;
        if all_versions {
            url.query_pairs_mut().append_pair("all", "true");
        }
        self.execute(operation, self.request(operation, Method::GET, url))
    }

    /// Exports one metadata version, or the latest when `version` is absent.
    ///
    /// # Errors
    ///
    /// Returns [`ArchivalStorageError`] on transport failure or non-2xx status.
    pub fn export_xml(
        &self,
        package: &PackageId,
        version: Option<u32>,
    ) -> Result<StorageBody, ArchivalStorageError> {
        let operation = StorageOperation::ExportXml;
        let mut url = self.endpoint(operation, package, &["xml"])?;
        if let Some(version) = version {
            url.query_pairs_mut().append_pair("v", &version.to_string());
        }
        self.execute(operation, self.request(operation, Method::GET, url))
    }

    /// Stores a new package with its first metadata version.
    ///
    /// # Errors
    ///
    /// Returns [`ArchivalStorageError`] on transport failure or non-2xx status.
    pub fn store<C, M>(
        &self,
        package: &PackageId,
        content: C,
        metadata: M,
        content_digest: &Checksum,
        metadata_digest: &Checksum,
    ) -> Result<StorageBody, ArchivalStorageError>
    where
        C: Read + Send + 'static,
        M: Read + Send + 'static,
    {
        let operation = StorageOperation::Store;
        let id = require_id(operation, package)?;
        let url = self.storage_url(operation, &["save"])?;
        let form = Form::new()
            .part("sip", Part::reader(content).file_name(format!("{id}.zip")))
            .part("aipXml", Part::reader(metadata).file_name(format!("{id}.xml")))
            .text("sipChecksumValue", content_digest.value.clone())
            .text("sipChecksumType", content_digest.algorithm.storage_label())
            .text("aipXmlChecksumValue", metadata_digest.value.clone())
            .text("aipXmlChecksumType", metadata_digest.algorithm.storage_label())
            .text("UUID", id.to_string());
        self.execute(operation, self.request(operation, Method::POST, url).multipart(form))
    }

    /// Stores a new metadata version of an archived package.
    ///
    /// With `synchronous` set the service answers after storage completes.
    ///
    /// # Errors
    ///
    /// Returns [`ArchivalStorageError`] on transport failure or non-2xx status.
    pub fn update_metadata<M>(
        &self,
        package: &PackageId,
        metadata: M,
        digest: &Checksum,
        version: u32,
        synchronous: bool,
    ) -> Result<StorageBody, ArchivalStorageError>
    where
        M: Read + Send + 'static,
    {
        let operation = StorageOperation::UpdateMetadata;
        let url = self.endpoint(operation, package, &["update"])?;
        let form = Form::new()
            .part("xml", Part::reader(metadata).file_name(format!("{package}.xml")))
            .text("checksumValue", digest.value.clone())
            .text("checksumType", digest.algorithm.storage_label())
            .text("v", version.to_string())
            .text("sync", synchronous.to_string());
        self.execute(operation, self.request(operation, Method::POST, url).multipart(form))
    }

    /// Queries the state of a package.
    ///
    /// # Errors
    ///
    /// Returns [`ArchivalStorageError::InvalidState`] for unknown state names
    /// and other variants on transport failure or non-2xx status.
    pub fn get_state(&self, package: &PackageId) -> Result<ObjectState, ArchivalStorageError> {
        let operation = StorageOperation::GetState;
        let url = self.endpoint(operation, package, &["state"])?;
        let body = self.execute(operation, self.request(operation, Method::GET, url))?;
        parse_state(operation, body)
    }

    /// Queries the state of one metadata version.
    ///
    /// # Errors
    ///
    /// Returns [`ArchivalStorageError::InvalidState`] for unknown state names
    /// and other variants on transport failure or non-2xx status.
    pub fn get_xml_state(
        &self,
        package: &PackageId,
        version: u32,
    ) -> Result<ObjectState, ArchivalStorageError> {
        let operation = StorageOperation::GetXmlState;
        let version = version.to_string();
        let url = self.endpoint(operation, package, &["xml", &version, "state"])?;
        let body = self.execute(operation, self.request(operation, Method::GET, url))?;
        parse_state(operation, body)
    }

    /// Physically deletes a package.
    ///
    /// # Errors
    ///
    /// Returns [`ArchivalStorageError`] on transport failure or non-2xx status.
    pub fn delete(&self, package: &PackageId) -> Result<StorageBody, ArchivalStorageError> {
        let operation = StorageOperation::Delete;
        let url = self.endpoint(operation, package, &[])?;
        self.execute(operation, self.request(operation, Method::DELETE, url))
    }

    /// Logically removes a package.
    ///
    /// # Errors
    ///
    /// Returns [`ArchivalStorageError`] on transport failure or non-2xx status.
    pub fn remove(&self, package: &PackageId) -> Result<StorageBody, ArchivalStorageError> {
        let operation = StorageOperation::Remove;
        let url = self.endpoint(operation, package, &["remove"])?;
        self.execute(operation, self.request(operation, Method::PUT, url))
    }

    /// Rolls back a package and its first metadata version.
    ///
    /// # Errors
    ///
    /// Returns [`ArchivalStorageError`] on transport failure or non-2xx status.
    pub fn rollback(&self, package: &PackageId) -> Result<StorageBody, ArchivalStorageError> {
        let operation = StorageOperation::Rollback;
        let url = self.endpoint(operation, package, &["rollback"])?;
        self.execute(operation, self.request(operation, Method::DELETE, url))
    }

    /// Rolls back the latest metadata version.
    ///
    /// # Errors
    ///
    /// Returns [`ArchivalStorageError`] on transport failure or non-2xx status.
    pub fn rollback_xml(
        &self,
        package: &PackageId,
        version: u32,
    ) -> Result<StorageBody, ArchivalStorageError> {
        let operation = StorageOperation::RollbackXml;
        let version = version.to_string();
        let url = self.endpoint(operation, package, &["rollbackXml", &version])?;
        self.execute(operation, self.request(operation, Method::DELETE, url))
    }

    /// Renews a removed package.
    ///
    /// # Errors
    ///
    /// Returns [`ArchivalStorageError`] on transport failure or non-2xx status.
    pub fn renew(&self, package: &PackageId) -> Result<StorageBody, ArchivalStorageError> {
        let operation = StorageOperation::Renew;
        let url = self.endpoint(operation, package, &["renew"])?;
        self.execute(operation, self.request(operation, Method::PUT, url))
    }

    /// Builds `{base}/storage/{package}/{segments...}`.
    fn endpoint(
        &self,
        operation: StorageOperation,
        package: &PackageId,
        segments: &[&str],
    ) -> Result<Url, ArchivalStorageError> {
        let id = require_id(operation, package)?;
        let mut path = Vec::with_capacity(segments.len() + 1);
        path.push(id);
        path.extend_from_slice(segments);
        self.storage_url(operation, &path)
    }

    /// Builds `{base}/storage/{segments...}` with each segment percent-encoded.
    fn storage_url(
        &self,
        operation: StorageOperation,
        segments: &[&str],
    ) -> Result<Url, ArchivalStorageError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ArchivalStorageError::InvalidRequest {
                operation,
                message: "base url cannot hold paths".to_string(),
            })?
            .pop_if_empty()
            .push("storage")
            .extend(segments);
        Ok(url)
    }

    /// Starts a request with the operation's credential.
    fn request(&self, operation: StorageOperation, method: Method, url: Url) -> RequestBuilder {
        let auth = if operation.is_read_only() { &self.read_auth } else { &self.read_write_auth };
        self.client.request(method, url).header(AUTHORIZATION, auth.clone())
    }

    /// Sends a request and accepts only 2xx responses.
    fn execute(
        &self,
        operation: StorageOperation,
        request: RequestBuilder,
    ) -> Result<StorageBody, ArchivalStorageError> {
        debug!(operation = %operation, "calling archival storage");
        let response = request.send().map_err(|err| ArchivalStorageError::Transport {
            operation,
            message: err.to_string(),
        })?;
        let status = response.status();
        if status.is_success() {
            return Ok(StorageBody {
                response,
            });
        }
        let body = response.text().unwrap_or_else(|err| format!("<unreadable body: {err}>"));
        warn!(operation = %operation, status = status.as_u16(), "archival storage rejected request");
        Err(ArchivalStorageError::Rejected {
            operation,
            status: status.as_u16(),
            body,
        })
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Rejects empty package identifiers.
fn require_id(operation: StorageOperation, package: &PackageId) -> Result<&str, ArchivalStorageError> {
    let id = package.as_str();
    if id.is_empty() {
        return Err(ArchivalStorageError::InvalidRequest {
            operation,
            message: "package id must not be empty".to_string(),
        });
    }
    Ok(id)
}

/// Parses a quoted state name.
fn parse_state(
    operation: StorageOperation,
    mut body: StorageBody,
) -> Result<ObjectState, ArchivalStorageError> {
    let mut text = String::new();
    body.read_to_string(&mut text).map_err(|err| ArchivalStorageError::Body {
        operation,
        message: err.to_string(),
    })?;
    let name = text.trim().replace('"', "");
    ObjectState::from_str(&name).map_err(|_| ArchivalStorageError::InvalidState {
        operation,
        value: text,
    })
}
