#![warn(missing_docs)]
//! # shutter-relay-upload
//!
//! ## Purpose
//! Implements the multipart upload client and its transport abstraction.
//!
//! ## Responsibilities
//! - Validate upload endpoint policy (HTTPS).
//! - Resolve per-asset filename and content type with documented fallbacks.
//! - Build multipart requests whose folder-tag part precedes the file part.
//! - Upload assets strictly in order, aborting the batch on first failure.
//! - Classify failures as transient or permanent for operator messaging.
//!
//! ## Data flow
//! Controller hands selected assets to [`UploadClient::upload_many`] -> each
//! asset's byte stream is opened exactly once through an [`AssetSource`] ->
//! the [`UploadTransport`] posts one multipart request per asset -> per-asset
//! [`UploadReport`] values or the first [`UploadError`] become the batch
//! outcome.
//!
//! ## Ownership and lifetimes
//! Requests own their body readers (`Box<dyn Read + Send>`); nothing borrows
//! from a transient stream across transport calls.
//!
//! ## Error model
//! Stream, transport, and server failures surface as [`UploadError`]
//! variants; under the abort-on-first-failure policy the first error stops
//! the batch and assets after it are never attempted.
//!
//! ## Security and privacy notes
//! Response bodies are logged only as bounded prefixes; asset payload bytes
//! are never logged.

use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use shutter_relay_core::{AssetReference, UploadTarget};
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

/// Filename used when the asset path has no usable file name.
pub const FALLBACK_FILE_NAME: &str = "image.jpg";

/// Content type used when the asset extension is unknown.
pub const FALLBACK_CONTENT_TYPE: &str = "image/*";

/// Default transport connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default whole-request timeout covering send and response read.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

const LOGGED_BODY_PREFIX_LEN: usize = 120;

/// Resolved multipart naming for one asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartMetadata {
    /// Filename sent in the file part.
    pub file_name: String,
    /// Content type sent in the file part.
    pub content_type: String,
}

/// Resolves filename and content type for an asset.
///
/// Fallbacks are `image.jpg` and `image/*` when the storage path carries no
/// usable name or a content type cannot be derived from the extension.
pub fn resolve_part_metadata(asset: &AssetReference) -> PartMetadata {
    let path = Path::new(&asset.storage_path);

    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .filter(|name| !name.trim().is_empty())
        .unwrap_or(FALLBACK_FILE_NAME)
        .to_string();

    let content_type = path
        .extension()
        .and_then(|extension| extension.to_str())
        .map(|extension| extension.to_ascii_lowercase())
        .and_then(|extension| match extension.as_str() {
            "jpg" | "jpeg" => Some("image/jpeg"),
            "png" => Some("image/png"),
            "gif" => Some("image/gif"),
            "webp" => Some("image/webp"),
            "heic" => Some("image/heic"),
            "bmp" => Some("image/bmp"),
            _ => None,
        })
        .unwrap_or(FALLBACK_CONTENT_TYPE)
        .to_string();

    PartMetadata {
        file_name,
        content_type,
    }
}

/// One prepared multipart request.
///
/// The optional folder-tag text part must be written before the file part;
/// the server's parser depends on that field order.
pub struct MultipartRequest {
    /// Destination endpoint URL.
    pub endpoint: String,
    /// Field name for the folder-tag text part.
    pub folder_field_name: String,
    /// Folder tag value; empty means the text part is omitted.
    pub folder_path: String,
    /// Field name for the file part.
    pub file_field_name: String,
    /// Filename advertised in the file part.
    pub file_name: String,
    /// Content type advertised in the file part.
    pub content_type: String,
    /// Asset byte stream, opened exactly once per request.
    pub body: Box<dyn Read + Send>,
}

/// Raw transport response before 2xx interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body text, returned verbatim.
    pub body: String,
}

/// Abstract transport used by the upload client.
pub trait UploadTransport: Send + Sync {
    /// Posts one multipart request and returns the raw response.
    ///
    /// # Errors
    /// Returns [`UploadError::Timeout`] or [`UploadError::Network`] for
    /// transport-level failures; non-2xx statuses are not errors here.
    fn post_multipart(&self, request: MultipartRequest) -> Result<WireResponse, UploadError>;
}

/// Opens asset byte streams for upload.
pub trait AssetSource: Send + Sync {
    /// Opens the asset's byte stream.
    ///
    /// # Errors
    /// Returns [`UploadError::Stream`] when the content cannot be opened.
    fn open(&self, asset: &AssetReference) -> Result<Box<dyn Read + Send>, UploadError>;
}

/// Asset source reading directly from storage paths.
#[derive(Debug, Clone, Default)]
pub struct FileAssetSource;

impl AssetSource for FileAssetSource {
    fn open(&self, asset: &AssetReference) -> Result<Box<dyn Read + Send>, UploadError> {
        let file = std::fs::File::open(&asset.storage_path).map_err(|error| UploadError::Stream {
            asset_id: asset.id.clone(),
            detail: error.to_string(),
        })?;
        Ok(Box::new(file))
    }
}

/// Blocking HTTP transport backed by `reqwest`.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    /// Creates a transport with default connect/request timeouts.
    ///
    /// # Errors
    /// Returns [`UploadError::Network`] when the HTTP client cannot be built.
    pub fn new() -> Result<Self, UploadError> {
        Self::with_timeouts(DEFAULT_CONNECT_TIMEOUT, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Creates a transport with explicit timeouts.
    ///
    /// # Errors
    /// Returns [`UploadError::Network`] when the HTTP client cannot be built.
    pub fn with_timeouts(
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self, UploadError> {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()
            .map_err(|error| UploadError::Network(format!("client build failed: {error}")))?;
        Ok(Self { client })
    }
}

impl UploadTransport for HttpTransport {
    fn post_multipart(&self, request: MultipartRequest) -> Result<WireResponse, UploadError> {
        let mut form = reqwest::blocking::multipart::Form::new();

        // Text part first; the server reads the folder tag before the file.
        if !request.folder_path.is_empty() {
            form = form.text(request.folder_field_name, request.folder_path);
        }

        let part = reqwest::blocking::multipart::Part::reader(request.body)
            .file_name(request.file_name)
            .mime_str(&request.content_type)
            .map_err(|error| UploadError::Part(error.to_string()))?;
        form = form.part(request.file_field_name, part);

        let response = self
            .client
            .post(&request.endpoint)
            .multipart(form)
            .send()
            .map_err(|error| {
                if error.is_timeout() {
                    UploadError::Timeout
                } else {
                    UploadError::Network(error.to_string())
                }
            })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .map_err(|error| UploadError::Network(format!("response read failed: {error}")))?;

        Ok(WireResponse { status, body })
    }
}

/// Per-asset upload outcome on success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReport {
    /// 2xx status returned by the server.
    pub status: u16,
    /// Response body, verbatim.
    pub response_body: String,
}

/// Upload client binding a target, an asset source, and a transport.
pub struct UploadClient {
    target: UploadTarget,
    source: Arc<dyn AssetSource>,
    transport: Arc<dyn UploadTransport>,
}

impl UploadClient {
    /// Creates a validated upload client.
    ///
    /// # Errors
    /// Returns [`UploadError::InvalidEndpoint`] when the target endpoint is
    /// not a valid HTTPS URL.
    pub fn new(
        target: UploadTarget,
        source: Arc<dyn AssetSource>,
        transport: Arc<dyn UploadTransport>,
    ) -> Result<Self, UploadError> {
        validate_upload_endpoint(&target.endpoint)?;
        Ok(Self {
            target,
            source,
            transport,
        })
    }

    /// Returns the configured upload target.
    pub fn target(&self) -> &UploadTarget {
        &self.target
    }

    /// Uploads one asset as a multipart POST.
    ///
    /// The asset's byte stream is opened exactly once. A 2xx response yields
    /// an [`UploadReport`] with the verbatim body.
    ///
    /// # Errors
    /// Returns [`UploadError::Stream`] when the content cannot be opened,
    /// [`UploadError::Timeout`]/[`UploadError::Network`] for transport
    /// failures, and [`UploadError::ServerRejected`] for non-2xx responses.
    pub fn upload_one(&self, asset: &AssetReference) -> Result<UploadReport, UploadError> {
        let metadata = resolve_part_metadata(asset);
        let body = self.source.open(asset)?;

        let response = self.transport.post_multipart(MultipartRequest {
            endpoint: self.target.endpoint.clone(),
            folder_field_name: self.target.folder_field.clone(),
            folder_path: self.target.folder_path.clone(),
            file_field_name: self.target.file_field.clone(),
            file_name: metadata.file_name,
            content_type: metadata.content_type,
            body,
        })?;

        if (200..300).contains(&response.status) {
            info!(
                asset_id = %asset.id,
                status = response.status,
                body_prefix = %bounded_prefix(&response.body),
                "asset uploaded"
            );
            return Ok(UploadReport {
                status: response.status,
                response_body: response.body,
            });
        }

        Err(UploadError::ServerRejected {
            status: response.status,
            body: response.body,
        })
    }

    /// Uploads assets strictly in input order, one at a time.
    ///
    /// Sequential execution keeps exactly one content stream open and
    /// guarantees the folder-tag part precedes the file part per request.
    ///
    /// # Errors
    /// Abort-on-first-failure: the first failing asset's error is the batch
    /// outcome and assets after it are never attempted.
    pub fn upload_many(
        &self,
        assets: &[AssetReference],
    ) -> Result<Vec<UploadReport>, UploadError> {
        let mut reports = Vec::with_capacity(assets.len());
        for (position, asset) in assets.iter().enumerate() {
            match self.upload_one(asset) {
                Ok(report) => reports.push(report),
                Err(error) => {
                    warn!(
                        asset_id = %asset.id,
                        position,
                        total = assets.len(),
                        %error,
                        "batch aborted on first failure"
                    );
                    return Err(error);
                }
            }
        }
        Ok(reports)
    }
}

/// Validates the upload endpoint policy.
///
/// # Errors
/// Returns [`UploadError::InvalidEndpoint`] for unparseable or non-HTTPS
/// URLs.
pub fn validate_upload_endpoint(endpoint: &str) -> Result<(), UploadError> {
    let parsed = Url::parse(endpoint)
        .map_err(|error| UploadError::InvalidEndpoint(format!("invalid upload url: {error}")))?;

    if parsed.scheme() != "https" {
        return Err(UploadError::InvalidEndpoint(
            "upload endpoint must use https".to_string(),
        ));
    }

    Ok(())
}

/// Coarse failure classification for operator messaging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// A later attempt could plausibly succeed.
    Transient,
    /// Retrying the same request will not help.
    Permanent,
}

/// Classifies an upload error as transient or permanent.
///
/// Classification is reporting-only; the client never retries on its own,
/// which keeps the one-POST-per-asset batch contract intact.
pub fn classify_upload_error(error: &UploadError) -> FailureClass {
    match error {
        UploadError::Timeout | UploadError::Network(_) => FailureClass::Transient,
        UploadError::ServerRejected { status, .. } if (500..600).contains(status) => {
            FailureClass::Transient
        }
        UploadError::ServerRejected { .. }
        | UploadError::Stream { .. }
        | UploadError::InvalidEndpoint(_)
        | UploadError::Part(_) => FailureClass::Permanent,
    }
}

fn bounded_prefix(body: &str) -> &str {
    match body.char_indices().nth(LOGGED_BODY_PREFIX_LEN) {
        Some((index, _)) => &body[..index],
        None => body,
    }
}

/// Errors produced by the upload client and transports.
#[derive(Debug, Error)]
pub enum UploadError {
    /// Endpoint violates the HTTPS upload policy.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
    /// Asset content could not be opened.
    #[error("asset stream unavailable for '{asset_id}': {detail}")]
    Stream {
        /// Asset whose stream failed to open.
        asset_id: String,
        /// Underlying open failure.
        detail: String,
    },
    /// Connect or read/write transport failure.
    #[error("network failure: {0}")]
    Network(String),
    /// Transport-level timeout.
    #[error("request timed out")]
    Timeout,
    /// Server answered with a non-2xx status.
    #[error("server rejected upload: HTTP {status}: {body}")]
    ServerRejected {
        /// HTTP status code.
        status: u16,
        /// Response body text.
        body: String,
    },
    /// Multipart part could not be constructed.
    #[error("invalid multipart part: {0}")]
    Part(String),
}
