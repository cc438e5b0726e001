#![warn(missing_docs)]
//! # shutter-relay-core
//!
//! ## Purpose
//! Defines the pure data model shared across the `shutter-relay` workspace.
//!
//! ## Responsibilities
//! - Represent opaque media asset handles produced by selection.
//! - Describe the upload destination and multipart field naming.
//! - Derive the deterministic per-device folder tag.
//! - Model the connection pipeline state reported to the UI layer.
//!
//! ## Data flow
//! Catalog code emits [`AssetReference`] values. The controller pairs them
//! with an [`UploadTarget`] (built from a [`DeviceIdentifier`]) and drives
//! [`ConnectionState`] through its transition function.
//!
//! ## Ownership and lifetimes
//! All values own their backing strings to avoid borrow coupling between the
//! selection, upload, and UI stages.
//!
//! ## Error model
//! Validation failures (blank identifiers, empty paths or field names) return
//! [`CoreError`] variants with caller-actionable categorization.
//!
//! ## Security and privacy notes
//! The device identifier is treated as an opaque per-install value and is
//! never transformed beyond prefixing; this crate never logs asset paths.
//!
//! ## Example
//! ```rust
//! use shutter_relay_core::{DeviceIdentifier, UploadTarget};
//!
//! let device = DeviceIdentifier::new("ab12cd34").expect("valid device id");
//! let target = UploadTarget::new("https://relay.example.test/upload", &device)
//!     .expect("valid target");
//! assert_eq!(target.folder_path, "ADR_ab12cd34");
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default bound on how many recent images one run selects.
pub const DEFAULT_ASSET_CAP: usize = 5;

/// Storage-path fragment identifying camera-roll media.
pub const CAMERA_PATH_FRAGMENT: &str = "/DCIM/";

/// Prefix applied to the device identifier to form the upload folder tag.
pub const FOLDER_TAG_PREFIX: &str = "ADR_";

/// Default multipart field name carrying the file part.
pub const DEFAULT_FILE_FIELD: &str = "file";

/// Default multipart field name carrying the folder tag.
pub const DEFAULT_FOLDER_FIELD: &str = "folderPath";

/// Opaque immutable handle to one media item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetReference {
    /// Stable identifier assigned by the media index.
    pub id: String,
    /// Storage path as reported by the media index.
    pub storage_path: String,
}

impl AssetReference {
    /// Constructs a validated asset reference.
    ///
    /// # Errors
    /// Returns [`CoreError::EmptyAssetId`] or [`CoreError::EmptyStoragePath`]
    /// when either field is blank.
    pub fn new(id: impl Into<String>, storage_path: impl Into<String>) -> Result<Self, CoreError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(CoreError::EmptyAssetId);
        }

        let storage_path = storage_path.into();
        if storage_path.trim().is_empty() {
            return Err(CoreError::EmptyStoragePath);
        }

        Ok(Self { id, storage_path })
    }
}

/// Stable opaque per-install device identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceIdentifier(String);

impl DeviceIdentifier {
    /// Constructs a validated device identifier.
    ///
    /// # Errors
    /// Returns [`CoreError::EmptyDeviceId`] when the value is blank.
    pub fn new(value: impl Into<String>) -> Result<Self, CoreError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(CoreError::EmptyDeviceId);
        }
        Ok(Self(value))
    }

    /// Returns the raw identifier string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Derives the deterministic upload folder tag for this device.
    pub fn folder_tag(&self) -> String {
        format!("{FOLDER_TAG_PREFIX}{}", self.0)
    }
}

/// Destination and multipart field naming for one pipeline run.
///
/// Constructed once per run and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTarget {
    /// Collection endpoint URL.
    pub endpoint: String,
    /// Folder tag attached to the batch; empty means untagged.
    pub folder_path: String,
    /// Multipart field name for the file part.
    pub file_field: String,
    /// Multipart field name for the folder tag part.
    pub folder_field: String,
}

impl UploadTarget {
    /// Builds a target with default field names and the device folder tag.
    ///
    /// # Errors
    /// Returns [`CoreError::EmptyEndpoint`] when the endpoint is blank.
    pub fn new(endpoint: impl Into<String>, device: &DeviceIdentifier) -> Result<Self, CoreError> {
        Self::with_field_names(
            endpoint,
            device.folder_tag(),
            DEFAULT_FILE_FIELD,
            DEFAULT_FOLDER_FIELD,
        )
    }

    /// Builds a target with explicit folder tag and field names.
    ///
    /// # Errors
    /// Returns [`CoreError::EmptyEndpoint`] for a blank endpoint and
    /// [`CoreError::EmptyFieldName`] for blank multipart field names.
    pub fn with_field_names(
        endpoint: impl Into<String>,
        folder_path: impl Into<String>,
        file_field: impl Into<String>,
        folder_field: impl Into<String>,
    ) -> Result<Self, CoreError> {
        let endpoint = endpoint.into();
        if endpoint.trim().is_empty() {
            return Err(CoreError::EmptyEndpoint);
        }

        let file_field = file_field.into();
        let folder_field = folder_field.into();
        if file_field.trim().is_empty() || folder_field.trim().is_empty() {
            return Err(CoreError::EmptyFieldName);
        }

        Ok(Self {
            endpoint,
            folder_path: folder_path.into().trim().to_string(),
            file_field,
            folder_field,
        })
    }
}

/// Connection pipeline state owned by the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// No run active; ready to connect.
    Idle,
    /// Media permission is missing; user action required.
    NeedsPermission,
    /// A selection + upload run is in flight.
    Connecting,
    /// The last run completed successfully.
    Connected,
    /// The last run failed with a categorized message.
    Failed(String),
}

impl ConnectionState {
    /// Returns `true` while a run is in flight.
    pub fn is_connecting(&self) -> bool {
        matches!(self, Self::Connecting)
    }
}

/// Error type for core model validation failures.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Asset identifier cannot be blank.
    #[error("asset identifier is empty")]
    EmptyAssetId,
    /// Asset storage path cannot be blank.
    #[error("asset storage path is empty")]
    EmptyStoragePath,
    /// Device identifier cannot be blank.
    #[error("device identifier is empty")]
    EmptyDeviceId,
    /// Upload endpoint cannot be blank.
    #[error("upload endpoint is empty")]
    EmptyEndpoint,
    /// Multipart field names cannot be blank.
    #[error("multipart field name is empty")]
    EmptyFieldName,
}
