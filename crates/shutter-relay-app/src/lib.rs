#![warn(missing_docs)]
//! # shutter-relay-app
//!
//! ## Purpose
//! Orchestrates permission, selection, upload, and UI state for
//! `shutter-relay`.
//!
//! ## Responsibilities
//! - Drive the connection state machine through permission and connect
//!   events.
//! - Enforce the single-run invariant with an explicit concurrency guard.
//! - Run the selection + upload pipeline and categorize its failures.
//! - Load environment configuration and the persisted device identity.
//!
//! ## Data flow
//! Permission gate observations + connect events -> [`ConnectionController`]
//! transitions -> asset selection -> sequential multipart upload ->
//! `Connected`/`Failed` state for UI projection.
//!
//! ## Ownership and lifetimes
//! The controller owns its state behind mutexes and shares backend seams as
//! `Arc` trait objects, so host threads can deliver events while a run is in
//! flight.
//!
//! ## Error model
//! Subsystem failures are wrapped in [`AppError`]; pipeline failures surface
//! on the controller as `Failed` with a categorized, human-readable message.
//!
//! ## Security and privacy notes
//! - A run starts only while the media permission is granted.
//! - The sync kill-switch env var can block new runs at runtime.
//! - The device identity is an opaque random value; no hardware identifiers
//!   are read.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use rand::RngCore;
use serde::{Deserialize, Serialize};
use shutter_relay_catalog::{MediaIndex, select_recent};
use shutter_relay_core::{
    CAMERA_PATH_FRAGMENT, ConnectionState, DEFAULT_ASSET_CAP, DeviceIdentifier,
};
use shutter_relay_permission::{MediaAccess, PermissionGate, PermissionProbe, SettingsOpener};
use shutter_relay_upload::{FailureClass, UploadClient, UploadError, classify_upload_error};
use thiserror::Error;
use tracing::{info, warn};

/// Build-time application version loaded from root `VERSION` file.
pub const APP_VERSION: &str = env!("SHUTTER_RELAY_VERSION");

/// Env var holding the collection endpoint URL (required).
pub const ENDPOINT_ENV: &str = "SHUTTER_RELAY_ENDPOINT";
/// Env var overriding the per-run asset cap.
pub const ASSET_CAP_ENV: &str = "SHUTTER_RELAY_ASSET_CAP";
/// Env var pointing at the media root to index.
pub const MEDIA_ROOT_ENV: &str = "SHUTTER_RELAY_MEDIA_ROOT";
/// Env var pointing at the state directory (device identity).
pub const STATE_DIR_ENV: &str = "SHUTTER_RELAY_STATE_DIR";
/// Runtime kill-switch env var for new sync runs.
pub const SYNC_ENABLED_ENV: &str = "SHUTTER_RELAY_SYNC_ENABLED";
/// Env var driving the desktop permission stand-in probe.
pub const MEDIA_ACCESS_ENV: &str = "SHUTTER_RELAY_MEDIA_ACCESS";

const DEVICE_ID_FILE: &str = "device_id.json";

/// Returns the app version sourced from root `VERSION`.
pub fn app_version() -> &'static str {
    APP_VERSION
}

/// Checks the runtime kill-switch env var.
///
/// Semantics:
/// - Unset => sync enabled.
/// - `0`, `false`, `off` (case-insensitive) => sync disabled.
/// - Any other value => sync enabled.
pub fn sync_enabled_from_env() -> bool {
    match std::env::var(SYNC_ENABLED_ENV) {
        Ok(value) => {
            let normalized = value.trim().to_ascii_lowercase();
            !(normalized == "0" || normalized == "false" || normalized == "off")
        }
        Err(_) => true,
    }
}

/// Runtime configuration resolved from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    /// Collection endpoint URL.
    pub endpoint: String,
    /// Maximum assets selected per run.
    pub asset_cap: usize,
    /// Root directory indexed for camera media.
    pub media_root: PathBuf,
    /// Directory holding persisted state (device identity).
    pub state_dir: PathBuf,
}

/// Loads configuration from the environment.
///
/// # Errors
/// Returns [`AppError::Config`] when the endpoint is missing or the asset
/// cap does not parse to a positive integer.
pub fn config_from_env() -> Result<RelayConfig, AppError> {
    let endpoint = std::env::var(ENDPOINT_ENV)
        .map_err(|_| AppError::Config(format!("{ENDPOINT_ENV} is not set")))?;

    let asset_cap = match std::env::var(ASSET_CAP_ENV) {
        Ok(raw) => raw
            .trim()
            .parse::<usize>()
            .ok()
            .filter(|cap| *cap > 0)
            .ok_or_else(|| AppError::Config(format!("invalid {ASSET_CAP_ENV} value '{raw}'")))?,
        Err(_) => DEFAULT_ASSET_CAP,
    };

    let media_root = std::env::var(MEDIA_ROOT_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."));

    let state_dir = match std::env::var(STATE_DIR_ENV) {
        Ok(raw) => PathBuf::from(raw),
        Err(_) => default_state_dir()?,
    };

    Ok(RelayConfig {
        endpoint,
        asset_cap,
        media_root,
        state_dir,
    })
}

fn default_state_dir() -> Result<PathBuf, AppError> {
    let exe_path = std::env::current_exe()
        .map_err(|error| AppError::Config(format!("unable to resolve executable path: {error}")))?;
    let exe_dir = exe_path
        .parent()
        .ok_or_else(|| AppError::Config("executable parent directory is missing".to_string()))?;
    Ok(exe_dir.join("state"))
}

#[derive(Debug, Serialize, Deserialize)]
struct DeviceIdentityRecord {
    device_id: DeviceIdentifier,
}

/// Loads the persisted device identity, creating one on first run.
///
/// The identity is 16 random bytes hex-encoded, written once to
/// `device_id.json` under `state_dir` and stable afterwards.
///
/// # Errors
/// Returns [`AppError::Identity`] when the state file cannot be read,
/// parsed, or written.
pub fn load_or_create_device_identifier(state_dir: &Path) -> Result<DeviceIdentifier, AppError> {
    let path = state_dir.join(DEVICE_ID_FILE);

    if path.exists() {
        let raw = std::fs::read_to_string(&path).map_err(|error| {
            AppError::Identity(format!("cannot read '{}': {error}", path.display()))
        })?;
        let record: DeviceIdentityRecord = serde_json::from_str(&raw).map_err(|error| {
            AppError::Identity(format!("cannot parse '{}': {error}", path.display()))
        })?;
        return Ok(record.device_id);
    }

    let mut bytes = [0_u8; 16];
    rand::rng().fill_bytes(&mut bytes);
    let device_id = DeviceIdentifier::new(hex::encode(bytes))
        .map_err(|error| AppError::Identity(error.to_string()))?;

    std::fs::create_dir_all(state_dir).map_err(|error| {
        AppError::Identity(format!("cannot create '{}': {error}", state_dir.display()))
    })?;
    let record = DeviceIdentityRecord {
        device_id: device_id.clone(),
    };
    let encoded = serde_json::to_string_pretty(&record)
        .map_err(|error| AppError::Identity(format!("cannot encode identity: {error}")))?;
    std::fs::write(&path, encoded).map_err(|error| {
        AppError::Identity(format!("cannot write '{}': {error}", path.display()))
    })?;

    info!("device identity created");
    Ok(device_id)
}

/// Desktop stand-in for the host permission surface.
///
/// Driven by `SHUTTER_RELAY_MEDIA_ACCESS`: `granted` reports the capability
/// granted; `blocked` makes the prompt resolve to a permanent denial; any
/// other value (or unset) is a retryable denial.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvPermissionProbe;

impl PermissionProbe for EnvPermissionProbe {
    fn status(&self) -> MediaAccess {
        match media_access_env().as_str() {
            "granted" => MediaAccess::Granted,
            _ => MediaAccess::DeniedRetryable,
        }
    }

    fn request(&self) -> MediaAccess {
        match media_access_env().as_str() {
            "granted" => MediaAccess::Granted,
            "blocked" => MediaAccess::DeniedPermanently,
            _ => MediaAccess::DeniedRetryable,
        }
    }
}

fn media_access_env() -> String {
    std::env::var(MEDIA_ACCESS_ENV)
        .map(|value| value.trim().to_ascii_lowercase())
        .unwrap_or_default()
}

/// Settings opener that only logs the required user action.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingSettingsOpener;

impl SettingsOpener for LoggingSettingsOpener {
    fn open_app_settings(&self) {
        warn!("media permission is disabled; enable it in the system settings for this app");
    }
}

/// Routes a permanently denied user to system settings.
///
/// Returns `true` when the escape hatch was invoked; no result is read back
/// from the opener.
pub fn open_settings_if_blocked(access: MediaAccess, opener: &dyn SettingsOpener) -> bool {
    if access == MediaAccess::DeniedPermanently {
        opener.open_app_settings();
        return true;
    }
    false
}

/// Selection parameters for the connection controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Maximum assets selected per run.
    pub asset_cap: usize,
    /// Storage-path fragment filter for selection.
    pub path_fragment: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            asset_cap: DEFAULT_ASSET_CAP,
            path_fragment: CAMERA_PATH_FRAGMENT.to_string(),
        }
    }
}

/// Outcome of one connect request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectDecision {
    /// A run was started and has completed (or failed).
    Started,
    /// A run was already in flight; the request was a no-op.
    IgnoredAlreadyConnecting,
    /// Permission is not granted; the controller moved to `NeedsPermission`.
    BlockedNeedsPermission,
    /// The runtime kill switch blocked the run.
    BlockedDisabled,
}

/// Finite-state controller sequencing the selection + upload pipeline.
///
/// Exactly one run may be in flight at a time, enforced by an explicit
/// atomic guard independent of any UI affordance. Permission changes
/// observed while a run is in flight are buffered and applied after the run
/// completes; no mid-run cancellation is supported.
pub struct ConnectionController {
    config: ControllerConfig,
    gate: Mutex<PermissionGate>,
    index: Arc<dyn MediaIndex>,
    uploader: UploadClient,
    state: Mutex<ConnectionState>,
    pending_access: Mutex<Option<MediaAccess>>,
    run_in_flight: AtomicBool,
    attempts: AtomicU64,
}

impl ConnectionController {
    /// Creates a controller in the `Idle` state.
    pub fn new(
        config: ControllerConfig,
        gate: PermissionGate,
        index: Arc<dyn MediaIndex>,
        uploader: UploadClient,
    ) -> Self {
        Self {
            config,
            gate: Mutex::new(gate),
            index,
            uploader,
            state: Mutex::new(ConnectionState::Idle),
            pending_access: Mutex::new(None),
            run_in_flight: AtomicBool::new(false),
            attempts: AtomicU64::new(0),
        }
    }

    /// Returns a snapshot of the current connection state.
    pub fn state(&self) -> ConnectionState {
        lock_unpoisoned(&self.state).clone()
    }

    /// Returns the last observed permission state.
    pub fn last_access(&self) -> MediaAccess {
        lock_unpoisoned(&self.gate).last_observed()
    }

    /// Returns how many runs have been started.
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Acquire)
    }

    /// Handles a foreground transition: re-checks permission and, while the
    /// denial is still retryable, requests it (one native prompt).
    ///
    /// A grant observed while the controller was waiting on permission (the
    /// user returning from system settings) arms a run immediately.
    pub fn on_foreground(&self) -> MediaAccess {
        let was_waiting = self.state() == ConnectionState::NeedsPermission;
        let refreshed = lock_unpoisoned(&self.gate).refresh();
        match refreshed {
            MediaAccess::DeniedRetryable => self.request_permission(),
            access => {
                self.apply_access(access);
                if access.is_granted() && was_waiting {
                    let _ = self.request_connect();
                }
                access
            }
        }
    }

    /// Requests the media permission through the gate.
    ///
    /// A grant coming out of the prompt immediately arms a run; a permanent
    /// denial settles in `NeedsPermission` without further prompts.
    pub fn request_permission(&self) -> MediaAccess {
        let outcome = lock_unpoisoned(&self.gate).request();
        self.apply_access(outcome);

        if outcome.is_granted() {
            let _ = self.request_connect();
        }
        outcome
    }

    /// Handles an explicit (re)connect request.
    ///
    /// Runs the pipeline to completion on the calling thread. A request
    /// while a run is in flight is rejected: no transition, no requests.
    pub fn request_connect(&self) -> ConnectDecision {
        if !sync_enabled_from_env() {
            info!("connect blocked by {SYNC_ENABLED_ENV} kill switch");
            return ConnectDecision::BlockedDisabled;
        }

        let access = lock_unpoisoned(&self.gate).refresh();
        if !access.is_granted() {
            self.apply_access(access);
            return ConnectDecision::BlockedNeedsPermission;
        }

        if self
            .run_in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            info!("connect ignored: a run is already in flight");
            return ConnectDecision::IgnoredAlreadyConnecting;
        }

        let attempt = self.attempts.fetch_add(1, Ordering::AcqRel) + 1;
        *lock_unpoisoned(&self.state) = ConnectionState::Connecting;
        info!(attempt, "pipeline run started");

        let outcome = self.run_pipeline();
        {
            let mut state = lock_unpoisoned(&self.state);
            *state = match &outcome {
                Ok(uploaded) => {
                    info!(attempt, uploaded, "pipeline run connected");
                    ConnectionState::Connected
                }
                Err(error) => {
                    let message = failure_message(error);
                    warn!(attempt, reason = %message, "pipeline run failed");
                    ConnectionState::Failed(message)
                }
            };
        }

        // The guard is cleared under the pending lock so a permission change
        // racing with run completion is either buffered here or applied
        // directly by its own caller, never lost.
        let buffered = {
            let mut pending = lock_unpoisoned(&self.pending_access);
            self.run_in_flight.store(false, Ordering::Release);
            pending.take()
        };
        if let Some(access) = buffered {
            self.apply_access_now(access);
        }

        ConnectDecision::Started
    }

    /// Handles a disconnect request; only `Connected` returns to `Idle`.
    pub fn request_disconnect(&self) {
        let mut state = lock_unpoisoned(&self.state);
        if *state == ConnectionState::Connected {
            *state = ConnectionState::Idle;
            info!("disconnected; pipeline state reset");
        }
    }

    fn run_pipeline(&self) -> Result<usize, AppError> {
        let assets = select_recent(
            self.index.as_ref(),
            self.config.asset_cap,
            &self.config.path_fragment,
        );
        info!(
            selected = assets.len(),
            cap = self.config.asset_cap,
            "asset selection complete"
        );

        // An empty selection is "nothing to upload", not a failure.
        let reports = self.uploader.upload_many(&assets)?;
        Ok(reports.len())
    }

    fn apply_access(&self, access: MediaAccess) {
        let mut pending = lock_unpoisoned(&self.pending_access);
        if self.run_in_flight.load(Ordering::Acquire) {
            // An in-flight run completes first; the change applies after.
            *pending = Some(access);
            return;
        }
        drop(pending);
        self.apply_access_now(access);
    }

    fn apply_access_now(&self, access: MediaAccess) {
        let mut state = lock_unpoisoned(&self.state);
        if access.is_granted() {
            if *state == ConnectionState::NeedsPermission {
                *state = ConnectionState::Idle;
            }
        } else {
            *state = ConnectionState::NeedsPermission;
        }
    }
}

/// Formats a pipeline failure as a categorized, human-readable message.
pub fn failure_message(error: &AppError) -> String {
    match error {
        AppError::Upload(upload_error) => {
            let class = match classify_upload_error(upload_error) {
                FailureClass::Transient => "transient",
                FailureClass::Permanent => "permanent",
            };
            format!("{class} upload failure: {upload_error}")
        }
        other => other.to_string(),
    }
}

// State mutexes guard plain data; a poisoned lock still holds a coherent
// value, so recovery beats propagating a panic across the pipeline.
fn lock_unpoisoned<'a, T>(mutex: &'a Mutex<T>) -> MutexGuard<'a, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// App integration error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Environment configuration is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),
    /// Device identity could not be loaded or persisted.
    #[error("device identity error: {0}")]
    Identity(String),
    /// Upload subsystem error.
    #[error(transparent)]
    Upload(#[from] UploadError),
    /// A sync run ended in the `Failed` state.
    #[error("sync run failed: {0}")]
    Sync(String),
}
