#![warn(missing_docs)]
//! # shutter-relay-app binary
//!
//! Desktop entry point for shutter-relay. Runs one connect cycle against the
//! configured endpoint and prints the projected status.

use std::process::ExitCode;
use std::sync::Arc;

use shutter_relay_app::{
    AppError, ConnectDecision, ConnectionController, ControllerConfig, EnvPermissionProbe,
    LoggingSettingsOpener, app_version, config_from_env, load_or_create_device_identifier,
    open_settings_if_blocked,
};
use shutter_relay_catalog::FilesystemMediaIndex;
use shutter_relay_core::{CAMERA_PATH_FRAGMENT, ConnectionState, UploadTarget};
use shutter_relay_permission::PermissionGate;
use shutter_relay_ui::project_status;
use shutter_relay_upload::{FileAssetSource, HttpTransport, UploadClient};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("shutter-relay failed: {error}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), AppError> {
    info!(version = app_version(), "shutter-relay starting");

    let config = config_from_env()?;
    let device_id = load_or_create_device_identifier(&config.state_dir)?;

    let target = UploadTarget::new(&config.endpoint, &device_id)
        .map_err(|error| AppError::Config(error.to_string()))?;
    let transport = HttpTransport::new()?;
    let uploader = UploadClient::new(target, Arc::new(FileAssetSource), Arc::new(transport))?;

    let gate = PermissionGate::new(Arc::new(EnvPermissionProbe));
    let index = Arc::new(FilesystemMediaIndex::new(&config.media_root));
    let controller = ConnectionController::new(
        ControllerConfig {
            asset_cap: config.asset_cap,
            path_fragment: CAMERA_PATH_FRAGMENT.to_string(),
        },
        gate,
        index,
        uploader,
    );

    let access = controller.on_foreground();
    open_settings_if_blocked(access, &LoggingSettingsOpener);

    let decision = controller.request_connect();
    if decision == ConnectDecision::Started {
        info!(attempts = controller.attempts(), "connect cycle finished");
    }

    let snapshot = project_status(&controller.state(), controller.last_access());
    println!("{} | {}", snapshot.headline, snapshot.detail);
    if snapshot.offer_settings {
        println!("Open the system settings to enable the media permission.");
    }

    match controller.state() {
        ConnectionState::Failed(message) => Err(AppError::Sync(message)),
        _ => Ok(()),
    }
}
