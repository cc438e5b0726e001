//! Integration tests for runtime kill-switch behavior.

mod common;

use std::sync::Arc;

use common::{
    RecordingTransport, StaticAssetSource, build_controller, dcim_entry, granted_gate,
};
use shutter_relay_app::{ConnectDecision, sync_enabled_from_env};
use shutter_relay_core::ConnectionState;

#[test]
fn sync_kill_switch_tests_blocks_connect_when_env_is_off() {
    let transport = Arc::new(RecordingTransport::always_ok());
    let controller = build_controller(
        granted_gate(),
        vec![dcim_entry("a", 100)],
        StaticAssetSource::new(),
        transport.clone(),
    );

    // Safety:
    // - Integration tests mutate process env in a single-threaded test body.
    // - We reset the variable before returning.
    unsafe { std::env::set_var("SHUTTER_RELAY_SYNC_ENABLED", "false") };
    assert!(!sync_enabled_from_env());
    assert_eq!(controller.request_connect(), ConnectDecision::BlockedDisabled);
    assert_eq!(controller.state(), ConnectionState::Idle);
    assert_eq!(transport.request_count(), 0);

    // Safety: see rationale above.
    unsafe { std::env::set_var("SHUTTER_RELAY_SYNC_ENABLED", "true") };
    assert!(sync_enabled_from_env());
    assert_eq!(controller.request_connect(), ConnectDecision::Started);
    assert_eq!(controller.state(), ConnectionState::Connected);

    // Safety: see rationale above.
    unsafe { std::env::remove_var("SHUTTER_RELAY_SYNC_ENABLED") };
    assert!(sync_enabled_from_env());
}
