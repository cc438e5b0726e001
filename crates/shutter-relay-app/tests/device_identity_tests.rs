//! Integration tests for persisted device identity.

use shutter_relay_app::load_or_create_device_identifier;

#[test]
fn device_identity_tests_creates_hex_identifier_on_first_run() {
    let state_dir = tempfile::tempdir().expect("state dir should create");
    let device = load_or_create_device_identifier(state_dir.path())
        .expect("identity should be created");

    // 16 random bytes hex-encoded.
    assert_eq!(device.as_str().len(), 32);
    assert!(device.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    assert_eq!(device.folder_tag(), format!("ADR_{}", device.as_str()));
    assert!(state_dir.path().join("device_id.json").exists());
}

#[test]
fn device_identity_tests_is_stable_across_loads() {
    let state_dir = tempfile::tempdir().expect("state dir should create");
    let first = load_or_create_device_identifier(state_dir.path())
        .expect("identity should be created");
    let second = load_or_create_device_identifier(state_dir.path())
        .expect("identity should be reloaded");
    assert_eq!(first, second);
}

#[test]
fn device_identity_tests_rejects_corrupt_state_file() {
    let state_dir = tempfile::tempdir().expect("state dir should create");
    std::fs::write(state_dir.path().join("device_id.json"), b"not json")
        .expect("corrupt file should write");

    assert!(load_or_create_device_identifier(state_dir.path()).is_err());
}
