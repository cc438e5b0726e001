//! Integration tests for the single-run concurrency guard.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{BlockingTransport, StaticAssetSource, build_controller, dcim_entry, granted_gate};
use shutter_relay_app::ConnectDecision;
use shutter_relay_core::ConnectionState;
use shutter_relay_permission::{MediaAccess, PermissionGate, ScriptedProbe};

#[test]
fn single_flight_guard_tests_rejects_connect_while_run_is_in_flight() {
    let (transport, release_tx) = BlockingTransport::new();
    let controller = build_controller(
        granted_gate(),
        vec![dcim_entry("a", 100)],
        StaticAssetSource::new(),
        transport.clone(),
    );

    let runner = {
        let controller = controller.clone();
        std::thread::spawn(move || controller.request_connect())
    };

    // Wait until the run is parked inside the transport.
    let mut waited = Duration::ZERO;
    while transport.hits() == 0 {
        std::thread::sleep(Duration::from_millis(5));
        waited += Duration::from_millis(5);
        assert!(waited < Duration::from_secs(5), "run never reached transport");
    }
    assert!(controller.state().is_connecting());

    // Second request while the first run is in flight: no transition, no post.
    assert_eq!(
        controller.request_connect(),
        ConnectDecision::IgnoredAlreadyConnecting
    );
    assert_eq!(controller.attempts(), 1);
    assert_eq!(transport.hits(), 1);

    release_tx.send(()).expect("release should reach transport");
    assert_eq!(
        runner.join().expect("runner thread should finish"),
        ConnectDecision::Started
    );
    assert_eq!(controller.state(), ConnectionState::Connected);
}

#[test]
fn single_flight_guard_tests_defers_permission_change_until_run_completes() {
    let gate = PermissionGate::new(Arc::new(ScriptedProbe::new(
        vec![
            MediaAccess::Granted,
            MediaAccess::Granted,
            MediaAccess::DeniedPermanently,
        ],
        vec![],
    )));
    let (transport, release_tx) = BlockingTransport::new();
    let controller = build_controller(
        gate,
        vec![dcim_entry("a", 100)],
        StaticAssetSource::new(),
        transport.clone(),
    );

    let runner = {
        let controller = controller.clone();
        std::thread::spawn(move || controller.request_connect())
    };
    let mut waited = Duration::ZERO;
    while transport.hits() == 0 {
        std::thread::sleep(Duration::from_millis(5));
        waited += Duration::from_millis(5);
        assert!(waited < Duration::from_secs(5), "run never reached transport");
    }

    // The host revokes the permission mid-run; the in-flight run finishes
    // first and the transition applies after it.
    assert_eq!(controller.on_foreground(), MediaAccess::DeniedPermanently);
    assert!(controller.state().is_connecting());

    release_tx.send(()).expect("release should reach transport");
    runner.join().expect("runner thread should finish");
    assert_eq!(controller.state(), ConnectionState::NeedsPermission);
}

#[test]
fn single_flight_guard_tests_allows_new_run_after_completion() {
    let (transport, release_tx) = BlockingTransport::new();
    let controller = build_controller(
        granted_gate(),
        vec![dcim_entry("a", 100)],
        StaticAssetSource::new(),
        transport.clone(),
    );

    release_tx.send(()).expect("first release should queue");
    assert_eq!(controller.request_connect(), ConnectDecision::Started);

    release_tx.send(()).expect("second release should queue");
    assert_eq!(controller.request_connect(), ConnectDecision::Started);
    assert_eq!(controller.attempts(), 2);
    assert_eq!(transport.hits(), 2);
}
