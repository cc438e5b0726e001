//! Shared fixtures for app integration tests.

use std::collections::HashSet;
use std::io::Read;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::mpsc::{Receiver, Sender, channel};
use std::sync::{Arc, Mutex};

use shutter_relay_app::{ConnectionController, ControllerConfig};
use shutter_relay_catalog::{IndexedImage, InMemoryMediaIndex};
use shutter_relay_core::{AssetReference, DeviceIdentifier, UploadTarget};
use shutter_relay_permission::{PermissionGate, ScriptedProbe};
use shutter_relay_upload::{
    AssetSource, MultipartRequest, UploadClient, UploadError, UploadTransport, WireResponse,
};

pub const TEST_ENDPOINT: &str = "https://relay.example.test/upload";

/// One request observed by [`RecordingTransport`], bodies fully drained.
#[allow(dead_code)]
pub struct RecordedRequest {
    pub endpoint: String,
    pub folder_field_name: String,
    pub folder_path: String,
    pub file_field_name: String,
    pub file_name: String,
    pub content_type: String,
    pub body_bytes: Vec<u8>,
}

/// Transport that records requests and answers from a scripted response list.
///
/// Responses are consumed in order; the final entry repeats once the script
/// runs out.
pub struct RecordingTransport {
    responses: Mutex<Vec<WireResponse>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

#[allow(dead_code)]
impl RecordingTransport {
    pub fn new(responses: Vec<WireResponse>) -> Self {
        Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn always_ok() -> Self {
        Self::new(vec![WireResponse {
            status: 200,
            body: "ok".to_string(),
        }])
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().expect("requests lock").len()
    }

    pub fn recorded(&self) -> Vec<(String, String)> {
        self.requests
            .lock()
            .expect("requests lock")
            .iter()
            .map(|request| (request.file_name.clone(), request.folder_path.clone()))
            .collect()
    }

    pub fn with_requests<T>(&self, f: impl FnOnce(&[RecordedRequest]) -> T) -> T {
        let requests = self.requests.lock().expect("requests lock");
        f(&requests)
    }
}

impl UploadTransport for RecordingTransport {
    fn post_multipart(&self, mut request: MultipartRequest) -> Result<WireResponse, UploadError> {
        let mut body_bytes = Vec::new();
        request
            .body
            .read_to_end(&mut body_bytes)
            .map_err(|error| UploadError::Network(error.to_string()))?;

        self.requests.lock().expect("requests lock").push(RecordedRequest {
            endpoint: request.endpoint,
            folder_field_name: request.folder_field_name,
            folder_path: request.folder_path,
            file_field_name: request.file_field_name,
            file_name: request.file_name,
            content_type: request.content_type,
            body_bytes,
        });

        let mut responses = self.responses.lock().expect("responses lock");
        if responses.len() > 1 {
            return Ok(responses.remove(0));
        }
        Ok(responses.first().cloned().unwrap_or(WireResponse {
            status: 200,
            body: "ok".to_string(),
        }))
    }
}

/// Transport that parks each request until the test releases it.
pub struct BlockingTransport {
    release_rx: Mutex<Receiver<()>>,
    hits: AtomicU32,
}

#[allow(dead_code)]
impl BlockingTransport {
    pub fn new() -> (Arc<Self>, Sender<()>) {
        let (release_tx, release_rx) = channel();
        let transport = Arc::new(Self {
            release_rx: Mutex::new(release_rx),
            hits: AtomicU32::new(0),
        });
        (transport, release_tx)
    }

    pub fn hits(&self) -> u32 {
        self.hits.load(Ordering::Acquire)
    }
}

impl UploadTransport for BlockingTransport {
    fn post_multipart(&self, _request: MultipartRequest) -> Result<WireResponse, UploadError> {
        self.hits.fetch_add(1, Ordering::AcqRel);
        let release = self.release_rx.lock().expect("release lock");
        release
            .recv()
            .map_err(|error| UploadError::Network(error.to_string()))?;
        Ok(WireResponse {
            status: 200,
            body: "ok".to_string(),
        })
    }
}

/// Asset source serving fixed bytes, with scripted open failures.
#[derive(Default)]
pub struct StaticAssetSource {
    fail_ids: HashSet<String>,
}

#[allow(dead_code)]
impl StaticAssetSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_for(ids: &[&str]) -> Self {
        Self {
            fail_ids: ids.iter().map(|id| id.to_string()).collect(),
        }
    }
}

impl AssetSource for StaticAssetSource {
    fn open(&self, asset: &AssetReference) -> Result<Box<dyn Read + Send>, UploadError> {
        if self.fail_ids.contains(&asset.id) {
            return Err(UploadError::Stream {
                asset_id: asset.id.clone(),
                detail: "fixture stream unavailable".to_string(),
            });
        }
        Ok(Box::new(std::io::Cursor::new(
            format!("bytes-of-{}", asset.id).into_bytes(),
        )))
    }
}

/// Camera-roll index entry fixture.
#[allow(dead_code)]
pub fn dcim_entry(id: &str, added_at_ms: u64) -> IndexedImage {
    IndexedImage {
        id: id.to_string(),
        storage_path: format!("/storage/emulated/0/DCIM/Camera/{id}.jpg"),
        added_at_ms,
    }
}

/// Gate whose probe always reports the capability granted.
#[allow(dead_code)]
pub fn granted_gate() -> PermissionGate {
    PermissionGate::new(Arc::new(ScriptedProbe::granted()))
}

/// Builds a controller over an in-memory index and the given seams.
#[allow(dead_code)]
pub fn build_controller(
    gate: PermissionGate,
    entries: Vec<IndexedImage>,
    source: StaticAssetSource,
    transport: Arc<dyn UploadTransport>,
) -> Arc<ConnectionController> {
    let device = DeviceIdentifier::new("device-1").expect("device id fixture should be valid");
    let target =
        UploadTarget::new(TEST_ENDPOINT, &device).expect("target fixture should be valid");
    let uploader = UploadClient::new(target, Arc::new(source), transport)
        .expect("upload client fixture should build");

    Arc::new(ConnectionController::new(
        ControllerConfig::default(),
        gate,
        Arc::new(InMemoryMediaIndex::with_entries(entries)),
        uploader,
    ))
}
