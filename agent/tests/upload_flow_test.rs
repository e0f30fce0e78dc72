//! Integration tests for the WebDAV transport and the upload coordinator.
//!
//! These tests run the real reqwest-backed client against a wiremock server
//! and verify the directory-then-file sequencing, tolerance for
//! already-existing collections, and the coordinator's cleanup behavior on
//! transport failure.

use std::path::Path;
use std::sync::{Arc, Mutex};

use tempfile::TempDir;
use wiremock::matchers::{body_string, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use cartsync_agent::observer::UploadObserver;
use cartsync_agent::uploader::UploadCoordinator;
use cartsync_agent::webdav::{Transport, WebDavClient};

// =============================================================================
// Test Helpers
// =============================================================================

/// Observer recording every call in order.
#[derive(Default)]
struct RecordingObserver {
    calls: Mutex<Vec<String>>,
}

impl RecordingObserver {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl UploadObserver for RecordingObserver {
    fn file_changed(&self, path: &str) {
        self.calls.lock().unwrap().push(format!("changed:{path}"));
    }
    fn file_uploaded(&self, dest: &str) {
        self.calls.lock().unwrap().push(format!("uploaded:{dest}"));
    }
    fn upload_failed(&self, message: &str) {
        self.calls.lock().unwrap().push(format!("failed:{message}"));
    }
    fn set_status(&self, _text: &str) {}
}

/// Creates a client rooted at the mock server and a temp working directory
/// holding `app/cartridge/templates/foo.isml`.
fn client_with_fixture(server_uri: &str) -> (WebDavClient, TempDir) {
    let temp = TempDir::new().expect("temp dir");
    let file_dir = temp.path().join("app/cartridge/templates");
    std::fs::create_dir_all(&file_dir).expect("create dirs");
    std::fs::write(file_dir.join("foo.isml"), "<isprint value=\"1\"/>").expect("write fixture");

    let client = WebDavClient::with_base_url(
        server_uri.to_string(),
        "deploy",
        "secret",
        temp.path().to_path_buf(),
    );
    (client, temp)
}

fn coordinator(
    client: WebDavClient,
    observer: Arc<RecordingObserver>,
) -> UploadCoordinator<WebDavClient> {
    UploadCoordinator::new(
        Arc::new(client),
        observer,
        Path::new("app/cartridge"),
        "v1",
        "watching".to_string(),
    )
}

// =============================================================================
// Transport Tests
// =============================================================================

/// The directory-ensure call creates every segment from the root down.
#[tokio::test]
async fn ensure_remote_dir_creates_each_segment() {
    let server = MockServer::start().await;

    for segment in ["/Cartridges", "/Cartridges/v1", "/Cartridges/v1/templates"] {
        Mock::given(method("MKCOL"))
            .and(path(segment))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;
    }

    let (client, _temp) = client_with_fixture(&server.uri());
    client
        .ensure_remote_dir("/Cartridges/v1/templates")
        .await
        .expect("all segments created");
}

/// 405 means the collection already exists; that is success.
#[tokio::test]
async fn ensure_remote_dir_tolerates_existing_collections() {
    let server = MockServer::start().await;

    Mock::given(method("MKCOL"))
        .respond_with(ResponseTemplate::new(405))
        .mount(&server)
        .await;

    let (client, _temp) = client_with_fixture(&server.uri());
    client
        .ensure_remote_dir("/Cartridges/v1/templates")
        .await
        .expect("existing collections tolerated");
}

/// A denied MKCOL surfaces as a transport error.
#[tokio::test]
async fn ensure_remote_dir_reports_denied_segment() {
    let server = MockServer::start().await;

    Mock::given(method("MKCOL"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let (client, _temp) = client_with_fixture(&server.uri());
    let result = client.ensure_remote_dir("/Cartridges/v1").await;
    assert!(result.is_err());
}

/// The file body is PUT to the destination directory under its own name.
#[tokio::test]
async fn transfer_file_puts_body_to_destination() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/Cartridges/v1/templates/foo.isml"))
        .and(body_string("<isprint value=\"1\"/>"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let (client, _temp) = client_with_fixture(&server.uri());
    client
        .transfer_file(
            "app/cartridge/templates/foo.isml",
            "/Cartridges/v1/templates",
        )
        .await
        .expect("upload succeeds");
}

/// A missing local file is an I/O transport error, not a panic.
#[tokio::test]
async fn transfer_file_reports_missing_local_file() {
    let server = MockServer::start().await;
    let (client, _temp) = client_with_fixture(&server.uri());

    let result = client
        .transfer_file("app/cartridge/templates/gone.isml", "/Cartridges/v1/templates")
        .await;
    assert!(result.is_err());
}

// =============================================================================
// Coordinator Flow Tests
// =============================================================================

/// End to end: directory ensured, file transferred, observer notified, path
/// released.
#[tokio::test]
async fn upload_flow_sequences_mkcol_before_put() {
    let server = MockServer::start().await;

    Mock::given(method("MKCOL"))
        .respond_with(ResponseTemplate::new(201))
        .expect(3)
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/Cartridges/v1/templates/foo.isml"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let (client, _temp) = client_with_fixture(&server.uri());
    let observer = Arc::new(RecordingObserver::default());
    let coordinator = coordinator(client, Arc::clone(&observer));

    coordinator.upload("app/cartridge/templates/foo.isml").await;

    assert!(!coordinator
        .is_in_flight("app/cartridge/templates/foo.isml")
        .await);

    let calls = observer.calls();
    assert_eq!(calls[0], "changed:app/cartridge/templates/foo.isml");
    assert_eq!(calls[1], "uploaded:/Cartridges/v1/templates");
}

/// A failed transfer reports through the observer and releases the
/// in-flight slot so a later change can retry.
#[tokio::test]
async fn failed_put_reports_and_releases_path() {
    let server = MockServer::start().await;

    Mock::given(method("MKCOL"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(500).set_body_string("disk full"))
        .mount(&server)
        .await;

    let (client, _temp) = client_with_fixture(&server.uri());
    let observer = Arc::new(RecordingObserver::default());
    let coordinator = coordinator(client, Arc::clone(&observer));

    coordinator.upload("app/cartridge/templates/foo.isml").await;

    assert!(!coordinator
        .is_in_flight("app/cartridge/templates/foo.isml")
        .await);

    let calls = observer.calls();
    assert!(calls.iter().any(|c| c.starts_with("failed:")));
    assert!(!calls.iter().any(|c| c.starts_with("uploaded:")));

    // A subsequent change event triggers a fresh attempt (the failure was
    // terminal for that one attempt only).
    coordinator.upload("app/cartridge/templates/foo.isml").await;
    let calls = observer.calls();
    assert_eq!(
        calls
            .iter()
            .filter(|c| c.starts_with("changed:"))
            .count(),
        2
    );
}
