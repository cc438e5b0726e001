//! Live wire tests for the blocking multipart transport.

use std::io::Cursor;

use mockito::Matcher;
use shutter_relay_upload::{HttpTransport, MultipartRequest, UploadTransport};

fn request_to(endpoint: String, folder_path: &str, body: &[u8]) -> MultipartRequest {
    MultipartRequest {
        endpoint,
        folder_field_name: "folderPath".to_string(),
        folder_path: folder_path.to_string(),
        file_field_name: "file".to_string(),
        file_name: "one.jpg".to_string(),
        content_type: "image/jpeg".to_string(),
        body: Box::new(Cursor::new(body.to_vec())),
    }
}

#[test]
fn folder_tag_part_precedes_file_part_on_the_wire() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("POST", "/upload")
        .match_header(
            "content-type",
            Matcher::Regex("multipart/form-data.*".to_string()),
        )
        .match_body(Matcher::Regex(
            r#"(?s)name="folderPath".*ADR_device-1.*name="file"; filename="one.jpg".*jpeg-bytes"#
                .to_string(),
        ))
        .with_status(200)
        .with_body("stored")
        .create();

    let transport = HttpTransport::new().expect("transport should build");
    let response = transport
        .post_multipart(request_to(
            format!("{}/upload", server.url()),
            "ADR_device-1",
            b"jpeg-bytes",
        ))
        .expect("post should succeed");

    assert_eq!(response.status, 200);
    assert_eq!(response.body, "stored");
    mock.assert();
}

#[test]
fn empty_folder_tag_omits_the_text_part() {
    let mut server = mockito::Server::new();
    let any_upload = server
        .mock("POST", "/upload")
        .with_status(200)
        .with_body("ok")
        .create();
    // Defined last so it is matched first; it must never be hit.
    let tagged_upload = server
        .mock("POST", "/upload")
        .match_body(Matcher::Regex("folderPath".to_string()))
        .expect(0)
        .create();

    let transport = HttpTransport::new().expect("transport should build");
    let response = transport
        .post_multipart(request_to(format!("{}/upload", server.url()), "", b"raw"))
        .expect("post should succeed");

    assert_eq!(response.status, 200);
    tagged_upload.assert();
    any_upload.assert();
}

#[test]
fn non_2xx_status_passes_through_the_transport() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("POST", "/upload")
        .with_status(507)
        .with_body("quota exceeded")
        .create();

    let transport = HttpTransport::new().expect("transport should build");
    let response = transport
        .post_multipart(request_to(format!("{}/upload", server.url()), "tag", b"x"))
        .expect("transport reports non-2xx as a response, not an error");

    assert_eq!(response.status, 507);
    assert_eq!(response.body, "quota exceeded");
    mock.assert();
}
