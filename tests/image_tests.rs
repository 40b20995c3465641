//! Integration tests for image resolution.

use std::io::Write;
use std::sync::Arc;

use integrations_kanidm::mocks::MockHttpTransport;
use integrations_kanidm::{ImageFormat, ImageSpec, KanidmError};

#[tokio::test]
async fn auto_format_resolves_png_from_magic_bytes() {
    // No extension, so only the magic-byte pass can identify it.
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A])
        .unwrap();
    file.write_all(b"payload").unwrap();

    let transport = MockHttpTransport::new();
    let spec = ImageSpec::new(file.path().to_string_lossy().to_string());
    let resolved = spec.resolve(&transport).await.unwrap();

    assert_eq!(resolved.format, ImageFormat::Png);
    assert_eq!(resolved.format.mime(), Some("image/png"));
    // Local sources never touch the network.
    transport.verify_request_count(0);
}

#[tokio::test]
async fn auto_format_resolves_extension_before_sniffing() {
    let mut file = tempfile::Builder::new().suffix(".svg").tempfile().unwrap();
    file.write_all(b"<svg xmlns=\"http://www.w3.org/2000/svg\"/>")
        .unwrap();

    let transport = MockHttpTransport::new();
    let spec = ImageSpec::new(file.path().to_string_lossy().to_string());
    let resolved = spec.resolve(&transport).await.unwrap();
    assert_eq!(resolved.format, ImageFormat::Svg);
}

#[tokio::test]
async fn url_sources_are_downloaded_through_the_transport() {
    let transport = Arc::new(MockHttpTransport::new());
    let mut body = vec![0xFF, 0xD8, 0xFF, 0xE0];
    body.extend_from_slice(b"jpeg-data");
    transport.enqueue_response(Ok(integrations_kanidm::transport::HttpResponse {
        status: 200,
        reason: "OK".to_string(),
        headers: Default::default(),
        body: body.into(),
    }));

    let spec = ImageSpec::new("https://cdn.example.com/logo");
    let resolved = spec.resolve(transport.as_ref()).await.unwrap();

    assert_eq!(resolved.format, ImageFormat::Jpg);
    assert_eq!(transport.requests_to("cdn.example.com").len(), 1);
    // The download was written to a local temp file.
    assert!(resolved.path.exists());
}

#[tokio::test]
async fn failed_download_is_fatal() {
    let transport = MockHttpTransport::new();
    transport.enqueue_json_response(404, "{}");

    let spec = ImageSpec::new("https://cdn.example.com/missing.png");
    let err = spec.resolve(&transport).await.unwrap_err();
    assert!(matches!(err, KanidmError::Image(_)));
}

#[tokio::test]
async fn unresolvable_format_is_fatal() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"not an image at all").unwrap();

    let transport = MockHttpTransport::new();
    let spec = ImageSpec::new(file.path().to_string_lossy().to_string());
    let err = spec.resolve(&transport).await.unwrap_err();
    assert!(matches!(err, KanidmError::Image(_)));
}
