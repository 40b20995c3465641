//! Integration tests for the OAuth2 client workflow.

use std::io::Write;
use std::sync::Arc;

use secrecy::SecretString;

use integrations_kanidm::mocks::MockHttpTransport;
use integrations_kanidm::transport::HttpMethod;
use integrations_kanidm::{
    ImageSpec, KanidmClient, KanidmConfig, KanidmError, OauthClientSpec, PrefUsername, Scope,
    ServerError,
};

fn client(transport: Arc<MockHttpTransport>) -> KanidmClient {
    let config = KanidmConfig::builder()
        .base_url("https://idm.example.com")
        .token(SecretString::new("tok-abc".into()))
        .build()
        .unwrap();
    KanidmClient::with_transport(config, transport).unwrap()
}

fn nextcloud_spec() -> OauthClientSpec {
    OauthClientSpec::builder()
        .name("nextcloud")
        .url("https://nextcloud.example.com")
        .redirect_url("https://nextcloud.example.com/apps/oauth2/callback")
        .scopes([Scope::Openid, Scope::Profile, Scope::Email])
        .username(PrefUsername::Short)
        .build()
        .unwrap()
}

const EXISTING_CLIENT: &str = r#"{"attrs":{"uuid":["d71f6b2a-0000-4000-8000-c0ffee000001"],"name":["nextcloud"]}}"#;

/// Enqueue the two auth-validation responses every run starts with.
fn enqueue_auth(transport: &MockHttpTransport) {
    transport.enqueue_json_response(200, "{}");
    transport.enqueue_json_response(200, "{}");
}

fn patch_bodies_containing(transport: &MockHttpTransport, attr: &str) -> usize {
    transport
        .get_requests()
        .iter()
        .filter(|r| {
            r.method == HttpMethod::Patch
                && r.body
                    .as_ref()
                    .map(|b| String::from_utf8_lossy(b).contains(attr))
                    .unwrap_or(false)
        })
        .count()
}

#[tokio::test]
async fn confidential_client_scenario() {
    let transport = Arc::new(MockHttpTransport::new());
    enqueue_auth(&transport);
    transport.enqueue_json_response(404, r#"{"error":"nomatchingentries"}"#); // get_client
    transport.enqueue_json_response(200, "{}"); // create_basic_client
    transport.enqueue_json_response(200, EXISTING_CLIENT); // get_client (re-fetch)
    transport.enqueue_json_response(200, "{}"); // set_pkce
    transport.enqueue_json_response(200, "{}"); // set_legacy_crypto
    transport.enqueue_json_response(200, "{}"); // add_redirect_url
    transport.enqueue_json_response(200, "{}"); // update_scope_map
    transport.enqueue_json_response(200, "{}"); // set_preferred_username
    transport.enqueue_json_response(200, "{}"); // set_strict_redirect
    transport.enqueue_json_response(200, r#""s3cr3t-value""#); // get_client_secret

    let secret = client(transport.clone())
        .create_oauth_client(nextcloud_spec())
        .await
        .unwrap();

    // The secret is the decoded JSON string, not the quoted raw body.
    assert_eq!(secret, "s3cr3t-value");

    assert_eq!(transport.requests_to("/v1/oauth2/_basic").len(), 1);
    assert!(transport.requests_to("/v1/oauth2/_public").is_empty());
    assert_eq!(
        transport
            .requests_to("/v1/oauth2/nextcloud/_scopemap/idm_all_persons")
            .len(),
        1
    );
    assert_eq!(
        transport
            .requests_to("/v1/oauth2/nextcloud/_basic_secret")
            .len(),
        1
    );
    assert_eq!(
        patch_bodies_containing(&transport, "oauth2_allow_insecure_client_disable_pkce"),
        1
    );
    assert_eq!(
        patch_bodies_containing(&transport, "oauth2_jwt_legacy_crypto_enable"),
        1
    );
    assert_eq!(
        patch_bodies_containing(&transport, "oauth2_prefer_short_username"),
        1
    );
    assert_eq!(
        patch_bodies_containing(&transport, "oauth2_strict_redirect_uri"),
        1
    );
    assert_eq!(patch_bodies_containing(&transport, "oauth2_rs_origin"), 1);

    // Username mode "short" patches the prefer-short flag to true.
    let patches = transport.requests_to("/v1/oauth2/nextcloud");
    let username_patch = patches
        .iter()
        .find(|r| {
            r.body
                .as_ref()
                .map(|b| String::from_utf8_lossy(b).contains("oauth2_prefer_short_username"))
                .unwrap_or(false)
        })
        .unwrap();
    let body: serde_json::Value =
        serde_json::from_slice(username_patch.body.as_ref().unwrap()).unwrap();
    assert_eq!(body["attrs"]["oauth2_prefer_short_username"][0], "true");

    // Scope map carries the declared scopes in order.
    let scope_request = &transport.requests_to("_scopemap/idm_all_persons")[0];
    let scopes: serde_json::Value =
        serde_json::from_slice(scope_request.body.as_ref().unwrap()).unwrap();
    assert_eq!(scopes, serde_json::json!(["openid", "profile", "email"]));
}

#[tokio::test]
async fn second_run_performs_zero_creation_calls() {
    let transport = Arc::new(MockHttpTransport::new());
    enqueue_auth(&transport);
    transport.enqueue_json_response(200, EXISTING_CLIENT); // get_client: exists
    transport.enqueue_json_response(200, EXISTING_CLIENT); // get_client (re-fetch)
    transport.enqueue_json_response(200, "{}"); // set_pkce
    transport.enqueue_json_response(200, "{}"); // set_legacy_crypto
    transport.enqueue_json_response(200, "{}"); // add_redirect_url
    transport.enqueue_json_response(200, "{}"); // update_scope_map
    transport.enqueue_json_response(200, "{}"); // set_preferred_username
    transport.enqueue_json_response(200, "{}"); // set_strict_redirect
    transport.enqueue_json_response(200, r#""s3cr3t-value""#); // get_client_secret

    let secret = client(transport.clone())
        .create_oauth_client(nextcloud_spec())
        .await
        .unwrap();

    assert_eq!(secret, "s3cr3t-value");
    assert!(transport.requests_to("/v1/oauth2/_basic").is_empty());
    assert!(transport.requests_to("/v1/oauth2/_public").is_empty());
}

#[tokio::test]
async fn redirect_failure_stops_the_sequence() {
    let spec = OauthClientSpec::builder()
        .name("app")
        .url("https://app.example.com")
        .redirect_urls([
            "https://app.example.com/cb1",
            "https://app.example.com/cb2",
            "https://app.example.com/cb3",
        ])
        .scopes([Scope::Openid])
        .build()
        .unwrap();

    let existing = r#"{"attrs":{"uuid":["d71f6b2a-0000-4000-8000-c0ffee000002"]}}"#;
    let transport = Arc::new(MockHttpTransport::new());
    enqueue_auth(&transport);
    transport.enqueue_json_response(200, existing); // get_client
    transport.enqueue_json_response(200, existing); // get_client (re-fetch)
    transport.enqueue_json_response(200, "{}"); // set_pkce
    transport.enqueue_json_response(200, "{}"); // set_legacy_crypto
    transport.enqueue_json_response(200, "{}"); // add_redirect_url cb1
    transport.enqueue_json_response(400, r#"{"error":"invalidattribute"}"#); // cb2 fails

    let mut reconciler = client(transport.clone()).oauth_client(spec).unwrap();
    let err = reconciler.run().await.unwrap_err();

    match err {
        KanidmError::Server(ServerError {
            step,
            status,
            body,
            ..
        }) => {
            assert_eq!(step, "add_redirect_url");
            assert_eq!(status, 400);
            assert!(body.contains("invalidattribute"));
        }
        other => panic!("expected server error, got {other}"),
    }

    // The accumulated log names the exact failing call.
    let log = reconciler.log();
    assert_eq!(log.requests_matching("add_redirect_url"), 2);
    let failing = log
        .response("add_redirect_url[https://app.example.com/cb2]")
        .unwrap();
    assert_eq!(failing.status, 400);

    // Exactly two append calls were made, and nothing after the failure.
    assert_eq!(patch_bodies_containing(&transport, "oauth2_rs_origin"), 2);
    assert!(transport.requests_to("_scopemap").is_empty());
    assert!(transport.requests_to("_basic_secret").is_empty());
    transport.verify_request_count(8);
}

#[tokio::test]
async fn public_client_patches_localhost_redirect_instead_of_pkce() {
    let spec = OauthClientSpec::builder()
        .name("cli-app")
        .url("https://cli.example.com")
        .redirect_url("http://localhost:8080/callback")
        .scopes([Scope::Openid])
        .public(true)
        .local_redirect(true)
        .build()
        .unwrap();

    let existing = r#"{"attrs":{"uuid":["d71f6b2a-0000-4000-8000-c0ffee000003"]}}"#;
    let transport = Arc::new(MockHttpTransport::new());
    enqueue_auth(&transport);
    transport.enqueue_json_response(404, "{}"); // get_client
    transport.enqueue_json_response(200, "{}"); // create_public_client
    transport.enqueue_json_response(200, existing); // get_client (re-fetch)
    transport.set_default_response(200, r#""pub-secret""#);

    client(transport.clone())
        .create_oauth_client(spec)
        .await
        .unwrap();

    assert_eq!(transport.requests_to("/v1/oauth2/_public").len(), 1);
    assert!(transport.requests_to("/v1/oauth2/_basic").is_empty());
    assert_eq!(
        patch_bodies_containing(&transport, "oauth2_allow_localhost_redirect"),
        1
    );
    assert_eq!(
        patch_bodies_containing(&transport, "oauth2_allow_insecure_client_disable_pkce"),
        0
    );
    assert_eq!(
        patch_bodies_containing(&transport, "oauth2_jwt_legacy_crypto_enable"),
        0
    );
}

#[tokio::test]
async fn sup_scopes_and_claims_are_applied_per_entry() {
    let spec = OauthClientSpec::builder()
        .name("grafana")
        .url("https://grafana.example.com")
        .redirect_url("https://grafana.example.com/login/generic_oauth")
        .scopes([Scope::Openid, Scope::Groups])
        .sup_scope("grafana_admins", vec![Scope::Groups])
        .sup_scope("grafana_editors", vec![Scope::Groups])
        .custom_claim("role", "grafana_admins", vec!["admin".to_string()])
        .build()
        .unwrap();

    let existing = r#"{"attrs":{"uuid":["d71f6b2a-0000-4000-8000-c0ffee000004"]}}"#;
    let transport = Arc::new(MockHttpTransport::new());
    enqueue_auth(&transport);
    transport.enqueue_json_response(200, existing);
    transport.enqueue_json_response(200, existing);
    transport.set_default_response(200, r#""graf-secret""#);

    client(transport.clone())
        .create_oauth_client(spec)
        .await
        .unwrap();

    assert_eq!(
        transport
            .requests_to("_sup_scopemap/grafana_admins")
            .len(),
        1
    );
    assert_eq!(
        transport
            .requests_to("_sup_scopemap/grafana_editors")
            .len(),
        1
    );
    assert_eq!(
        transport.requests_to("_claimmap/grafana_admins").len(),
        1
    );
    // The join mode is set once, not once per claim.
    assert_eq!(transport.requests_to("_claimmap/array").len(), 1);
}

#[tokio::test]
async fn image_upload_sends_multipart_form() {
    let mut file = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
    file.write_all(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A])
        .unwrap();
    file.write_all(b"fake-png-payload").unwrap();

    let spec = OauthClientSpec::builder()
        .name("wiki")
        .url("https://wiki.example.com")
        .redirect_url("https://wiki.example.com/oauth/callback")
        .scopes([Scope::Openid])
        .image(ImageSpec::new(file.path().to_string_lossy().to_string()))
        .build()
        .unwrap();

    let existing = r#"{"attrs":{"uuid":["d71f6b2a-0000-4000-8000-c0ffee000005"]}}"#;
    let transport = Arc::new(MockHttpTransport::new());
    enqueue_auth(&transport);
    transport.enqueue_json_response(200, existing);
    transport.enqueue_json_response(200, existing);
    transport.set_default_response(200, r#""wiki-secret""#);

    client(transport.clone())
        .create_oauth_client(spec)
        .await
        .unwrap();

    let uploads = transport.requests_to("/v1/oauth2/wiki/_image");
    assert_eq!(uploads.len(), 1);
    let upload = &uploads[0];
    assert!(upload.headers["Content-Type"].starts_with("multipart/form-data; boundary="));
    let body = String::from_utf8_lossy(upload.body.as_ref().unwrap()).to_string();
    assert!(body.contains("name=\"image\""));
    assert!(body.contains("filename=\"wiki.png\""));
    assert!(body.contains("Content-Type: image/png"));
}

#[test]
fn invariants_are_rejected_before_any_network_call() {
    let err = OauthClientSpec::builder()
        .name("app")
        .url("https://app.example.com")
        .redirect_url("https://app.example.com/cb")
        .scopes([Scope::Openid])
        .public(true)
        .pkce(false)
        .build()
        .unwrap_err();
    assert!(matches!(err, KanidmError::Argument(_)));

    let err = OauthClientSpec::builder()
        .name("app")
        .url("https://app.example.com")
        .redirect_url("https://app.example.com/cb")
        .scopes([Scope::Openid])
        .local_redirect(true)
        .build()
        .unwrap_err();
    assert!(matches!(err, KanidmError::Argument(_)));
}
