//! End-to-end strategy tests against a local mock server.

use sourcepin_core::Error;
use sourcepin_core::resolve::HttpResolve;
use sourcepin_http::{HttpOptions, HttpResolver};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// sha256("hello")
const HELLO_SHA256: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

fn options_for(server: &MockServer) -> HttpOptions {
    HttpOptions {
        raw_content_hosts: vec![],
        release_hosts: vec![],
        release_api_base: server.uri(),
        ..HttpOptions::default()
    }
}

#[tokio::test]
async fn etag_shortcut_skips_body_fetch() {
    let server = MockServer::start().await;

    Mock::given(method("HEAD"))
        .and(path("/org/repo/main/install.sh"))
        .respond_with(
            ResponseTemplate::new(200).insert_header("etag", format!("\"{HELLO_SHA256}\"")),
        )
        .mount(&server)
        .await;
    // The whole point of the fast path: not a single body transfer.
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let mut options = options_for(&server);
    options.raw_content_hosts = vec!["127.0.0.1".to_string()];
    let resolver = HttpResolver::new(options);

    let url = format!("{}/org/repo/main/install.sh", server.uri());
    let resolution = resolver
        .resolve(&url, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(resolution.checksum, format!("sha256:{HELLO_SHA256}"));
    assert!(resolution.volatile.is_none());
}

#[tokio::test]
async fn weak_or_opaque_etag_falls_through_to_download() {
    let server = MockServer::start().await;

    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(200).insert_header("etag", "\"6-19a4c1a2\""))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes("hello"))
        .expect(1)
        .mount(&server)
        .await;

    let mut options = options_for(&server);
    options.raw_content_hosts = vec!["127.0.0.1".to_string()];
    let resolver = HttpResolver::new(options);

    let url = format!("{}/file.txt", server.uri());
    let resolution = resolver
        .resolve(&url, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(resolution.checksum, format!("sha256:{HELLO_SHA256}"));
}

#[tokio::test]
async fn release_api_digest_is_used() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/cli/cli/releases/tags/v2.40.0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "tag_name": "v2.40.0",
            "assets": [
                {"name": "gh_linux_amd64.tar.gz", "digest": format!("sha256:{HELLO_SHA256}")},
                {"name": "gh_darwin_arm64.tar.gz", "digest": "sha256:ffff"}
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    // The asset body itself is never transferred.
    Mock::given(method("GET"))
        .and(path("/cli/cli/releases/download/v2.40.0/gh_linux_amd64.tar.gz"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let mut options = options_for(&server);
    options.release_hosts = vec!["127.0.0.1".to_string()];
    let resolver = HttpResolver::new(options);

    let url = format!(
        "{}/cli/cli/releases/download/v2.40.0/gh_linux_amd64.tar.gz",
        server.uri()
    );
    let resolution = resolver
        .resolve(&url, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(resolution.checksum, format!("sha256:{HELLO_SHA256}"));
}

#[tokio::test]
async fn release_api_token_is_sent_as_bearer() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/o/r/releases/tags/v1"))
        .and(header("authorization", "Bearer secret-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "assets": [{"name": "a.tgz", "digest": format!("sha256:{HELLO_SHA256}")}]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let mut options = options_for(&server);
    options.release_hosts = vec!["127.0.0.1".to_string()];
    options.github_token = Some("secret-token".to_string());
    let resolver = HttpResolver::new(options);

    let url = format!("{}/o/r/releases/download/v1/a.tgz", server.uri());
    let resolution = resolver
        .resolve(&url, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(resolution.checksum, format!("sha256:{HELLO_SHA256}"));
}

#[tokio::test]
async fn fallback_download_hashes_body() {
    let server = MockServer::start().await;

    // No HEAD support at all - probe degrades, fallback still works.
    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(405))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/tool.tar.gz"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes("hello"))
        .mount(&server)
        .await;

    let resolver = HttpResolver::new(options_for(&server));
    let url = format!("{}/tool.tar.gz", server.uri());
    let resolution = resolver
        .resolve(&url, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(resolution.checksum, format!("sha256:{HELLO_SHA256}"));
    assert!(resolution.headers.is_empty());
}

#[tokio::test]
async fn no_store_content_is_pinned_and_flagged_volatile() {
    let server = MockServer::start().await;

    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(200).insert_header("cache-control", "no-store"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes("hello"))
        .mount(&server)
        .await;

    let resolver = HttpResolver::new(options_for(&server));
    let url = format!("{}/latest.tar.gz", server.uri());
    let resolution = resolver
        .resolve(&url, &CancellationToken::new())
        .await
        .unwrap();

    // Still pinned - volatility is an advisory, not an error.
    assert_eq!(resolution.checksum, format!("sha256:{HELLO_SHA256}"));
    assert_eq!(
        resolution.volatile.as_deref(),
        Some("Cache-Control: no-store")
    );
}

#[tokio::test]
async fn vary_headers_are_captured() {
    let server = MockServer::start().await;

    Mock::given(method("HEAD"))
        .respond_with(
            ResponseTemplate::new(200).insert_header("vary", "Accept, Accept-Encoding"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes("hello"))
        .mount(&server)
        .await;

    let resolver = HttpResolver::new(options_for(&server));
    let url = format!("{}/negotiated", server.uri());
    let resolution = resolver
        .resolve(&url, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(resolution.headers["Accept"], "*/*");
    assert_eq!(resolution.headers["Accept-Encoding"], "identity");
}

#[tokio::test]
async fn non_success_status_is_fatal() {
    let server = MockServer::start().await;

    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let resolver = HttpResolver::new(options_for(&server));
    let url = format!("{}/missing", server.uri());
    let err = resolver
        .resolve(&url, &CancellationToken::new())
        .await
        .unwrap_err();

    match err {
        Error::HttpResolve { url: u, message } => {
            assert_eq!(u, url);
            assert!(message.contains("404"), "unexpected message: {message}");
        }
        other => panic!("expected HttpResolve error, got: {other}"),
    }
}

#[tokio::test]
async fn cancellation_aborts_resolution() {
    let server = MockServer::start().await;

    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(200).set_delay(std::time::Duration::from_secs(30)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(std::time::Duration::from_secs(30)))
        .mount(&server)
        .await;

    let resolver = HttpResolver::new(options_for(&server));
    let cancel = CancellationToken::new();
    cancel.cancel();

    let url = format!("{}/slow", server.uri());
    let err = resolver.resolve(&url, &cancel).await.unwrap_err();
    assert!(matches!(err, Error::Cancelled));
}

#[tokio::test]
async fn invalid_url_is_fatal() {
    let resolver = HttpResolver::new(HttpOptions::default());
    let err = resolver
        .resolve("http://[invalid", &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::HttpResolve { .. }));
}
