//! Server test utilities.

use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use beacon_core::config::{AppConfig, AuthConfig};
use beacon_server::{AppState, create_router};
use beacon_storage::{KvStore, MemoryStore};
use std::sync::{Arc, LazyLock};
use tower::ServiceExt;

/// Password accepted by every test server.
#[allow(dead_code)]
pub const TEST_PASSWORD: &str = "hunter2";

/// Hashing once keeps the suite fast even at the minimum bcrypt cost.
static TEST_HASH: LazyLock<String> =
    LazyLock::new(|| bcrypt::hash(TEST_PASSWORD, 4).expect("Failed to hash test password"));

/// Build a test configuration with the shared password installed.
#[allow(dead_code)]
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::for_testing();
    config.auth = AuthConfig::Password {
        hash: TEST_HASH.clone(),
    };
    config.server.public_url = "https://beacon.test/".to_string();
    config
}

/// A test server wrapper with all dependencies.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestServer {
    pub router: axum::Router,
    pub state: AppState,
}

#[allow(dead_code)]
impl TestServer {
    /// Create a new test server over an in-memory store.
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    /// Create a test server with custom config modifications.
    pub fn with_config<F>(modifier: F) -> Self
    where
        F: FnOnce(&mut AppConfig),
    {
        let mut config = test_config();
        modifier(&mut config);
        Self::build(config, Arc::new(MemoryStore::new()))
    }

    /// Create a test server over a caller-supplied store.
    pub fn with_store(store: Arc<dyn KvStore>) -> Self {
        Self::build(test_config(), store)
    }

    fn build(config: AppConfig, store: Arc<dyn KvStore>) -> Self {
        let authenticator = beacon_server::auth::from_config(&config.auth);
        let state = AppState::new(config, store, authenticator);
        let router = create_router(state.clone());

        Self { router, state }
    }

    /// POST a url-encoded form and return the status and body text.
    pub async fn post_form(&self, uri: &str, fields: &[(&str, &str)]) -> (StatusCode, String) {
        let (status, _, body) = self.post_form_full(uri, fields).await;
        (status, body)
    }

    /// POST a url-encoded form and also return the response headers.
    pub async fn post_form_full(
        &self,
        uri: &str,
        fields: &[(&str, &str)],
    ) -> (StatusCode, HeaderMap, String) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(Body::from(encode_form(fields)))
            .unwrap();
        self.send(request).await
    }

    /// GET `uri` and return status, headers and body text.
    pub async fn get(&self, uri: &str) -> (StatusCode, HeaderMap, String) {
        let request = Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, HeaderMap, String) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, headers, String::from_utf8(body_bytes.to_vec()).unwrap())
    }

    /// Create a solo share and return (session id, share id).
    pub async fn create_solo(&self, extra: &[(&str, &str)]) -> (String, String) {
        let mut fields = vec![
            ("dur", "3600"),
            ("int", "1"),
            ("pwd", TEST_PASSWORD),
        ];
        fields.extend_from_slice(extra);
        let (status, body) = self.post_form("/api/create.php", &fields).await;
        assert_eq!(status, StatusCode::OK, "create failed: {body}");
        let lines = response_lines(&body);
        (lines[1].clone(), lines[3].clone())
    }

    /// Create a group share and return (session id, share id, pin).
    pub async fn create_group(&self, nickname: &str) -> (String, String, String) {
        let (status, body) = self
            .post_form(
                "/api/create.php",
                &[
                    ("dur", "3600"),
                    ("int", "1"),
                    ("pwd", TEST_PASSWORD),
                    ("mod", "1"),
                    ("nic", nickname),
                ],
            )
            .await;
        assert_eq!(status, StatusCode::OK, "group create failed: {body}");
        let lines = response_lines(&body);
        (lines[1].clone(), lines[4].clone(), lines[3].clone())
    }

    /// Join a group by PIN and return (session id, share id).
    pub async fn join_group(&self, nickname: &str, pin: &str) -> (String, String) {
        let (status, body) = self
            .post_form(
                "/api/create.php",
                &[
                    ("dur", "3600"),
                    ("int", "2"),
                    ("pwd", TEST_PASSWORD),
                    ("mod", "2"),
                    ("nic", nickname),
                    ("pin", pin),
                ],
            )
            .await;
        assert_eq!(status, StatusCode::OK, "join failed: {body}");
        let lines = response_lines(&body);
        (lines[1].clone(), lines[3].clone())
    }

    /// Post a plaintext fix for `sid`.
    pub async fn post_location(&self, sid: &str, lat: &str, lon: &str, time: &str) -> StatusCode {
        let (status, _) = self
            .post_form(
                "/api/post.php",
                &[("sid", sid), ("lat", lat), ("lon", lon), ("time", time)],
            )
            .await;
        status
    }

    /// Fetch a share view as JSON.
    pub async fn fetch(&self, share_id: &str) -> (StatusCode, serde_json::Value) {
        let (status, _, body) = self.get(&format!("/api/fetch.php?id={share_id}")).await;
        let json = serde_json::from_str(&body).unwrap_or(serde_json::Value::Null);
        (status, json)
    }
}

/// Split a protocol response body into its lines.
#[allow(dead_code)]
pub fn response_lines(body: &str) -> Vec<String> {
    body.lines().map(str::to_string).collect()
}

/// Percent-encode form fields; everything outside the unreserved set is escaped.
fn encode_form(fields: &[(&str, &str)]) -> String {
    fields
        .iter()
        .map(|(k, v)| format!("{}={}", escape(k), escape(v)))
        .collect::<Vec<_>>()
        .join("&")
}

fn escape(raw: &str) -> String {
    raw.bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                (b as char).to_string()
            }
            _ => format!("%{b:02X}"),
        })
        .collect()
}
