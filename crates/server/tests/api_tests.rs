//! Integration tests for HTTP API endpoints.

mod common;

use axum::http::StatusCode;
use beacon_core::keys::{SESSION_PREFIX, SHARE_PREFIX};
use beacon_storage::KvStore;
use common::{FaultyStore, TEST_PASSWORD, TestServer, response_lines};
use std::sync::Arc;

// =============================================================================
// Solo shares
// =============================================================================

#[tokio::test]
async fn test_solo_share_roundtrip() {
    let server = TestServer::new();

    let (status, headers, body) = server
        .post_form_full(
            "/api/create.php",
            &[("dur", "3600"), ("int", "5"), ("pwd", TEST_PASSWORD)],
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers.contains_key("x-beacon-version"));

    let lines = response_lines(&body);
    assert_eq!(lines.len(), 4, "unexpected create body: {body}");
    assert_eq!(lines[0], "OK");
    let (sid, link, share_id) = (&lines[1], &lines[2], &lines[3]);
    assert_eq!(sid.len(), 64);
    assert_eq!(link, &format!("https://beacon.test/?{share_id}"));

    let (status, body) = server
        .post_form(
            "/api/post.php",
            &[
                ("sid", sid.as_str()),
                ("lat", "51.5074"),
                ("lon", "-0.1278"),
                ("time", "1700000000.5"),
                ("acc", "12"),
                ("spd", "3.5"),
            ],
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let lines = response_lines(&body);
    assert_eq!(lines, ["OK", "https://beacon.test/?%s", share_id.as_str()]);

    let (status, view) = server.fetch(share_id).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["type"], 0);
    assert_eq!(view["interval"], 5.0);
    assert_eq!(view["encrypted"], false);
    assert_eq!(view["salt"], "");
    assert!(view["serverTime"].as_f64().unwrap() > 1_700_000_000.0);

    let points = view["points"].as_array().unwrap();
    assert_eq!(points.len(), 1);
    assert_eq!(points[0][0], 51.5074);
    assert_eq!(points[0][1], -0.1278);
    assert_eq!(points[0][2], 1700000000.5);
    assert_eq!(points[0][3], 0);
    assert_eq!(points[0][4], 12.0);
    assert_eq!(points[0][5], 3.5);
}

#[tokio::test]
async fn test_fetch_returns_text_json() {
    let server = TestServer::new();
    let (_, share_id) = server.create_solo(&[]).await;

    let (status, headers, _) = server.get(&format!("/api/fetch.php?id={share_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["content-type"], "text/json");
}

#[tokio::test]
async fn test_fetch_since_filters_older_points() {
    let server = TestServer::new();
    let (sid, share_id) = server.create_solo(&[]).await;

    for time in ["100", "200", "300"] {
        assert_eq!(
            server.post_location(&sid, "10", "20", time).await,
            StatusCode::OK
        );
    }

    let (status, _, body) = server
        .get(&format!("/api/fetch.php?id={share_id}&since=150"))
        .await;
    assert_eq!(status, StatusCode::OK);
    let view: serde_json::Value = serde_json::from_str(&body).unwrap();
    let times: Vec<f64> = view["points"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p[2].as_f64().unwrap())
        .collect();
    assert_eq!(times, [200.0, 300.0]);
}

#[tokio::test]
async fn test_point_buffer_keeps_newest() {
    let server = TestServer::new();
    let (sid, share_id) = server.create_solo(&[]).await;

    for time in ["1", "2", "3", "4", "5"] {
        server.post_location(&sid, "10", "20", time).await;
    }

    let (_, view) = server.fetch(&share_id).await;
    let times: Vec<f64> = view["points"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p[2].as_f64().unwrap())
        .collect();
    assert_eq!(times, [3.0, 4.0, 5.0]);
}

#[tokio::test]
async fn test_encrypted_share_roundtrip() {
    let server = TestServer::new();
    let (sid, share_id) = server
        .create_solo(&[("e2e", "1"), ("salt", "c2FsdHNhbHQ=")])
        .await;

    // Ciphertext fields are opaque; the iv is mandatory.
    let (status, body) = server
        .post_form(
            "/api/post.php",
            &[("sid", sid.as_str()), ("lat", "AAAA"), ("lon", "BBBB"), ("time", "CCCC")],
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, "Missing data!\n");

    let (status, _) = server
        .post_form(
            "/api/post.php",
            &[
                ("sid", sid.as_str()),
                ("iv", "IVIV"),
                ("lat", "AAAA"),
                ("lon", "BBBB"),
                ("time", "CCCC"),
            ],
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, view) = server.fetch(&share_id).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["encrypted"], true);
    assert_eq!(view["salt"], "c2FsdHNhbHQ=");
    let point = &view["points"][0];
    assert_eq!(point[0], "IVIV");
    assert_eq!(point[1], "AAAA");
    assert_eq!(point[2], "BBBB");
    assert_eq!(point[3], "CCCC");
}

// =============================================================================
// Create validation
// =============================================================================

#[tokio::test]
async fn test_create_rejects_bad_password() {
    let server = TestServer::new();
    let (status, body) = server
        .post_form(
            "/api/create.php",
            &[("dur", "3600"), ("int", "1"), ("pwd", "wrong")],
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, "Incorrect password!\n");
}

#[tokio::test]
async fn test_create_missing_data_checked_before_password() {
    let server = TestServer::new();
    let (status, body) = server
        .post_form("/api/create.php", &[("int", "1"), ("pwd", "wrong")])
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, "Missing data!\n");
}

#[tokio::test]
async fn test_create_enforces_limits() {
    let server = TestServer::new();
    let cases = [
        ("0", "1", "Invalid duration!"),
        ("abc", "1", "Invalid duration!"),
        ("3600", "0", "Invalid interval!"),
        ("86401", "1", "Share duration exceeds maximum configured!"),
        ("3600", "90000", "Interval exceeds maximum configured!"),
        ("3600", "0.5", "Interval is too short!"),
    ];
    for (dur, int, message) in cases {
        let (status, body) = server
            .post_form(
                "/api/create.php",
                &[("dur", dur), ("int", int), ("pwd", TEST_PASSWORD)],
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "dur={dur} int={int}");
        assert_eq!(body, format!("{message}\n"));
    }
}

#[tokio::test]
async fn test_create_rejects_unknown_mode_and_encrypted_group() {
    let server = TestServer::new();

    let (status, body) = server
        .post_form(
            "/api/create.php",
            &[("dur", "60"), ("int", "1"), ("pwd", TEST_PASSWORD), ("mod", "7")],
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, "Unsupported share mode!\n");

    let (status, body) = server
        .post_form(
            "/api/create.php",
            &[
                ("dur", "60"),
                ("int", "1"),
                ("pwd", TEST_PASSWORD),
                ("mod", "1"),
                ("nic", "alice"),
                ("e2e", "1"),
                ("salt", "x"),
            ],
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body,
        "End-to-end encryption is not supported for group shares.\n"
    );
}

#[tokio::test]
async fn test_join_with_unknown_pin() {
    let server = TestServer::new();
    let (status, body) = server
        .post_form(
            "/api/create.php",
            &[
                ("dur", "60"),
                ("int", "1"),
                ("pwd", TEST_PASSWORD),
                ("mod", "2"),
                ("nic", "bob"),
                ("pin", "123456"),
            ],
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, "Invalid group PIN!\n");
}

// =============================================================================
// Group shares
// =============================================================================

#[tokio::test]
async fn test_group_share_roundtrip() {
    let server = TestServer::new();

    let (alice_sid, share_id, pin) = server.create_group("alice").await;
    assert_eq!(pin.len(), 6);
    let (bob_sid, joined_id) = server.join_group("bob", pin.as_str()).await;
    assert_eq!(joined_id, share_id);

    assert_eq!(
        server.post_location(&alice_sid, "48.85", "2.35", "10").await,
        StatusCode::OK
    );
    assert_eq!(
        server.post_location(&bob_sid, "40.71", "-74.0", "11").await,
        StatusCode::OK
    );

    let (status, view) = server.fetch(&share_id).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["type"], 1);
    // Alice posts every 1s, Bob every 2s.
    assert_eq!(view["interval"], 1.0);
    assert_eq!(view["points"]["alice"][0][0], 48.85);
    assert_eq!(view["points"]["bob"][0][0], 40.71);
    assert!(view.get("encrypted").is_none());
}

#[tokio::test]
async fn test_group_survives_until_last_host_stops() {
    let server = TestServer::new();
    let (alice_sid, share_id, pin) = server.create_group("alice").await;
    let (bob_sid, _) = server.join_group("bob", pin.as_str()).await;

    let (status, body) = server
        .post_form("/api/stop.php", &[("sid", alice_sid.as_str())])
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "OK\n");

    let (status, view) = server.fetch(&share_id).await;
    assert_eq!(status, StatusCode::OK);
    assert!(view["points"].get("alice").is_none());
    assert!(view["points"].get("bob").is_some());

    server.post_form("/api/stop.php", &[("sid", bob_sid.as_str())]).await;
    let (status, _) = server.fetch(&share_id).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // The PIN is released with the group.
    let (status, _) = server
        .post_form(
            "/api/create.php",
            &[
                ("dur", "60"),
                ("int", "1"),
                ("pwd", TEST_PASSWORD),
                ("mod", "2"),
                ("nic", "carol"),
                ("pin", pin.as_str()),
            ],
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// =============================================================================
// Adoption
// =============================================================================

#[tokio::test]
async fn test_adopt_solo_share_into_group() {
    let server = TestServer::new();
    let (carol_sid, solo_id) = server.create_solo(&[("ado", "1")]).await;
    let (_, group_id, pin) = server.create_group("alice").await;

    // The adopting device proves itself with its own session id.
    let (status, body) = server
        .post_form(
            "/api/adopt.php",
            &[
                ("sid", carol_sid.as_str()),
                ("nic", "carol"),
                ("aid", solo_id.as_str()),
                ("pin", pin.as_str()),
            ],
        )
        .await;
    assert_eq!(status, StatusCode::OK, "adopt failed: {body}");
    assert_eq!(body, "OK\n");

    // Carol's posts now feed both shares.
    let (status, body) = server
        .post_form(
            "/api/post.php",
            &[
                ("sid", carol_sid.as_str()),
                ("lat", "1"),
                ("lon", "2"),
                ("time", "3"),
            ],
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let lines = response_lines(&body);
    let targets: Vec<&str> = lines[2].split(',').collect();
    assert_eq!(targets, [solo_id.as_str(), group_id.as_str()]);

    let (_, view) = server.fetch(&group_id).await;
    assert_eq!(view["points"]["carol"][0][0], 1.0);

    // The solo link keeps working.
    let (status, view) = server.fetch(&solo_id).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["points"][0][0], 1.0);
}

#[tokio::test]
async fn test_adopt_by_non_host_is_forbidden() {
    let server = TestServer::new();
    let (_, solo_id) = server.create_solo(&[("ado", "1")]).await;
    let (alice_sid, group_id, pin) = server.create_group("alice").await;

    let (status, body) = server
        .post_form(
            "/api/adopt.php",
            &[
                ("sid", alice_sid.as_str()),
                ("nic", "carol"),
                ("aid", solo_id.as_str()),
                ("pin", pin.as_str()),
            ],
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, "Not authorized!\n");

    let (_, view) = server.fetch(&group_id).await;
    assert!(view["points"].get("carol").is_none());
}

async fn adopt_as(
    server: &TestServer,
    sid: &str,
    share_id: &str,
    pin: &str,
) -> (StatusCode, String) {
    server
        .post_form(
            "/api/adopt.php",
            &[("sid", sid), ("nic", "carol"), ("aid", share_id), ("pin", pin)],
        )
        .await
}

#[tokio::test]
async fn test_repeated_adopt_from_other_session_fails() {
    let server = TestServer::new();
    let (carol_sid, solo_id) = server.create_solo(&[("ado", "1")]).await;
    let (_, _, pin) = server.create_group("alice").await;
    let (dave_sid, _) = server.create_solo(&[]).await;

    let (status, _) = adopt_as(&server, &carol_sid, &solo_id, &pin).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = adopt_as(&server, &dave_sid, &solo_id, &pin).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, "Not authorized!\n");
}

#[tokio::test]
async fn test_adopt_not_allowed_without_consent() {
    let server = TestServer::new();
    let (carol_sid, solo_id) = server.create_solo(&[]).await;
    let (_, _, pin) = server.create_group("alice").await;

    let (status, body) = server
        .post_form(
            "/api/adopt.php",
            &[
                ("sid", carol_sid.as_str()),
                ("nic", "carol"),
                ("aid", solo_id.as_str()),
                ("pin", pin.as_str()),
            ],
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, "Share adoption not allowed!\n");
}

// =============================================================================
// Stop and new-link
// =============================================================================

#[tokio::test]
async fn test_stop_is_idempotent() {
    let server = TestServer::new();
    let (sid, share_id) = server.create_solo(&[]).await;

    for _ in 0..2 {
        let (status, body) = server.post_form("/api/stop.php", &[("sid", sid.as_str())]).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "OK\n");
    }

    let (status, _, body) = server.get(&format!("/api/fetch.php?id={share_id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, "Invalid session!\n");

    assert_eq!(
        server.post_location(&sid, "1", "2", "3").await,
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn test_stop_single_link_keeps_session() {
    let server = TestServer::new();
    let (sid, first_id) = server.create_solo(&[]).await;

    let (status, body) = server
        .post_form("/api/new-link.php", &[("sid", sid.as_str()), ("ado", "0")])
        .await;
    assert_eq!(status, StatusCode::OK);
    let lines = response_lines(&body);
    assert_eq!(lines.len(), 3);
    let second_id = lines[2].clone();
    assert_eq!(lines[1], format!("https://beacon.test/?{second_id}"));
    assert_ne!(second_id, first_id);

    let (status, _) = server
        .post_form("/api/stop.php", &[("sid", sid.as_str()), ("lid", first_id.as_str())])
        .await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(server.fetch(&first_id).await.0, StatusCode::NOT_FOUND);
    assert_eq!(
        server.post_location(&sid, "1", "2", "3").await,
        StatusCode::OK
    );
    let (status, view) = server.fetch(&second_id).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["points"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_post_to_unknown_session() {
    let server = TestServer::new();
    let (status, body) = server
        .post_form(
            "/api/post.php",
            &[("sid", "nope"), ("lat", "1"), ("lon", "2"), ("time", "3")],
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, "Session expired!\n");
}

#[tokio::test]
async fn test_post_rejects_out_of_range_coordinates() {
    let server = TestServer::new();
    let (sid, _) = server.create_solo(&[]).await;
    let (status, body) = server
        .post_form(
            "/api/post.php",
            &[("sid", sid.as_str()), ("lat", "91"), ("lon", "2"), ("time", "3")],
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, "Invalid location!\n");
}

// =============================================================================
// Ambient endpoints
// =============================================================================

#[tokio::test]
async fn test_viewer_settings_script() {
    let server = TestServer::with_config(|config| {
        config.viewer.default_zoom = 12;
    });

    let (status, headers, body) = server.get("/dynamic.js.php").await;
    assert_eq!(status, StatusCode::OK);
    assert!(
        headers["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/javascript")
    );
    assert!(body.contains("var DEFAULT_ZOOM = 12;"));
    assert_eq!(body.lines().count(), 10);
}

#[tokio::test]
async fn test_health_check() {
    let server = TestServer::new();
    let (status, headers, body) = server.get("/api/health").await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers.contains_key("x-beacon-version"));

    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["store"], "memory");
}

#[tokio::test]
async fn test_metrics_endpoint_toggle() {
    let enabled = TestServer::new();
    let (status, _, _) = enabled.get("/metrics").await;
    assert_eq!(status, StatusCode::OK);

    let disabled = TestServer::with_config(|config| {
        config.server.metrics_enabled = false;
    });
    let (status, _, _) = disabled.get("/metrics").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_create_rate_limited() {
    let server = TestServer::with_config(|config| {
        config.rate_limit.create_per_window = 2;
    });

    for _ in 0..2 {
        server.create_solo(&[]).await;
    }

    let (status, headers, body) = server
        .post_form_full(
            "/api/create.php",
            &[("dur", "60"), ("int", "1"), ("pwd", TEST_PASSWORD)],
        )
        .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body, "Rate limit exceeded!\n");
    assert!(headers.contains_key("retry-after"));

    // Other operations are not limited.
    let (status, _, _) = server.get("/api/health").await;
    assert_eq!(status, StatusCode::OK);
}

// =============================================================================
// Store failures
// =============================================================================

fn faulty_server() -> (TestServer, Arc<FaultyStore>) {
    let faulty = Arc::new(FaultyStore::new());
    let store: Arc<dyn KvStore> = faulty.clone();
    (TestServer::with_store(store), faulty)
}

#[tokio::test]
async fn test_store_write_failure_is_internal_error() {
    let (server, store) = faulty_server();
    store.fail_sets(SESSION_PREFIX);

    let (status, headers, body) = server
        .post_form_full(
            "/api/create.php",
            &[("dur", "60"), ("int", "1"), ("pwd", TEST_PASSWORD)],
        )
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, "internal error\n");
    assert_eq!(headers["content-type"], "text/plain; charset=utf-8");

    // Backend details stay out of the response.
    assert!(!body.contains("injected"));
    assert_eq!(store.take_writes().len(), 1);
}

#[tokio::test]
async fn test_store_read_failure_is_internal_error() {
    let (server, store) = faulty_server();
    let (sid, share_id) = server.create_solo(&[]).await;
    store.fail_reads(SHARE_PREFIX);

    let (status, _, body) = server.get(&format!("/api/fetch.php?id={share_id}")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, "internal error\n");

    let (status, body) = server
        .post_form("/api/stop.php", &[("sid", sid.as_str())])
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, "internal error\n");

    store.heal();
    let (status, _) = server.fetch(&share_id).await;
    assert_eq!(status, StatusCode::OK);
}
