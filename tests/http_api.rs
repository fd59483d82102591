// ==============================================
// HTTP API TESTS (integration)
// ==============================================
//
// Drives the node router the way a remote peer would, including the
// percent-encoding round trip the peer client performs.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use tower::util::ServiceExt;

use peercache::error::BoxError;
use peercache::group::new_group;
use peercache::http::router;

async fn get(uri: &str) -> (StatusCode, Vec<u8>) {
    let response = router()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec();
    (status, body)
}

#[tokio::test]
async fn value_round_trips_as_octet_stream() {
    new_group("api-octet", 2048, |key: &str| -> Result<Vec<u8>, BoxError> {
        match key {
            "Tom" => Ok(b"630".to_vec()),
            _ => Err(format!("{key} not exist").into()),
        }
    });

    let response = router()
        .oneshot(
            Request::builder()
                .uri("/_peercache/api-octet/Tom")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/octet-stream");
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&body[..], b"630");
}

#[tokio::test]
async fn percent_encoded_keys_are_decoded_before_lookup() {
    new_group("api-encoded", 2048, |key: &str| -> Result<Vec<u8>, BoxError> {
        Ok(format!("echo:{key}").into_bytes())
    });

    // The peer client encodes "user 42/a" as a single path segment.
    let (status, body) = get("/_peercache/api-encoded/user%2042%2Fa").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"echo:user 42/a");
}

#[tokio::test]
async fn zero_length_values_ship_as_empty_bodies() {
    new_group("api-empty", 2048, |_: &str| -> Result<Vec<u8>, BoxError> {
        Ok(Vec::new())
    });

    let (status, body) = get("/_peercache/api-empty/whatever").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.is_empty());
}

#[tokio::test]
async fn loader_failure_maps_to_500_with_json_error() {
    new_group("api-loader-error", 2048, |key: &str| -> Result<Vec<u8>, BoxError> {
        Err(format!("{key} not exist").into())
    });

    let (status, body) = get("/_peercache/api-loader-error/Zoe").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let error: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(error["error"].as_str().unwrap().contains("Zoe"));
}

#[tokio::test]
async fn unknown_group_maps_to_404() {
    let (status, _) = get("/_peercache/api-no-such-group/key").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn health_and_stats_endpoints_respond() {
    let group = new_group("api-stats", 2048, |_: &str| -> Result<Vec<u8>, BoxError> {
        Ok(b"v".to_vec())
    });
    group.get("k").unwrap();

    let (status, _) = get("/health").await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = get("/stats/api-stats").await;
    assert_eq!(status, StatusCode::OK);
    let stats: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(stats["entries"], 1);
    assert_eq!(stats["metrics"]["inserts"], 1);
}
