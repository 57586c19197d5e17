mod support;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::put;
use axum::{Json, Router};
use serde_json::{json, Value};

use crate::support::{spawn_server, tracing_init};
use synctify::playback::{PlayApi, PlayQueue, PlayRequest, PlayerError, WebPlayApi};

#[derive(Debug, Clone)]
struct CapturedPlay {
    device_id: Option<String>,
    authorization: Option<String>,
    body: Value,
}

#[derive(Clone)]
struct MockPlayer {
    captured: Arc<Mutex<Vec<CapturedPlay>>>,
    status: StatusCode,
    response_body: String,
}

async fn play_handler(
    State(mock): State<MockPlayer>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, String) {
    mock.captured.lock().unwrap().push(CapturedPlay {
        device_id: query.get("device_id").cloned(),
        authorization: headers
            .get("authorization")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string),
        body,
    });
    (mock.status, mock.response_body.clone())
}

/// Start a mock play endpoint answering every request with `status` and `body`
async fn mock_player(
    status: StatusCode,
    body: &str,
) -> (WebPlayApi, Arc<Mutex<Vec<CapturedPlay>>>) {
    tracing_init();
    let captured = Arc::new(Mutex::new(Vec::new()));
    let mock = MockPlayer {
        captured: captured.clone(),
        status,
        response_body: body.to_string(),
    };
    let router = Router::new()
        .route("/me/player/play", put(play_handler))
        .with_state(mock);
    let base_url = spawn_server(router).await;
    (WebPlayApi::new(base_url), captured)
}

#[tokio::test]
async fn test_windowed_play_sends_uris_offset_and_auth() {
    let (api, captured) = mock_player(StatusCode::NO_CONTENT, "").await;

    let mut queue = PlayQueue::new();
    queue.replace((0..60).map(|i| format!("spotify:track:{}", i)).collect());
    let request = queue.window(30).unwrap().into_request();

    api.play("device-7", "token-abc", &request).await.unwrap();

    let captured = captured.lock().unwrap().clone();
    assert_eq!(captured.len(), 1);
    let play = &captured[0];
    assert_eq!(play.device_id.as_deref(), Some("device-7"));
    assert_eq!(play.authorization.as_deref(), Some("Bearer token-abc"));

    let uris = play.body["uris"].as_array().unwrap();
    assert_eq!(uris.len(), 50);
    assert_eq!(uris[0], "spotify:track:5");
    assert_eq!(play.body["offset"], json!({ "position": 25 }));
}

#[tokio::test]
async fn test_single_track_play_has_no_offset() {
    let (api, captured) = mock_player(StatusCode::OK, "").await;

    api.play("device-1", "token", &PlayRequest::single("spotify:track:solo"))
        .await
        .unwrap();

    let captured = captured.lock().unwrap().clone();
    assert_eq!(captured[0].body, json!({ "uris": ["spotify:track:solo"] }));
}

#[tokio::test]
async fn test_rejected_play_reports_server_message() {
    let (api, _captured) = mock_player(
        StatusCode::FORBIDDEN,
        r#"{"error":{"status":403,"message":"Player command failed: Restriction violated"}}"#,
    )
    .await;

    let result = api
        .play("device-1", "token", &PlayRequest::single("spotify:track:x"))
        .await;

    assert_eq!(
        result,
        Err(PlayerError::PlaybackCommandFailed(
            "Player command failed: Restriction violated".to_string()
        ))
    );
}

#[tokio::test]
async fn test_rejected_play_without_message_is_generic() {
    let (api, _captured) = mock_player(StatusCode::BAD_GATEWAY, "upstream down").await;

    let result = api
        .play("device-1", "token", &PlayRequest::single("spotify:track:x"))
        .await;

    assert_eq!(
        result,
        Err(PlayerError::PlaybackCommandFailed(
            "Failed to play track".to_string()
        ))
    );
}
