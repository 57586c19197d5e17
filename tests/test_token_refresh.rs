mod support;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use crate::support::{spawn_server, tracing_init};
use synctify::api::{ApiClient, ApiError};
use synctify::playback::PlayerError;
use synctify::session::{SharedSession, User, UserSettings};

/// Backend that accepts `valid_token` only and hands out `issued_token` on refresh
#[derive(Clone)]
struct MockBackend {
    valid_token: String,
    issued_token: String,
    refresh_status: StatusCode,
    refresh_calls: Arc<AtomicUsize>,
    refresh_bodies: Arc<Mutex<Vec<Value>>>,
    resource_calls: Arc<AtomicUsize>,
}

async fn refresh_handler(
    State(backend): State<MockBackend>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    backend.refresh_calls.fetch_add(1, Ordering::SeqCst);
    backend.refresh_bodies.lock().unwrap().push(body);
    if backend.refresh_status != StatusCode::OK {
        return (backend.refresh_status, Json(json!({ "error": "nope" })));
    }
    (
        StatusCode::OK,
        Json(json!({ "new_access_token": backend.issued_token })),
    )
}

async fn songs_handler(State(backend): State<MockBackend>, headers: HeaderMap) -> StatusCode {
    backend.resource_calls.fetch_add(1, Ordering::SeqCst);
    let expected = format!("Bearer {}", backend.valid_token);
    match headers.get("authorization").and_then(|v| v.to_str().ok()) {
        Some(value) if value == expected => StatusCode::OK,
        _ => StatusCode::UNAUTHORIZED,
    }
}

struct Fixture {
    client: ApiClient,
    session: SharedSession,
    backend: MockBackend,
}

impl Fixture {
    async fn new(valid_token: &str, issued_token: &str, refresh_status: StatusCode) -> Self {
        tracing_init();
        let backend = MockBackend {
            valid_token: valid_token.to_string(),
            issued_token: issued_token.to_string(),
            refresh_status,
            refresh_calls: Arc::new(AtomicUsize::new(0)),
            refresh_bodies: Arc::new(Mutex::new(Vec::new())),
            resource_calls: Arc::new(AtomicUsize::new(0)),
        };
        let router = Router::new()
            .route("/refresh_token", post(refresh_handler))
            .route("/api/songs", get(songs_handler))
            .with_state(backend.clone());
        let base_url = spawn_server(router).await;

        let session = SharedSession::new(User {
            settings: UserSettings {
                redirect_uri: "http://localhost:3000/callback".to_string(),
                client_id: "client-id".to_string(),
                client_secret: "client-secret".to_string(),
            },
            access_token: Some("expired".to_string()),
            refresh_token: Some("refresh-1".to_string()),
            id: Some("42".to_string()),
            ..Default::default()
        });
        let client = ApiClient::new(base_url, session.clone());

        Self {
            client,
            session,
            backend,
        }
    }

    async fn get_songs(&self) -> Result<reqwest::StatusCode, ApiError> {
        let url = self.client.url("api/songs");
        self.client
            .send_authorized(|http| http.get(&url))
            .await
            .map(|response| response.status())
    }
}

#[tokio::test]
async fn test_unauthorized_request_refreshes_once_and_retries() {
    let fixture = Fixture::new("fresh", "fresh", StatusCode::OK).await;

    let status = fixture.get_songs().await.unwrap();

    assert_eq!(status, reqwest::StatusCode::OK);
    assert_eq!(fixture.backend.refresh_calls.load(Ordering::SeqCst), 1);
    assert_eq!(fixture.backend.resource_calls.load(Ordering::SeqCst), 2);
    assert_eq!(fixture.session.access_token().as_deref(), Some("fresh"));

    let bodies = fixture.backend.refresh_bodies.lock().unwrap().clone();
    assert_eq!(
        bodies[0],
        json!({
            "refresh_token": "refresh-1",
            "user_id": "42",
            "client_id": "client-id",
            "client_secret": "client-secret"
        })
    );
}

#[tokio::test]
async fn test_valid_token_does_not_refresh() {
    let fixture = Fixture::new("expired", "unused", StatusCode::OK).await;

    let status = fixture.get_songs().await.unwrap();

    assert_eq!(status, reqwest::StatusCode::OK);
    assert_eq!(fixture.backend.refresh_calls.load(Ordering::SeqCst), 0);
    assert_eq!(fixture.backend.resource_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_second_unauthorized_is_refresh_failure() {
    // Refresh hands out a token the backend still rejects
    let fixture = Fixture::new("other", "still-wrong", StatusCode::OK).await;

    let result = fixture.get_songs().await;

    assert!(matches!(result, Err(ApiError::TokenRefreshFailed)));
    assert_eq!(fixture.backend.refresh_calls.load(Ordering::SeqCst), 1);
    assert_eq!(fixture.backend.resource_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_rejected_refresh_keeps_old_token() {
    let fixture = Fixture::new("fresh", "fresh", StatusCode::INTERNAL_SERVER_ERROR).await;

    let result = fixture.get_songs().await;

    assert!(matches!(result, Err(ApiError::TokenRefreshFailed)));
    assert_eq!(fixture.session.access_token().as_deref(), Some("expired"));
    assert_eq!(fixture.backend.resource_calls.load(Ordering::SeqCst), 1);

    let player_error: PlayerError = result.unwrap_err().into();
    assert_eq!(player_error, PlayerError::TokenRefreshFailed);
}
