// # Device Session
//
// Boundary to the external device-based playback SDK. The SDK delivers
// loosely typed events by name; they are narrowed into `DeviceEvent` here
// before they reach the controller's state machine.

use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

/// Returns the session's current access token each time it is called
pub type TokenSupplier = Arc<dyn Fn() -> Option<String> + Send + Sync>;

/// Channel the SDK uses to deliver device events to the controller
pub type DeviceEventSender = mpsc::UnboundedSender<DeviceEvent>;

/// Failure reported by the SDK for a control call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct DeviceError {
    pub message: String,
}

impl DeviceError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Construction parameters for a device session
#[derive(Clone)]
pub struct DeviceConfig {
    /// Name the device advertises to the remote service
    pub name: String,
    pub token_supplier: TokenSupplier,
    /// Initial volume as a fraction in 0.0..=1.0
    pub initial_volume: f32,
}

impl std::fmt::Debug for DeviceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceConfig")
            .field("name", &self.name)
            .field("token_supplier", &"<fn>")
            .field("initial_volume", &self.initial_volume)
            .finish()
    }
}

/// Control surface of a connected playback device
#[async_trait::async_trait]
pub trait DeviceSession: Send + Sync {
    /// Returns Ok(false) when the SDK declined to connect
    async fn connect(&self) -> Result<bool, DeviceError>;
    async fn toggle_play(&self) -> Result<(), DeviceError>;
    async fn pause(&self) -> Result<(), DeviceError>;
    async fn resume(&self) -> Result<(), DeviceError>;
    async fn seek(&self, position_ms: u32) -> Result<(), DeviceError>;
    /// `volume` is a fraction in 0.0..=1.0
    async fn set_volume(&self, volume: f32) -> Result<(), DeviceError>;
    async fn next_track(&self) -> Result<(), DeviceError>;
    async fn previous_track(&self) -> Result<(), DeviceError>;
    async fn disconnect(&self);
}

/// Events emitted by the device, one variant per SDK event name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    Ready { device_id: String },
    NotReady { device_id: String },
    /// `None` when the SDK reports a null state (e.g. playback moved elsewhere)
    StateChanged(Option<DeviceState>),
    InitializationError { message: String },
    AuthenticationError { message: String },
    AccountError { message: String },
}

impl DeviceEvent {
    /// Narrow a raw SDK event.
    ///
    /// Returns Ok(None) for event names the controller does not handle.
    pub fn parse(name: &str, payload: serde_json::Value) -> Result<Option<Self>, serde_json::Error> {
        let event = match name {
            "ready" => {
                let DeviceIdPayload { device_id } = serde_json::from_value(payload)?;
                DeviceEvent::Ready { device_id }
            }
            "not_ready" => {
                let DeviceIdPayload { device_id } = serde_json::from_value(payload)?;
                DeviceEvent::NotReady { device_id }
            }
            "player_state_changed" => {
                DeviceEvent::StateChanged(serde_json::from_value::<Option<DeviceState>>(payload)?)
            }
            "initialization_error" => {
                let ErrorPayload { message } = serde_json::from_value(payload)?;
                DeviceEvent::InitializationError { message }
            }
            "authentication_error" => {
                let ErrorPayload { message } = serde_json::from_value(payload)?;
                DeviceEvent::AuthenticationError { message }
            }
            "account_error" => {
                let ErrorPayload { message } = serde_json::from_value(payload)?;
                DeviceEvent::AccountError { message }
            }
            _ => return Ok(None),
        };
        Ok(Some(event))
    }
}

#[derive(Debug, Deserialize)]
struct DeviceIdPayload {
    device_id: String,
}

#[derive(Debug, Deserialize)]
struct ErrorPayload {
    message: String,
}

/// Playback state as reported by the device
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeviceState {
    pub paused: bool,
    pub position: u32,
    pub duration: u32,
    #[serde(default)]
    pub track_window: Option<TrackWindow>,
}

impl DeviceState {
    pub fn current_track(&self) -> Option<&DeviceTrack> {
        self.track_window
            .as_ref()
            .and_then(|window| window.current_track.as_ref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TrackWindow {
    #[serde(default)]
    pub current_track: Option<DeviceTrack>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeviceTrack {
    pub uri: String,
    pub name: String,
    #[serde(default)]
    pub artists: Vec<NamedRef>,
    pub album: DeviceAlbum,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NamedRef {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeviceAlbum {
    pub name: String,
    #[serde(default)]
    pub images: Vec<DeviceImage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeviceImage {
    pub url: String,
}
