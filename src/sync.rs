// # Sync Notifications
//
// Applies events from the user's private notification channel to the
// session: channel connection state, and completion of a background
// liked-songs sync.

use crate::session::SharedSession;
use chrono::{DateTime, Local, NaiveDateTime};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

const LAST_SYNC_FORMAT: &str = "%d/%m/%Y %H:%M";
const SYNC_OK: u16 = 200;

/// Name of the private channel carrying a user's notifications
pub fn channel_name(user_id: &str) -> String {
    format!("private-user-{}", user_id)
}

/// Surface that shows transient messages to the user
pub trait Notifier: Send + Sync {
    fn success(&self, message: &str);
    fn error(&self, message: &str);
}

/// `Notifier` that only logs
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn success(&self, message: &str) {
        info!("{}", message);
    }

    fn error(&self, message: &str) {
        warn!("{}", message);
    }
}

/// Status of a sync: a message on success, a nested object on failure
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum SyncStatus {
    Message(String),
    Detail { status: String },
}

impl SyncStatus {
    pub fn message(&self) -> &str {
        match self {
            SyncStatus::Message(message) => message,
            SyncStatus::Detail { status } => status,
        }
    }
}

/// Payload of `SyncLikedSongsCompleted`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SyncCompleted {
    #[serde(default)]
    pub status_code: Option<u16>,
    #[serde(default)]
    pub status: Option<SyncStatus>,
    #[serde(default)]
    pub current_time: Option<String>,
}

/// Events delivered on the notification channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// Subscription accepted or connection established
    Connected,
    /// Connection error, failure or disconnect
    Disconnected,
    SyncCompleted(SyncCompleted),
}

impl ChannelEvent {
    /// Narrow a raw channel event; Ok(None) for names that carry no meaning here
    pub fn parse(name: &str, payload: serde_json::Value) -> Result<Option<Self>, serde_json::Error> {
        let event = match name {
            "pusher:subscription_succeeded" | "pusher:connection_established" => {
                ChannelEvent::Connected
            }
            "pusher:connection_error" | "failed" | "disconnected" => ChannelEvent::Disconnected,
            "SyncLikedSongsCompleted" => ChannelEvent::SyncCompleted(serde_json::from_value(payload)?),
            _ => return Ok(None),
        };
        Ok(Some(event))
    }
}

/// Result of handling a sync completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Completed {
        message: String,
        last_sync: Option<String>,
    },
    Failed {
        message: String,
    },
}

/// Applies channel events to the session and reports them to the user
#[derive(Clone)]
pub struct SyncListener {
    session: SharedSession,
    notifier: Arc<dyn Notifier>,
}

impl SyncListener {
    pub fn new(session: SharedSession, notifier: Arc<dyn Notifier>) -> Self {
        Self { session, notifier }
    }

    /// Parse and apply a raw channel event
    pub fn handle_raw(&self, name: &str, payload: serde_json::Value) -> Option<SyncOutcome> {
        match ChannelEvent::parse(name, payload) {
            Ok(Some(event)) => self.handle(event),
            Ok(None) => {
                debug!("Ignoring channel event '{}'", name);
                None
            }
            Err(e) => {
                warn!("Malformed '{}' payload: {}", name, e);
                None
            }
        }
    }

    pub fn handle(&self, event: ChannelEvent) -> Option<SyncOutcome> {
        match event {
            ChannelEvent::Connected => {
                info!("Notification channel connected");
                self.session.update(|user| user.pusher_authenticated = true);
                None
            }
            ChannelEvent::Disconnected => {
                warn!("Notification channel disconnected");
                self.session.update(|user| user.pusher_authenticated = false);
                None
            }
            ChannelEvent::SyncCompleted(payload) => Some(self.sync_completed(&payload)),
        }
    }

    fn sync_completed(&self, payload: &SyncCompleted) -> SyncOutcome {
        let message = payload
            .status
            .as_ref()
            .map(|status| status.message().to_string())
            .unwrap_or_default();

        let succeeded = payload.status_code == Some(SYNC_OK)
            && matches!(&payload.status, Some(SyncStatus::Message(m)) if !m.is_empty());
        if !succeeded {
            warn!(
                "Sync failed (status code {:?}): {}",
                payload.status_code, message
            );
            self.notifier.error(&message);
            return SyncOutcome::Failed { message };
        }

        let last_sync = payload.current_time.as_deref().and_then(format_last_sync);
        if last_sync.is_none() {
            warn!("Unreadable sync time: {:?}", payload.current_time);
        }

        self.session.update(|user| {
            if let Some(last_sync) = &last_sync {
                user.last_sync = Some(last_sync.clone());
            }
            user.fetch_songs_now = true;
        });
        info!("Sync completed at {:?}", last_sync);
        self.notifier.success(&message);

        SyncOutcome::Completed { message, last_sync }
    }
}

/// Format a sync timestamp as `dd/mm/yyyy HH:MM` in local time.
///
/// Accepts RFC 3339 timestamps and zone-less `YYYY-MM-DD HH:MM:SS` values,
/// the latter taken as already local.
pub fn format_last_sync(raw: &str) -> Option<String> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Local).format(LAST_SYNC_FORMAT).to_string());
    }
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.format(LAST_SYNC_FORMAT).to_string())
}
