use crate::playback::device::DeviceTrack;
use crate::playback::error::PlayerError;
use std::time::Duration;

/// Resolution of the locally predicted playback position
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

const TICK_MS: u32 = 1000;
const DEFAULT_VOLUME_PERCENT: u8 = 50;

/// Track metadata projected from device state payloads
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackInfo {
    pub uri: String,
    pub name: String,
    /// Artist names joined with ", "
    pub artist: String,
    pub album: String,
    /// First album image, empty when the device reports none
    pub album_art_url: String,
    pub duration_ms: u32,
}

impl TrackInfo {
    /// URI-only stand-in used until the device reports the real metadata
    pub fn placeholder(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            name: String::new(),
            artist: String::new(),
            album: String::new(),
            album_art_url: String::new(),
            duration_ms: 0,
        }
    }

    pub(crate) fn from_device(track: &DeviceTrack, duration_ms: u32) -> Self {
        Self {
            uri: track.uri.clone(),
            name: track.name.clone(),
            artist: track
                .artists
                .iter()
                .map(|a| a.name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            album: track.album.name.clone(),
            album_art_url: track
                .album
                .images
                .first()
                .map(|image| image.url.clone())
                .unwrap_or_default(),
            duration_ms,
        }
    }
}

/// Connection state of the device session owned by the controller
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaybackSession {
    pub connected: bool,
    pub device_id: Option<String>,
    pub ready: bool,
    pub last_error: Option<PlayerError>,
}

/// Transport state, overwritten by device events and ticked locally in between
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackState {
    pub is_playing: bool,
    pub position_ms: u32,
    pub duration_ms: u32,
    pub current_track: Option<TrackInfo>,
    pub volume_percent: u8,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            is_playing: false,
            position_ms: 0,
            duration_ms: 0,
            current_track: None,
            volume_percent: DEFAULT_VOLUME_PERCENT,
        }
    }
}

impl PlaybackState {
    /// Advance the predicted position by one tick.
    ///
    /// Returns false when nothing moved (paused, or already at the end).
    pub fn tick(&mut self) -> bool {
        if !self.is_playing || self.position_ms >= self.duration_ms {
            return false;
        }
        self.position_ms = self.position_ms.saturating_add(TICK_MS).min(self.duration_ms);
        true
    }
}

/// Everything an observer needs to render the player
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayerSnapshot {
    pub session: PlaybackSession,
    pub playback: PlaybackState,
    pub queue: Vec<String>,
    pub current_index: Option<usize>,
    pub shuffle: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::device::{DeviceAlbum, DeviceImage, NamedRef};

    fn playing(position_ms: u32, duration_ms: u32) -> PlaybackState {
        PlaybackState {
            is_playing: true,
            position_ms,
            duration_ms,
            ..Default::default()
        }
    }

    #[test]
    fn test_tick_advances_one_second_while_playing() {
        let mut state = playing(0, 10_000);
        assert!(state.tick());
        assert_eq!(state.position_ms, 1000);
    }

    #[test]
    fn test_tick_never_passes_duration() {
        let mut state = playing(9_500, 10_000);
        assert!(state.tick());
        assert_eq!(state.position_ms, 10_000);
        assert!(!state.tick());
        assert_eq!(state.position_ms, 10_000);
    }

    #[test]
    fn test_tick_is_inert_when_paused() {
        let mut state = playing(2_000, 10_000);
        state.is_playing = false;
        assert!(!state.tick());
        assert_eq!(state.position_ms, 2_000);
    }

    #[test]
    fn test_track_info_from_device_joins_artists() {
        let track = DeviceTrack {
            uri: "spotify:track:1".to_string(),
            name: "Song".to_string(),
            artists: vec![
                NamedRef {
                    name: "A".to_string(),
                },
                NamedRef {
                    name: "B".to_string(),
                },
            ],
            album: DeviceAlbum {
                name: "Record".to_string(),
                images: vec![
                    DeviceImage {
                        url: "https://img/large".to_string(),
                    },
                    DeviceImage {
                        url: "https://img/small".to_string(),
                    },
                ],
            },
        };

        let info = TrackInfo::from_device(&track, 180_000);
        assert_eq!(info.artist, "A, B");
        assert_eq!(info.album, "Record");
        assert_eq!(info.album_art_url, "https://img/large");
        assert_eq!(info.duration_ms, 180_000);
    }

    #[test]
    fn test_track_info_without_images_has_empty_art() {
        let track = DeviceTrack {
            uri: "spotify:track:2".to_string(),
            name: "Bare".to_string(),
            artists: vec![],
            album: DeviceAlbum {
                name: "Untitled".to_string(),
                images: vec![],
            },
        };

        let info = TrackInfo::from_device(&track, 1);
        assert_eq!(info.album_art_url, "");
        assert_eq!(info.artist, "");
    }
}
