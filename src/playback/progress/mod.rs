pub mod handle;

use crate::playback::error::PlayerError;
use crate::playback::state::{PlayerSnapshot, TrackInfo};
pub use handle::PlaybackProgressHandle;

/// Notifications emitted by the playback service
#[derive(Debug, Clone)]
pub enum PlaybackProgress {
    StateChanged {
        snapshot: PlayerSnapshot,
    },
    PositionUpdate {
        position_ms: u32,
        track_uri: Option<String>,
    },
    TrackChanged {
        track: TrackInfo,
        index: Option<usize>,
    },
    Error {
        error: PlayerError,
    },
}
