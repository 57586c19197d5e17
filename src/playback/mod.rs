// # Playback
//
// Controller for a remote, device-based playback service:
//
// - **PlaybackService**: task owning queue, shuffle and transport state
// - **PlaybackHandle**: command API plus snapshot and progress observation
// - **DeviceSession / PlaybackSdk**: the external SDK boundary
// - **PlayApi**: remote play endpoint used for windowed queue playback

pub mod device;
pub mod error;
pub mod progress;
pub mod queue;
pub mod remote;
pub mod sdk;
pub mod service;
pub mod state;

pub use device::{DeviceConfig, DeviceError, DeviceEvent, DeviceSession, TokenSupplier};
pub use error::PlayerError;
pub use progress::PlaybackProgress;
pub use queue::{PlayQueue, PlayWindow, MAX_PLAY_WINDOW};
pub use remote::{PlayApi, PlayOffset, PlayRequest, WebPlayApi};
pub use sdk::{PlaybackSdk, SdkLoader};
pub use service::{PlaybackHandle, PlaybackService, PlayerSettings, Transport};
pub use state::{PlaybackSession, PlaybackState, PlayerSnapshot, TrackInfo};
