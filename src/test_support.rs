// Test support utilities for both unit and integration tests

use crate::playback::device::{DeviceConfig, DeviceError, DeviceEvent, DeviceEventSender};
use crate::playback::{DeviceSession, PlayApi, PlayRequest, PlaybackSdk, PlayerError};
use crate::sync::Notifier;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// How `FakeSdk::load` behaves
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SdkBehavior {
    Loads,
    /// `load` never completes
    NeverLoads,
    Fails(String),
}

/// In-memory playback SDK.
///
/// Every `create_player` call produces a `FakeDevice` that is kept for
/// inspection.
pub struct FakeSdk {
    behavior: SdkBehavior,
    connect_result: Result<bool, DeviceError>,
    load_calls: AtomicUsize,
    devices: Mutex<Vec<Arc<FakeDevice>>>,
}

impl Default for FakeSdk {
    fn default() -> Self {
        Self::with_behavior(SdkBehavior::Loads)
    }
}

impl FakeSdk {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_behavior(behavior: SdkBehavior) -> Self {
        FakeSdk {
            behavior,
            connect_result: Ok(true),
            load_calls: AtomicUsize::new(0),
            devices: Mutex::new(Vec::new()),
        }
    }

    /// Result every created device returns from `connect`
    pub fn with_connect_result(mut self, result: Result<bool, DeviceError>) -> Self {
        self.connect_result = result;
        self
    }

    pub fn load_calls(&self) -> usize {
        self.load_calls.load(Ordering::SeqCst)
    }

    pub fn players_created(&self) -> usize {
        self.devices.lock().unwrap().len()
    }

    /// Most recently created device
    pub fn device(&self) -> Option<Arc<FakeDevice>> {
        self.devices.lock().unwrap().last().cloned()
    }
}

#[async_trait::async_trait]
impl PlaybackSdk for FakeSdk {
    async fn load(&self) -> Result<(), DeviceError> {
        self.load_calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            SdkBehavior::Loads => Ok(()),
            SdkBehavior::NeverLoads => std::future::pending().await,
            SdkBehavior::Fails(message) => Err(DeviceError::new(message.clone())),
        }
    }

    fn create_player(
        &self,
        config: DeviceConfig,
        events: DeviceEventSender,
    ) -> Arc<dyn DeviceSession> {
        let device = Arc::new(FakeDevice {
            config,
            events,
            connect_result: self.connect_result.clone(),
            failure: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        });
        self.devices.lock().unwrap().push(device.clone());
        device
    }
}

/// A control call received by a `FakeDevice`
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCall {
    Connect,
    TogglePlay,
    Pause,
    Resume,
    Seek(u32),
    SetVolume(f32),
    NextTrack,
    PreviousTrack,
    Disconnect,
}

/// Device session that records calls and lets tests emit device events
pub struct FakeDevice {
    config: DeviceConfig,
    events: DeviceEventSender,
    connect_result: Result<bool, DeviceError>,
    failure: Mutex<Option<DeviceError>>,
    calls: Mutex<Vec<DeviceCall>>,
}

impl FakeDevice {
    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// Token the device would use right now
    pub fn token(&self) -> Option<String> {
        (self.config.token_supplier)()
    }

    /// Deliver an event as if the SDK emitted it
    pub fn emit(&self, event: DeviceEvent) {
        let _ = self.events.send(event);
    }

    /// Make every control call after this one fail with `message`
    pub fn fail_commands(&self, message: &str) {
        *self.failure.lock().unwrap() = Some(DeviceError::new(message));
    }

    pub fn calls(&self) -> Vec<DeviceCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: DeviceCall) -> Result<(), DeviceError> {
        self.calls.lock().unwrap().push(call);
        match self.failure.lock().unwrap().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait::async_trait]
impl DeviceSession for FakeDevice {
    async fn connect(&self) -> Result<bool, DeviceError> {
        self.calls.lock().unwrap().push(DeviceCall::Connect);
        self.connect_result.clone()
    }

    async fn toggle_play(&self) -> Result<(), DeviceError> {
        self.record(DeviceCall::TogglePlay)
    }

    async fn pause(&self) -> Result<(), DeviceError> {
        self.record(DeviceCall::Pause)
    }

    async fn resume(&self) -> Result<(), DeviceError> {
        self.record(DeviceCall::Resume)
    }

    async fn seek(&self, position_ms: u32) -> Result<(), DeviceError> {
        self.record(DeviceCall::Seek(position_ms))
    }

    async fn set_volume(&self, volume: f32) -> Result<(), DeviceError> {
        self.record(DeviceCall::SetVolume(volume))
    }

    async fn next_track(&self) -> Result<(), DeviceError> {
        self.record(DeviceCall::NextTrack)
    }

    async fn previous_track(&self) -> Result<(), DeviceError> {
        self.record(DeviceCall::PreviousTrack)
    }

    async fn disconnect(&self) {
        self.calls.lock().unwrap().push(DeviceCall::Disconnect);
    }
}

/// A play request received by `RecordingPlayApi`
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedPlay {
    pub device_id: String,
    pub access_token: String,
    pub request: PlayRequest,
}

/// `PlayApi` that records requests and answers with queued results.
///
/// Requests succeed once the queued results run out.
#[derive(Default)]
pub struct RecordingPlayApi {
    requests: Mutex<Vec<RecordedPlay>>,
    results: Mutex<VecDeque<Result<(), PlayerError>>>,
}

impl RecordingPlayApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer the next unanswered request with `result`
    pub fn push_result(&self, result: Result<(), PlayerError>) {
        self.results.lock().unwrap().push_back(result);
    }

    pub fn requests(&self) -> Vec<RecordedPlay> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> Option<PlayRequest> {
        self.requests
            .lock()
            .unwrap()
            .last()
            .map(|recorded| recorded.request.clone())
    }
}

#[async_trait::async_trait]
impl PlayApi for RecordingPlayApi {
    async fn play(
        &self,
        device_id: &str,
        access_token: &str,
        request: &PlayRequest,
    ) -> Result<(), PlayerError> {
        self.requests.lock().unwrap().push(RecordedPlay {
            device_id: device_id.to_string(),
            access_token: access_token.to_string(),
            request: request.clone(),
        });
        self.results.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }
}

/// `Notifier` that keeps every message
#[derive(Default)]
pub struct RecordingNotifier {
    successes: Mutex<Vec<String>>,
    errors: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn successes(&self) -> Vec<String> {
        self.successes.lock().unwrap().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn success(&self, message: &str) {
        self.successes.lock().unwrap().push(message.to_string());
    }

    fn error(&self, message: &str) {
        self.errors.lock().unwrap().push(message.to_string());
    }
}
