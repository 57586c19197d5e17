use crate::playback::device::{DeviceConfig, DeviceEvent, DeviceSession, DeviceState};
use crate::playback::error::PlayerError;
use crate::playback::progress::{PlaybackProgress, PlaybackProgressHandle};
use crate::playback::queue::PlayQueue;
use crate::playback::remote::{PlayApi, PlayRequest};
use crate::playback::sdk::{PlaybackSdk, SdkLoader};
use crate::playback::state::{
    PlaybackSession, PlaybackState, PlayerSnapshot, TrackInfo, TICK_INTERVAL,
};
use crate::session::SharedSession;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc as tokio_mpsc;
use tokio::sync::{oneshot, watch};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

type Reply<T = ()> = oneshot::Sender<Result<T, PlayerError>>;

/// Settings the controller needs to create a device session
#[derive(Debug, Clone)]
pub struct PlayerSettings {
    /// Name the device advertises to the remote service
    pub device_name: String,
    /// Volume applied when the device is created, 0–100
    pub initial_volume: u8,
    pub sdk_load_timeout: Duration,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            device_name: "Synctify Web Player".to_string(),
            initial_volume: 50,
            sdk_load_timeout: Duration::from_secs(20),
        }
    }
}

/// Native device control calls
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transport {
    TogglePlay,
    Pause,
    Resume,
    Seek(u32),
    SetVolume(u8),
    Next,
    Previous,
}

/// Commands sent to the service
enum PlaybackCommand {
    Init(Reply),
    SetQueue(Vec<String>),
    PlayTrack {
        uri: String,
        queue: Option<Vec<String>>,
        reply: Reply,
    },
    PlayFromQueue {
        index: usize,
        reply: Reply,
    },
    Transport {
        op: Transport,
        reply: Reply,
    },
    NextTrack(Reply),
    PreviousTrack(Reply),
    ToggleShuffle(Reply<bool>),
    Disconnect(Reply),
    Snapshot(Reply<PlayerSnapshot>),
}

/// Completion of a spawned play request
struct PlayOutcome {
    target_uri: String,
    result: Result<(), PlayerError>,
    reply: Reply,
}

/// Handle to the playback service for sending commands and observing state
#[derive(Clone)]
pub struct PlaybackHandle {
    command_tx: tokio_mpsc::UnboundedSender<PlaybackCommand>,
    progress_handle: PlaybackProgressHandle,
    snapshot_rx: watch::Receiver<PlayerSnapshot>,
}

impl PlaybackHandle {
    async fn request<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> PlaybackCommand,
    ) -> Result<T, PlayerError> {
        let (tx, rx) = oneshot::channel();
        self.command_tx
            .send(build(tx))
            .map_err(|_| PlayerError::ServiceStopped)?;
        rx.await.map_err(|_| PlayerError::ServiceStopped)?
    }

    /// Load the SDK, create the device session and connect it.
    ///
    /// A no-op while a session from an earlier successful call is alive.
    pub async fn init_player(&self) -> Result<(), PlayerError> {
        self.request(PlaybackCommand::Init).await
    }

    /// Replace the queue without touching current playback
    pub fn set_queue(&self, uris: Vec<String>) -> Result<(), PlayerError> {
        self.command_tx
            .send(PlaybackCommand::SetQueue(uris))
            .map_err(|_| {
                warn!("Queue update dropped, playback service is not running");
                PlayerError::ServiceStopped
            })
    }

    /// Play `uri`, optionally making `queue` the active queue
    pub async fn play_track(
        &self,
        uri: impl Into<String>,
        queue: Option<Vec<String>>,
    ) -> Result<(), PlayerError> {
        let uri = uri.into();
        self.request(|reply| PlaybackCommand::PlayTrack { uri, queue, reply })
            .await
    }

    /// Play the queue entry at `index`; out-of-range indices are ignored
    pub async fn play_track_from_queue(&self, index: usize) -> Result<(), PlayerError> {
        self.request(|reply| PlaybackCommand::PlayFromQueue { index, reply })
            .await
    }

    async fn transport(&self, op: Transport) -> Result<(), PlayerError> {
        self.request(|reply| PlaybackCommand::Transport { op, reply })
            .await
    }

    pub async fn toggle_play(&self) -> Result<(), PlayerError> {
        self.transport(Transport::TogglePlay).await
    }

    pub async fn pause(&self) -> Result<(), PlayerError> {
        self.transport(Transport::Pause).await
    }

    pub async fn resume(&self) -> Result<(), PlayerError> {
        self.transport(Transport::Resume).await
    }

    pub async fn seek(&self, position_ms: u32) -> Result<(), PlayerError> {
        self.transport(Transport::Seek(position_ms)).await
    }

    /// `percent` is clamped to 0–100
    pub async fn set_volume(&self, percent: u8) -> Result<(), PlayerError> {
        self.transport(Transport::SetVolume(percent)).await
    }

    pub async fn next_track(&self) -> Result<(), PlayerError> {
        self.request(PlaybackCommand::NextTrack).await
    }

    pub async fn previous_track(&self) -> Result<(), PlayerError> {
        self.request(PlaybackCommand::PreviousTrack).await
    }

    /// Flip shuffle; returns whether shuffle is now enabled
    pub async fn toggle_shuffle(&self) -> Result<bool, PlayerError> {
        self.request(PlaybackCommand::ToggleShuffle).await
    }

    /// Release the device session. Commands needing a device fail until the
    /// next `init_player`.
    pub async fn disconnect(&self) -> Result<(), PlayerError> {
        self.request(PlaybackCommand::Disconnect).await
    }

    /// Latest published state
    pub fn snapshot(&self) -> PlayerSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// State after every device event delivered so far has been applied
    pub async fn current_state(&self) -> Result<PlayerSnapshot, PlayerError> {
        self.request(PlaybackCommand::Snapshot).await
    }

    /// Receiver that is notified whenever the state changes
    pub fn watch_state(&self) -> watch::Receiver<PlayerSnapshot> {
        self.snapshot_rx.clone()
    }

    pub fn subscribe_progress(&self) -> tokio_mpsc::UnboundedReceiver<PlaybackProgress> {
        self.progress_handle.subscribe_all()
    }
}

/// Playback controller: owns queue, session and transport state and bridges
/// device events with user commands
pub struct PlaybackService {
    settings: PlayerSettings,
    user_session: SharedSession,
    sdk: SdkLoader,
    play_api: Arc<dyn PlayApi>,
    command_rx: tokio_mpsc::UnboundedReceiver<PlaybackCommand>,
    /// Events of the live device session only; replaced per session
    device_events_rx: Option<tokio_mpsc::UnboundedReceiver<DeviceEvent>>,
    outcome_tx: tokio_mpsc::UnboundedSender<PlayOutcome>,
    outcome_rx: tokio_mpsc::UnboundedReceiver<PlayOutcome>,
    progress_tx: tokio_mpsc::UnboundedSender<PlaybackProgress>,
    snapshot_tx: watch::Sender<PlayerSnapshot>,
    initialized: bool,
    device: Option<Arc<dyn DeviceSession>>,
    session: PlaybackSession,
    playback: PlaybackState,
    queue: PlayQueue,
    ticker: Option<Interval>,
    rng: StdRng,
}

impl PlaybackService {
    pub fn start(
        settings: PlayerSettings,
        user_session: SharedSession,
        sdk: Arc<dyn PlaybackSdk>,
        play_api: Arc<dyn PlayApi>,
        runtime_handle: tokio::runtime::Handle,
    ) -> PlaybackHandle {
        Self::start_with_rng(
            settings,
            user_session,
            sdk,
            play_api,
            StdRng::from_entropy(),
            runtime_handle,
        )
    }

    /// Like `start`, with a caller-provided shuffle RNG
    pub fn start_with_rng(
        settings: PlayerSettings,
        user_session: SharedSession,
        sdk: Arc<dyn PlaybackSdk>,
        play_api: Arc<dyn PlayApi>,
        rng: StdRng,
        runtime_handle: tokio::runtime::Handle,
    ) -> PlaybackHandle {
        let (command_tx, command_rx) = tokio_mpsc::unbounded_channel();
        let (progress_tx, progress_rx) = tokio_mpsc::unbounded_channel();
        let (outcome_tx, outcome_rx) = tokio_mpsc::unbounded_channel();

        let playback = PlaybackState {
            volume_percent: settings.initial_volume.min(100),
            ..Default::default()
        };
        let (snapshot_tx, snapshot_rx) = watch::channel(PlayerSnapshot {
            playback: playback.clone(),
            ..Default::default()
        });

        let progress_handle = PlaybackProgressHandle::new(progress_rx, runtime_handle.clone());

        let handle = PlaybackHandle {
            command_tx,
            progress_handle,
            snapshot_rx,
        };

        let service = PlaybackService {
            sdk: SdkLoader::new(sdk, settings.sdk_load_timeout),
            settings,
            user_session,
            play_api,
            command_rx,
            device_events_rx: None,
            outcome_tx,
            outcome_rx,
            progress_tx,
            snapshot_tx,
            initialized: false,
            device: None,
            session: PlaybackSession::default(),
            playback,
            queue: PlayQueue::new(),
            ticker: None,
            rng,
        };

        runtime_handle.spawn(service.run());

        handle
    }

    async fn run(mut self) {
        info!("PlaybackService started");

        loop {
            tokio::select! {
                biased;
                Some(event) = next_device_event(&mut self.device_events_rx) => {
                    self.apply_device_event(event);
                }
                Some(outcome) = self.outcome_rx.recv() => {
                    self.finish_play(outcome);
                }
                command = self.command_rx.recv() => {
                    match command {
                        Some(command) => self.handle_command(command).await,
                        None => break,
                    }
                }
                _ = next_tick(&mut self.ticker) => {
                    self.advance_position();
                }
            }
        }

        self.stop_ticking();
        if let Some(device) = self.device.take() {
            device.disconnect().await;
        }
        info!("PlaybackService stopped");
    }

    async fn handle_command(&mut self, command: PlaybackCommand) {
        match command {
            PlaybackCommand::Init(reply) => {
                let result = self.init_player().await;
                let _ = reply.send(result);
            }
            PlaybackCommand::SetQueue(uris) => {
                debug!("Queue replaced with {} tracks", uris.len());
                self.queue.replace(uris);
                self.publish();
            }
            PlaybackCommand::PlayTrack { uri, queue, reply } => {
                self.play_track(uri, queue, reply);
            }
            PlaybackCommand::PlayFromQueue { index, reply } => {
                self.play_from_queue(index, reply);
            }
            PlaybackCommand::Transport { op, reply } => {
                let result = self.transport(op).await;
                let _ = reply.send(result);
            }
            PlaybackCommand::NextTrack(reply) => match self.queue.next_index() {
                Some(index) => self.play_from_queue(index, reply),
                None => {
                    let result = self.transport(Transport::Next).await;
                    let _ = reply.send(result);
                }
            },
            PlaybackCommand::PreviousTrack(reply) => match self.queue.previous_index() {
                Some(index) => self.play_from_queue(index, reply),
                None => {
                    let result = self.transport(Transport::Previous).await;
                    let _ = reply.send(result);
                }
            },
            PlaybackCommand::ToggleShuffle(reply) => {
                let current_uri = self
                    .playback
                    .current_track
                    .as_ref()
                    .map(|track| track.uri.clone())
                    .or_else(|| self.queue.current_uri().map(str::to_owned));
                let enabled = self
                    .queue
                    .toggle_shuffle(current_uri.as_deref(), &mut self.rng);
                info!("Shuffle {}", if enabled { "enabled" } else { "disabled" });
                self.publish();
                let _ = reply.send(Ok(enabled));
            }
            PlaybackCommand::Disconnect(reply) => {
                self.disconnect().await;
                let _ = reply.send(Ok(()));
            }
            PlaybackCommand::Snapshot(reply) => {
                let _ = reply.send(Ok(self.snapshot()));
            }
        }
    }

    async fn init_player(&mut self) -> Result<(), PlayerError> {
        if self.initialized {
            debug!("Player already initialized");
            return Ok(());
        }
        self.initialized = true;

        let result = self.connect_device().await;
        if let Err(e) = &result {
            error!("Failed to initialize player: {}", e);
            self.initialized = false;
            self.device = None;
            self.device_events_rx = None;
            self.session.connected = false;
            self.record_error(e.clone());
        }
        result
    }

    async fn connect_device(&mut self) -> Result<(), PlayerError> {
        self.sdk.ensure_loaded().await?;

        if self.user_session.access_token().is_none() {
            return Err(PlayerError::MissingToken);
        }

        let user_session = self.user_session.clone();
        let config = DeviceConfig {
            name: self.settings.device_name.clone(),
            token_supplier: Arc::new(move || user_session.access_token()),
            initial_volume: f32::from(self.playback.volume_percent) / 100.0,
        };
        let (events_tx, events_rx) = tokio_mpsc::unbounded_channel();
        self.device_events_rx = Some(events_rx);
        let device = self.sdk.sdk().create_player(config, events_tx);
        self.device = Some(device.clone());

        match device.connect().await {
            Ok(true) => {
                info!("Device '{}' connected", self.settings.device_name);
                self.session.connected = true;
                self.publish();
                Ok(())
            }
            Ok(false) => Err(PlayerError::DeviceInitError(
                "Failed to connect to playback device".to_string(),
            )),
            Err(e) => Err(PlayerError::DeviceInitError(e.message)),
        }
    }

    async fn disconnect(&mut self) {
        self.stop_ticking();
        // Late events from the released session are discarded with the receiver
        self.device_events_rx = None;
        if let Some(device) = self.device.take() {
            info!("Disconnecting device");
            device.disconnect().await;
        }
        self.initialized = false;
        self.session.connected = false;
        self.session.ready = false;
        self.session.device_id = None;
        self.playback.is_playing = false;
        self.publish();
    }

    fn apply_device_event(&mut self, event: DeviceEvent) {
        match event {
            DeviceEvent::Ready { device_id } => {
                info!("Player ready with device ID: {}", device_id);
                self.session.device_id = Some(device_id);
                self.session.ready = true;
                self.session.last_error = None;
            }
            DeviceEvent::NotReady { device_id } => {
                warn!("Device ID has gone offline: {}", device_id);
                self.session.ready = false;
            }
            DeviceEvent::StateChanged(Some(state)) => self.apply_device_state(state),
            DeviceEvent::StateChanged(None) => {
                debug!("Ignoring empty device state");
                return;
            }
            DeviceEvent::InitializationError { message } => {
                error!("Initialization error: {}", message);
                self.record_error(PlayerError::DeviceInitError(message));
            }
            DeviceEvent::AuthenticationError { message } => {
                if self.session.ready {
                    debug!("Ignoring authentication error on ready device: {}", message);
                    return;
                }
                error!("Authentication error: {}", message);
                self.record_error(PlayerError::AuthFailed);
            }
            DeviceEvent::AccountError { message } => {
                error!("Account error: {}", message);
                self.record_error(PlayerError::PremiumRequired);
            }
        }
        self.publish();
    }

    fn apply_device_state(&mut self, state: DeviceState) {
        self.playback.is_playing = !state.paused;
        self.playback.position_ms = state.position;
        self.playback.duration_ms = state.duration;

        if let Some(track) = state.current_track() {
            let info = TrackInfo::from_device(track, state.duration);
            let index = self.queue.resync(&info.uri).or(self.queue.current_index());
            let changed = self
                .playback
                .current_track
                .as_ref()
                .map_or(true, |current| current.uri != info.uri);
            if changed {
                debug!("Now playing {} (queue index {:?})", info.uri, index);
                let _ = self.progress_tx.send(PlaybackProgress::TrackChanged {
                    track: info.clone(),
                    index,
                });
            }
            self.playback.current_track = Some(info);
        }

        if state.paused {
            self.stop_ticking();
        } else {
            self.start_ticking();
            self.session.last_error = None;
        }
    }

    fn play_track(&mut self, uri: String, queue: Option<Vec<String>>, reply: Reply) {
        let Some((device_id, token)) = self.play_target() else {
            self.fail(reply, PlayerError::PlayerNotReady);
            return;
        };

        match queue.filter(|tracks| !tracks.is_empty()) {
            Some(tracks) => {
                let index = tracks.iter().position(|track| *track == uri).unwrap_or(0);
                self.queue.replace(tracks);
                self.play_from_queue(index, reply);
            }
            None => {
                info!("Playing single track {}", uri);
                self.queue.collapse_to(uri.clone());
                self.publish();
                let request = PlayRequest::single(uri.clone());
                self.dispatch_play(device_id, token, uri, request, reply);
            }
        }
    }

    fn play_from_queue(&mut self, index: usize, reply: Reply) {
        let Some((device_id, token)) = self.play_target() else {
            self.fail(reply, PlayerError::PlayerNotReady);
            return;
        };

        let Some(window) = self.queue.window(index) else {
            debug!(
                "Ignoring play request for index {} (queue has {} tracks)",
                index,
                self.queue.len()
            );
            let _ = reply.send(Ok(()));
            return;
        };

        self.queue.select(index);
        self.publish();

        info!(
            "Playing queue index {} via window {}..{} (offset {})",
            index,
            window.start,
            window.start + window.uris.len(),
            window.offset
        );
        let target_uri = window.target().to_string();
        self.dispatch_play(device_id, token, target_uri, window.into_request(), reply);
    }

    /// Device id and token for a network play command
    fn play_target(&self) -> Option<(String, String)> {
        let device_id = self.session.device_id.clone()?;
        let token = self.user_session.access_token()?;
        Some((device_id, token))
    }

    fn dispatch_play(
        &self,
        device_id: String,
        token: String,
        target_uri: String,
        request: PlayRequest,
        reply: Reply,
    ) {
        let play_api = self.play_api.clone();
        let outcome_tx = self.outcome_tx.clone();
        tokio::spawn(async move {
            let result = play_api.play(&device_id, &token, &request).await;
            let _ = outcome_tx.send(PlayOutcome {
                target_uri,
                result,
                reply,
            });
        });
    }

    fn finish_play(&mut self, outcome: PlayOutcome) {
        let PlayOutcome {
            target_uri,
            result,
            reply,
        } = outcome;

        match result {
            Ok(()) => {
                self.session.last_error = None;
                self.playback.is_playing = true;
                let stale = self
                    .playback
                    .current_track
                    .as_ref()
                    .map_or(true, |track| track.uri != target_uri);
                if stale {
                    self.playback.current_track = Some(TrackInfo::placeholder(target_uri));
                }
                self.publish();
                let _ = reply.send(Ok(()));
            }
            Err(e) => {
                error!("Failed to play track {}: {}", target_uri, e);
                self.fail(reply, e);
            }
        }
    }

    async fn transport(&mut self, op: Transport) -> Result<(), PlayerError> {
        let Some(device) = self.device.clone() else {
            self.record_error(PlayerError::PlayerNotReady);
            self.publish();
            return Err(PlayerError::PlayerNotReady);
        };

        debug!("Device command: {:?}", op);
        let result = match op {
            Transport::TogglePlay => device.toggle_play().await,
            Transport::Pause => device.pause().await,
            Transport::Resume => device.resume().await,
            Transport::Seek(position_ms) => {
                let result = device.seek(position_ms).await;
                if result.is_ok() {
                    self.playback.position_ms = position_ms;
                    self.publish();
                }
                result
            }
            Transport::SetVolume(percent) => {
                let percent = percent.min(100);
                self.playback.volume_percent = percent;
                self.publish();
                device.set_volume(f32::from(percent) / 100.0).await
            }
            Transport::Next => device.next_track().await,
            Transport::Previous => device.previous_track().await,
        };

        result.map_err(|e| {
            warn!("Device command {:?} failed: {}", op, e);
            let error = PlayerError::PlaybackCommandFailed(e.message);
            self.record_error(error.clone());
            self.publish();
            error
        })
    }

    fn start_ticking(&mut self) {
        let mut ticker = tokio::time::interval_at(Instant::now() + TICK_INTERVAL, TICK_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.ticker = Some(ticker);
    }

    fn stop_ticking(&mut self) {
        self.ticker = None;
    }

    fn advance_position(&mut self) {
        if !self.playback.tick() {
            return;
        }
        let _ = self.progress_tx.send(PlaybackProgress::PositionUpdate {
            position_ms: self.playback.position_ms,
            track_uri: self
                .playback
                .current_track
                .as_ref()
                .map(|track| track.uri.clone()),
        });
        self.publish();
    }

    fn record_error(&mut self, error: PlayerError) {
        self.session.last_error = Some(error.clone());
        let _ = self.progress_tx.send(PlaybackProgress::Error { error });
    }

    fn fail(&mut self, reply: Reply, error: PlayerError) {
        self.record_error(error.clone());
        self.publish();
        let _ = reply.send(Err(error));
    }

    fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            session: self.session.clone(),
            playback: self.playback.clone(),
            queue: self.queue.tracks().to_vec(),
            current_index: self.queue.current_index(),
            shuffle: self.queue.shuffle_enabled(),
        }
    }

    fn publish(&self) {
        let snapshot = self.snapshot();
        self.snapshot_tx.send_replace(snapshot.clone());
        let _ = self
            .progress_tx
            .send(PlaybackProgress::StateChanged { snapshot });
    }
}

async fn next_device_event(
    events_rx: &mut Option<tokio_mpsc::UnboundedReceiver<DeviceEvent>>,
) -> Option<DeviceEvent> {
    match events_rx {
        Some(events_rx) => events_rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}
