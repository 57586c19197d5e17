use super::PlaybackProgress;
use std::collections::HashMap;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex, MutexGuard,
};
use tokio::sync::mpsc as tokio_mpsc;
use tracing::info;

type SubscriptionId = u64;
type Subscriptions = Arc<Mutex<HashMap<SubscriptionId, tokio_mpsc::UnboundedSender<PlaybackProgress>>>>;

/// Fans playback progress out to any number of subscribers
#[derive(Clone)]
pub struct PlaybackProgressHandle {
    subscriptions: Subscriptions,
    next_id: Arc<AtomicU64>,
}

fn lock(subscriptions: &Subscriptions) -> MutexGuard<'_, HashMap<SubscriptionId, tokio_mpsc::UnboundedSender<PlaybackProgress>>> {
    subscriptions.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl PlaybackProgressHandle {
    /// Create a handle and spawn the task that dispatches `progress_rx`
    pub fn new(
        mut progress_rx: tokio_mpsc::UnboundedReceiver<PlaybackProgress>,
        runtime_handle: tokio::runtime::Handle,
    ) -> Self {
        let subscriptions: Subscriptions = Arc::new(Mutex::new(HashMap::new()));
        let subscriptions_clone = subscriptions.clone();

        runtime_handle.spawn(async move {
            while let Some(progress) = progress_rx.recv().await {
                // Dropped receivers are pruned on the next dispatch
                lock(&subscriptions_clone).retain(|_, tx| tx.send(progress.clone()).is_ok());
            }
            info!("Playback progress channel closed, exiting");
        });

        Self {
            subscriptions,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Subscribe to all playback progress updates.
    ///
    /// The subscription is removed once the receiver is dropped.
    pub fn subscribe_all(&self) -> tokio_mpsc::UnboundedReceiver<PlaybackProgress> {
        let (tx, rx) = tokio_mpsc::unbounded_channel();
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        lock(&self.subscriptions).insert(id, tx);
        rx
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.subscriptions).len()
    }
}
