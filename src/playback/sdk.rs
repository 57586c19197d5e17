use crate::playback::device::{DeviceConfig, DeviceError, DeviceEventSender, DeviceSession};
use crate::playback::error::PlayerError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// Entry point of the external playback SDK
#[async_trait::async_trait]
pub trait PlaybackSdk: Send + Sync {
    /// Make the SDK available. May never complete if the SDK never loads.
    async fn load(&self) -> Result<(), DeviceError>;

    /// Construct a device session that reports its events through `events`
    fn create_player(
        &self,
        config: DeviceConfig,
        events: DeviceEventSender,
    ) -> Arc<dyn DeviceSession>;
}

/// Loads the SDK at most once, bounded by a timeout.
///
/// Only a successful load is cached; a failed or timed out load is attempted
/// again on the next call.
pub struct SdkLoader {
    sdk: Arc<dyn PlaybackSdk>,
    timeout: Duration,
    loaded: OnceCell<()>,
}

impl SdkLoader {
    pub fn new(sdk: Arc<dyn PlaybackSdk>, timeout: Duration) -> Self {
        Self {
            sdk,
            timeout,
            loaded: OnceCell::new(),
        }
    }

    pub fn sdk(&self) -> &Arc<dyn PlaybackSdk> {
        &self.sdk
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.initialized()
    }

    pub async fn ensure_loaded(&self) -> Result<(), PlayerError> {
        if self.is_loaded() {
            debug!("Playback SDK already loaded");
            return Ok(());
        }

        self.loaded
            .get_or_try_init(|| async {
                info!("Loading playback SDK (timeout {:?})", self.timeout);
                match tokio::time::timeout(self.timeout, self.sdk.load()).await {
                    Ok(Ok(())) => {
                        info!("Playback SDK loaded");
                        Ok(())
                    }
                    Ok(Err(e)) => {
                        warn!("Playback SDK failed to load: {}", e);
                        Err(PlayerError::SdkLoadFailed(e.message))
                    }
                    Err(_) => {
                        warn!("Playback SDK did not load within {:?}", self.timeout);
                        Err(PlayerError::SdkLoadFailed(format!(
                            "timed out after {}s",
                            self.timeout.as_secs()
                        )))
                    }
                }
            })
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeSdk, SdkBehavior};

    #[tokio::test]
    async fn test_sdk_loads_once() {
        let sdk = Arc::new(FakeSdk::new());
        let loader = SdkLoader::new(sdk.clone(), Duration::from_secs(5));

        loader.ensure_loaded().await.unwrap();
        loader.ensure_loaded().await.unwrap();

        assert!(loader.is_loaded());
        assert_eq!(sdk.load_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sdk_load_times_out() {
        let sdk = Arc::new(FakeSdk::with_behavior(SdkBehavior::NeverLoads));
        let loader = SdkLoader::new(sdk.clone(), Duration::from_secs(20));

        let result = loader.ensure_loaded().await;

        assert_eq!(
            result,
            Err(PlayerError::SdkLoadFailed("timed out after 20s".to_string()))
        );
        assert!(!loader.is_loaded());
    }

    #[tokio::test]
    async fn test_failed_load_is_retried() {
        let sdk = Arc::new(FakeSdk::with_behavior(SdkBehavior::Fails(
            "script blocked".to_string(),
        )));
        let loader = SdkLoader::new(sdk.clone(), Duration::from_secs(5));

        assert_eq!(
            loader.ensure_loaded().await,
            Err(PlayerError::SdkLoadFailed("script blocked".to_string()))
        );
        assert_eq!(
            loader.ensure_loaded().await,
            Err(PlayerError::SdkLoadFailed("script blocked".to_string()))
        );
        assert_eq!(sdk.load_calls(), 2);
    }
}
