use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use webrtc::track::track_local::TrackLocal;

#[derive(Debug, Error)]
#[error("media capture unavailable: {0}")]
pub struct MediaError(pub String);

/// The local capture tracks attached to a peer session. Either side may be
/// absent (audio-only calls, capture failures).
#[derive(Clone, Default)]
pub struct MediaTracks {
    pub audio: Option<Arc<dyn TrackLocal + Send + Sync>>,
    pub video: Option<Arc<dyn TrackLocal + Send + Sync>>,
}

impl MediaTracks {
    pub fn is_empty(&self) -> bool {
        self.audio.is_none() && self.video.is_none()
    }
}

/// Local media capture, supplied by the embedding application (camera and
/// microphone glue is platform-specific and lives outside this crate).
/// `acquire` is called once at startup and again whenever tracks die.
#[async_trait]
pub trait MediaSource: Send + Sync {
    async fn acquire(&self) -> Result<MediaTracks, MediaError>;
}
