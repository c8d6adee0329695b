use crate::event::Event;
use crate::media::MediaTracks;
use async_trait::async_trait;
use thiserror::Error;
use tincan_core::{CandidateInit, IceServerConfig, SessionDescription};
use tokio::sync::mpsc;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid session description: {0}")]
    Description(String),

    #[error("invalid ice candidate: {0}")]
    Candidate(String),
}

/// Negotiation / connectivity state of the (single) peer session. `Idle`
/// through `Answering` are driven by the signaling exchange, the rest by the
/// underlying transport's connectivity reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Offering,
    Answering,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    pub ice_servers: Vec<IceServerConfig>,
    /// Outbound video bitrate ceiling, applied to the local description
    /// before it leaves the client.
    pub max_video_bitrate_kbps: Option<u32>,
}

/// One negotiated point-to-point media session. The media path itself
/// (packetization, codecs, ICE) belongs to the transport implementation; the
/// state machine only configures it and feeds it descriptions/candidates.
#[async_trait]
pub trait PeerSession: Send + Sync {
    /// Produce and install the local offer.
    async fn create_offer(&self) -> Result<SessionDescription, SessionError>;

    /// Install the remote offer and produce the local answer.
    async fn accept_offer(
        &self,
        offer: SessionDescription,
    ) -> Result<SessionDescription, SessionError>;

    /// Install the remote answer; only meaningful while a local offer is
    /// outstanding.
    async fn accept_answer(&self, answer: SessionDescription) -> Result<(), SessionError>;

    /// Add a remote trickle-ICE candidate.
    async fn add_candidate(&self, candidate: CandidateInit) -> Result<(), SessionError>;

    /// Hot-swap the outbound tracks without renegotiating.
    async fn replace_tracks(&self, tracks: MediaTracks) -> Result<(), SessionError>;

    async fn close(&self);
}

/// Builds peer sessions wired back into the client's event loop: connectivity
/// changes arrive as [`Event::SessionState`], locally gathered candidates as
/// [`Event::LocalCandidate`]. Every event the session emits must carry the
/// `generation` it was created with, so the client can tell a live session's
/// reports from a retired one's.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn create(
        &self,
        tracks: MediaTracks,
        events: mpsc::Sender<Event>,
        generation: u64,
    ) -> Result<Box<dyn PeerSession>, SessionError>;
}
