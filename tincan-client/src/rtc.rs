use crate::event::Event;
use crate::media::MediaTracks;
use crate::sdp::apply_bitrate_hint;
use crate::session::{PeerSession, SessionConfig, SessionError, SessionFactory, SessionState};
use async_trait::async_trait;
use std::sync::Arc;
use tincan_core::{CandidateInit, SessionDescription};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp_transceiver::rtp_sender::RTCRtpSender;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_remote::TrackRemote;

impl From<webrtc::Error> for SessionError {
    fn from(e: webrtc::Error) -> Self {
        SessionError::Transport(e.to_string())
    }
}

/// Builds webrtc-rs backed peer sessions. Remote tracks are handed to the
/// embedding application through `remote_tracks`; rendering is not this
/// crate's concern.
pub struct WebrtcSessionFactory {
    config: SessionConfig,
    remote_tracks: Option<mpsc::UnboundedSender<Arc<TrackRemote>>>,
}

impl WebrtcSessionFactory {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            remote_tracks: None,
        }
    }

    pub fn with_remote_tracks(
        mut self,
        sink: mpsc::UnboundedSender<Arc<TrackRemote>>,
    ) -> Self {
        self.remote_tracks = Some(sink);
        self
    }
}

#[async_trait]
impl SessionFactory for WebrtcSessionFactory {
    async fn create(
        &self,
        tracks: MediaTracks,
        events: mpsc::Sender<Event>,
        generation: u64,
    ) -> Result<Box<dyn PeerSession>, SessionError> {
        let mut media_engine = MediaEngine::default();
        media_engine.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut media_engine)?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let ice_servers = self
            .config
            .ice_servers
            .iter()
            .map(|s| RTCIceServer {
                urls: s.urls.clone(),
                username: s.username.clone().unwrap_or_default(),
                credential: s.credential.clone().unwrap_or_default(),
                ..Default::default()
            })
            .collect();

        let rtc_config = RTCConfiguration {
            ice_servers,
            ..Default::default()
        };

        let pc = Arc::new(api.new_peer_connection(rtc_config).await?);

        // Connectivity reports drive the negotiation state machine.
        let state_events = events.clone();
        pc.on_peer_connection_state_change(Box::new(move |s: RTCPeerConnectionState| {
            let events = state_events.clone();
            Box::pin(async move {
                info!("Peer connection state: {s}");
                let mapped = match s {
                    RTCPeerConnectionState::Connected => Some(SessionState::Connected),
                    RTCPeerConnectionState::Disconnected => Some(SessionState::Disconnected),
                    RTCPeerConnectionState::Failed => Some(SessionState::Failed),
                    RTCPeerConnectionState::Closed => Some(SessionState::Closed),
                    _ => None,
                };
                if let Some(state) = mapped {
                    let _ = events
                        .send(Event::SessionState { generation, state })
                        .await;
                }
            })
        }));

        // Trickle ICE: every locally gathered candidate goes to the peer.
        let ice_events = events.clone();
        pc.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let events = ice_events.clone();
            Box::pin(async move {
                let Some(candidate) = c else { return };
                let Ok(init) = candidate.to_json() else {
                    return;
                };
                let Ok(value) = serde_json::to_value(&init) else {
                    return;
                };
                let _ = events
                    .send(Event::LocalCandidate {
                        generation,
                        candidate: CandidateInit(value),
                    })
                    .await;
            })
        }));

        let remote_sink = self.remote_tracks.clone();
        pc.on_track(Box::new(move |track, _receiver, _transceiver| {
            let remote_sink = remote_sink.clone();
            Box::pin(async move {
                debug!("Remote track arrived: {:?}", track.kind());
                if let Some(sink) = remote_sink {
                    let _ = sink.send(track);
                }
            })
        }));

        let mut audio_sender = None;
        if let Some(track) = tracks.audio {
            audio_sender = Some(pc.add_track(track).await?);
        }

        let mut video_sender = None;
        if let Some(track) = tracks.video {
            video_sender = Some(pc.add_track(track).await?);
        }

        Ok(Box::new(WebrtcSession {
            pc,
            audio_sender,
            video_sender,
            max_video_bitrate_kbps: self.config.max_video_bitrate_kbps,
        }))
    }
}

/// One live RTCPeerConnection. Track senders are kept so fresh capture
/// tracks can be hot-swapped without an offer/answer cycle.
pub struct WebrtcSession {
    pc: Arc<RTCPeerConnection>,
    audio_sender: Option<Arc<RTCRtpSender>>,
    video_sender: Option<Arc<RTCRtpSender>>,
    max_video_bitrate_kbps: Option<u32>,
}

impl WebrtcSession {
    /// Install the bitrate hint into an outgoing description.
    fn hinted(&self, sdp: String) -> String {
        match self.max_video_bitrate_kbps {
            Some(kbps) => apply_bitrate_hint(&sdp, kbps),
            None => sdp,
        }
    }

    fn to_value(desc: &RTCSessionDescription) -> Result<SessionDescription, SessionError> {
        serde_json::to_value(desc)
            .map(SessionDescription)
            .map_err(|e| SessionError::Description(e.to_string()))
    }

    fn from_value(desc: SessionDescription) -> Result<RTCSessionDescription, SessionError> {
        serde_json::from_value(desc.0).map_err(|e| SessionError::Description(e.to_string()))
    }
}

#[async_trait]
impl PeerSession for WebrtcSession {
    async fn create_offer(&self) -> Result<SessionDescription, SessionError> {
        let offer = self.pc.create_offer(None).await?;
        let offer = RTCSessionDescription::offer(self.hinted(offer.sdp))?;
        self.pc.set_local_description(offer.clone()).await?;
        Self::to_value(&offer)
    }

    async fn accept_offer(
        &self,
        offer: SessionDescription,
    ) -> Result<SessionDescription, SessionError> {
        self.pc.set_remote_description(Self::from_value(offer)?).await?;
        let answer = self.pc.create_answer(None).await?;
        let answer = RTCSessionDescription::answer(self.hinted(answer.sdp))?;
        self.pc.set_local_description(answer.clone()).await?;
        Self::to_value(&answer)
    }

    async fn accept_answer(&self, answer: SessionDescription) -> Result<(), SessionError> {
        self.pc.set_remote_description(Self::from_value(answer)?).await?;
        Ok(())
    }

    async fn add_candidate(&self, candidate: CandidateInit) -> Result<(), SessionError> {
        let init: RTCIceCandidateInit = serde_json::from_value(candidate.0)
            .map_err(|e| SessionError::Candidate(e.to_string()))?;
        self.pc
            .add_ice_candidate(init)
            .await
            .map_err(|e| SessionError::Candidate(e.to_string()))
    }

    async fn replace_tracks(&self, tracks: MediaTracks) -> Result<(), SessionError> {
        if let (Some(sender), Some(track)) = (&self.audio_sender, tracks.audio) {
            sender
                .replace_track(Some(Arc::clone(&track) as Arc<dyn TrackLocal + Send + Sync>))
                .await?;
        }
        if let (Some(sender), Some(track)) = (&self.video_sender, tracks.video) {
            sender
                .replace_track(Some(Arc::clone(&track) as Arc<dyn TrackLocal + Send + Sync>))
                .await?;
        }
        Ok(())
    }

    async fn close(&self) {
        if let Err(e) = self.pc.close().await {
            warn!("Error closing peer connection: {e}");
        }
    }
}
