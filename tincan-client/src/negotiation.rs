use crate::event::Event;
use crate::media::MediaTracks;
use crate::session::{PeerSession, SessionError, SessionFactory, SessionState};
use std::sync::Arc;
use tincan_core::{CandidateInit, SessionDescription};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Fixed for the lifetime of a room membership: the first member to join is
/// the initiator and the only side that ever originates offers, which rules
/// out simultaneous-offer glare by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Initiator,
    Responder,
}

/// Owns the one live peer session and its offer/answer lifecycle. Each
/// participant runs its own instance; the two sides are never required to be
/// in lock-step and learn about each other only through relayed signals.
pub struct Negotiator {
    factory: Arc<dyn SessionFactory>,
    session: Option<Box<dyn PeerSession>>,
    /// Bumped on every teardown; events tagged with an older generation come
    /// from a session that no longer exists.
    generation: u64,
    state: SessionState,
    role: Role,
    tracks: MediaTracks,
    events: mpsc::Sender<Event>,
}

impl Negotiator {
    pub fn new(factory: Arc<dyn SessionFactory>, events: mpsc::Sender<Event>) -> Self {
        Self {
            factory,
            session: None,
            generation: 0,
            state: SessionState::Idle,
            role: Role::Responder,
            tracks: MediaTracks::default(),
            events,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_initiator(&self) -> bool {
        self.role == Role::Initiator
    }

    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    /// Generation of the current session. Events carrying any other value
    /// were emitted by an instance that has since been torn down.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Adopt the role assigned by the relay's join acknowledgment. On a
    /// rejoin the slot order decides again, so the role may change.
    pub fn set_role(&mut self, is_initiator: bool) {
        let role = if is_initiator {
            Role::Initiator
        } else {
            Role::Responder
        };
        if role != self.role {
            info!("Role assigned: {role:?}");
        }
        self.role = role;
    }

    pub fn set_tracks(&mut self, tracks: MediaTracks) {
        self.tracks = tracks;
    }

    /// Build a fresh session and produce the local offer. Initiator only.
    pub async fn start_offer(&mut self) -> Result<SessionDescription, SessionError> {
        let offer = self.create_session().await?.create_offer().await?;
        self.state = SessionState::Offering;
        Ok(offer)
    }

    /// Accept a remote offer on a fresh session and produce the answer. Any
    /// existing session is discarded first.
    pub async fn accept_offer(
        &mut self,
        offer: SessionDescription,
    ) -> Result<SessionDescription, SessionError> {
        let answer = self.create_session().await?.accept_offer(offer).await?;
        self.state = SessionState::Answering;
        Ok(answer)
    }

    /// Accept a remote answer. Only valid while our own offer is
    /// outstanding; anything else is a stale message and is dropped.
    pub async fn accept_answer(&mut self, answer: SessionDescription) {
        match (&self.session, self.state) {
            (Some(session), SessionState::Offering) => {
                if let Err(e) = session.accept_answer(answer).await {
                    warn!("Failed to accept answer: {e}");
                }
            }
            _ => warn!("Dropping answer in state {:?}", self.state),
        }
    }

    /// Add a remote trickle candidate. Failures are non-fatal: ICE carries on
    /// with whatever candidates do apply.
    pub async fn add_candidate(&mut self, candidate: CandidateInit) {
        match &self.session {
            Some(session) => {
                if let Err(e) = session.add_candidate(candidate).await {
                    warn!("Failed to add ICE candidate: {e}");
                }
            }
            None => debug!("Dropping candidate, no session"),
        }
    }

    /// Transport connectivity report for the current session.
    pub fn on_transport_state(&mut self, state: SessionState) {
        debug!("Session connectivity: {state:?}");
        self.state = state;
    }

    /// Swap in freshly acquired capture tracks. A connected session gets them
    /// hot-swapped in place; no offer/answer cycle.
    pub async fn replace_tracks(&mut self, tracks: MediaTracks) {
        self.tracks = tracks.clone();
        if let Some(session) = &self.session {
            if self.state == SessionState::Connected {
                if let Err(e) = session.replace_tracks(tracks).await {
                    warn!("Track hot-swap failed: {e}");
                }
            }
        }
    }

    /// Close and discard the current session, if any. Bumping the generation
    /// here retires everything the closed session still has in flight,
    /// including the `Closed` report the close itself produces.
    pub async fn teardown(&mut self) {
        if let Some(session) = self.session.take() {
            session.close().await;
        }
        self.generation += 1;
        self.state = SessionState::Idle;
    }

    /// At most one session is ever live: the previous one is closed before
    /// the factory builds its replacement.
    async fn create_session(&mut self) -> Result<&dyn PeerSession, SessionError> {
        self.teardown().await;
        let session = self
            .factory
            .create(self.tracks.clone(), self.events.clone(), self.generation)
            .await?;
        Ok(&**self.session.insert(session))
    }
}
