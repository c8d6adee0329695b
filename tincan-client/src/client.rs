use crate::channel::ControlChannel;
use crate::event::{CallNotification, Event};
use crate::media::MediaSource;
use crate::negotiation::Negotiator;
use crate::resilience::{MAX_RESTART_ATTEMPTS, TimerSlot, restart_delay};
use crate::session::{SessionFactory, SessionState};
use std::sync::Arc;
use std::time::Duration;
use tincan_core::{RoomId, Signal};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct CallConfig {
    pub room_id: RoomId,
    /// Whether this side creates the room before joining. Re-sent on every
    /// control-channel reconnect (create is idempotent).
    pub create_room: bool,
    /// Delay before a control-channel reconnect attempt.
    pub reconnect_delay: Duration,
}

impl CallConfig {
    pub fn new(room_id: impl Into<RoomId>) -> Self {
        Self {
            room_id: room_id.into(),
            create_room: false,
            reconnect_delay: Duration::from_secs(3),
        }
    }

    pub fn creating_room(mut self) -> Self {
        self.create_room = true;
        self
    }
}

/// One participant's call engine: the negotiation state machine plus the
/// resilience controller, run as a single event loop. Each failure domain
/// (local media, control channel, peer session) recovers independently.
pub struct CallClient {
    config: CallConfig,
    channel: Arc<dyn ControlChannel>,
    media: Arc<dyn MediaSource>,
    negotiator: Negotiator,

    /// Consecutive session restarts since the last connected transition.
    attempts: u32,
    restart_timer: TimerSlot,
    reconnect_timer: TimerSlot,
    /// While inactive (backgrounded), recovery timers stay disarmed.
    active: bool,

    events_tx: mpsc::Sender<Event>,
    events_rx: mpsc::Receiver<Event>,
    notify: mpsc::UnboundedSender<CallNotification>,
}

impl CallClient {
    pub fn new(
        config: CallConfig,
        channel: Arc<dyn ControlChannel>,
        factory: Arc<dyn SessionFactory>,
        media: Arc<dyn MediaSource>,
    ) -> (Self, mpsc::UnboundedReceiver<CallNotification>) {
        let (events_tx, events_rx) = mpsc::channel(64);
        let (notify, notify_rx) = mpsc::unbounded_channel();

        let client = Self {
            config,
            channel,
            media,
            negotiator: Negotiator::new(factory, events_tx.clone()),
            attempts: 0,
            restart_timer: TimerSlot::default(),
            reconnect_timer: TimerSlot::default(),
            active: true,
            events_tx,
            events_rx,
            notify,
        };
        (client, notify_rx)
    }

    /// Sender half of the event loop, for wiring in external stimuli
    /// (visibility changes, track-ended callbacks).
    pub fn events(&self) -> mpsc::Sender<Event> {
        self.events_tx.clone()
    }

    /// Acquire local media and open the control channel. Media failure is
    /// reported but does not abort the call setup; signaling can proceed.
    pub async fn start(&mut self) -> Result<(), crate::channel::ChannelError> {
        match self.media.acquire().await {
            Ok(tracks) => self.negotiator.set_tracks(tracks),
            Err(e) => {
                error!("Media acquisition failed: {e}");
                self.notified(CallNotification::MediaFailed(e.to_string()));
            }
        }
        self.channel.connect(self.events_tx.clone()).await
    }

    /// Process events until every sender half is gone.
    pub async fn run(mut self) {
        while let Some(event) = self.events_rx.recv().await {
            self.handle_event(event).await;
        }
    }

    /// Receive the next queued event, if any. Test seam for driving the loop
    /// step by step.
    pub async fn next_event(&mut self) -> Option<Event> {
        self.events_rx.recv().await
    }

    /// Non-blocking variant of [`next_event`](Self::next_event).
    pub fn try_next_event(&mut self) -> Option<Event> {
        self.events_rx.try_recv().ok()
    }

    pub async fn handle_event(&mut self, event: Event) {
        debug!("Event: {event:?}");
        match event {
            Event::Signal(signal) => self.handle_signal(signal).await,

            Event::ChannelOpen => {
                self.reconnect_timer.cancel();
                if self.config.create_room {
                    self.send_signal(Signal::CreateRoom {
                        room_id: self.config.room_id.clone(),
                    })
                    .await;
                }
                self.send_signal(Signal::Join {
                    room_id: self.config.room_id.clone(),
                })
                .await;
            }

            Event::ChannelClosed => {
                warn!("Control channel lost");
                self.schedule_reconnect();
            }

            Event::ReconnectTimer => {
                if self.channel.is_open() {
                    return;
                }
                if let Err(e) = self.channel.connect(self.events_tx.clone()).await {
                    warn!("Control channel reconnect failed: {e}");
                    self.schedule_reconnect();
                }
            }

            Event::SessionState { generation, state } => {
                if generation != self.negotiator.generation() {
                    debug!("Ignoring {state:?} report from a retired session");
                    return;
                }
                self.handle_session_state(state).await;
            }

            Event::LocalCandidate {
                generation,
                candidate,
            } => {
                if generation != self.negotiator.generation() {
                    debug!("Dropping candidate from a retired session");
                    return;
                }
                self.send_signal(Signal::IceCandidate { candidate }).await;
            }

            Event::TrackEnded => self.refresh_media().await,

            Event::Suspended => {
                self.active = false;
            }

            Event::Resumed => {
                self.active = true;
                if !self.channel.is_open() {
                    // The close event may have been missed while suspended.
                    self.reconnect_timer.cancel();
                    if let Err(e) = self.channel.connect(self.events_tx.clone()).await {
                        warn!("Control channel reconnect failed: {e}");
                        self.schedule_reconnect();
                    }
                } else if !self.negotiator.has_session() && self.negotiator.is_initiator() {
                    // Connectivity reports may have been lost entirely; ask
                    // the peer whether it is still there before re-offering.
                    self.send_signal(Signal::CheckPeer).await;
                }
            }

            Event::RestartTimer => self.perform_restart().await,
        }
    }

    async fn handle_signal(&mut self, signal: Signal) {
        match signal {
            Signal::Joined {
                room_id,
                is_initiator,
            } => {
                info!("Joined room {room_id} (initiator: {is_initiator})");
                self.negotiator.set_role(is_initiator);
                self.notified(CallNotification::Joined { is_initiator });
            }

            Signal::Ready => {
                info!("Peer is present");
                if self.negotiator.is_initiator() {
                    self.make_offer().await;
                }
            }

            Signal::Offer { offer } => {
                // The peer is renegotiating; any restart we had queued up is
                // redundant and would tear down the session being built.
                self.restart_timer.cancel();
                match self.negotiator.accept_offer(offer).await {
                    Ok(answer) => self.send_signal(Signal::Answer { answer }).await,
                    Err(e) => {
                        warn!("Failed to accept offer: {e}");
                        self.schedule_restart();
                    }
                }
            }

            Signal::Answer { answer } => self.negotiator.accept_answer(answer).await,

            Signal::IceCandidate { candidate } => self.negotiator.add_candidate(candidate).await,

            Signal::Restart => {
                info!("Peer requested a session restart");
                // The peer beat us to it; a pending local restart would only
                // duplicate sessions.
                self.restart_timer.cancel();
                self.negotiator.teardown().await;
                // The initiator re-offers; the responder holds for the offer.
                if self.negotiator.is_initiator() {
                    self.make_offer().await;
                }
            }

            Signal::CheckPeer => self.send_signal(Signal::PeerReady).await,

            Signal::PeerReady => {
                if self.negotiator.state() != SessionState::Connected
                    && self.negotiator.is_initiator()
                {
                    self.make_offer().await;
                }
            }

            Signal::PeerDisconnected => {
                info!("Peer disconnected");
                self.negotiator.teardown().await;
                self.notified(CallNotification::PeerDisconnected);
            }

            Signal::Error { message, redirect } => {
                error!("Relay error: {message}");
                self.notified(CallNotification::RoomError {
                    message,
                    redirect: redirect.unwrap_or(false),
                });
            }

            Signal::CreateRoom { .. } | Signal::Join { .. } => {
                warn!("Relay echoed a client-origin signal, dropping");
            }
        }
    }

    async fn handle_session_state(&mut self, state: SessionState) {
        self.negotiator.on_transport_state(state);
        match state {
            SessionState::Connected => {
                info!("Peer session connected");
                self.attempts = 0;
                self.restart_timer.cancel();
                self.notified(CallNotification::Connected);
            }

            SessionState::Disconnected | SessionState::Failed => {
                warn!("Peer session {state:?}");
                self.notified(CallNotification::SessionDown);
                self.schedule_restart();
            }

            // Terminal for that session instance only; a restart or a fresh
            // offer may create a new one.
            SessionState::Closed => {}

            SessionState::Idle | SessionState::Offering | SessionState::Answering => {}
        }
    }

    /// Staged peer-session recovery: bounded attempts, exponential backoff,
    /// one outstanding timer.
    fn schedule_restart(&mut self) {
        if self.restart_timer.is_pending() {
            debug!("Restart already scheduled");
            return;
        }
        if self.attempts >= MAX_RESTART_ATTEMPTS {
            error!("Giving up after {} restart attempts", self.attempts);
            self.notified(CallNotification::RetriesExhausted);
            return;
        }
        self.attempts += 1;
        let delay = restart_delay(self.attempts);
        info!(
            "Scheduling session restart {}/{} in {:?}",
            self.attempts, MAX_RESTART_ATTEMPTS, delay
        );
        self.restart_timer
            .arm(delay, self.events_tx.clone(), Event::RestartTimer);
    }

    async fn perform_restart(&mut self) {
        self.negotiator.teardown().await;
        self.send_signal(Signal::Restart).await;
        if self.negotiator.is_initiator() {
            self.make_offer().await;
        }
    }

    fn schedule_reconnect(&mut self) {
        if !self.active {
            debug!("Inactive, deferring control-channel reconnect");
            return;
        }
        if self.reconnect_timer.is_pending() {
            return;
        }
        self.reconnect_timer.arm(
            self.config.reconnect_delay,
            self.events_tx.clone(),
            Event::ReconnectTimer,
        );
    }

    async fn make_offer(&mut self) {
        match self.negotiator.start_offer().await {
            Ok(offer) => self.send_signal(Signal::Offer { offer }).await,
            Err(e) => {
                warn!("Failed to create offer: {e}");
                self.schedule_restart();
            }
        }
    }

    /// Re-acquire capture after a track died; a connected session gets the
    /// new tracks swapped in without renegotiation.
    async fn refresh_media(&mut self) {
        match self.media.acquire().await {
            Ok(tracks) => self.negotiator.replace_tracks(tracks).await,
            Err(e) => {
                error!("Media re-acquisition failed: {e}");
                self.notified(CallNotification::MediaFailed(e.to_string()));
            }
        }
    }

    async fn send_signal(&self, signal: Signal) {
        if let Err(e) = self.channel.send(signal).await {
            // Best-effort: the resilience paths recover from lost signals.
            warn!("Failed to send signal: {e}");
        }
    }

    fn notified(&self, notification: CallNotification) {
        let _ = self.notify.send(notification);
    }
}
