use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use tincan_client::{
    CallClient, CallConfig, CallNotification, ChannelError, ControlChannel, Event, MediaError,
    MediaSource, MediaTracks, PeerSession, SessionError, SessionFactory, SessionState,
};
use tincan_core::{CandidateInit, SessionDescription, Signal};
use tokio::sync::{Mutex, mpsc};

/// Control channel double: connects instantly, records every outbound
/// signal.
pub struct MockChannel {
    pub sent: Mutex<Vec<Signal>>,
    pub open: AtomicBool,
    pub connect_calls: AtomicUsize,
    pub fail_connect: AtomicBool,
}

impl MockChannel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            open: AtomicBool::new(false),
            connect_calls: AtomicUsize::new(0),
            fail_connect: AtomicBool::new(false),
        })
    }

    pub async fn sent_signals(&self) -> Vec<Signal> {
        self.sent.lock().await.clone()
    }

    pub async fn count_sent<F>(&self, pred: F) -> usize
    where
        F: Fn(&Signal) -> bool,
    {
        self.sent.lock().await.iter().filter(|s| pred(s)).count()
    }

    /// Simulate the transport dropping out from under the client.
    pub fn drop_link(&self) {
        self.open.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl ControlChannel for MockChannel {
    async fn connect(&self, events: mpsc::Sender<Event>) -> Result<(), ChannelError> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(ChannelError::Ws("mock connect refused".into()));
        }
        self.open.store(true, Ordering::SeqCst);
        events
            .send(Event::ChannelOpen)
            .await
            .map_err(|_| ChannelError::NotOpen)
    }

    async fn send(&self, signal: Signal) -> Result<(), ChannelError> {
        if !self.is_open() {
            return Err(ChannelError::NotOpen);
        }
        self.sent.lock().await.push(signal);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

/// Shared counters across every session a factory hands out.
#[derive(Default)]
pub struct SessionStats {
    pub created: AtomicUsize,
    pub closed: AtomicUsize,
    pub replaced: AtomicUsize,
    pub candidates: AtomicUsize,
    pub answers: AtomicUsize,
    /// Generation the most recent session was created with.
    pub last_generation: AtomicU64,
}

impl SessionStats {
    pub fn live(&self) -> usize {
        self.created.load(Ordering::SeqCst) - self.closed.load(Ordering::SeqCst)
    }
}

pub struct MockSession {
    id: usize,
    stats: Arc<SessionStats>,
    generation: u64,
    events: mpsc::Sender<Event>,
    /// Mirror the production session: closing a peer connection emits one
    /// last `Closed` connectivity report.
    report_closed: bool,
}

#[async_trait]
impl PeerSession for MockSession {
    async fn create_offer(&self) -> Result<SessionDescription, SessionError> {
        Ok(SessionDescription(json!({
            "type": "offer",
            "sdp": format!("mock-offer-{}", self.id),
        })))
    }

    async fn accept_offer(
        &self,
        _offer: SessionDescription,
    ) -> Result<SessionDescription, SessionError> {
        Ok(SessionDescription(json!({
            "type": "answer",
            "sdp": format!("mock-answer-{}", self.id),
        })))
    }

    async fn accept_answer(&self, _answer: SessionDescription) -> Result<(), SessionError> {
        self.stats.answers.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn add_candidate(&self, _candidate: CandidateInit) -> Result<(), SessionError> {
        self.stats.candidates.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn replace_tracks(&self, _tracks: MediaTracks) -> Result<(), SessionError> {
        self.stats.replaced.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) {
        self.stats.closed.fetch_add(1, Ordering::SeqCst);
        if self.report_closed {
            let _ = self
                .events
                .send(Event::SessionState {
                    generation: self.generation,
                    state: SessionState::Closed,
                })
                .await;
        }
    }
}

pub struct MockFactory {
    pub stats: Arc<SessionStats>,
    closing_reports_closed: AtomicBool,
}

impl MockFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            stats: Arc::new(SessionStats::default()),
            closing_reports_closed: AtomicBool::new(false),
        })
    }

    /// Make every session report `Closed` from its `close()`, the way a real
    /// peer connection does.
    pub fn closing_reports_closed(&self) {
        self.closing_reports_closed.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl SessionFactory for MockFactory {
    async fn create(
        &self,
        _tracks: MediaTracks,
        events: mpsc::Sender<Event>,
        generation: u64,
    ) -> Result<Box<dyn PeerSession>, SessionError> {
        let id = self.stats.created.fetch_add(1, Ordering::SeqCst);
        self.stats.last_generation.store(generation, Ordering::SeqCst);
        Ok(Box::new(MockSession {
            id,
            stats: Arc::clone(&self.stats),
            generation,
            events,
            report_closed: self.closing_reports_closed.load(Ordering::SeqCst),
        }))
    }
}

pub struct MockMedia {
    pub acquisitions: AtomicUsize,
    pub fail: AtomicBool,
}

impl MockMedia {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            acquisitions: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
        })
    }
}

#[async_trait]
impl MediaSource for MockMedia {
    async fn acquire(&self) -> Result<MediaTracks, MediaError> {
        self.acquisitions.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(MediaError("mock capture denied".into()));
        }
        Ok(MediaTracks::default())
    }
}

pub struct Harness {
    pub client: CallClient,
    pub notes: mpsc::UnboundedReceiver<CallNotification>,
    pub channel: Arc<MockChannel>,
    pub factory: Arc<MockFactory>,
    pub media: Arc<MockMedia>,
}

impl Harness {
    pub async fn start(room: &str) -> Self {
        Self::build(room, false).await
    }

    /// Boot with a capture source that denies the first acquisition.
    pub async fn start_with_denied_media(room: &str) -> Self {
        Self::build(room, true).await
    }

    async fn build(room: &str, deny_media: bool) -> Self {
        let channel = MockChannel::new();
        let factory = MockFactory::new();
        let media = MockMedia::new();
        media.fail.store(deny_media, Ordering::SeqCst);
        let (mut client, notes) = CallClient::new(
            CallConfig::new(room).creating_room(),
            channel.clone(),
            factory.clone(),
            media.clone(),
        );
        client.start().await.expect("Mock connect cannot fail");
        let mut harness = Self {
            client,
            notes,
            channel,
            factory,
            media,
        };
        harness.drive().await;
        harness
    }

    /// Run every queued event to quiescence, giving spawned timer tasks a
    /// chance to be scheduled in between.
    pub async fn drive(&mut self) {
        for _ in 0..8 {
            tokio::task::yield_now().await;
            while let Some(event) = self.client.try_next_event() {
                self.client.handle_event(event).await;
                tokio::task::yield_now().await;
            }
        }
    }

    pub async fn feed(&mut self, event: Event) {
        self.client.handle_event(event).await;
        self.drive().await;
    }

    pub async fn feed_signal(&mut self, signal: Signal) {
        self.feed(Event::Signal(signal)).await;
    }

    /// Inject a connectivity report as if the current session emitted it.
    pub async fn feed_state(&mut self, state: SessionState) {
        let generation = self.factory.stats.last_generation.load(Ordering::SeqCst);
        self.feed(Event::SessionState { generation, state }).await;
    }

    /// Inject a locally gathered candidate as if the current session found it.
    pub async fn feed_local_candidate(&mut self, candidate: CandidateInit) {
        let generation = self.factory.stats.last_generation.load(Ordering::SeqCst);
        self.feed(Event::LocalCandidate {
            generation,
            candidate,
        })
        .await;
    }

    /// Shorthand for "joined as initiator, peer arrived, negotiation
    /// finished".
    pub async fn connect_as_initiator(&mut self, room: &str) {
        self.feed_signal(Signal::Joined {
            room_id: room.into(),
            is_initiator: true,
        })
        .await;
        self.feed_signal(Signal::Ready).await;
        let answer = SessionDescription(json!({"type": "answer", "sdp": "remote"}));
        self.feed_signal(Signal::Answer { answer }).await;
        self.feed_state(SessionState::Connected).await;
    }

    pub fn drain_notes(&mut self) -> Vec<CallNotification> {
        let mut out = Vec::new();
        while let Ok(note) = self.notes.try_recv() {
            out.push(note);
        }
        out
    }
}
