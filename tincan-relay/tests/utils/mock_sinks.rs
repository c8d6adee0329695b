use async_trait::async_trait;
use std::sync::Arc;
use tincan_core::{ConnId, Signal};
use tincan_relay::ConnectionSink;
use tokio::sync::{Mutex, mpsc};

#[derive(Debug, Clone, PartialEq)]
pub enum SinkEvent {
    Signal(ConnId, Signal),
    Ping(ConnId),
    Close(ConnId),
}

/// Mock ConnectionSink that captures everything the registry emits.
#[derive(Clone)]
pub struct MockSinks {
    tx: mpsc::UnboundedSender<SinkEvent>,
    events: Arc<Mutex<Vec<SinkEvent>>>,
}

impl MockSinks {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SinkEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sinks = Self {
            tx,
            events: Arc::new(Mutex::new(Vec::new())),
        };
        (sinks, rx)
    }

    /// All signals delivered to a specific connection, in order.
    pub async fn signals_for(&self, conn: &ConnId) -> Vec<Signal> {
        self.events
            .lock()
            .await
            .iter()
            .filter_map(|e| match e {
                SinkEvent::Signal(to, signal) if to == conn => Some(signal.clone()),
                _ => None,
            })
            .collect()
    }

    pub async fn ping_count(&self, conn: &ConnId) -> usize {
        self.events
            .lock()
            .await
            .iter()
            .filter(|e| matches!(e, SinkEvent::Ping(to) if to == conn))
            .count()
    }

    pub async fn was_closed(&self, conn: &ConnId) -> bool {
        self.events
            .lock()
            .await
            .iter()
            .any(|e| matches!(e, SinkEvent::Close(to) if to == conn))
    }

    async fn record(&self, event: SinkEvent) {
        self.events.lock().await.push(event.clone());
        let _ = self.tx.send(event);
    }
}

#[async_trait]
impl ConnectionSink for MockSinks {
    async fn send(&self, conn: ConnId, signal: Signal) {
        tracing::debug!("[MockSinks] send to {conn}: {signal:?}");
        self.record(SinkEvent::Signal(conn, signal)).await;
    }

    async fn ping(&self, conn: ConnId) {
        self.record(SinkEvent::Ping(conn)).await;
    }

    async fn close(&self, conn: ConnId) {
        self.record(SinkEvent::Close(conn)).await;
    }
}
