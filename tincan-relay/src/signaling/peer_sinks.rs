use crate::signaling::ConnectionSink;
use async_trait::async_trait;
use axum::extract::ws::Message;
use dashmap::DashMap;
use std::sync::Arc;
use tincan_core::{ConnId, Signal};
use tokio::sync::mpsc;
use tracing::{error, warn};

/// Maps connections to their WebSocket writer pumps. Dropping a sender ends
/// the pump task, which closes the socket.
#[derive(Clone, Default)]
pub struct PeerSinks {
    inner: Arc<DashMap<ConnId, mpsc::UnboundedSender<Message>>>,
}

impl PeerSinks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, conn: ConnId, tx: mpsc::UnboundedSender<Message>) {
        self.inner.insert(conn, tx);
    }

    pub fn remove(&self, conn: &ConnId) {
        self.inner.remove(conn);
    }

    fn push(&self, conn: ConnId, msg: Message) {
        if let Some(tx) = self.inner.get(&conn) {
            if let Err(e) = tx.send(msg) {
                error!("Failed to queue WS message for {conn}: {e}");
            }
        } else {
            warn!("Attempted to send to disconnected connection {conn}");
        }
    }
}

#[async_trait]
impl ConnectionSink for PeerSinks {
    async fn send(&self, conn: ConnId, signal: Signal) {
        match serde_json::to_string(&signal) {
            Ok(json) => self.push(conn, Message::Text(json.into())),
            Err(e) => error!("Failed to serialize signal: {e}"),
        }
    }

    async fn ping(&self, conn: ConnId) {
        self.push(conn, Message::Ping(Vec::new().into()));
    }

    async fn close(&self, conn: ConnId) {
        self.inner.remove(&conn);
    }
}
