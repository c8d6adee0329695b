use crate::event::Event;
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tincan_core::Signal;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("control channel is not open")]
    NotOpen,

    #[error("websocket error: {0}")]
    Ws(String),

    #[error("signal encoding error: {0}")]
    Codec(String),
}

/// The persistent signaling channel to the relay. Implementations emit
/// [`Event::ChannelOpen`], [`Event::ChannelClosed`] and [`Event::Signal`]
/// into the client loop; reconnection policy lives in the client, not here.
#[async_trait]
pub trait ControlChannel: Send + Sync {
    /// Establish (or re-establish) the channel.
    async fn connect(&self, events: mpsc::Sender<Event>) -> Result<(), ChannelError>;

    /// Send a signal; fails fast when no socket is live (the resilience
    /// layer recovers from lost messages, so there is no buffering here).
    async fn send(&self, signal: Signal) -> Result<(), ChannelError>;

    fn is_open(&self) -> bool;
}

/// tokio-tungstenite control channel: a writer pump plus a reader task that
/// feeds the client's event loop.
pub struct WsControlChannel {
    url: String,
    out: Arc<Mutex<Option<mpsc::UnboundedSender<Message>>>>,
}

impl WsControlChannel {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            out: Arc::new(Mutex::new(None)),
        }
    }
}

#[async_trait]
impl ControlChannel for WsControlChannel {
    async fn connect(&self, events: mpsc::Sender<Event>) -> Result<(), ChannelError> {
        let (ws, _) = connect_async(&self.url)
            .await
            .map_err(|e| ChannelError::Ws(e.to_string()))?;
        info!("Control channel connected: {}", self.url);

        let (mut write, mut read) = ws.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

        if let Ok(mut guard) = self.out.lock() {
            *guard = Some(tx.clone());
        }

        tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                if write.send(msg).await.is_err() {
                    break;
                }
            }
            let _ = write.close().await;
        });

        let out = Arc::clone(&self.out);
        let pong_tx = tx.clone();
        let reader_events = events.clone();
        tokio::spawn(async move {
            while let Some(Ok(msg)) = read.next().await {
                match msg {
                    Message::Text(text) => match serde_json::from_str::<Signal>(text.as_str()) {
                        Ok(signal) => {
                            if reader_events.send(Event::Signal(signal)).await.is_err() {
                                return;
                            }
                        }
                        Err(e) => warn!("Malformed signal from relay: {e}"),
                    },
                    Message::Ping(payload) => {
                        // Answer the relay's liveness probe ourselves; the
                        // writer pump may otherwise sit idle for a while.
                        let _ = pong_tx.send(Message::Pong(payload));
                    }
                    Message::Close(_) => break,
                    other => debug!("Ignoring frame: {other:?}"),
                }
            }

            // Clear the sink only if a newer connection has not replaced it.
            if let Ok(mut guard) = out.lock() {
                if guard.as_ref().is_some_and(|t| t.same_channel(&pong_tx)) {
                    *guard = None;
                }
            }
            let _ = reader_events.send(Event::ChannelClosed).await;
        });

        events
            .send(Event::ChannelOpen)
            .await
            .map_err(|_| ChannelError::NotOpen)?;
        Ok(())
    }

    async fn send(&self, signal: Signal) -> Result<(), ChannelError> {
        let json = serde_json::to_string(&signal).map_err(|e| ChannelError::Codec(e.to_string()))?;
        let tx = self
            .out
            .lock()
            .ok()
            .and_then(|guard| guard.clone())
            .ok_or(ChannelError::NotOpen)?;
        tx.send(Message::Text(json.into()))
            .map_err(|_| ChannelError::NotOpen)
    }

    fn is_open(&self) -> bool {
        self.out
            .lock()
            .map(|guard| guard.as_ref().is_some_and(|t| !t.is_closed()))
            .unwrap_or(false)
    }
}
