use async_trait::async_trait;
use tincan_core::{ConnId, Signal};

/// Output port of the registry actor: how signals, liveness probes and
/// evictions reach the transport layer. The WebSocket server implements this;
/// tests substitute a capturing mock.
#[async_trait]
pub trait ConnectionSink: Send + Sync {
    /// Deliver a signal to one connection. Best-effort: a missing or closed
    /// channel drops the message without retry.
    async fn send(&self, conn: ConnId, signal: Signal);

    /// Send a liveness probe.
    async fn ping(&self, conn: ConnId);

    /// Force-close the connection's channel (eviction).
    async fn close(&self, conn: ConnId);
}
