use crate::event::Event;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Consecutive peer-session restarts allowed before giving up.
pub const MAX_RESTART_ATTEMPTS: u32 = 5;

const BACKOFF_BASE_MS: u64 = 1000;
const BACKOFF_CEILING_MS: u64 = 10_000;

/// Backoff before restart attempt `attempt` (1-based, counted after the
/// increment): 2000, 4000, 8000, then capped at 10000 ms.
pub fn restart_delay(attempt: u32) -> Duration {
    let ms = BACKOFF_BASE_MS.saturating_mul(1u64 << attempt.min(10));
    Duration::from_millis(ms.min(BACKOFF_CEILING_MS))
}

/// One owned timer per failure domain. Arming always cancels the previous
/// handle first, so a domain can never have two outstanding timers.
#[derive(Default)]
pub struct TimerSlot {
    handle: Option<JoinHandle<()>>,
}

impl TimerSlot {
    pub fn is_pending(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    /// Fire `event` into the client loop after `delay`.
    pub fn arm(&mut self, delay: Duration, events: mpsc::Sender<Event>, event: Event) {
        self.cancel();
        self.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(event).await;
        }));
    }
}

impl Drop for TimerSlot {
    fn drop(&mut self) {
        self.cancel();
    }
}
