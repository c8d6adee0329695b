use crate::session::SessionState;
use tincan_core::{CandidateInit, Signal};

/// Everything that can wake the call client. All stimuli funnel into one
/// channel and are processed one at a time, so handlers never race each
/// other.
#[derive(Debug)]
pub enum Event {
    /// Inbound control-channel signal.
    Signal(Signal),

    /// Control channel (re)established.
    ChannelOpen,

    /// Control channel dropped.
    ChannelClosed,

    /// Peer session connectivity changed. Tagged with the generation of the
    /// emitting session: a torn-down instance keeps reporting (closing a
    /// peer connection emits `Closed`) and those reports must not touch the
    /// state of its replacement.
    SessionState {
        generation: u64,
        state: SessionState,
    },

    /// Trickle ICE: the transport discovered a local candidate.
    LocalCandidate {
        generation: u64,
        candidate: CandidateInit,
    },

    /// A local capture track stopped (device sleep, permission revoked).
    TrackEnded,

    /// The embedding app became active again (tab visible, process resumed).
    Resumed,

    /// The embedding app went inactive; recovery timers stay disarmed.
    Suspended,

    /// Peer-session restart backoff elapsed.
    RestartTimer,

    /// Control-channel reconnect delay elapsed.
    ReconnectTimer,
}

/// User-visible call updates. Every failure path either recovers or lands
/// here with something actionable.
#[derive(Debug, Clone, PartialEq)]
pub enum CallNotification {
    Joined { is_initiator: bool },
    Connected,
    PeerDisconnected,
    /// The peer session dropped; automatic recovery is underway.
    SessionDown,
    /// Restart attempts hit the cap; the user must start over manually.
    RetriesExhausted,
    /// Capture is unavailable; needs user action, no automatic retry.
    MediaFailed(String),
    RoomError { message: String, redirect: bool },
}
