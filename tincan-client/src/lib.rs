mod channel;
mod client;
mod event;
mod media;
mod negotiation;
mod resilience;
mod rtc;
mod sdp;
mod session;

pub use channel::{ChannelError, ControlChannel, WsControlChannel};
pub use client::{CallClient, CallConfig};
pub use event::{CallNotification, Event};
pub use media::{MediaError, MediaSource, MediaTracks};
pub use negotiation::{Negotiator, Role};
pub use resilience::{MAX_RESTART_ATTEMPTS, TimerSlot, restart_delay};
pub use rtc::{WebrtcSession, WebrtcSessionFactory};
pub use session::{PeerSession, SessionConfig, SessionError, SessionFactory, SessionState};
