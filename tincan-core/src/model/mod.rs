mod conn;
mod room;
mod signal;

pub use conn::ConnId;
pub use room::RoomId;
pub use signal::{CandidateInit, IceServerConfig, SessionDescription, Signal};
