mod model;

pub use model::{CandidateInit, ConnId, IceServerConfig, RoomId, SessionDescription, Signal};
