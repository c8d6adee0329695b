mod room;
mod signaling;

pub use room::{Registry, RegistryCommand, RegistryHandle, Room, RoomError};
pub use signaling::{AppState, ConnectionSink, PeerSinks, router};
