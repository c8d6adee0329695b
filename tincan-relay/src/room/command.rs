use tincan_core::{ConnId, RoomId, Signal};
use tokio::sync::oneshot;

/// Commands entering the registry actor. Every mutation of room or
/// connection state flows through this channel, which serializes joins,
/// relays, leaves and liveness sweeps against each other.
#[derive(Debug)]
pub enum RegistryCommand {
    /// A control channel was established.
    Register { conn: ConnId },

    /// Mark a room id as valid for joining. Idempotent.
    CreateRoom { conn: ConnId, room: RoomId },

    /// Join a room, leaving any prior room first.
    Join { conn: ConnId, room: RoomId },

    /// Forward a signal to the other member of the sender's room.
    Relay { conn: ConnId, signal: Signal },

    /// The control channel closed; tear down membership and notify the peer.
    Disconnect { conn: ConnId },

    /// A keepalive response arrived.
    Pong { conn: ConnId },

    /// Synchronous room-existence check for the pre-join probe.
    RoomExists {
        room: RoomId,
        reply: oneshot::Sender<bool>,
    },
}
