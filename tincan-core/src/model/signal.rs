use crate::model::room::RoomId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    pub username: Option<String>,
    pub credential: Option<String>,
}

/// Opaque session description (SDP offer or answer). The relay forwards it
/// untouched; only the peer session implementation interprets it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct SessionDescription(pub serde_json::Value);

/// Opaque ICE candidate, exchanged during trickle ICE.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct CandidateInit(pub serde_json::Value);

/// Control-channel envelope: one JSON object per message, tagged by kind.
/// Both the relay and the client match on this exhaustively so an unhandled
/// kind is a compile error rather than a silently dropped message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Signal {
    /// client -> relay: mark a room id as valid for joining.
    #[serde(rename_all = "camelCase")]
    CreateRoom { room_id: RoomId },

    /// client -> relay: join (or rejoin) a room.
    #[serde(rename_all = "camelCase")]
    Join { room_id: RoomId },

    /// relay -> client: join acknowledged, with the assigned role.
    #[serde(rename_all = "camelCase")]
    Joined { room_id: RoomId, is_initiator: bool },

    /// relay -> client: the other participant has arrived.
    Ready,

    /// peer -> peer via relay.
    Offer { offer: SessionDescription },

    /// peer -> peer via relay.
    Answer { answer: SessionDescription },

    /// peer -> peer via relay, trickle ICE.
    IceCandidate { candidate: CandidateInit },

    /// peer -> peer via relay: sender is tearing down its session and will
    /// renegotiate.
    Restart,

    /// peer -> peer via relay: liveness cross-check.
    CheckPeer,

    /// peer -> peer via relay: reply to check-peer.
    PeerReady,

    /// relay -> client: the other participant's connection is gone.
    PeerDisconnected,

    /// relay -> client: a registry operation failed.
    Error {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        redirect: Option<bool>,
    },
}

impl Signal {
    /// Signals a client may ask the relay to forward verbatim to the other
    /// room member. Registry operations and relay-origin notifications are
    /// not relayable.
    pub fn is_relayable(&self) -> bool {
        matches!(
            self,
            Signal::Offer { .. }
                | Signal::Answer { .. }
                | Signal::IceCandidate { .. }
                | Signal::Restart
                | Signal::CheckPeer
                | Signal::PeerReady
        )
    }
}
