use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tincan_core::{CandidateInit, RoomId, SessionDescription, Signal};
use tincan_relay::{AppState, PeerSinks, Registry, router};

use crate::integration::init_tracing;
use crate::utils::{WsClient, http_get};

async fn start_relay() -> SocketAddr {
    let sinks = PeerSinks::new();
    let registry = Registry::spawn(Arc::new(sinks.clone()), Duration::from_secs(30));
    let app = router(AppState {
        registry,
        sinks,
        ice_servers: vec![],
    });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().expect("No local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Relay server died");
    });
    addr
}

#[tokio::test]
async fn full_signaling_flow_over_real_sockets() {
    init_tracing();
    let addr = start_relay().await;
    let room = RoomId::from("R7K2");

    assert_eq!(http_get(addr, "/rooms/R7K2").await, "false");

    let mut alice = WsClient::connect(addr).await;
    alice
        .send(&Signal::CreateRoom {
            room_id: room.clone(),
        })
        .await;
    alice.send(&Signal::Join {
        room_id: room.clone(),
    })
    .await;
    assert_eq!(
        alice.recv().await,
        Signal::Joined {
            room_id: room.clone(),
            is_initiator: true,
        }
    );

    assert_eq!(http_get(addr, "/rooms/R7K2").await, "true");

    let mut bob = WsClient::connect(addr).await;
    bob.send(&Signal::Join {
        room_id: room.clone(),
    })
    .await;
    assert_eq!(
        bob.recv().await,
        Signal::Joined {
            room_id: room.clone(),
            is_initiator: false,
        }
    );
    assert_eq!(alice.recv().await, Signal::Ready);

    // Offer / answer / trickle candidate pass through verbatim.
    let offer = Signal::Offer {
        offer: SessionDescription(json!({"type": "offer", "sdp": "v=0\r\nm=audio\r\n"})),
    };
    alice.send(&offer).await;
    assert_eq!(bob.recv().await, offer);

    let answer = Signal::Answer {
        answer: SessionDescription(json!({"type": "answer", "sdp": "v=0\r\nm=audio\r\n"})),
    };
    bob.send(&answer).await;
    assert_eq!(alice.recv().await, answer);

    let candidate = Signal::IceCandidate {
        candidate: CandidateInit(json!({"candidate": "candidate:0 1 UDP 1 127.0.0.1 9 typ host"})),
    };
    bob.send(&candidate).await;
    assert_eq!(alice.recv().await, candidate);

    // Bob hangs up; Alice is told, the half-empty room survives.
    bob.close().await;
    assert_eq!(alice.recv().await, Signal::PeerDisconnected);
    assert_eq!(http_get(addr, "/rooms/R7K2").await, "true");

    alice.close().await;
}

#[tokio::test]
async fn join_error_is_surfaced_over_the_socket() {
    init_tracing();
    let addr = start_relay().await;

    let mut client = WsClient::connect(addr).await;
    client
        .send(&Signal::Join {
            room_id: RoomId::from("guessing"),
        })
        .await;

    match client.recv().await {
        Signal::Error { message, redirect } => {
            assert!(message.contains("not found"), "got: {message}");
            assert_eq!(redirect, Some(true));
        }
        other => panic!("Expected an error, got {other:?}"),
    }
    client.close().await;
}
