use crate::room::{RegistryCommand, Room, RoomError};
use crate::signaling::ConnectionSink;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tincan_core::{ConnId, RoomId, Signal};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// Liveness state for one registered control channel.
#[derive(Debug)]
struct ConnState {
    /// Cleared before each probe, set again by the pong. A connection still
    /// cleared at the next probe has missed a full probe interval and is
    /// evicted.
    alive: bool,
    room: Option<RoomId>,
}

/// Cloneable front for the registry actor.
#[derive(Clone)]
pub struct RegistryHandle {
    tx: mpsc::Sender<RegistryCommand>,
}

impl RegistryHandle {
    pub async fn register(&self, conn: ConnId) {
        let _ = self.tx.send(RegistryCommand::Register { conn }).await;
    }

    pub async fn create_room(&self, conn: ConnId, room: RoomId) {
        let _ = self.tx.send(RegistryCommand::CreateRoom { conn, room }).await;
    }

    pub async fn join(&self, conn: ConnId, room: RoomId) {
        let _ = self.tx.send(RegistryCommand::Join { conn, room }).await;
    }

    pub async fn relay(&self, conn: ConnId, signal: Signal) {
        let _ = self.tx.send(RegistryCommand::Relay { conn, signal }).await;
    }

    pub async fn disconnect(&self, conn: ConnId) {
        let _ = self.tx.send(RegistryCommand::Disconnect { conn }).await;
    }

    pub async fn pong(&self, conn: ConnId) {
        let _ = self.tx.send(RegistryCommand::Pong { conn }).await;
    }

    /// Whether `room` was created and is still valid for joining.
    pub async fn room_exists(&self, room: RoomId) -> bool {
        let (reply, rx) = oneshot::channel();
        let _ = self
            .tx
            .send(RegistryCommand::RoomExists { room, reply })
            .await;
        rx.await.unwrap_or(false)
    }
}

/// Single-writer owner of all room and connection state. One task runs the
/// event loop; commands and the periodic liveness sweep are arms of the same
/// `select!`, so no two of them ever interleave.
pub struct Registry {
    rooms: HashMap<RoomId, Room>,
    conns: HashMap<ConnId, ConnState>,
    sink: Arc<dyn ConnectionSink>,
    command_rx: mpsc::Receiver<RegistryCommand>,
    sweep_interval: Duration,
}

impl Registry {
    /// Spawn the registry actor and return its handle.
    pub fn spawn(sink: Arc<dyn ConnectionSink>, sweep_interval: Duration) -> RegistryHandle {
        let (tx, command_rx) = mpsc::channel(256);
        let registry = Self {
            rooms: HashMap::new(),
            conns: HashMap::new(),
            sink,
            command_rx,
            sweep_interval,
        };
        tokio::spawn(registry.run());
        RegistryHandle { tx }
    }

    pub async fn run(mut self) {
        info!("Registry event loop started");

        let mut sweep = tokio::time::interval(self.sweep_interval);
        sweep.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick of an interval fires immediately; skip it so a fresh
        // connection is not probed before it can possibly answer.
        sweep.tick().await;

        loop {
            tokio::select! {
                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(c) => self.handle_command(c).await,
                        None => {
                            info!("Command channel closed. Shutting down registry.");
                            break;
                        }
                    }
                }

                _ = sweep.tick() => {
                    self.sweep().await;
                }
            }
        }

        info!("Registry event loop finished");
    }

    async fn handle_command(&mut self, cmd: RegistryCommand) {
        match cmd {
            RegistryCommand::Register { conn } => {
                debug!("Connection registered: {conn}");
                self.conns.insert(
                    conn,
                    ConnState {
                        alive: true,
                        room: None,
                    },
                );
            }

            RegistryCommand::CreateRoom { conn, room } => {
                info!("Room {room} created by {conn}");
                self.rooms.entry(room).or_default();
            }

            RegistryCommand::Join { conn, room } => {
                if let Err(e) = self.join(conn, room).await {
                    warn!("Join failed for {conn}: {e}");
                    self.sink
                        .send(
                            conn,
                            Signal::Error {
                                message: e.to_string(),
                                redirect: Some(true),
                            },
                        )
                        .await;
                }
            }

            RegistryCommand::Relay { conn, signal } => {
                self.relay(conn, signal).await;
            }

            RegistryCommand::Disconnect { conn } => {
                self.leave_room(&conn).await;
                self.conns.remove(&conn);
                debug!("Connection removed: {conn}");
            }

            RegistryCommand::Pong { conn } => {
                if let Some(state) = self.conns.get_mut(&conn) {
                    state.alive = true;
                }
            }

            RegistryCommand::RoomExists { room, reply } => {
                let _ = reply.send(self.rooms.contains_key(&room));
            }
        }
    }

    async fn join(&mut self, conn: ConnId, room_id: RoomId) -> Result<(), RoomError> {
        if !self.conns.contains_key(&conn) {
            // Register is always sent before any join on the same channel,
            // so this only happens for a connection mid-teardown.
            return Ok(());
        }

        // Joining always leaves any prior room first.
        self.leave_room(&conn).await;

        let conns = &self.conns;
        let room = self
            .rooms
            .get_mut(&room_id)
            .ok_or_else(|| RoomError::NotFound(room_id.clone()))?;

        room.prune(|m| conns.contains_key(m));

        if room.is_full() {
            return Err(RoomError::Full(room_id));
        }

        let is_initiator = room.add(conn);
        let peers: Vec<ConnId> = room.others(&conn).copied().collect();

        if let Some(state) = self.conns.get_mut(&conn) {
            state.room = Some(room_id.clone());
        }

        info!("{conn} joined room {room_id} (initiator: {is_initiator})");

        self.sink
            .send(
                conn,
                Signal::Joined {
                    room_id,
                    is_initiator,
                },
            )
            .await;

        // Only the member that was already present learns the room is now
        // complete; the new joiner waits for the initiator's offer instead.
        for peer in peers {
            self.sink.send(peer, Signal::Ready).await;
        }

        Ok(())
    }

    async fn relay(&mut self, conn: ConnId, signal: Signal) {
        let Some(room_id) = self.conns.get(&conn).and_then(|s| s.room.clone()) else {
            // Sender may be mid-disconnect; best-effort relay drops silently.
            debug!("Dropping relay from roomless connection {conn}");
            return;
        };

        let Some(room) = self.rooms.get(&room_id) else {
            return;
        };

        let targets: Vec<ConnId> = room.others(&conn).copied().collect();
        for target in targets {
            self.sink.send(target, signal.clone()).await;
        }
    }

    /// Remove `conn` from its room, deleting the room when it empties and
    /// notifying the remaining member otherwise.
    async fn leave_room(&mut self, conn: &ConnId) {
        let Some(room_id) = self.conns.get_mut(conn).and_then(|s| s.room.take()) else {
            return;
        };

        let Some(room) = self.rooms.get_mut(&room_id) else {
            return;
        };

        if !room.remove(conn) {
            return;
        }

        if room.is_empty() {
            // An emptied room is invalidated; joining it again requires an
            // explicit create.
            info!("Room {room_id} is empty, deleting");
            self.rooms.remove(&room_id);
            return;
        }

        let remaining = room.members();
        for member in remaining {
            self.sink.send(member, Signal::PeerDisconnected).await;
        }
    }

    /// Liveness sweep. Connections that never answered the previous probe are
    /// evicted; everyone else gets their flag cleared and a fresh ping.
    async fn sweep(&mut self) {
        let stale: Vec<ConnId> = self
            .conns
            .iter()
            .filter(|(_, state)| !state.alive)
            .map(|(conn, _)| *conn)
            .collect();

        for conn in stale {
            warn!("Evicting unresponsive connection {conn}");
            self.leave_room(&conn).await;
            self.conns.remove(&conn);
            self.sink.close(conn).await;
        }

        for (conn, state) in self.conns.iter_mut() {
            state.alive = false;
            self.sink.ping(*conn).await;
        }
    }
}
