//! Networked client.
//!
//! The client maintains:
//! - A datagram socket to the relay
//! - A receive task forwarding raw datagrams into a bounded queue
//! - An outbox fed by the simulation (hooks, input, join replies)
//! - The local [`Game`] and the [`SyncController`] mirroring peers
//!
//! The simulation only ever runs inside [`GameClient::frame`], which drains
//! the inbound queue first, so network input and ticks never interleave.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;

use anyhow::Context;
use blastar_shared::{
    config::ArenaConfig,
    entity::{Commands, Entity, EntityHooks},
    impulse::Impulse,
    net::{ClientMsg, DatagramConn},
    render::RenderBackend,
    rules::{destroy_on_contact, ClampToArena},
    wire::{PositionSync, SyncPayload},
};
use bytes::Bytes;
use tokio::{
    sync::mpsc::{self, error::TryRecvError},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
    game::{Game, SpriteSheet},
    input::InputState,
    sync::{Dispatch, Outbox, SyncController},
};

/// Datagrams buffered between the receive task and the frame loop.
const INBOUND_QUEUE: usize = 64;

/// Client connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// Receiving from the relay.
    Connected,
    /// The receive loop ended. The local simulation keeps running.
    Disconnected,
}

/// Hooks of the local player when peers are watching.
///
/// Same arena rules as offline play, plus a position report whenever the
/// force queue runs dry.
pub struct NetworkedPlayerHooks {
    pub arena: ClampToArena,
    pub outbox: Outbox,
}

impl EntityHooks for NetworkedPlayerHooks {
    fn on_wall_collided(&self, entity: &mut Entity, commands: &mut Commands) {
        self.arena.on_wall_collided(entity, commands);
    }

    fn on_collision(&self, entity: &Entity, other: &Entity, commands: &mut Commands) {
        destroy_on_contact(entity, other, commands);
    }

    fn on_force_consumed(&self, force: &Impulse, entity: &Entity, _commands: &mut Commands) {
        if !entity.force_queue().is_empty() {
            return;
        }
        let sync = SyncPayload {
            position: PositionSync::from_position(entity.position()),
            impulse: force.clone(),
        };
        if self.outbox.send(ClientMsg::PositionSync(sync)).is_err() {
            debug!("Outbox closed, position sync dropped");
        }
    }
}

/// High-level game client.
pub struct GameClient {
    pub state: ClientState,
    pub game: Game,
    pub sync: SyncController,

    conn: Arc<DatagramConn>,
    inbound: mpsc::Receiver<Bytes>,
    outbox: Outbox,
    outbox_rx: mpsc::UnboundedReceiver<ClientMsg>,
    recv_task: JoinHandle<()>,
}

impl GameClient {
    /// Binds a socket, spawns the local player and announces it to the relay.
    pub async fn connect(
        cfg: &ArenaConfig,
        renderer: Box<dyn RenderBackend>,
        sprites: SpriteSheet,
    ) -> anyhow::Result<Self> {
        let relay_addr: SocketAddr = cfg.relay_addr.parse().context("parse relay_addr")?;
        info!(relay = %relay_addr, "Connecting to relay");

        let bind_ip = match relay_addr.ip() {
            IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
        };
        let conn = Arc::new(DatagramConn::connect(SocketAddr::new(bind_ip, 0), relay_addr).await?);

        let (outbox, outbox_rx) = mpsc::unbounded_channel();
        let arena = ClampToArena { bounds: cfg.arena };
        let player_hooks = Arc::new(NetworkedPlayerHooks {
            arena,
            outbox: outbox.clone(),
        });
        let game = Game::new(
            cfg.clone(),
            renderer,
            sprites,
            player_hooks,
            &mut rand::thread_rng(),
        );
        let sync = SyncController::new(
            game.player_id(),
            outbox.clone(),
            Arc::new(arena),
            cfg.sprite_size,
            sprites.enemy,
        );

        let (tx, inbound) = mpsc::channel(INBOUND_QUEUE);
        let recv_task = tokio::spawn(receive_loop(conn.clone(), tx));

        let mut client = Self {
            state: ClientState::Connected,
            game,
            sync,
            conn,
            inbound,
            outbox,
            outbox_rx,
            recv_task,
        };

        let snapshot = client
            .game
            .player()
            .map(Entity::snapshot)
            .context("local player missing after spawn")?;
        client.conn.send_msg(&ClientMsg::Join(snapshot)).await?;
        // The join announcement goes out first; anything the spawn queued follows.
        client.flush_outbox().await?;
        info!(local = %client.local_addr()?, "Joined relay");

        Ok(client)
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        self.conn.local_addr()
    }

    pub fn relay_addr(&self) -> SocketAddr {
        self.conn.peer_addr()
    }

    /// One frame: apply network input, then local input, tick, and send.
    pub async fn frame(&mut self, input: &InputState) -> anyhow::Result<()> {
        self.pump_inbound();

        let outbox = &self.outbox;
        self.game.apply_input(input, |imp| {
            if outbox.send(ClientMsg::Impulse(imp.clone())).is_err() {
                debug!("Outbox closed, impulse dropped");
            }
        });
        self.game.tick();

        self.flush_outbox().await
    }

    /// Applies every datagram received since the last call.
    pub fn pump_inbound(&mut self) {
        if self.state == ClientState::Disconnected {
            return;
        }
        loop {
            match self.inbound.try_recv() {
                Ok(datagram) => {
                    let dispatch = self
                        .sync
                        .handle_datagram(&datagram, self.game.manager_mut());
                    if dispatch == Dispatch::Stop {
                        self.disconnect();
                        return;
                    }
                }
                Err(TryRecvError::Empty) => return,
                Err(TryRecvError::Disconnected) => {
                    info!("Receive loop ended");
                    self.state = ClientState::Disconnected;
                    return;
                }
            }
        }
    }

    fn disconnect(&mut self) {
        self.inbound.close();
        self.recv_task.abort();
        self.state = ClientState::Disconnected;
    }

    async fn flush_outbox(&mut self) -> anyhow::Result<()> {
        while let Ok(msg) = self.outbox_rx.try_recv() {
            self.conn
                .send_msg(&msg)
                .await
                .with_context(|| format!("send {:?}", msg.packet_type()))?;
        }
        Ok(())
    }

    /// Tells peers we are leaving and stops receiving.
    pub async fn quit(mut self) -> anyhow::Result<()> {
        self.flush_outbox().await?;
        self.conn.send_msg(&ClientMsg::Quit).await?;
        self.disconnect();
        info!("Left relay");
        Ok(())
    }

    /// Human-readable status lines for the console.
    pub fn status(&self) -> Vec<String> {
        let manager = self.game.manager();
        let mut out = vec![
            format!("State: {:?}", self.state),
            format!("Relay: {}", self.relay_addr()),
            format!("Frame: {}", manager.frame()),
            format!("Entities: {}", manager.len()),
            format!("Peers: {}", self.sync.peer_count()),
        ];
        match self.game.player() {
            Some(p) => out.push(format!(
                "Player: ({:.1}, {:.1}) {:?} velocity {}",
                p.position().x,
                p.position().y,
                p.state(),
                p.velocity()
            )),
            None => out.push("Player: removed".to_string()),
        }
        out
    }
}

impl Drop for GameClient {
    fn drop(&mut self) {
        self.recv_task.abort();
    }
}

async fn receive_loop(conn: Arc<DatagramConn>, tx: mpsc::Sender<Bytes>) {
    loop {
        let datagram = match conn.recv().await {
            Ok(datagram) => datagram,
            Err(e) => {
                warn!(error = %e, "Receive failed, closing receive loop");
                break;
            }
        };
        if tx.send(datagram).await.is_err() {
            debug!("Frame loop stopped listening");
            break;
        }
    }
}
