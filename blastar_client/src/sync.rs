//! Keeps remote players' entities in step with what their owners report.
//!
//! Peers are never authoritative over each other. A remote entity is driven
//! by replaying the impulses its owner accepted, and when the owner's queue
//! drains it sends its position so drift on a single axis can be corrected by
//! queueing extra copies of the last impulse.

use std::collections::HashMap;
use std::sync::Arc;

use blastar_shared::{
    entity::{Entity, EntityHooks, EntityId},
    impulse::Impulse,
    manager::EntityManager,
    math::IVec2,
    net::{ClientMsg, PeerBody, PeerMsg},
    render::SpriteSet,
    wire::{EntitySnapshot, SyncPayload},
};
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use crate::game::PLAYER_ID;

/// Messages waiting to go out to the relay.
pub type Outbox = mpsc::UnboundedSender<ClientMsg>;

/// Most impulse copies a single position sync may queue.
pub const MAX_REPLAYED_IMPULSES: usize = 1024;

/// Whether the receive loop keeps going.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Continue,
    Stop,
}

/// Result of comparing a peer entity to a reported position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reconciliation {
    InSync,
    /// `count` copies of the reported impulse were queued.
    Corrected { count: usize },
    /// Both axes disagree; left alone.
    Diagonal { dx: i64, dy: i64 },
    /// The impulse has no motion on the drifting axis.
    ZeroRate,
}

/// Single-axis correction of `entity` towards a reported position.
///
/// The integer error `entity - reported` on the one drifting axis is divided
/// by the impulse's rate on that axis. The magnitude, truncated, is the
/// number of copies queued, bypassing the stack-depth cap.
pub fn reconcile(entity: &mut Entity, sync: &SyncPayload) -> Reconciliation {
    let current = entity.position().trunc();
    let dx = i64::from(current.x) - i64::from(sync.position.x);
    let dy = i64::from(current.y) - i64::from(sync.position.y);

    let (error, rate) = match (dx, dy) {
        (0, 0) => return Reconciliation::InSync,
        (error, 0) => (error, sync.impulse.x),
        (0, error) => (error, sync.impulse.y),
        (dx, dy) => return Reconciliation::Diagonal { dx, dy },
    };

    let steps = (error as f32 / rate).abs();
    if !steps.is_finite() {
        return Reconciliation::ZeroRate;
    }
    let count = (steps.trunc() as usize).min(MAX_REPLAYED_IMPULSES);
    entity.enqueue_repeated(&sync.impulse, count);
    Reconciliation::Corrected { count }
}

/// Applies relayed messages to the local simulation.
pub struct SyncController {
    local_player: EntityId,
    peers: HashMap<u8, EntityId>,
    outbox: Outbox,
    peer_hooks: Arc<dyn EntityHooks>,
    peer_dimensions: IVec2,
    peer_sprites: SpriteSet,
}

impl SyncController {
    pub fn new(
        local_player: EntityId,
        outbox: Outbox,
        peer_hooks: Arc<dyn EntityHooks>,
        peer_dimensions: IVec2,
        peer_sprites: SpriteSet,
    ) -> Self {
        Self {
            local_player,
            peers: HashMap::new(),
            outbox,
            peer_hooks,
            peer_dimensions,
            peer_sprites,
        }
    }

    /// Entity of the peer with relay index `sender`, if it joined.
    pub fn peer(&self, sender: u8) -> Option<EntityId> {
        self.peers.get(&sender).copied()
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    /// Decodes and applies one relayed datagram. Malformed datagrams are
    /// logged and skipped.
    pub fn handle_datagram(&mut self, datagram: &[u8], manager: &mut EntityManager) -> Dispatch {
        match PeerMsg::decode(datagram) {
            Ok(msg) => self.handle(msg, manager),
            Err(e) => {
                warn!(error = %e, len = datagram.len(), "Dropping malformed datagram");
                Dispatch::Continue
            }
        }
    }

    pub fn handle(&mut self, msg: PeerMsg, manager: &mut EntityManager) -> Dispatch {
        let sender = msg.sender;
        match msg.body {
            PeerBody::Join(snapshot) => self.on_join(sender, &snapshot, manager),
            PeerBody::Impulse(impulse) => self.on_impulse(sender, impulse, manager),
            PeerBody::PositionSync(sync) => self.on_position_sync(sender, &sync, manager),
            PeerBody::Unhandled(tag) => {
                info!(sender, tag, "Unhandled packet type, closing receive loop");
                return Dispatch::Stop;
            }
        }
        Dispatch::Continue
    }

    fn on_join(&mut self, sender: u8, snapshot: &EntitySnapshot, manager: &mut EntityManager) {
        if self.peers.contains_key(&sender) {
            debug!(sender, "Duplicate join ignored");
            return;
        }

        // Answer so the newcomer learns about us too.
        match manager.get(self.local_player) {
            Some(player) => {
                if self.outbox.send(ClientMsg::Join(player.snapshot())).is_err() {
                    warn!("Outbox closed, join reply dropped");
                }
            }
            None => warn!(sender, "Local player gone, not answering join"),
        }

        let peer = Entity::from_snapshot(
            format!("{PLAYER_ID}_{sender}"),
            snapshot,
            self.peer_dimensions,
            self.peer_hooks.clone(),
        )
        .with_sprites(self.peer_sprites);
        let id = manager.summon(peer);
        self.peers.insert(sender, id);
        info!(sender, x = snapshot.x, y = snapshot.y, "Peer joined");
    }

    fn on_impulse(&mut self, sender: u8, impulse: Impulse, manager: &mut EntityManager) {
        let Some(peer) = self.peer_entity(sender, manager) else {
            warn!(sender, "Impulse from unknown peer");
            return;
        };
        if !peer.add_force(impulse) {
            trace!(sender, "Peer force queue full, impulse dropped");
        }
    }

    fn on_position_sync(&mut self, sender: u8, sync: &SyncPayload, manager: &mut EntityManager) {
        let Some(peer) = self.peer_entity(sender, manager) else {
            warn!(sender, "Position sync from unknown peer");
            return;
        };
        match reconcile(peer, sync) {
            Reconciliation::InSync => trace!(sender, "Peer in sync"),
            Reconciliation::Corrected { count } => {
                debug!(sender, count, "Queued correcting impulses");
                if count == MAX_REPLAYED_IMPULSES {
                    warn!(sender, "Correction capped");
                }
            }
            Reconciliation::Diagonal { dx, dy } => {
                warn!(sender, dx, dy, "Diagonal drift, not corrected");
            }
            Reconciliation::ZeroRate => {
                warn!(
                    sender,
                    impulse = %sync.impulse,
                    "Drifting axis has no rate, not corrected"
                );
            }
        }
    }

    fn peer_entity<'m>(
        &self,
        sender: u8,
        manager: &'m mut EntityManager,
    ) -> Option<&'m mut Entity> {
        let id = self.peers.get(&sender)?;
        manager.get_mut(*id)
    }
}

#[cfg(test)]
mod tests {
    use blastar_shared::{
        entity::{EntityParams, NoHooks, MAX_SNAPSHOT_STACK_DEPTH},
        manager::SimulationRules,
        math::Vec2,
        net::relay_frame,
        wire::PositionSync,
    };

    use super::*;

    fn setup() -> (
        SyncController,
        EntityManager,
        mpsc::UnboundedReceiver<ClientMsg>,
    ) {
        let mut manager = EntityManager::headless(SimulationRules {
            tick_on_summon_and_kill: false,
            ..SimulationRules::default()
        });
        let local = manager.summon(Entity::new(
            PLAYER_ID,
            EntityParams {
                position: Vec2::new(400.0, 400.0),
                dimensions: IVec2::new(32, 32),
                max_stack_depth: 1,
                max_speed: 5.0,
                falloff: 0.1,
            },
            Arc::new(NoHooks),
        ));
        let (tx, rx) = mpsc::unbounded_channel();
        let controller = SyncController::new(
            local,
            tx,
            Arc::new(NoHooks),
            IVec2::new(32, 32),
            SpriteSet::default(),
        );
        (controller, manager, rx)
    }

    fn join(controller: &mut SyncController, manager: &mut EntityManager, sender: u8, x: u32) {
        let snap = EntitySnapshot {
            x,
            y: 50,
            max_stack_depth: 1,
            max_speed: 5,
            falloff: 0.1,
        };
        let datagram = relay_frame(sender, &ClientMsg::Join(snap).encode());
        assert_eq!(controller.handle_datagram(&datagram, manager), Dispatch::Continue);
    }

    #[test]
    fn join_summons_peer_and_answers() {
        let (mut controller, mut manager, mut rx) = setup();
        join(&mut controller, &mut manager, 2, 50);

        let id = controller.peer(2).unwrap();
        let peer = manager.get(id).unwrap();
        assert_eq!(peer.id(), "Player_2");
        assert_eq!(peer.position(), Vec2::new(50.0, 50.0));

        match rx.try_recv().unwrap() {
            ClientMsg::Join(snap) => assert_eq!((snap.x, snap.y), (400, 400)),
            other => panic!("expected join reply, got {other:?}"),
        }
    }

    #[test]
    fn duplicate_join_is_ignored() {
        let (mut controller, mut manager, mut rx) = setup();
        join(&mut controller, &mut manager, 1, 50);
        join(&mut controller, &mut manager, 1, 60);
        assert_eq!(controller.peer_count(), 1);
        assert_eq!(manager.len(), 2);
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn impulse_drives_known_peer_only() {
        let (mut controller, mut manager, _rx) = setup();
        let imp = Impulse::new(1.0, 0.0, 0.1, false, 5.0);
        let from_stranger = relay_frame(9, &ClientMsg::Impulse(imp.clone()).encode());
        assert_eq!(
            controller.handle_datagram(&from_stranger, &mut manager),
            Dispatch::Continue
        );

        join(&mut controller, &mut manager, 1, 50);
        let datagram = relay_frame(1, &ClientMsg::Impulse(imp).encode());
        controller.handle_datagram(&datagram, &mut manager);
        let peer = manager.get(controller.peer(1).unwrap()).unwrap();
        assert_eq!(peer.force_queue().len(), 1);
    }

    #[test]
    fn single_axis_drift_queues_copies() {
        let (mut controller, mut manager, _rx) = setup();
        join(&mut controller, &mut manager, 1, 50);
        let sync = SyncPayload {
            position: PositionSync { x: 40, y: 50 },
            impulse: Impulse::new(-2.0, 0.0, 0.1, false, 5.0),
        };
        let datagram = relay_frame(1, &ClientMsg::PositionSync(sync).encode());
        controller.handle_datagram(&datagram, &mut manager);

        let peer = manager.get(controller.peer(1).unwrap()).unwrap();
        assert_eq!(peer.force_queue().len(), 5);
        assert!(peer.force_queue().iter().all(|f| f.x == -2.0));
    }

    #[test]
    fn diagonal_and_zero_rate_drift_are_left_alone() {
        let (_controller, mut manager, _rx) = setup();
        let id = manager.entities()[0].handle();
        let entity = manager.get_mut(id).unwrap();

        let diagonal = SyncPayload {
            position: PositionSync { x: 390, y: 390 },
            impulse: Impulse::new(-2.0, -2.0, 0.1, false, 5.0),
        };
        assert_eq!(
            reconcile(entity, &diagonal),
            Reconciliation::Diagonal { dx: 10, dy: 10 }
        );

        let zero = SyncPayload {
            position: PositionSync { x: 390, y: 400 },
            impulse: Impulse::new(0.0, 1.0, 0.1, false, 5.0),
        };
        assert_eq!(reconcile(entity, &zero), Reconciliation::ZeroRate);

        let exact = SyncPayload {
            position: PositionSync { x: 400, y: 400 },
            impulse: Impulse::new(3.0, 0.0, 0.1, false, 5.0),
        };
        assert_eq!(reconcile(entity, &exact), Reconciliation::InSync);
        assert!(entity.force_queue().is_empty());
    }

    #[test]
    fn join_with_huge_stack_depth_is_capped() {
        let (mut controller, mut manager, _rx) = setup();
        let snap = EntitySnapshot {
            x: 10,
            y: 10,
            max_stack_depth: u32::MAX,
            max_speed: 5,
            falloff: 0.1,
        };
        let datagram = relay_frame(1, &ClientMsg::Join(snap).encode());
        assert_eq!(
            controller.handle_datagram(&datagram, &mut manager),
            Dispatch::Continue
        );

        let peer = manager.get(controller.peer(1).unwrap()).unwrap();
        assert_eq!(peer.max_stack_depth(), MAX_SNAPSHOT_STACK_DEPTH);
    }

    #[test]
    fn join_at_the_far_edge_of_the_wire_range() {
        let (mut controller, mut manager, _rx) = setup();
        join(&mut controller, &mut manager, 1, u32::MAX);
        manager.tick();

        let peer = manager.get(controller.peer(1).unwrap()).unwrap();
        assert_eq!(peer.collision_box().bottom_right().x, i32::MAX);
    }

    #[test]
    fn nan_impulse_is_dropped_before_it_reaches_the_queue() {
        let (mut controller, mut manager, _rx) = setup();
        join(&mut controller, &mut manager, 1, 50);

        let imp = Impulse::new(1.0, 0.0, 0.1, false, 5.0);
        let good = relay_frame(1, &ClientMsg::Impulse(imp).encode());
        let mut poisoned = good.to_vec();
        poisoned[2..6].copy_from_slice(&f32::NAN.to_be_bytes());
        assert_eq!(
            controller.handle_datagram(&poisoned, &mut manager),
            Dispatch::Continue
        );
        let id = controller.peer(1).unwrap();
        assert!(manager.get(id).unwrap().force_queue().is_empty());

        controller.handle_datagram(&good, &mut manager);
        assert_eq!(manager.get(id).unwrap().force_queue().len(), 1);
    }

    #[test]
    fn unhandled_tag_stops_the_loop() {
        let (mut controller, mut manager, _rx) = setup();
        assert_eq!(
            controller.handle_datagram(&[0, 5], &mut manager),
            Dispatch::Stop
        );
        assert_eq!(
            controller.handle_datagram(&[0, 1, 0], &mut manager),
            Dispatch::Continue
        );
    }
}
