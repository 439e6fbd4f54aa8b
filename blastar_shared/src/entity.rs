//! Entities: a position driven by a bounded queue of impulses.
//!
//! Each frame an alive entity:
//! 1. feeds its resultant velocity through the front queued impulse,
//!    popping that impulse once it finishes;
//! 2. moves by its velocity;
//! 3. lets its hooks react to the new position (walls);
//! 4. snaps its collision box to the new position;
//! 5. samples its box against every other entity;
//! 6. draws itself.
//!
//! A dead entity only draws itself.
//!
//! Reactions are delivered through [`EntityHooks`]. Hooks cannot reach the
//! manager directly; they queue [`Command`]s that the manager applies once the
//! entity's tick returns.

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use crate::{
    collision::CollisionBox,
    impulse::Impulse,
    math::{IVec2, Vec2},
    render::{RenderBackend, SpriteId, SpriteSet},
    wire::{coord_to_wire, EntitySnapshot},
};
use tracing::warn;

static NEXT_ENTITY_ID: AtomicU64 = AtomicU64::new(1);

/// Deepest force queue a peer's snapshot may ask for.
pub const MAX_SNAPSHOT_STACK_DEPTH: usize = 64;

/// Identity of an entity, unique within the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u64);

impl EntityId {
    pub fn new_unique() -> Self {
        EntityId(NEXT_ENTITY_ID.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifeState {
    Alive,
    Dead,
}

/// Requests a hook can make of the manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Kill(EntityId),
}

/// Command buffer handed to hooks.
#[derive(Debug, Default)]
pub struct Commands {
    queue: Vec<Command>,
}

impl Commands {
    pub fn kill(&mut self, id: EntityId) {
        self.queue.push(Command::Kill(id));
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn drain(&mut self) -> std::vec::Drain<'_, Command> {
        self.queue.drain(..)
    }
}

/// Reactions attached to an entity.
///
/// Every method defaults to doing nothing.
pub trait EntityHooks: Send + Sync {
    /// Called after the entity moved, before its collision box is refreshed.
    /// May adjust the position.
    fn on_wall_collided(&self, _entity: &mut Entity, _commands: &mut Commands) {}

    /// Called once per sample point of `entity` that lands in `other`.
    fn on_collision(&self, _entity: &Entity, _other: &Entity, _commands: &mut Commands) {}

    /// Called when the front queued impulse finished and was popped.
    fn on_force_consumed(&self, _force: &Impulse, _entity: &Entity, _commands: &mut Commands) {}
}

/// Hooks that never react.
#[derive(Debug, Default)]
pub struct NoHooks;

impl EntityHooks for NoHooks {}

/// Construction parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntityParams {
    pub position: Vec2,
    /// Collision box size, normally the sprite size.
    pub dimensions: IVec2,
    pub max_stack_depth: usize,
    pub max_speed: f32,
    pub falloff: f32,
}

/// Per-tick environment supplied by the manager.
pub struct TickContext<'a> {
    pub renderer: &'a mut dyn RenderBackend,
    pub commands: &'a mut Commands,
    /// Whether dead entities still block alive ones.
    pub dead_entities_collide: bool,
}

pub struct Entity {
    handle: EntityId,
    id: String,
    position: Vec2,
    force_queue: VecDeque<Impulse>,
    max_stack_depth: usize,
    max_speed: f32,
    falloff: f32,
    velocity: Impulse,
    collision_box: CollisionBox,
    state: LifeState,
    sprites: SpriteSet,
    hooks: Arc<dyn EntityHooks>,
}

impl std::fmt::Debug for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entity")
            .field("handle", &self.handle)
            .field("id", &self.id)
            .field("position", &self.position)
            .field("velocity", &self.velocity)
            .field("queued", &self.force_queue.len())
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Entity {
    pub fn new(id: impl Into<String>, params: EntityParams, hooks: Arc<dyn EntityHooks>) -> Self {
        Self {
            handle: EntityId::new_unique(),
            id: id.into(),
            position: params.position,
            force_queue: VecDeque::new(),
            max_stack_depth: params.max_stack_depth,
            max_speed: params.max_speed,
            falloff: params.falloff,
            velocity: Impulse::resting(params.falloff, params.max_speed),
            collision_box: CollisionBox::new(params.position.trunc(), params.dimensions),
            state: LifeState::Alive,
            sprites: SpriteSet::default(),
            hooks,
        }
    }

    /// Rebuilds a remote peer's entity from its snapshot.
    ///
    /// A stack depth above [`MAX_SNAPSHOT_STACK_DEPTH`] is clamped to it.
    pub fn from_snapshot(
        id: impl Into<String>,
        snapshot: &EntitySnapshot,
        dimensions: IVec2,
        hooks: Arc<dyn EntityHooks>,
    ) -> Self {
        let id = id.into();
        let mut max_stack_depth = snapshot.max_stack_depth as usize;
        if max_stack_depth > MAX_SNAPSHOT_STACK_DEPTH {
            warn!(
                %id,
                requested = snapshot.max_stack_depth,
                "Snapshot stack depth clamped"
            );
            max_stack_depth = MAX_SNAPSHOT_STACK_DEPTH;
        }
        let params = EntityParams {
            position: snapshot.position(),
            dimensions,
            max_stack_depth,
            max_speed: snapshot.max_speed as f32,
            falloff: snapshot.falloff,
        };
        Self::new(id, params, hooks)
    }

    pub fn with_sprites(mut self, sprites: SpriteSet) -> Self {
        self.sprites = sprites;
        self
    }

    /// Pre-loads the force queue, ignoring the stack-depth cap.
    pub fn with_forces(mut self, forces: impl IntoIterator<Item = Impulse>) -> Self {
        self.force_queue.extend(forces);
        self
    }

    pub fn handle(&self) -> EntityId {
        self.handle
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn set_position(&mut self, position: Vec2) {
        self.position = position;
    }

    pub fn velocity(&self) -> &Impulse {
        &self.velocity
    }

    pub fn force_queue(&self) -> &VecDeque<Impulse> {
        &self.force_queue
    }

    pub fn max_stack_depth(&self) -> usize {
        self.max_stack_depth
    }

    pub fn collision_box(&self) -> &CollisionBox {
        &self.collision_box
    }

    pub fn state(&self) -> LifeState {
        self.state
    }

    pub fn is_dead(&self) -> bool {
        self.state == LifeState::Dead
    }

    pub fn active_sprite(&self) -> SpriteId {
        match self.state {
            LifeState::Alive => self.sprites.alive,
            LifeState::Dead => self.sprites.dead,
        }
    }

    /// Queues `force` if there is room. Overflow is dropped silently.
    pub fn add_force(&mut self, force: Impulse) -> bool {
        self.add_force_with(force, |_| {})
    }

    /// Like [`Entity::add_force`], calling `on_accepted` when the force was queued.
    pub fn add_force_with(&mut self, force: Impulse, on_accepted: impl FnOnce(&Impulse)) -> bool {
        if self.force_queue.len() >= self.max_stack_depth {
            return false;
        }
        self.force_queue.push_back(force);
        if let Some(accepted) = self.force_queue.back() {
            on_accepted(accepted);
        }
        true
    }

    /// Appends `count` copies of `force`, bypassing the stack-depth cap.
    ///
    /// Used by position reconciliation, which must be able to replay a
    /// whole run of impulses at once.
    pub fn enqueue_repeated(&mut self, force: &Impulse, count: usize) {
        self.force_queue
            .extend(std::iter::repeat_n(force, count).cloned());
    }

    /// Marks the entity dead. Returns `false` if it already was.
    pub fn die(&mut self) -> bool {
        if self.state == LifeState::Dead {
            return false;
        }
        self.state = LifeState::Dead;
        true
    }

    /// Runs one frame. `others` may include `self`'s own handle; it is skipped.
    pub fn tick<'a>(
        &mut self,
        others: impl IntoIterator<Item = &'a Entity>,
        ctx: &mut TickContext<'_>,
    ) {
        if self.state == LifeState::Dead {
            ctx.renderer.draw_sprite(self.active_sprite(), self.position);
            return;
        }

        let hooks = Arc::clone(&self.hooks);

        let front_finished = match self.force_queue.front_mut() {
            Some(front) => {
                let v = front.apply(self.velocity.as_vec2());
                self.velocity.set_from(v);
                front.is_finished()
            }
            None => false,
        };
        if front_finished {
            if let Some(force) = self.force_queue.pop_front() {
                hooks.on_force_consumed(&force, self, ctx.commands);
            }
        }

        self.position = self.velocity.apply(self.position);

        hooks.on_wall_collided(self, ctx.commands);

        self.collision_box.update(self.position.trunc());

        for other in others {
            if other.handle == self.handle {
                continue;
            }
            if other.is_dead() && !ctx.dead_entities_collide {
                continue;
            }
            let hits = self
                .collision_box
                .sample_hits(self.position, &other.collision_box);
            for _ in 0..hits {
                hooks.on_collision(self, other, ctx.commands);
            }
        }

        ctx.renderer.draw_sprite(self.active_sprite(), self.position);
    }

    /// Snapshot used to reconstruct this entity on a remote peer.
    pub fn snapshot(&self) -> EntitySnapshot {
        EntitySnapshot {
            x: coord_to_wire(self.position.x),
            y: coord_to_wire(self.position.y),
            max_stack_depth: self.max_stack_depth as u32,
            max_speed: self.max_speed as u32,
            falloff: self.falloff,
        }
    }

    pub fn to_bytes(&self) -> bytes::Bytes {
        self.snapshot().to_bytes()
    }
}
