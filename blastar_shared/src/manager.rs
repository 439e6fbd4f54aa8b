//! Entity manager: owns every entity and advances the simulation.
//!
//! Ordering notes:
//! - Entities tick in insertion order.
//! - Commands queued by an entity's hooks are applied as soon as that
//!   entity's tick returns, so later entities in the same pass already see
//!   the effects (e.g. a freshly killed entity no longer collides).
//! - Deferred removals for the current frame run after every entity ticked,
//!   then the frame counter advances.

use std::collections::BTreeMap;

use tracing::debug;

use crate::{
    entity::{Command, Commands, Entity, EntityId, TickContext},
    render::{NullRenderer, RenderBackend},
};

/// Simulation switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulationRules {
    /// Frames a dead entity stays on screen before removal.
    pub death_delay: u64,
    /// Whether dead entities still block alive ones.
    pub dead_entities_collide: bool,
    /// Whether `summon` and `kill` run a full tick of their own.
    pub tick_on_summon_and_kill: bool,
}

impl Default for SimulationRules {
    fn default() -> Self {
        Self {
            death_delay: 72,
            dead_entities_collide: false,
            tick_on_summon_and_kill: true,
        }
    }
}

pub struct EntityManager {
    entities: Vec<Entity>,
    pending_removal: BTreeMap<u64, Vec<EntityId>>,
    frame: u64,
    rules: SimulationRules,
    renderer: Box<dyn RenderBackend>,
}

impl EntityManager {
    pub fn new(rules: SimulationRules, renderer: Box<dyn RenderBackend>) -> Self {
        Self {
            entities: Vec::new(),
            pending_removal: BTreeMap::new(),
            frame: 0,
            rules,
            renderer,
        }
    }

    /// A manager that draws nothing.
    pub fn headless(rules: SimulationRules) -> Self {
        Self::new(rules, Box::new(NullRenderer))
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn rules(&self) -> &SimulationRules {
        &self.rules
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.iter().any(|e| e.handle() == id)
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.iter().find(|e| e.handle() == id)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.iter_mut().find(|e| e.handle() == id)
    }

    /// Adds an entity and, unless disabled, immediately runs a tick.
    pub fn summon(&mut self, entity: Entity) -> EntityId {
        let id = entity.handle();
        debug!(entity = %entity.id(), handle = id.0, frame = self.frame, "Summon");
        self.entities.push(entity);
        if self.rules.tick_on_summon_and_kill {
            self.tick();
        }
        id
    }

    /// Kills entities, schedules their removal, and unless disabled runs a tick.
    pub fn kill(&mut self, ids: impl IntoIterator<Item = EntityId>) {
        for id in ids {
            self.mark_dead(id);
        }
        if self.rules.tick_on_summon_and_kill {
            self.tick();
        }
    }

    fn mark_dead(&mut self, id: EntityId) {
        let Some(entity) = self.entities.iter_mut().find(|e| e.handle() == id) else {
            return;
        };
        if !entity.die() {
            return;
        }
        debug!(entity = %entity.id(), handle = id.0, frame = self.frame, "Kill");
        let at = self.frame + self.rules.death_delay;
        self.pending_removal.entry(at).or_default().push(id);
    }

    /// Advances the simulation by one frame.
    pub fn tick(&mut self) {
        let mut commands = Commands::default();
        for i in 0..self.entities.len() {
            let (before, rest) = self.entities.split_at_mut(i);
            let Some((current, after)) = rest.split_first_mut() else {
                break;
            };
            let mut ctx = TickContext {
                renderer: self.renderer.as_mut(),
                commands: &mut commands,
                dead_entities_collide: self.rules.dead_entities_collide,
            };
            current.tick(before.iter().chain(after.iter()), &mut ctx);
            self.apply(&mut commands);
        }

        if let Some(ids) = self.pending_removal.remove(&self.frame) {
            self.entities.retain(|e| !ids.contains(&e.handle()));
        }
        self.frame += 1;
    }

    // Hook-issued kills never tick on their own: the manager is mid-pass.
    fn apply(&mut self, commands: &mut Commands) {
        let queued: Vec<Command> = commands.drain().collect();
        for command in queued {
            match command {
                Command::Kill(id) => self.mark_dead(id),
            }
        }
    }
}
