//! Arena rules expressed as entity hooks.
//!
//! - Players are clamped into the arena.
//! - Bullets die when they touch or leave the arena edge.
//! - Any collision kills both parties, unless one's id contains the other's
//!   (`Player` never dies to `Player_Bullet`).

use serde::{Deserialize, Serialize};

use crate::{
    entity::{Commands, Entity, EntityHooks},
    math::Vec2,
};

/// Playable area, `[0, width] x [0, height]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ArenaBounds {
    pub width: f32,
    pub height: f32,
}

impl ArenaBounds {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn clamp(&self, p: Vec2) -> Vec2 {
        p.clamp(Vec2::ZERO, Vec2::new(self.width, self.height))
    }

    /// True when `p` is on or beyond any edge.
    pub fn touches_edge(&self, p: Vec2) -> bool {
        p.x <= 0.0 || p.x >= self.width || p.y <= 0.0 || p.y >= self.height
    }
}

/// Entities that share an id prefix are on the same side.
pub fn same_side(a: &str, b: &str) -> bool {
    a.contains(b) || b.contains(a)
}

/// Queues both entities for death unless they are on the same side.
pub fn destroy_on_contact(entity: &Entity, other: &Entity, commands: &mut Commands) {
    if !same_side(entity.id(), other.id()) {
        commands.kill(entity.handle());
        commands.kill(other.handle());
    }
}

/// Player hooks: stay inside the arena.
#[derive(Debug, Clone, Copy)]
pub struct ClampToArena {
    pub bounds: ArenaBounds,
}

impl EntityHooks for ClampToArena {
    fn on_wall_collided(&self, entity: &mut Entity, _commands: &mut Commands) {
        let clamped = self.bounds.clamp(entity.position());
        entity.set_position(clamped);
    }

    fn on_collision(&self, entity: &Entity, other: &Entity, commands: &mut Commands) {
        destroy_on_contact(entity, other, commands);
    }
}

/// Bullet hooks: die at the arena edge.
#[derive(Debug, Clone, Copy)]
pub struct KillOutsideArena {
    pub bounds: ArenaBounds,
}

impl EntityHooks for KillOutsideArena {
    fn on_wall_collided(&self, entity: &mut Entity, commands: &mut Commands) {
        if self.bounds.touches_edge(entity.position()) {
            commands.kill(entity.handle());
        }
    }

    fn on_collision(&self, entity: &Entity, other: &Entity, commands: &mut Commands) {
        destroy_on_contact(entity, other, commands);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        entity::{EntityParams, NoHooks},
        impulse::Impulse,
        manager::{EntityManager, SimulationRules},
        math::IVec2,
    };

    const BOUNDS: ArenaBounds = ArenaBounds::new(800.0, 800.0);

    fn params(x: f32, y: f32) -> EntityParams {
        EntityParams {
            position: Vec2::new(x, y),
            dimensions: IVec2::new(10, 10),
            max_stack_depth: 2,
            max_speed: 5.0,
            falloff: 0.1,
        }
    }

    fn manager() -> EntityManager {
        EntityManager::headless(SimulationRules {
            death_delay: 10,
            ..SimulationRules::default()
        })
    }

    #[test]
    fn same_side_matches_prefixes() {
        assert!(same_side("Player", "Player_Bullet"));
        assert!(same_side("Player_Bullet", "Player"));
        // Remote peers are tagged `Player_<index>`, so they are on the local
        // player's side too.
        assert!(same_side("Player", "Player_3"));
        assert!(!same_side("Player_Bullet", "Enemy"));
    }

    #[test]
    fn players_are_clamped_into_the_arena() {
        let mut mgr = manager();
        let p = mgr.summon(
            Entity::new("Player", params(2.0, 400.0), Arc::new(ClampToArena { bounds: BOUNDS }))
                .with_forces([Impulse::new(-5.0, 0.0, 0.0, false, 5.0)]),
        );
        for _ in 0..5 {
            mgr.tick();
        }
        let pos = mgr.get(p).unwrap().position();
        assert_eq!(pos.x, 0.0);
        assert_eq!(pos.y, 400.0);
    }

    #[test]
    fn bullets_die_at_the_edge() {
        let mut mgr = manager();
        let hooks = Arc::new(KillOutsideArena { bounds: BOUNDS });
        let b = mgr.summon(
            Entity::new("Player_Bullet", params(400.0, 3.0), hooks)
                .with_forces([Impulse::new(0.0, -4.0, 0.0, false, 6.0)]),
        );
        for _ in 0..5 {
            mgr.tick();
        }
        assert!(mgr.get(b).unwrap().is_dead());
    }

    #[test]
    fn bullet_kills_enemy_but_not_its_shooter() {
        let mut mgr = manager();
        let bullet_hooks = Arc::new(KillOutsideArena { bounds: BOUNDS });
        let player = mgr.summon(Entity::new(
            "Player",
            params(300.0, 300.0),
            Arc::new(ClampToArena { bounds: BOUNDS }),
        ));
        let own = mgr.summon(Entity::new(
            "Player_Bullet",
            params(302.0, 302.0),
            bullet_hooks.clone(),
        ));
        assert!(!mgr.get(player).unwrap().is_dead());
        assert!(!mgr.get(own).unwrap().is_dead());

        let enemy = mgr.summon(Entity::new("Enemy", params(100.0, 100.0), Arc::new(NoHooks)));
        let shot = mgr.summon(Entity::new("Player_Bullet", params(95.0, 95.0), bullet_hooks));
        assert!(mgr.get(enemy).unwrap().is_dead());
        assert!(mgr.get(shot).unwrap().is_dead());
        assert!(!mgr.get(player).unwrap().is_dead());
        assert!(!mgr.get(own).unwrap().is_dead());
    }
}
