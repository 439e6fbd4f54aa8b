//! Local arena session: the player, its bullets, and the manager that owns them.
//!
//! Used as-is for offline play and wrapped by [`crate::client::GameClient`]
//! when a relay is involved.

use std::path::Path;
use std::sync::Arc;

use blastar_shared::{
    config::ArenaConfig,
    entity::{Entity, EntityHooks, EntityId, EntityParams},
    impulse::Impulse,
    manager::EntityManager,
    math::Vec2,
    render::{ImageLoader, KeySet, RenderBackend, SpriteSet},
    rules::{ClampToArena, KillOutsideArena},
};
use rand::Rng;
use tracing::{debug, info};

use crate::input::InputState;

/// Local player id. Remote players are `Player_<relay index>`.
pub const PLAYER_ID: &str = "Player";
pub const BULLET_ID: &str = "Player_Bullet";
pub const ENEMY_ID: &str = "Enemy";

/// Spawn positions keep this far from every edge.
const SPAWN_MARGIN: i32 = 20;

/// Sprites of every entity kind.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpriteSheet {
    pub player: SpriteSet,
    pub enemy: SpriteSet,
    pub bullet: SpriteSet,
}

impl SpriteSheet {
    /// Loads the sheet from `dir`.
    pub fn load(loader: &mut dyn ImageLoader, dir: &Path) -> anyhow::Result<Self> {
        let mut image = |name: &str| loader.load_image(&dir.join(name));
        Ok(Self {
            player: SpriteSet {
                alive: image("player.png")?,
                dead: image("player_death.png")?,
            },
            enemy: SpriteSet {
                alive: image("enemy.png")?,
                dead: image("enemy_death.png")?,
            },
            bullet: SpriteSet {
                alive: image("player_bullet.png")?,
                dead: image("player_bullet.png")?,
            },
        })
    }
}

pub struct Game {
    cfg: ArenaConfig,
    manager: EntityManager,
    player: EntityId,
    sprites: SpriteSheet,
}

impl Game {
    /// Creates the manager and summons the local player at a random spot.
    pub fn new(
        cfg: ArenaConfig,
        renderer: Box<dyn RenderBackend>,
        sprites: SpriteSheet,
        player_hooks: Arc<dyn EntityHooks>,
        rng: &mut impl Rng,
    ) -> Self {
        let mut manager = EntityManager::new(cfg.simulation_rules(), renderer);
        let position = random_spawn(&cfg, rng);
        let player = Entity::new(
            PLAYER_ID,
            EntityParams {
                position,
                dimensions: cfg.sprite_size,
                max_stack_depth: cfg.player_stack_depth,
                max_speed: cfg.max_speed,
                falloff: cfg.falloff,
            },
            player_hooks,
        )
        .with_sprites(sprites.player);
        let player = manager.summon(player);
        info!(x = position.x, y = position.y, "Player spawned");

        Self {
            cfg,
            manager,
            player,
            sprites,
        }
    }

    pub fn config(&self) -> &ArenaConfig {
        &self.cfg
    }

    pub fn sprites(&self) -> &SpriteSheet {
        &self.sprites
    }

    pub fn manager(&self) -> &EntityManager {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut EntityManager {
        &mut self.manager
    }

    pub fn player_id(&self) -> EntityId {
        self.player
    }

    /// The local player, until it is removed after death.
    pub fn player(&self) -> Option<&Entity> {
        self.manager.get(self.player)
    }

    pub fn player_alive(&self) -> bool {
        self.player().is_some_and(|p| !p.is_dead())
    }

    /// Summons a motionless enemy at a random spot. It follows the player's
    /// arena rules.
    pub fn spawn_enemy(&mut self, rng: &mut impl Rng) -> EntityId {
        let position = random_spawn(&self.cfg, rng);
        let enemy = Entity::new(
            ENEMY_ID,
            EntityParams {
                position,
                dimensions: self.cfg.sprite_size,
                max_stack_depth: self.cfg.player_stack_depth,
                max_speed: self.cfg.max_speed,
                falloff: self.cfg.falloff,
            },
            Arc::new(ClampToArena {
                bounds: self.cfg.arena,
            }),
        )
        .with_sprites(self.sprites.enemy);
        debug!(x = position.x, y = position.y, "Enemy spawned");
        self.manager.summon(enemy)
    }

    /// Turns held keys into player forces and bullets.
    ///
    /// `on_accepted` sees every movement impulse the player's queue took.
    pub fn apply_input(&mut self, input: &InputState, mut on_accepted: impl FnMut(&Impulse)) {
        if let Some(player) = self.manager.get_mut(self.player) {
            for force in input.movement_forces(&self.cfg) {
                player.add_force_with(force, &mut on_accepted);
            }
        }

        let shoot = input.keys.contains(KeySet::SHOOT);
        if shoot && self.manager.frame() % self.cfg.shot_interval() == 0 {
            self.shoot(input);
        }
    }

    /// Fires a bullet from the player's position. No-op once the player died.
    pub fn shoot(&mut self, input: &InputState) -> Option<EntityId> {
        let origin = self.player().filter(|p| !p.is_dead())?.position();
        let bullet = Entity::new(
            BULLET_ID,
            EntityParams {
                position: origin,
                dimensions: self.cfg.sprite_size,
                max_stack_depth: self.cfg.bullet.stack_depth,
                max_speed: self.cfg.bullet.max_speed,
                falloff: self.cfg.falloff,
            },
            Arc::new(KillOutsideArena {
                bounds: self.cfg.arena,
            }),
        )
        .with_sprites(self.sprites.bullet)
        .with_forces([input.bullet_launch(&self.cfg)]);
        Some(self.manager.summon(bullet))
    }

    pub fn tick(&mut self) {
        self.manager.tick();
    }
}

fn random_spawn(cfg: &ArenaConfig, rng: &mut impl Rng) -> Vec2 {
    let x = spawn_axis(cfg.arena.width, rng);
    let y = spawn_axis(cfg.arena.height, rng);
    Vec2::new(x, y)
}

fn spawn_axis(extent: f32, rng: &mut impl Rng) -> f32 {
    let hi = (extent as i32 - SPAWN_MARGIN).max(SPAWN_MARGIN);
    rng.gen_range(SPAWN_MARGIN..=hi) as f32
}
