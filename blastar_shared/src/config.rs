//! Configuration system.
//!
//! Loads arena configuration from JSON strings/files. Every field has a
//! default, so a partial file only overrides what it names.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::{manager::SimulationRules, math::IVec2, rules::ArenaBounds};

/// Root configuration shared by client/relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArenaConfig {
    /// Relay address, e.g. `127.0.0.1:40000`. The relay binds it, clients send to it.
    #[serde(default = "default_relay_addr")]
    pub relay_addr: String,
    /// Target frames per second of the simulation loop.
    #[serde(default = "default_target_fps")]
    pub target_fps: u32,
    /// Arena width and height in pixels.
    #[serde(default = "default_arena")]
    pub arena: ArenaBounds,
    /// Multiplier of the frame-rate scale `game_speed_factor / fps`.
    #[serde(default = "default_game_speed_factor")]
    pub game_speed_factor: f32,
    /// Movement impulse per key press, before frame-rate scaling.
    #[serde(default = "default_speed")]
    pub speed: f32,
    #[serde(default = "default_max_speed")]
    pub max_speed: f32,
    #[serde(default = "default_falloff")]
    pub falloff: f32,
    /// Force queue depth of the player entity.
    #[serde(default = "default_player_stack_depth")]
    pub player_stack_depth: usize,
    /// Frames a dead entity lingers. Derived from `target_fps` when absent.
    #[serde(default)]
    pub death_delay_frames: Option<u64>,
    /// Collision box size of every sprite.
    #[serde(default = "default_sprite_size")]
    pub sprite_size: IVec2,
    #[serde(default)]
    pub bullet: BulletConfig,
    /// Whether dead entities keep blocking alive ones until removed.
    #[serde(default)]
    pub dead_entities_collide: bool,
    /// Whether summon/kill run an extra simulation tick.
    #[serde(default = "default_true")]
    pub tick_on_summon_and_kill: bool,
}

/// Bullet tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulletConfig {
    /// Launch speed (upwards) before frame-rate scaling.
    #[serde(default = "default_bullet_speed")]
    pub speed: f32,
    /// Max speed of the launch impulse.
    #[serde(default = "default_bullet_impulse_max_speed")]
    pub impulse_max_speed: f32,
    /// Max speed of the bullet entity itself.
    #[serde(default = "default_bullet_max_speed")]
    pub max_speed: f32,
    #[serde(default = "default_bullet_stack_depth")]
    pub stack_depth: usize,
    /// Seconds between shots.
    #[serde(default = "default_bullet_cooldown")]
    pub cooldown_secs: f32,
}

fn default_relay_addr() -> String {
    "127.0.0.1:40000".to_string()
}

fn default_target_fps() -> u32 {
    144
}

fn default_arena() -> ArenaBounds {
    ArenaBounds::new(800.0, 800.0)
}

fn default_game_speed_factor() -> f32 {
    1000.0
}

fn default_speed() -> f32 {
    0.2
}

fn default_max_speed() -> f32 {
    5.0
}

fn default_falloff() -> f32 {
    0.1
}

fn default_player_stack_depth() -> usize {
    1
}

fn default_sprite_size() -> IVec2 {
    IVec2::new(32, 32)
}

fn default_true() -> bool {
    true
}

fn default_bullet_speed() -> f32 {
    2.0
}

fn default_bullet_impulse_max_speed() -> f32 {
    6.0
}

fn default_bullet_max_speed() -> f32 {
    4.0
}

fn default_bullet_stack_depth() -> usize {
    2
}

fn default_bullet_cooldown() -> f32 {
    0.15
}

impl Default for BulletConfig {
    fn default() -> Self {
        Self {
            speed: default_bullet_speed(),
            impulse_max_speed: default_bullet_impulse_max_speed(),
            max_speed: default_bullet_max_speed(),
            stack_depth: default_bullet_stack_depth(),
            cooldown_secs: default_bullet_cooldown(),
        }
    }
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            relay_addr: default_relay_addr(),
            target_fps: default_target_fps(),
            arena: default_arena(),
            game_speed_factor: default_game_speed_factor(),
            speed: default_speed(),
            max_speed: default_max_speed(),
            falloff: default_falloff(),
            player_stack_depth: default_player_stack_depth(),
            death_delay_frames: None,
            sprite_size: default_sprite_size(),
            bullet: BulletConfig::default(),
            dead_entities_collide: false,
            tick_on_summon_and_kill: default_true(),
        }
    }
}

impl ArenaConfig {
    /// Parses config from JSON.
    pub fn from_json_str(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }

    /// Reads and parses a JSON config file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        Self::from_json_str(&contents).with_context(|| format!("parse config {}", path.display()))
    }

    /// Half a second worth of frames unless set explicitly.
    pub fn death_delay(&self) -> u64 {
        self.death_delay_frames
            .unwrap_or_else(|| (self.target_fps as f32 * 0.5).round() as u64)
    }

    /// Frames between two shots, never zero.
    pub fn shot_interval(&self) -> u64 {
        ((self.target_fps as f32 * self.bullet.cooldown_secs).round() as u64).max(1)
    }

    pub fn simulation_rules(&self) -> SimulationRules {
        SimulationRules {
            death_delay: self.death_delay(),
            dead_entities_collide: self.dead_entities_collide,
            tick_on_summon_and_kill: self.tick_on_summon_and_kill,
        }
    }
}
