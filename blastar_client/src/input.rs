//! Input handling.
//!
//! Keyboard polling itself lives behind [`InputSource`]. This module turns a
//! sampled [`KeySet`] into frame-rate-scaled impulses: the lower the frame
//! rate, the harder each frame pushes, so movement speed stays roughly
//! independent of fps.

use std::collections::VecDeque;

use blastar_shared::{
    config::ArenaConfig,
    impulse::Impulse,
    render::{InputSource, KeySet},
};

/// User input sampled for one frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct InputState {
    pub keys: KeySet,
    /// Measured frames per second. Zero (not measured yet) counts as one.
    pub fps: f32,
}

impl InputState {
    pub fn new(keys: KeySet, fps: f32) -> Self {
        Self { keys, fps }
    }

    /// `game_speed_factor / fps`.
    pub fn scale(&self, game_speed_factor: f32) -> f32 {
        let fps = if self.fps > 0.0 { self.fps } else { 1.0 };
        game_speed_factor / fps
    }

    /// One impulse per held direction key, in left/right/up/down order.
    pub fn movement_forces(&self, cfg: &ArenaConfig) -> Vec<Impulse> {
        let scale = self.scale(cfg.game_speed_factor);
        let push = cfg.speed * scale;
        let falloff = cfg.falloff * scale;
        [
            (KeySet::LEFT, -push, 0.0),
            (KeySet::RIGHT, push, 0.0),
            (KeySet::UP, 0.0, -push),
            (KeySet::DOWN, 0.0, push),
        ]
        .into_iter()
        .filter(|(key, _, _)| self.keys.contains(*key))
        .map(|(_, x, y)| Impulse::new(x, y, falloff, false, cfg.max_speed))
        .collect()
    }

    /// The impulse that launches a bullet straight up.
    pub fn bullet_launch(&self, cfg: &ArenaConfig) -> Impulse {
        let scale = self.scale(cfg.game_speed_factor);
        Impulse::new(
            0.0,
            -cfg.bullet.speed * scale,
            0.0,
            false,
            cfg.bullet.impulse_max_speed,
        )
    }
}

/// Maps an operator word to a key.
pub fn parse_key(word: &str) -> Option<KeySet> {
    match word {
        "left" => Some(KeySet::LEFT),
        "right" => Some(KeySet::RIGHT),
        "up" => Some(KeySet::UP),
        "down" => Some(KeySet::DOWN),
        "shoot" => Some(KeySet::SHOOT),
        "quit" | "exit" => Some(KeySet::QUIT),
        _ => None,
    }
}

/// Key presses queued from somewhere other than a keyboard (console, tests).
///
/// Each poll yields the next queued frame of keys, or nothing held.
#[derive(Debug, Default)]
pub struct QueuedInput {
    frames: VecDeque<KeySet>,
}

impl QueuedInput {
    pub fn press(&mut self, keys: KeySet) {
        self.frames.push_back(keys);
    }

    /// Holds `keys` for the next `frames` polls.
    pub fn hold(&mut self, keys: KeySet, frames: usize) {
        self.frames.extend(std::iter::repeat_n(keys, frames));
    }
}

impl InputSource for QueuedInput {
    fn poll_keys(&mut self) -> KeySet {
        self.frames.pop_front().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forces_scale_with_frame_rate() {
        let cfg = ArenaConfig::default();
        let input = InputState::new(KeySet::LEFT | KeySet::DOWN, 100.0);
        let forces = input.movement_forces(&cfg);
        assert_eq!(forces.len(), 2);
        // 0.2 * 1000 / 100
        assert!((forces[0].x + 2.0).abs() < 1e-5);
        assert_eq!(forces[0].y, 0.0);
        assert!((forces[1].y - 2.0).abs() < 1e-5);
        assert!((forces[1].falloff() - 1.0).abs() < 1e-5);
        assert!(!forces[1].is_persistent());
    }

    #[test]
    fn unmeasured_fps_counts_as_one() {
        let input = InputState::new(KeySet::empty(), 0.0);
        assert_eq!(input.scale(1000.0), 1000.0);
    }

    #[test]
    fn bullet_launches_upwards() {
        let cfg = ArenaConfig::default();
        let imp = InputState::new(KeySet::SHOOT, 1000.0).bullet_launch(&cfg);
        assert_eq!(imp.x, 0.0);
        assert!((imp.y + 2.0).abs() < 1e-5);
        assert_eq!(imp.falloff(), 0.0);
        assert_eq!(imp.max_speed, 6.0);
    }

    #[test]
    fn queued_input_yields_one_frame_per_poll() {
        let mut input = QueuedInput::default();
        input.hold(KeySet::UP, 2);
        input.press(KeySet::SHOOT);
        assert_eq!(input.poll_keys(), KeySet::UP);
        assert_eq!(input.poll_keys(), KeySet::UP);
        assert_eq!(input.poll_keys(), KeySet::SHOOT);
        assert_eq!(input.poll_keys(), KeySet::empty());
        assert_eq!(parse_key("left"), Some(KeySet::LEFT));
        assert_eq!(parse_key("jump"), None);
    }
}
