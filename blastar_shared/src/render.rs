//! Presentation collaborators.
//!
//! This crate intentionally does not depend on a graphics or windowing
//! backend. The simulation only talks to these traits.

use std::path::Path;

use bitflags::bitflags;

use crate::math::Vec2;

/// Opaque handle to a loaded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SpriteId(pub u32);

/// The images an entity shows while alive and after death.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SpriteSet {
    pub alive: SpriteId,
    pub dead: SpriteId,
}

bitflags! {
    /// Keys the arena reacts to.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct KeySet: u8 {
        const LEFT = 1 << 0;
        const RIGHT = 1 << 1;
        const UP = 1 << 2;
        const DOWN = 1 << 3;
        const SHOOT = 1 << 4;
        const QUIT = 1 << 5;
    }
}

/// Draws sprites.
pub trait RenderBackend: Send {
    fn draw_sprite(&mut self, sprite: SpriteId, position: Vec2);
}

/// Samples the keyboard once per frame.
pub trait InputSource {
    fn poll_keys(&mut self) -> KeySet;
}

/// Loads images from disk.
pub trait ImageLoader {
    fn load_image(&mut self, path: &Path) -> anyhow::Result<SpriteId>;
}

/// A no-op renderer useful for headless runs.
#[derive(Default)]
pub struct NullRenderer;

impl RenderBackend for NullRenderer {
    fn draw_sprite(&mut self, _sprite: SpriteId, _position: Vec2) {}
}

/// Remembers every draw call. Handy in tests.
#[derive(Debug, Default)]
pub struct RecordingRenderer {
    pub draws: Vec<(SpriteId, Vec2)>,
}

impl RenderBackend for RecordingRenderer {
    fn draw_sprite(&mut self, sprite: SpriteId, position: Vec2) {
        self.draws.push((sprite, position));
    }
}
