//! Impulses: decaying directional pushes, the unit of motion.
//!
//! An impulse integrates over a fixed number of sub-steps per call. Each
//! sub-step displaces by the current (pre-decay) velocity, then decays every
//! non-zero component toward zero by `falloff * STEP`, clamping at zero.
//! A component never changes sign and never exceeds `max_speed` in magnitude
//! after a decay.

use bytes::Bytes;

use crate::{
    math::{clamp, Vec2},
    wire::{BinaryReader, BinaryWriter, DecodeError, IMPULSE_LEN},
};

/// Integration sub-step.
pub const STEP: f32 = 0.1;
/// Sub-steps per [`Impulse::apply`] call.
pub const SUBSTEPS: usize = 10;

/// A decaying force.
#[derive(Debug, Clone, PartialEq)]
pub struct Impulse {
    pub x: f32,
    pub y: f32,
    pub max_speed: f32,
    falloff: f32,
    persistent: bool,
    finished: bool,
}

impl Impulse {
    pub fn new(x: f32, y: f32, falloff: f32, persistent: bool, max_speed: f32) -> Self {
        Self {
            x,
            y,
            max_speed,
            falloff,
            persistent,
            finished: false,
        }
    }

    /// A persistent, motionless impulse. Used as an entity's resultant velocity.
    pub fn resting(falloff: f32, max_speed: f32) -> Self {
        Self::new(0.0, 0.0, falloff, true, max_speed)
    }

    pub fn falloff(&self) -> f32 {
        self.falloff
    }

    pub fn is_persistent(&self) -> bool {
        self.persistent
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn as_vec2(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    pub fn set_from(&mut self, v: Vec2) {
        self.x = v.x;
        self.y = v.y;
    }

    /// Advances `pos` by this impulse and decays it.
    ///
    /// A non-persistent impulse whose components both truncate to zero is
    /// marked finished instead, and from then on leaves `pos` untouched.
    pub fn apply(&mut self, pos: Vec2) -> Vec2 {
        if self.persistent {
            return self.integrate(pos);
        }
        if !self.finished {
            if self.x.trunc() == 0.0 && self.y.trunc() == 0.0 {
                self.finished = true;
            } else {
                return self.integrate(pos);
            }
        }
        pos
    }

    fn integrate(&mut self, pos: Vec2) -> Vec2 {
        let mut result = pos;
        let decay = self.falloff * STEP;
        for _ in 0..SUBSTEPS {
            result.x += self.x * STEP;
            result.y += self.y * STEP;
            self.x = decay_axis(self.x, decay, self.max_speed);
            self.y = decay_axis(self.y, decay, self.max_speed);
        }
        result
    }

    pub fn write(&self, w: &mut BinaryWriter) {
        w.put_f32(self.x);
        w.put_f32(self.y);
        w.put_f32(self.max_speed);
        w.put_f32(self.falloff);
        w.put_bool(self.persistent);
    }

    /// Reads a 17-byte record. The decoded impulse is never finished.
    ///
    /// Every float must be finite.
    pub fn read(r: &mut BinaryReader<'_>) -> Result<Self, DecodeError> {
        let x = r.get_finite_f32()?;
        let y = r.get_finite_f32()?;
        let max_speed = r.get_finite_f32()?;
        let falloff = r.get_finite_f32()?;
        let persistent = r.get_bool()?;
        Ok(Self::new(x, y, falloff, persistent, max_speed))
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut w = BinaryWriter::with_capacity(IMPULSE_LEN);
        self.write(&mut w);
        w.finish()
    }

    pub fn from_bytes(b: &[u8]) -> Result<Self, DecodeError> {
        Self::read(&mut BinaryReader::new(b))
    }
}

impl std::fmt::Display for Impulse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:.1}|{:.1}]", self.x, self.y)
    }
}

// The two branches clamp to different ranges: a negative component may only
// rise to 0, a positive one may only fall to 0.
#[inline]
fn decay_axis(v: f32, decay: f32, max_speed: f32) -> f32 {
    if v < 0.0 {
        clamp(v + decay, -max_speed, 0.0)
    } else if v > 0.0 {
        clamp(v - decay, 0.0, max_speed)
    } else {
        v
    }
}
