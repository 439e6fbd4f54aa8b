//! Fixed-size binary encodings.
//!
//! All values are big-endian (network byte order). Every record has a fixed
//! length; decoding a buffer that is too short yields a [`DecodeError`].

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

use crate::{impulse::Impulse, math::Vec2};

/// Encoded size of an [`Impulse`].
pub const IMPULSE_LEN: usize = 17;
/// Encoded size of an [`EntitySnapshot`].
pub const ENTITY_SNAPSHOT_LEN: usize = 20;
/// Encoded size of a [`PositionSync`].
pub const POSITION_SYNC_LEN: usize = 8;
/// Encoded size of a [`SyncPayload`].
pub const SYNC_PAYLOAD_LEN: usize = POSITION_SYNC_LEN + IMPULSE_LEN;

/// Errors that can occur while decoding wire records.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("unexpected end of data: needed {needed} bytes, {remaining} remaining")]
    UnexpectedEof { needed: usize, remaining: usize },

    #[error("invalid boolean byte: {0:#04x}")]
    InvalidBool(u8),

    #[error("non-finite float")]
    NonFinite,

    #[error("unknown packet type: {0}")]
    UnknownPacketType(u8),

    #[error("empty datagram")]
    EmptyDatagram,
}

/// A checked big-endian reader.
#[derive(Debug)]
pub struct BinaryReader<'a> {
    buf: &'a [u8],
}

impl<'a> BinaryReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    /// Returns remaining bytes.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    /// Returns the unread tail without consuming it.
    pub fn rest(&self) -> &'a [u8] {
        self.buf
    }

    fn ensure(&self, needed: usize) -> Result<(), DecodeError> {
        if self.buf.remaining() < needed {
            return Err(DecodeError::UnexpectedEof {
                needed,
                remaining: self.buf.remaining(),
            });
        }
        Ok(())
    }

    #[inline]
    pub fn get_u8(&mut self) -> Result<u8, DecodeError> {
        self.ensure(1)?;
        Ok(self.buf.get_u8())
    }

    #[inline]
    pub fn get_u32(&mut self) -> Result<u32, DecodeError> {
        self.ensure(4)?;
        Ok(self.buf.get_u32())
    }

    #[inline]
    pub fn get_f32(&mut self) -> Result<f32, DecodeError> {
        self.ensure(4)?;
        Ok(self.buf.get_f32())
    }

    /// Reads an `f32`, rejecting NaN and infinities.
    pub fn get_finite_f32(&mut self) -> Result<f32, DecodeError> {
        let v = self.get_f32()?;
        if !v.is_finite() {
            return Err(DecodeError::NonFinite);
        }
        Ok(v)
    }

    /// Reads a one-byte boolean. Only `0` and `1` are accepted.
    pub fn get_bool(&mut self) -> Result<bool, DecodeError> {
        match self.get_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(DecodeError::InvalidBool(other)),
        }
    }
}

/// A big-endian writer for building records and packets.
#[derive(Debug, Default)]
pub struct BinaryWriter {
    buf: BytesMut,
}

impl BinaryWriter {
    /// Create a new writer with the specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    #[inline]
    pub fn put_u8(&mut self, v: u8) {
        self.buf.put_u8(v);
    }

    #[inline]
    pub fn put_u32(&mut self, v: u32) {
        self.buf.put_u32(v);
    }

    #[inline]
    pub fn put_f32(&mut self, v: f32) {
        self.buf.put_f32(v);
    }

    #[inline]
    pub fn put_bool(&mut self, v: bool) {
        self.buf.put_u8(u8::from(v));
    }

    pub fn put_slice(&mut self, data: &[u8]) {
        self.buf.put_slice(data);
    }

    /// Consume the writer and return the built buffer.
    pub fn finish(self) -> Bytes {
        self.buf.freeze()
    }
}

/// Converts a coordinate to its unsigned wire form.
///
/// The protocol cannot carry negative coordinates: they saturate to `0`, and
/// values beyond `u32::MAX` saturate to `u32::MAX`. Fractions are truncated.
#[inline]
pub fn coord_to_wire(v: f32) -> u32 {
    v as u32
}

/// Reconstructable state of an entity, sent on first contact.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntitySnapshot {
    pub x: u32,
    pub y: u32,
    pub max_stack_depth: u32,
    pub max_speed: u32,
    pub falloff: f32,
}

impl EntitySnapshot {
    pub fn position(&self) -> Vec2 {
        Vec2::new(self.x as f32, self.y as f32)
    }

    pub fn write(&self, w: &mut BinaryWriter) {
        w.put_u32(self.x);
        w.put_u32(self.y);
        w.put_u32(self.max_stack_depth);
        w.put_u32(self.max_speed);
        w.put_f32(self.falloff);
    }

    pub fn read(r: &mut BinaryReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            x: r.get_u32()?,
            y: r.get_u32()?,
            max_stack_depth: r.get_u32()?,
            max_speed: r.get_u32()?,
            falloff: r.get_finite_f32()?,
        })
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut w = BinaryWriter::with_capacity(ENTITY_SNAPSHOT_LEN);
        self.write(&mut w);
        w.finish()
    }

    pub fn from_bytes(b: &[u8]) -> Result<Self, DecodeError> {
        Self::read(&mut BinaryReader::new(b))
    }
}

/// Authoritative integer position of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionSync {
    pub x: u32,
    pub y: u32,
}

impl PositionSync {
    pub fn from_position(pos: Vec2) -> Self {
        Self {
            x: coord_to_wire(pos.x),
            y: coord_to_wire(pos.y),
        }
    }

    pub fn write(&self, w: &mut BinaryWriter) {
        w.put_u32(self.x);
        w.put_u32(self.y);
    }

    pub fn read(r: &mut BinaryReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            x: r.get_u32()?,
            y: r.get_u32()?,
        })
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut w = BinaryWriter::with_capacity(POSITION_SYNC_LEN);
        self.write(&mut w);
        w.finish()
    }

    pub fn from_bytes(b: &[u8]) -> Result<Self, DecodeError> {
        Self::read(&mut BinaryReader::new(b))
    }
}

/// Payload of a position-sync packet: where the sender ended up, and the
/// impulse whose completion triggered the sync.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncPayload {
    pub position: PositionSync,
    pub impulse: Impulse,
}

impl SyncPayload {
    pub fn to_bytes(&self) -> Bytes {
        let mut w = BinaryWriter::with_capacity(SYNC_PAYLOAD_LEN);
        self.position.write(&mut w);
        self.impulse.write(&mut w);
        w.finish()
    }

    pub fn from_bytes(b: &[u8]) -> Result<Self, DecodeError> {
        let mut r = BinaryReader::new(b);
        let position = PositionSync::read(&mut r)?;
        let impulse = Impulse::read(&mut r)?;
        Ok(Self { position, impulse })
    }
}
