//! `blastar_shared`
//!
//! Shared libraries used by both client and relay.
//!
//! Design goals:
//! - A small force-queue physics kernel with exact, frame-based semantics.
//! - Fixed-size big-endian wire records with typed decode errors.
//! - Traits for presentation collaborators so the kernel never touches a
//!   window, keyboard, or image file.
//! - No `unsafe`.

pub mod collision;
pub mod config;
pub mod entity;
pub mod impulse;
pub mod manager;
pub mod math;
pub mod net;
pub mod render;
pub mod rules;
pub mod wire;

pub mod prelude {
    //! Commonly used exports.

    pub use crate::collision::*;
    pub use crate::config::*;
    pub use crate::entity::*;
    pub use crate::impulse::*;
    pub use crate::manager::*;
    pub use crate::math::*;
    pub use crate::net::*;
    pub use crate::wire::*;
}
