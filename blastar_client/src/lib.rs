//! `blastar_client`
//!
//! Client-side systems:
//! - Input mapping from held keys to frame-rate-scaled impulses
//! - The local arena session (player, bullets, offline enemy)
//! - Relay connection and peer synchronization

pub mod client;
pub mod game;
pub mod input;
pub mod sync;

pub use client::GameClient;
pub use game::Game;
