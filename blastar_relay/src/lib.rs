//! `blastar_relay`
//!
//! Stateless fan-out relay for arena clients:
//! - One UDP socket, no handshake
//! - Clients are identified by source address and numbered on first contact
//! - Every datagram goes to every other known client, prefixed with the
//!   sender's index

pub mod relay;

pub use relay::RelayServer;
