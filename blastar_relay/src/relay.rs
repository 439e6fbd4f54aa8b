//! Relay implementation.
//!
//! The relay has no game knowledge. It remembers the source address of every
//! datagram it has seen, gives each new address the next one-byte index, and
//! forwards every datagram to all other known addresses with the sender's
//! index prepended.
//!
//! Delivery notes:
//! - Best effort. A failed send to one recipient is logged and skipped.
//! - The sender never receives its own datagram back.
//! - Indices are never reused; at most 256 clients are ever admitted.

use std::{
    collections::HashMap,
    net::{Ipv4Addr, SocketAddr},
};

use anyhow::Context;
use blastar_shared::{
    config::ArenaConfig,
    net::{relay_frame, MAX_DATAGRAM},
};
use bytes::Bytes;
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

/// Binds a relay on an ephemeral localhost port and returns a config
/// pointing clients at it.
pub async fn bind_ephemeral() -> anyhow::Result<(RelayServer, ArenaConfig)> {
    let relay = RelayServer::bind(SocketAddr::from((Ipv4Addr::LOCALHOST, 0))).await?;
    let cfg = ArenaConfig {
        relay_addr: relay.local_addr()?.to_string(),
        ..ArenaConfig::default()
    };
    Ok((relay, cfg))
}

/// Number of distinct sender indices.
pub const MAX_CLIENTS: usize = u8::MAX as usize + 1;

/// Known client addresses in arrival order.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    indices: HashMap<SocketAddr, u8>,
    order: Vec<SocketAddr>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of `addr`, assigning the next free one on first contact.
    /// `None` once every index is taken.
    pub fn register(&mut self, addr: SocketAddr) -> Option<u8> {
        if let Some(&index) = self.indices.get(&addr) {
            return Some(index);
        }
        let index = u8::try_from(self.order.len()).ok()?;
        self.indices.insert(addr, index);
        self.order.push(addr);
        info!(%addr, index, "Client connected");
        Some(index)
    }

    pub fn index_of(&self, addr: &SocketAddr) -> Option<u8> {
        self.indices.get(addr).copied()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Every known address except `from`, in arrival order.
    pub fn recipients(&self, from: SocketAddr) -> impl Iterator<Item = SocketAddr> + '_ {
        self.order.iter().copied().filter(move |addr| *addr != from)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u8, SocketAddr)> + '_ {
        self.order
            .iter()
            .enumerate()
            .map(|(index, addr)| (index as u8, *addr))
    }
}

/// A framed datagram and where it must go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FanOut {
    pub sender: u8,
    pub frame: Bytes,
    pub recipients: Vec<SocketAddr>,
}

/// Registers `from` and plans delivery of `payload` to everyone else.
///
/// `None` when the registry is full and `from` is a stranger.
pub fn fan_out(registry: &mut ClientRegistry, from: SocketAddr, payload: &[u8]) -> Option<FanOut> {
    let sender = registry.register(from)?;
    Some(FanOut {
        sender,
        frame: relay_frame(sender, payload),
        recipients: registry.recipients(from).collect(),
    })
}

/// Counters shown by the `status` console command.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RelayStats {
    pub received: u64,
    pub forwarded: u64,
    pub send_failures: u64,
    pub rejected: u64,
}

/// What happened to one received datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    Forwarded { sender: u8, delivered: usize },
    Rejected,
}

/// UDP relay server.
pub struct RelayServer {
    socket: UdpSocket,
    registry: ClientRegistry,
    stats: RelayStats,
}

impl RelayServer {
    pub async fn bind(addr: SocketAddr) -> anyhow::Result<Self> {
        let socket = UdpSocket::bind(addr)
            .await
            .with_context(|| format!("bind relay socket {addr}"))?;
        info!(addr = %socket.local_addr()?, "Relay listening");
        Ok(Self {
            socket,
            registry: ClientRegistry::new(),
            stats: RelayStats::default(),
        })
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    pub fn registry(&self) -> &ClientRegistry {
        &self.registry
    }

    pub fn stats(&self) -> RelayStats {
        self.stats
    }

    /// Waits for the next datagram. Cancel safe.
    pub async fn recv(&self) -> anyhow::Result<(SocketAddr, Bytes)> {
        let mut buf = [0u8; MAX_DATAGRAM];
        let (n, from) = self
            .socket
            .recv_from(&mut buf)
            .await
            .context("relay recv")?;
        Ok((from, Bytes::copy_from_slice(&buf[..n])))
    }

    /// Forwards one datagram from `from` to every other known client.
    pub async fn forward(&mut self, from: SocketAddr, payload: &[u8]) -> RelayOutcome {
        self.stats.received += 1;
        let Some(plan) = fan_out(&mut self.registry, from, payload) else {
            self.stats.rejected += 1;
            warn!(%from, "Registry full, datagram dropped");
            return RelayOutcome::Rejected;
        };

        let mut delivered = 0;
        for &to in &plan.recipients {
            match self.socket.send_to(&plan.frame, to).await {
                Ok(_) => delivered += 1,
                Err(e) => {
                    self.stats.send_failures += 1;
                    warn!(%to, error = %e, "Relay send failed");
                }
            }
        }
        self.stats.forwarded += delivered as u64;
        debug!(sender = plan.sender, len = payload.len(), delivered, "Relayed");
        RelayOutcome::Forwarded {
            sender: plan.sender,
            delivered,
        }
    }

    /// Receives and forwards a single datagram.
    pub async fn relay_one(&mut self) -> anyhow::Result<RelayOutcome> {
        let (from, payload) = self.recv().await?;
        Ok(self.forward(from, &payload).await)
    }

    /// Relays until the task is cancelled. Receive errors are logged and
    /// the loop keeps going.
    pub async fn run(&mut self) {
        loop {
            if let Err(e) = self.relay_one().await {
                warn!(error = %e, "Relay receive failed");
            }
        }
    }

    /// Human-readable status lines for the console.
    pub fn status(&self) -> Vec<String> {
        let mut out = vec![
            format!("Clients: {}", self.registry.len()),
            format!(
                "Datagrams: {} received, {} forwarded, {} send failures, {} rejected",
                self.stats.received,
                self.stats.forwarded,
                self.stats.send_failures,
                self.stats.rejected
            ),
        ];
        out.extend(
            self.registry
                .iter()
                .map(|(index, addr)| format!("  [{index}] {addr}")),
        );
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    #[test]
    fn indices_follow_first_contact() {
        let mut reg = ClientRegistry::new();
        assert_eq!(reg.register(addr(1000)), Some(0));
        assert_eq!(reg.register(addr(1001)), Some(1));
        assert_eq!(reg.register(addr(1000)), Some(0));
        assert_eq!(reg.len(), 2);
        assert_eq!(reg.index_of(&addr(1001)), Some(1));
    }

    #[test]
    fn fan_out_skips_the_sender() {
        let mut reg = ClientRegistry::new();
        reg.register(addr(1));
        reg.register(addr(2));
        reg.register(addr(3));

        let plan = fan_out(&mut reg, addr(2), &[1, 9, 9]).unwrap();
        assert_eq!(plan.sender, 1);
        assert_eq!(&plan.frame[..], &[1, 1, 9, 9]);
        assert_eq!(plan.recipients, vec![addr(1), addr(3)]);
    }

    #[test]
    fn first_datagram_registers_and_reaches_nobody() {
        let mut reg = ClientRegistry::new();
        let plan = fan_out(&mut reg, addr(7), &[0]).unwrap();
        assert_eq!(plan.sender, 0);
        assert!(plan.recipients.is_empty());
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn registry_stops_at_256_clients() {
        let mut reg = ClientRegistry::new();
        for port in 0..MAX_CLIENTS as u16 {
            assert!(reg.register(addr(10_000 + port)).is_some());
        }
        assert_eq!(reg.register(addr(10_000 + 255)), Some(255));
        assert_eq!(reg.register(addr(20_000)), None);
        assert!(fan_out(&mut reg, addr(20_000), &[0]).is_none());
        assert_eq!(reg.len(), MAX_CLIENTS);
    }

    #[tokio::test]
    async fn forward_delivers_to_others_only() {
        let mut relay = RelayServer::bind(addr(0)).await.unwrap();
        let relay_addr = relay.local_addr().unwrap();

        let a = UdpSocket::bind(addr(0)).await.unwrap();
        let b = UdpSocket::bind(addr(0)).await.unwrap();

        a.send_to(&[0, 1], relay_addr).await.unwrap();
        assert_eq!(
            relay.relay_one().await.unwrap(),
            RelayOutcome::Forwarded {
                sender: 0,
                delivered: 0
            }
        );

        b.send_to(&[1, 2, 3], relay_addr).await.unwrap();
        assert_eq!(
            relay.relay_one().await.unwrap(),
            RelayOutcome::Forwarded {
                sender: 1,
                delivered: 1
            }
        );

        let mut buf = [0u8; 16];
        let (n, from) = a.recv_from(&mut buf).await.unwrap();
        assert_eq!(from, relay_addr);
        assert_eq!(&buf[..n], &[1, 1, 2, 3]);
        assert_eq!(relay.stats().forwarded, 1);
    }
}
