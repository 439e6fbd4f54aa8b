//! Networking primitives.
//!
//! Framing:
//! - client -> relay: `[type:1][payload]`
//! - relay -> client: `[sender index:1][type:1][payload]`
//!
//! Payloads are the fixed-size records from [`crate::wire`]. Nothing here is
//! reliable: datagrams may be lost, duplicated, or reordered.

use std::net::SocketAddr;

use anyhow::Context;
use bytes::{BufMut, Bytes, BytesMut};
use tokio::net::UdpSocket;

use crate::{
    impulse::Impulse,
    wire::{DecodeError, EntitySnapshot, SyncPayload},
};

/// Largest datagram read from the socket.
pub const MAX_DATAGRAM: usize = 256;

/// One-byte packet type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketType {
    Join = 0,
    Impulse = 1,
    PositionSync = 2,
    Summon = 3,
    Kill = 4,
    Quit = 5,
}

impl TryFrom<u8> for PacketType {
    type Error = DecodeError;

    fn try_from(tag: u8) -> Result<Self, DecodeError> {
        Ok(match tag {
            0 => PacketType::Join,
            1 => PacketType::Impulse,
            2 => PacketType::PositionSync,
            3 => PacketType::Summon,
            4 => PacketType::Kill,
            5 => PacketType::Quit,
            other => return Err(DecodeError::UnknownPacketType(other)),
        })
    }
}

/// Messages a client sends to the relay.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMsg {
    /// Announce (or answer an announcement of) the local player.
    Join(EntitySnapshot),
    /// The local player accepted a force.
    Impulse(Impulse),
    /// The local player's force queue drained.
    PositionSync(SyncPayload),
    /// The client is leaving.
    Quit,
}

impl ClientMsg {
    pub fn packet_type(&self) -> PacketType {
        match self {
            ClientMsg::Join(_) => PacketType::Join,
            ClientMsg::Impulse(_) => PacketType::Impulse,
            ClientMsg::PositionSync(_) => PacketType::PositionSync,
            ClientMsg::Quit => PacketType::Quit,
        }
    }

    pub fn encode(&self) -> Bytes {
        let payload = match self {
            ClientMsg::Join(snap) => snap.to_bytes(),
            ClientMsg::Impulse(imp) => imp.to_bytes(),
            ClientMsg::PositionSync(sync) => sync.to_bytes(),
            ClientMsg::Quit => Bytes::new(),
        };
        let mut buf = BytesMut::with_capacity(1 + payload.len());
        buf.put_u8(self.packet_type() as u8);
        buf.extend_from_slice(&payload);
        buf.freeze()
    }
}

/// A datagram as delivered by the relay, split into its frame fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayedFrame<'a> {
    pub sender: u8,
    pub tag: u8,
    pub payload: &'a [u8],
}

impl<'a> RelayedFrame<'a> {
    pub fn split(datagram: &'a [u8]) -> Result<Self, DecodeError> {
        match datagram {
            [] => Err(DecodeError::EmptyDatagram),
            [_] => Err(DecodeError::UnexpectedEof {
                needed: 1,
                remaining: 0,
            }),
            [sender, tag, payload @ ..] => Ok(Self {
                sender: *sender,
                tag: *tag,
                payload,
            }),
        }
    }
}

/// Decoded body of a relayed message.
#[derive(Debug, Clone, PartialEq)]
pub enum PeerBody {
    Join(EntitySnapshot),
    Impulse(Impulse),
    PositionSync(SyncPayload),
    /// Any tag the receive loop does not handle. Ends the session.
    Unhandled(u8),
}

/// A message from another client, tagged with its relay index.
#[derive(Debug, Clone, PartialEq)]
pub struct PeerMsg {
    pub sender: u8,
    pub body: PeerBody,
}

impl PeerMsg {
    pub fn decode(datagram: &[u8]) -> Result<Self, DecodeError> {
        let frame = RelayedFrame::split(datagram)?;
        let body = match PacketType::try_from(frame.tag) {
            Ok(PacketType::Join) => PeerBody::Join(EntitySnapshot::from_bytes(frame.payload)?),
            Ok(PacketType::Impulse) => PeerBody::Impulse(Impulse::from_bytes(frame.payload)?),
            Ok(PacketType::PositionSync) => {
                PeerBody::PositionSync(SyncPayload::from_bytes(frame.payload)?)
            }
            _ => PeerBody::Unhandled(frame.tag),
        };
        Ok(Self {
            sender: frame.sender,
            body,
        })
    }
}

/// Prefixes `payload` with the sender's relay index.
pub fn relay_frame(sender: u8, payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(1 + payload.len());
    buf.put_u8(sender);
    buf.extend_from_slice(payload);
    buf.freeze()
}

/// Unreliable channel over UDP, bound to a single peer (the relay).
#[derive(Debug)]
pub struct DatagramConn {
    socket: UdpSocket,
    peer: SocketAddr,
}

impl DatagramConn {
    pub async fn connect(bind_addr: SocketAddr, peer: SocketAddr) -> anyhow::Result<Self> {
        let socket = UdpSocket::bind(bind_addr).await.context("udp bind")?;
        socket.connect(peer).await.context("udp connect")?;
        Ok(Self { socket, peer })
    }

    pub async fn send(&self, datagram: &[u8]) -> anyhow::Result<()> {
        self.socket.send(datagram).await.context("udp send")?;
        Ok(())
    }

    pub async fn send_msg(&self, msg: &ClientMsg) -> anyhow::Result<()> {
        self.send(&msg.encode()).await
    }

    /// Receives one datagram, truncated to [`MAX_DATAGRAM`] bytes.
    pub async fn recv(&self) -> anyhow::Result<Bytes> {
        let mut buf = [0u8; MAX_DATAGRAM];
        let n = self.socket.recv(&mut buf).await.context("udp recv")?;
        Ok(Bytes::copy_from_slice(&buf[..n]))
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::PositionSync;

    #[test]
    fn client_msg_is_tag_then_payload() {
        let imp = Impulse::new(1.0, 0.0, 0.1, false, 5.0);
        let bytes = ClientMsg::Impulse(imp.clone()).encode();
        assert_eq!(bytes[0], 1);
        assert_eq!(&bytes[1..], &imp.to_bytes()[..]);

        assert_eq!(&ClientMsg::Quit.encode()[..], &[5]);
    }

    #[test]
    fn relayed_join_decodes() {
        let snap = EntitySnapshot {
            x: 10,
            y: 20,
            max_stack_depth: 1,
            max_speed: 5,
            falloff: 0.1,
        };
        let datagram = relay_frame(3, &ClientMsg::Join(snap).encode());
        let msg = PeerMsg::decode(&datagram).unwrap();
        assert_eq!(msg.sender, 3);
        assert_eq!(msg.body, PeerBody::Join(snap));
    }

    #[test]
    fn relayed_sync_decodes() {
        let sync = SyncPayload {
            position: PositionSync { x: 40, y: 50 },
            impulse: Impulse::new(-2.0, 0.0, 0.1, false, 5.0),
        };
        let datagram = relay_frame(0, &ClientMsg::PositionSync(sync.clone()).encode());
        assert_eq!(
            PeerMsg::decode(&datagram).unwrap().body,
            PeerBody::PositionSync(sync)
        );
    }

    #[test]
    fn unhandled_tags_are_surfaced() {
        for tag in [3u8, 4, 5, 200] {
            let msg = PeerMsg::decode(&[1, tag, 9, 9]).unwrap();
            assert_eq!(msg.body, PeerBody::Unhandled(tag));
        }
        assert_eq!(PacketType::try_from(9), Err(DecodeError::UnknownPacketType(9)));
    }

    #[tokio::test]
    async fn conn_talks_to_its_peer_and_truncates() {
        let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let peer_addr = peer.local_addr().unwrap();
        let conn = DatagramConn::connect("127.0.0.1:0".parse().unwrap(), peer_addr)
            .await
            .unwrap();
        assert_eq!(conn.peer_addr(), peer_addr);

        conn.send_msg(&ClientMsg::Quit).await.unwrap();
        let mut buf = [0u8; 8];
        let (n, from) = peer.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], &[5]);
        assert_eq!(from, conn.local_addr().unwrap());

        peer.send_to(&[7u8; 300], from).await.unwrap();
        let got = conn.recv().await.unwrap();
        assert_eq!(got.len(), MAX_DATAGRAM);
    }

    #[test]
    fn short_datagrams_fail_to_decode() {
        assert_eq!(PeerMsg::decode(&[]), Err(DecodeError::EmptyDatagram));
        assert!(PeerMsg::decode(&[1]).is_err());
        assert!(matches!(
            PeerMsg::decode(&[1, 1, 0, 0]),
            Err(DecodeError::UnexpectedEof { .. })
        ));
    }
}
