//! UDP receive loop. Every datagram is one complete packet — no
//! reassembly — so a transient read error just gets logged and the
//! loop continues listening.

use crate::dispatch::Mux;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tracing::warn;

/// Largest datagram the mux will ever accept. Matches the probe's own
/// `max_packet_size` ceiling; anything the kernel hands back larger
/// than this was never a valid packet to begin with.
pub const MAX_UDP_PACKET: usize = 8192;

pub async fn run_udp(socket: UdpSocket, mux: Arc<Mux>) {
    let mut buf = vec![0u8; MAX_UDP_PACKET];
    loop {
        match socket.recv_from(&mut buf).await {
            Ok((n, peer)) => mux.handle_packet(peer.ip(), &buf[..n]),
            Err(err) => warn!(%err, "udp recv error"),
        }
    }
}
