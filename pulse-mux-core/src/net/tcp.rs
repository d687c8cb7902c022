//! Per-connection TCP telemetry decoding. Unlike UDP, a `read` can
//! return a partial packet or several packets back to back, so each
//! connection keeps its own scratch buffer and a small state machine:
//!
//!   - fewer than a header's worth of bytes buffered: wait for more
//!   - the claimed packet length exceeds the scratch buffer: the
//!     connection can never produce a valid packet again, so it is
//!     closed
//!   - buffered bytes short of the claimed length: wait for more
//!   - CRC mismatch or unsupported version: drop just that one framed
//!     packet (the length field itself is still trusted to find the
//!     start of the next one) and keep reading
//!   - a complete, valid packet: dispatch it, then slide any trailing
//!     bytes down to the front of the scratch buffer

use crate::dispatch::Mux;
use pulse_proto::{Header, WireError, HEADER_LEN, MAX_SUPPORTED_VERSION};
use std::net::IpAddr;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tracing::{debug, warn};

/// Largest packet a TCP telemetry connection can ever frame. A claimed
/// length beyond this is not a framing error to recover from; the
/// connection is closed.
pub const MAX_TCP_SCRATCH: usize = 16384;

pub async fn handle_telemetry_connection(mut stream: TcpStream, peer_ip: IpAddr, mux: Arc<Mux>) {
    let mut scratch = vec![0u8; MAX_TCP_SCRATCH];
    let mut filled = 0usize;

    loop {
        let n = match stream.read(&mut scratch[filled..]).await {
            Ok(0) => {
                debug!(%peer_ip, "telemetry connection closed");
                return;
            }
            Ok(n) => n,
            Err(err) => {
                warn!(%err, %peer_ip, "telemetry connection read error");
                return;
            }
        };
        filled += n;

        loop {
            if filled < HEADER_LEN {
                break;
            }
            let peeked = Header::decode(&scratch[..HEADER_LEN])
                .expect("HEADER_LEN bytes are always enough to decode a header");
            let length = peeked.length as usize;
            if length > scratch.len() {
                warn!(%peer_ip, length, "packet claims a length larger than the scratch buffer, closing connection");
                return;
            }
            if filled < length {
                break;
            }

            match Header::validate(&scratch[..length], length, MAX_SUPPORTED_VERSION) {
                Ok(_) => mux.handle_packet(peer_ip, &scratch[..length]),
                Err(WireError::UnsupportedVersion { version }) => {
                    debug!(%peer_ip, version, "dropping packet with unsupported version");
                }
                Err(err) => {
                    warn!(%err, %peer_ip, "dropping malformed packet");
                }
            }

            scratch.copy_within(length..filled, 0);
            filled -= length;
        }

        if filled == scratch.len() {
            warn!(%peer_ip, "scratch buffer full without a complete header, closing connection");
            return;
        }
    }
}
