use crate::config::Protocol;
use crate::error::Result;
use std::net::SocketAddr;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpStream, UdpSocket};

/// The probe's outbound link to the mux, one packet per call.
pub enum Transport {
    Udp(UdpSocket),
    Tcp(TcpStream),
}

impl Transport {
    pub async fn connect(addr: SocketAddr, protocol: Protocol) -> Result<Self> {
        match protocol {
            Protocol::Udp => {
                let bind_addr: SocketAddr = if addr.is_ipv4() {
                    "0.0.0.0:0".parse().unwrap()
                } else {
                    "[::]:0".parse().unwrap()
                };
                let socket = UdpSocket::bind(bind_addr).await?;
                socket.connect(addr).await?;
                Ok(Transport::Udp(socket))
            }
            Protocol::Tcp => {
                let stream = TcpStream::connect(addr).await?;
                Ok(Transport::Tcp(stream))
            }
        }
    }

    pub async fn send(&mut self, buf: &[u8]) -> Result<()> {
        match self {
            Transport::Udp(socket) => {
                socket.send(buf).await?;
            }
            Transport::Tcp(stream) => {
                stream.write_all(buf).await?;
            }
        }
        Ok(())
    }
}
