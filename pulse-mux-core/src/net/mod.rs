mod server;
mod subscriber;
mod tcp;
mod udp;

pub use server::{run, ServerConfig};
pub use tcp::MAX_TCP_SCRATCH;
pub use udp::MAX_UDP_PACKET;
