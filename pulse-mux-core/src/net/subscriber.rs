//! The subscriber-facing TCP listener: every accepted connection gets
//! its own fan-out receiver and simply writes whatever lines arrive
//! until it disconnects or falls too far behind.

use crate::fanout::FanOut;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

pub async fn handle_subscriber_connection(mut stream: TcpStream, fanout: FanOut) {
    let mut rx = fanout.subscribe();
    loop {
        match rx.recv().await {
            Ok(line) => {
                if let Err(err) = stream.write_all(line.as_bytes()).await {
                    debug!(%err, "subscriber disconnected");
                    return;
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "subscriber fell behind, some lines were dropped");
            }
            Err(RecvError::Closed) => return,
        }
    }
}
