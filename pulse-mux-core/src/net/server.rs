//! Ties the UDP listener, the TCP telemetry listener and the TCP
//! subscriber listener together into one run loop. A telemetry
//! connection from a peer IP with no configured source is closed
//! immediately on accept, before it is registered or handed to a
//! handler task. A new telemetry connection from a host that already
//! has one open evicts the stale connection rather than running both
//! side by side — a probe that reconnects (after a restart, or a
//! network flap) should immediately take over its host's stream.

use crate::dispatch::Mux;
use crate::fanout::FanOut;
use crate::net::subscriber::handle_subscriber_connection;
use crate::net::tcp::handle_telemetry_connection;
use crate::net::udp::run_udp;
use crate::registry::find_source_by_ip;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::{TcpListener, UdpSocket};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub struct ServerConfig {
    pub udp_bind: SocketAddr,
    pub tcp_bind: SocketAddr,
    pub subscriber_bind: Option<SocketAddr>,
}

/// Runs every listener concurrently until `shutdown` reports `true`.
/// Each accept loop is spawned as its own task so one listener's churn
/// never blocks another.
pub async fn run(cfg: ServerConfig, mux: Arc<Mux>, mut shutdown: watch::Receiver<bool>) -> std::io::Result<()> {
    let udp_socket = UdpSocket::bind(cfg.udp_bind).await?;
    let tcp_listener = TcpListener::bind(cfg.tcp_bind).await?;
    let subscriber_listener = match cfg.subscriber_bind {
        Some(addr) => Some(TcpListener::bind(addr).await?),
        None => None,
    };

    info!(udp = %cfg.udp_bind, tcp = %cfg.tcp_bind, "mux listening for telemetry");

    let udp_task = tokio::spawn(run_udp(udp_socket, Arc::clone(&mux)));
    let telemetry_task = tokio::spawn(run_telemetry_listener(tcp_listener, Arc::clone(&mux)));
    let subscriber_task = subscriber_listener
        .map(|listener| tokio::spawn(run_subscriber_listener(listener, mux.fanout.clone(), mux.metrics.clone())));

    shutdown.changed().await.ok();
    info!("shutdown requested, stopping listeners");
    udp_task.abort();
    telemetry_task.abort();
    if let Some(task) = subscriber_task {
        task.abort();
    }
    Ok(())
}

async fn run_telemetry_listener(listener: TcpListener, mux: Arc<Mux>) {
    let active: Arc<Mutex<HashMap<std::net::IpAddr, CancellationToken>>> = Arc::new(Mutex::new(HashMap::new()));
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(pair) => pair,
            Err(err) => {
                warn!(%err, "telemetry accept error");
                continue;
            }
        };
        let peer_ip = peer.ip();
        if find_source_by_ip(&mux.sources, peer_ip).is_none() {
            debug!(%peer_ip, "closing telemetry connection from unauthorized source");
            continue;
        }

        let token = CancellationToken::new();
        let previous = active.lock().unwrap().insert(peer_ip, token.clone());
        if let Some(previous) = previous {
            debug!(%peer_ip, "evicting stale telemetry connection for reconnecting source");
            previous.cancel();
        }

        let mux = Arc::clone(&mux);
        tokio::spawn(async move {
            tokio::select! {
                _ = handle_telemetry_connection(stream, peer_ip, mux) => {}
                _ = token.cancelled() => {
                    debug!(%peer_ip, "telemetry connection evicted");
                }
            }
        });
    }
}

async fn run_subscriber_listener(
    listener: TcpListener,
    fanout: FanOut,
    metrics: Option<Arc<crate::telemetry::Metrics>>,
) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(pair) => pair,
            Err(err) => {
                warn!(%err, "subscriber accept error");
                continue;
            }
        };
        info!(%peer, "subscriber connected");
        if let Some(m) = &metrics {
            m.subscribers_active.add(1, &[]);
        }
        let fanout = fanout.clone();
        tokio::spawn(handle_subscriber_connection(stream, fanout));
    }
}
