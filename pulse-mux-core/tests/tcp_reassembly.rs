use pulse_mux_core::archive::AppendFileArchive;
use pulse_mux_core::dispatch::Mux;
use pulse_mux_core::net::{self, ServerConfig};
use pulse_mux_core::registry::{Source, Stream};
use pulse_proto::{pack_record, Arg, Header, Record, RecordPayload, MAX_SUPPORTED_VERSION, RecordType, HEADER_LEN};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

fn build_packet(timestamp: u64, record: Record) -> Vec<u8> {
    let mut buf = vec![0u8; HEADER_LEN];
    pack_record(&mut buf, 4096, &record, MAX_SUPPORTED_VERSION).unwrap();
    let total = buf.len();
    Header::finalize(&mut buf, total, MAX_SUPPORTED_VERSION, timestamp).unwrap();
    buf
}

/// Binds the telemetry/subscriber listeners on ephemeral ports and spawns
/// the server loop, returning the TCP telemetry address to connect to.
async fn spawn_server(mux: Arc<Mux>) -> std::net::SocketAddr {
    let udp_bind: std::net::SocketAddr = "127.0.0.1:0".parse().unwrap();
    let tcp_probe = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let tcp_bind = tcp_probe.local_addr().unwrap();
    drop(tcp_probe);
    let udp_probe = std::net::UdpSocket::bind(udp_bind).unwrap();
    let udp_bind = udp_probe.local_addr().unwrap();
    drop(udp_probe);

    let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let cfg = ServerConfig { udp_bind, tcp_bind, subscriber_bind: None };
    tokio::spawn(async move {
        net::run(cfg, mux, shutdown_rx).await.unwrap();
    });
    // give the listeners a moment to bind before the test connects
    tokio::time::sleep(Duration::from_millis(20)).await;
    tcp_bind
}

fn sample_mux() -> Arc<Mux> {
    let sources = vec![Source {
        host: "127.0.0.1".parse().unwrap(),
        streams: vec![Stream { record_type: RecordType::Load, arg: Arg::new("cpu0").unwrap(), archive_file: None }],
    }];
    Arc::new(Mux::new(sources, Arc::new(AppendFileArchive)))
}

#[tokio::test]
async fn reassembles_a_packet_split_across_two_writes() {
    let mux = sample_mux();
    let mut rx = mux.fanout.subscribe();
    let addr = spawn_server(Arc::clone(&mux)).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    let record = Record { arg: Arg::new("cpu0").unwrap(), payload: RecordPayload::Load { load1: 1.0, load5: 2.0, load15: 3.0 } };
    let packet = build_packet(55, record);

    let split = packet.len() / 2;
    stream.write_all(&packet[..split]).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    stream.write_all(&packet[split..]).await.unwrap();

    let line = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await.unwrap().unwrap();
    assert!(line.starts_with("127.0.0.1;Load:cpu0:55:"));
}

#[tokio::test]
async fn decodes_two_packets_delivered_in_one_write() {
    let mux = sample_mux();
    let mut rx = mux.fanout.subscribe();
    let addr = spawn_server(Arc::clone(&mux)).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    let record = Record { arg: Arg::new("cpu0").unwrap(), payload: RecordPayload::Load { load1: 0.1, load5: 0.2, load15: 0.3 } };
    let mut combined = build_packet(1, record);
    combined.extend(build_packet(2, record));
    stream.write_all(&combined).await.unwrap();

    let first = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await.unwrap().unwrap();
    let second = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await.unwrap().unwrap();
    assert!(first.starts_with("127.0.0.1;Load:cpu0:1:"));
    assert!(second.starts_with("127.0.0.1;Load:cpu0:2:"));
}

#[tokio::test]
async fn unauthorized_peer_connection_is_closed_immediately() {
    let mux = Arc::new(Mux::new(Vec::new(), Arc::new(AppendFileArchive)));
    let addr = spawn_server(mux).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    let mut buf = [0u8; 1];
    let n = tokio::time::timeout(Duration::from_secs(2), stream.read(&mut buf)).await.unwrap().unwrap();
    assert_eq!(n, 0, "connection from an unconfigured source should be closed immediately");
}
