use crate::telemetry::handle_metrics;
use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::Request;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use opentelemetry::global;
use opentelemetry::metrics::{Counter, Meter};
use opentelemetry_sdk::metrics::SdkMeterProvider;
use prometheus::Registry;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};

#[derive(Clone)]
pub struct Metrics {
    pub packets_received_total: Counter<u64>,
    pub packets_rejected_total: Counter<u64>,
    pub records_decoded_total: Counter<u64>,
    pub records_dropped_total: Counter<u64>,
    pub archive_writes_total: Counter<u64>,
    pub archive_errors_total: Counter<u64>,
    pub subscribers_active: Counter<u64>,
}

impl Metrics {
    fn new(meter: Meter) -> Self {
        Self {
            packets_received_total: meter
                .u64_counter("pulse_mux_packets_received_total")
                .with_description("Total number of telemetry packets received over UDP or TCP")
                .build(),
            packets_rejected_total: meter
                .u64_counter("pulse_mux_packets_rejected_total")
                .with_description("Total number of packets rejected during header validation")
                .build(),
            records_decoded_total: meter
                .u64_counter("pulse_mux_records_decoded_total")
                .with_description("Total number of records successfully decoded and authorized")
                .build(),
            records_dropped_total: meter
                .u64_counter("pulse_mux_records_dropped_total")
                .with_description("Total number of records dropped as malformed or unauthorized")
                .build(),
            archive_writes_total: meter
                .u64_counter("pulse_mux_archive_writes_total")
                .with_description("Total number of successful archive updates")
                .build(),
            archive_errors_total: meter
                .u64_counter("pulse_mux_archive_errors_total")
                .with_description("Total number of archive update failures")
                .build(),
            subscribers_active: meter
                .u64_counter("pulse_mux_subscribers_connected_total")
                .with_description("Total number of subscriber connections accepted")
                .build(),
        }
    }
}

pub fn init_metrics() -> Result<(Arc<Metrics>, Registry), Box<dyn std::error::Error + Send + Sync>>
{
    let registry = Registry::default();

    let exporter = opentelemetry_prometheus::exporter()
        .with_registry(registry.clone())
        .build()?;

    let meter_provider = SdkMeterProvider::builder().with_reader(exporter).build();

    global::set_meter_provider(meter_provider);

    let meter = global::meter("pulse-mux");
    let metrics = Arc::new(Metrics::new(meter));

    Ok((metrics, registry))
}

pub async fn start_metrics_server(
    port: u16,
    registry: Registry,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let registry = Arc::new(registry);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;

    info!(?addr, "metrics server started on dedicated port");

    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
        .map_err(|e| std::io::Error::other(format!("failed to set up SIGTERM handler: {e}")))?;
    let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())
        .map_err(|e| std::io::Error::other(format!("failed to set up SIGINT handler: {e}")))?;

    loop {
        tokio::select! {
            _ = sigterm.recv() => {
                info!("metrics server: received SIGTERM, shutting down");
                break;
            }
            _ = sigint.recv() => {
                info!("metrics server: received SIGINT, shutting down");
                break;
            }
            result = listener.accept() => {
                let (stream, peer) = match result {
                    Ok(pair) => pair,
                    Err(e) => {
                        warn!(error = %e, "metrics server: accept error");
                        continue;
                    }
                };

                let registry = registry.clone();
                tokio::spawn(async move {
                    let svc = hyper::service::service_fn(move |req: Request<Incoming>| {
                        let registry = registry.clone();
                        async move {
                            if req.uri().path() == "/metrics" {
                                match handle_metrics(&registry) {
                                    Ok(resp) => Ok::<_, hyper::Error>(resp),
                                    Err(_) => {
                                        let body = Full::new(Bytes::from("internal server error"))
                                            .map_err(|never| match never {})
                                            .boxed();
                                        let mut resp = hyper::Response::new(body);
                                        *resp.status_mut() = hyper::StatusCode::INTERNAL_SERVER_ERROR;
                                        Ok(resp)
                                    }
                                }
                            } else {
                                let body = Full::new(Bytes::from("not found"))
                                    .map_err(|never| match never {})
                                    .boxed();
                                let mut resp = hyper::Response::new(body);
                                *resp.status_mut() = hyper::StatusCode::NOT_FOUND;
                                Ok(resp)
                            }
                        }
                    });

                    let builder = ConnBuilder::new(TokioExecutor::new());
                    if let Err(e) = builder.serve_connection(TokioIo::new(stream), svc).await {
                        warn!(?peer, error = %e, "metrics server: serve_connection error");
                    }
                });
            }
        }
    }

    info!("metrics server stopped");
    Ok(())
}
