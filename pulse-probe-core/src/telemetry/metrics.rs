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
use tracing::{info, warn};

#[derive(Clone)]
pub struct Metrics {
    pub samples_total: Counter<u64>,
    pub packets_sent_total: Counter<u64>,
    pub packets_flushed_on_buffer_full_total: Counter<u64>,
    pub send_errors_total: Counter<u64>,
}

impl Metrics {
    fn new(meter: Meter) -> Self {
        Self {
            samples_total: meter
                .u64_counter("pulse_probe_samples_total")
                .with_description("Total number of sampler sweeps completed")
                .build(),
            packets_sent_total: meter
                .u64_counter("pulse_probe_packets_sent_total")
                .with_description("Total number of packets sent to the configured destination")
                .build(),
            packets_flushed_on_buffer_full_total: meter
                .u64_counter("pulse_probe_packets_flushed_on_buffer_full_total")
                .with_description("Total number of packets flushed early because a record did not fit")
                .build(),
            send_errors_total: meter
                .u64_counter("pulse_probe_send_errors_total")
                .with_description("Total number of transport send failures")
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

    let meter = global::meter("pulse-probe");
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

    loop {
        let (stream, peer) = match listener.accept().await {
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
                        let body = Full::new(Bytes::from("not found")).map_err(|never| match never {}).boxed();
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
