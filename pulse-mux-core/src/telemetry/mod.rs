pub mod metrics;
pub mod metrics_handler;
pub mod tracing;

pub use metrics::{init_metrics, start_metrics_server, Metrics};
pub use metrics_handler::handle_metrics;
pub use tracing::{init_tracing_with_otel, shutdown_tracing};
