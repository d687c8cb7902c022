pub mod metrics;
pub mod metrics_handler;

pub use metrics::{init_metrics, start_metrics_server, Metrics};
pub use metrics_handler::handle_metrics;
