use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;

use super::source::SourceConfig;

#[derive(Debug, Deserialize, Clone)]
pub struct MuxSection {
    pub udp_bind: SocketAddr,
    pub tcp_bind: SocketAddr,
    #[serde(default)]
    pub subscriber_bind: Option<SocketAddr>,
    #[serde(default)]
    pub pid_file: Option<PathBuf>,
    #[serde(default)]
    pub metrics_port: Option<u16>,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(rename = "source", default)]
    pub sources: Vec<SourceConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub show_target: bool,
    #[serde(default = "default_otel_log_level")]
    pub otel_log_level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level(), show_target: false, otel_log_level: default_otel_log_level() }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_otel_log_level() -> String {
    "warn".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct MuxConfig {
    pub mux: MuxSection,
}
