use serde::Deserialize;
use std::net::IpAddr;
use std::path::PathBuf;

/// A stream a [`SourceConfig`] is willing to receive and, optionally,
/// persist to an archive file.
#[derive(Debug, Deserialize, Clone)]
pub struct AcceptedStream {
    #[serde(rename = "type")]
    pub record_type: String,
    pub arg: String,
    #[serde(default)]
    pub archive: Option<PathBuf>,
}

/// One authorized telemetry source, matched by host alone for both
/// UDP and TCP.
#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    pub host: IpAddr,
    #[serde(rename = "accept", default)]
    pub accepted: Vec<AcceptedStream>,
}
