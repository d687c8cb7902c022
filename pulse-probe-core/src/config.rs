use crate::error::{ProbeError, Result};
use serde::Deserialize;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;

#[derive(Debug, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Udp,
    Tcp,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StreamConfig {
    #[serde(rename = "type")]
    pub record_type: String,
    pub arg: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProbeSection {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    pub destination: SocketAddr,
    #[serde(default)]
    pub protocol: Protocol,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub metrics_port: Option<u16>,
    #[serde(rename = "stream", default)]
    pub streams: Vec<StreamConfig>,
}

fn default_interval_secs() -> u64 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProbeConfig {
    pub probe: ProbeSection,
}

pub fn load_from_path<P: AsRef<Path>>(p: P) -> Result<ProbeConfig> {
    let txt = fs::read_to_string(p).map_err(ProbeError::Io)?;
    let cfg: ProbeConfig =
        toml::from_str(&txt).map_err(|e| ProbeError::Config(format!("failed to parse config: {e}")))?;
    validate(&cfg)?;
    Ok(cfg)
}

fn validate(cfg: &ProbeConfig) -> Result<()> {
    if cfg.probe.streams.is_empty() {
        return Err(ProbeError::Config("at least one [[probe.stream]] is required".into()));
    }
    if cfg.probe.interval_secs == 0 {
        return Err(ProbeError::Config("interval_secs must be > 0".into()));
    }
    for stream in &cfg.probe.streams {
        if pulse_proto::RecordType::from_config_name(&stream.record_type).is_none() {
            return Err(ProbeError::Config(format!(
                "unknown stream type {:?}",
                stream.record_type
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f
    }

    #[test]
    fn loads_minimal_valid_config() {
        let f = write_config(
            r#"
            [probe]
            destination = "127.0.0.1:2100"

            [[probe.stream]]
            type = "process"
            arg = "sshd"
            "#,
        );
        let cfg = load_from_path(f.path()).unwrap();
        assert_eq!(cfg.probe.interval_secs, 5);
        assert_eq!(cfg.probe.streams.len(), 1);
    }

    #[test]
    fn rejects_empty_stream_list() {
        let f = write_config(
            r#"
            [probe]
            destination = "127.0.0.1:2100"
            "#,
        );
        assert!(load_from_path(f.path()).is_err());
    }

    #[test]
    fn rejects_unknown_stream_type() {
        let f = write_config(
            r#"
            [probe]
            destination = "127.0.0.1:2100"

            [[probe.stream]]
            type = "bogus"
            arg = "x"
            "#,
        );
        assert!(load_from_path(f.path()).is_err());
    }
}
