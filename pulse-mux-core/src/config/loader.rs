use crate::error::{MuxError, Result};
use std::fs;
use std::path::Path;

use super::root::MuxConfig;

pub fn load_from_path<P: AsRef<Path>>(p: P) -> Result<MuxConfig> {
    let txt = fs::read_to_string(p).map_err(MuxError::Io)?;
    let cfg: MuxConfig =
        toml::from_str(&txt).map_err(|e| MuxError::Config(format!("failed to parse config: {e}")))?;
    validate(&cfg)?;
    Ok(cfg)
}

fn validate(cfg: &MuxConfig) -> Result<()> {
    if cfg.mux.sources.is_empty() {
        return Err(MuxError::Config("at least one [[mux.source]] is required".into()));
    }
    for source in &cfg.mux.sources {
        if source.accepted.is_empty() {
            return Err(MuxError::Config(format!(
                "source {} accepts no streams",
                source.host
            )));
        }
        let mut seen = std::collections::HashSet::new();
        for accepted in &source.accepted {
            if pulse_proto::RecordType::from_config_name(&accepted.record_type).is_none() {
                return Err(MuxError::Config(format!(
                    "source {}: unknown stream type {:?}",
                    source.host, accepted.record_type
                )));
            }
            if !seen.insert((accepted.record_type.clone(), accepted.arg.clone())) {
                return Err(MuxError::Config(format!(
                    "source {}: duplicate stream {}({})",
                    source.host, accepted.record_type, accepted.arg
                )));
            }
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
            [mux]
            udp_bind = "0.0.0.0:2100"
            tcp_bind = "0.0.0.0:2100"

            [[mux.source]]
            host = "10.0.0.5"

            [[mux.source.accept]]
            type = "process"
            arg = "sshd"
            "#,
        );
        let cfg = load_from_path(f.path()).unwrap();
        assert_eq!(cfg.mux.sources.len(), 1);
    }

    #[test]
    fn rejects_source_with_no_accepted_streams() {
        let f = write_config(
            r#"
            [mux]
            udp_bind = "0.0.0.0:2100"
            tcp_bind = "0.0.0.0:2100"

            [[mux.source]]
            host = "10.0.0.5"
            "#,
        );
        assert!(load_from_path(f.path()).is_err());
    }

    #[test]
    fn rejects_unknown_record_type() {
        let f = write_config(
            r#"
            [mux]
            udp_bind = "0.0.0.0:2100"
            tcp_bind = "0.0.0.0:2100"

            [[mux.source]]
            host = "10.0.0.5"

            [[mux.source.accept]]
            type = "not-a-real-type"
            arg = "x"
            "#,
        );
        assert!(load_from_path(f.path()).is_err());
    }

    #[test]
    fn rejects_duplicate_stream_within_a_source() {
        let f = write_config(
            r#"
            [mux]
            udp_bind = "0.0.0.0:2100"
            tcp_bind = "0.0.0.0:2100"

            [[mux.source]]
            host = "10.0.0.5"

            [[mux.source.accept]]
            type = "cpu"
            arg = "cpu0"

            [[mux.source.accept]]
            type = "cpu"
            arg = "cpu0"
            "#,
        );
        assert!(load_from_path(f.path()).is_err());
    }
}
