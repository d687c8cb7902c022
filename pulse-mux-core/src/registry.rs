//! The mux's view of which hosts may send telemetry and which streams
//! each is authorized to report. Built once from [`crate::config`] at
//! startup; read-only for the lifetime of the process.

use crate::config::MuxSection;
use crate::error::{MuxError, Result};
use pulse_proto::{Arg, RecordType};
use std::net::IpAddr;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stream {
    pub record_type: RecordType,
    pub arg: Arg,
    pub archive_file: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct Source {
    pub host: IpAddr,
    pub streams: Vec<Stream>,
}

impl Source {
    pub fn find_stream(&self, record_type: RecordType, arg: &Arg) -> Option<&Stream> {
        self.streams.iter().find(|s| s.record_type == record_type && &s.arg == arg)
    }
}

/// Authorization is by source host alone. A sending host's UDP source
/// port varies datagram to datagram and a TCP client's port is
/// ephemeral per connection, so neither carries identity information —
/// only the address does.
pub fn find_source_by_ip(sources: &[Source], ip: IpAddr) -> Option<&Source> {
    sources.iter().find(|s| s.host == ip)
}

/// Builds the runtime registry from parsed configuration. Assumes the
/// configuration has already passed [`crate::config::load_from_path`]'s
/// validation (every stream type name is known).
pub fn sources_from_config(section: &MuxSection) -> Result<Vec<Source>> {
    section
        .sources
        .iter()
        .map(|source| {
            let streams = source
                .accepted
                .iter()
                .map(|accepted| {
                    let record_type = RecordType::from_config_name(&accepted.record_type)
                        .ok_or_else(|| MuxError::Config(format!("unknown stream type {:?}", accepted.record_type)))?;
                    let arg = Arg::new(&accepted.arg)
                        .map_err(|e| MuxError::Config(format!("invalid arg {:?}: {e}", accepted.arg)))?;
                    Ok(Stream { record_type, arg, archive_file: accepted.archive.clone() })
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(Source { host: source.host, streams })
        })
        .collect()
}
