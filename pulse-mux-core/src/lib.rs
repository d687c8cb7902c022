#![forbid(unsafe_code)]

pub mod archive;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod fanout;
pub mod net;
pub mod registry;
pub mod telemetry;

pub use archive::{AppendFileArchive, ArchiveErrorTracker, ArchiveOutcome, ArchiveWriter, MAX_ARCHIVE_ERRORS};
pub use config::{load_from_path, AcceptedStream, LoggingConfig, MuxConfig, MuxSection, SourceConfig};
pub use dispatch::Mux;
pub use error::{MuxError, Result};
pub use fanout::{format_fields, FanOut, FANOUT_CHANNEL_CAPACITY};
pub use net::{run as run_net, ServerConfig, MAX_TCP_SCRATCH, MAX_UDP_PACKET};
pub use registry::{find_source_by_ip, sources_from_config, Source, Stream};
