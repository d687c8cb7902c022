mod loader;
mod root;
mod source;

pub use loader::load_from_path;
pub use root::{LoggingConfig, MuxConfig, MuxSection};
pub use source::{AcceptedStream, SourceConfig};
