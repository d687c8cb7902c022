use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("resource limit exceeded: {0}")]
    ResourceLimit(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("wire error: {0}")]
    Wire(#[from] pulse_proto::WireError),

    #[error("duplicate stream for command {0:?}")]
    DuplicateStream(String),

    #[error("unknown user {0:?}")]
    UnknownUser(String),

    #[error("metrics error: {0}")]
    Metrics(String),
}

pub type Result<T> = std::result::Result<T, ProbeError>;
