use thiserror::Error;

#[derive(Error, Debug)]
pub enum MuxError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("resource limit exceeded: {0}")]
    ResourceLimit(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("wire error: {0}")]
    Wire(#[from] pulse_proto::WireError),

    #[error("archive error: {0}")]
    Archive(String),

    #[error("http error: {0}")]
    Http(String),
}

pub type Result<T> = std::result::Result<T, MuxError>;
