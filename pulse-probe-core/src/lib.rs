#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod process;
pub mod sampler;
pub mod scheduler;
pub mod stub;
pub mod telemetry;
pub mod transport;

pub use config::{load_from_path, ProbeConfig};
pub use error::{ProbeError, Result};
pub use process::ProcessSampler;
pub use sampler::{PackOutcome, Sampler};
pub use scheduler::Scheduler;
pub use stub::StubSampler;
pub use transport::Transport;
