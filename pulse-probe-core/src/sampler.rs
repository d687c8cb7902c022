use crate::error::Result;
use pulse_proto::Arg;

/// Outcome of [`Sampler::pack`]. Kept distinct from a bare `0`-byte
/// return because the scheduler needs to tell "this stream has nothing
/// new to report" from "this packet is full, flush and retry" — two
/// different reasons a caller would see zero bytes written.
pub enum PackOutcome {
    Wrote(usize),
    NoData,
    BufferFull,
}

/// The uniform three-and-a-half-operation interface every platform
/// counter module implements, whether or not its sampling logic is
/// built out in this crate.
pub trait Sampler: Send {
    /// Runs once, before any privilege drop. Most samplers have nothing
    /// to do here; a few (raw sockets, `/dev` device nodes) need it.
    fn privinit(&mut self) -> Result<()> {
        Ok(())
    }

    /// Runs once at startup, after privileges are dropped. Registers
    /// the set of instance identifiers ("args") this sampler will be
    /// asked to report on.
    fn init(&mut self, args: &[Arg]) -> Result<()>;

    /// Refreshes this sampler's view of the current epoch's counters
    /// for every registered arg.
    fn sample_all(&mut self) -> Result<()>;

    /// Encodes the record for `arg` into `buf`, bounded by `capacity`
    /// total bytes already used in the packet being assembled.
    fn pack(&mut self, arg: &Arg, buf: &mut Vec<u8>, capacity: usize, version: u8) -> PackOutcome;
}
