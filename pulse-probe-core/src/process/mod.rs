pub mod cmdindex;
pub mod epoch;
pub mod inventory;

use crate::error::{ProbeError, Result};
use crate::sampler::{PackOutcome, Sampler};
use cmdindex::CommandPrefixIndex;
use epoch::ProcessAccumulator;
use inventory::{ClockConfig, ProcessInventory};
use pulse_proto::{pack_record, Arg, Record, RecordPayload};
use std::collections::HashMap;
use std::time::Instant;

/// Maximum number of processes a single `sample_all` sweep may observe.
/// `/proc` handing back more dynamic objects than this in one epoch is
/// treated as a resource-limit error, fatal to the probe.
pub const MAX_DOBJECTS: usize = 16_384;

/// Maximum length of a single process's command name. A `/proc` entry
/// reporting a name past this is a resource-limit error too, not
/// silently truncated.
pub const MAX_OBJSIZE: usize = 1024;

/// Tracks CPU and memory usage of processes matched by command name,
/// aggregated per configured stream.
pub struct ProcessSampler {
    inventory: Box<dyn ProcessInventory>,
    clock: Option<ClockConfig>,
    index: CommandPrefixIndex,
    args: Vec<Arg>,
    accumulators: Vec<ProcessAccumulator>,
    epoch: u64,
    last_sample_at: Option<Instant>,
    wall_elapsed_usec: u64,
}

impl ProcessSampler {
    pub fn new(inventory: Box<dyn ProcessInventory>) -> Self {
        Self {
            inventory,
            clock: None,
            index: CommandPrefixIndex::new(),
            args: Vec::new(),
            accumulators: Vec::new(),
            epoch: 0,
            last_sample_at: None,
            wall_elapsed_usec: 0,
        }
    }

    fn stream_index(&self, arg: &Arg) -> Option<usize> {
        self.args.iter().position(|a| a == arg)
    }
}

impl Sampler for ProcessSampler {
    fn init(&mut self, args: &[Arg]) -> Result<()> {
        self.clock = Some(ClockConfig::query()?);
        for (idx, arg) in args.iter().enumerate() {
            let name = arg.as_str().map_err(|_| {
                ProbeError::Config(format!("process stream arg {idx} is not valid utf-8"))
            })?;
            self.index
                .insert(name, idx)
                .map_err(|e| ProbeError::DuplicateStream(e.0))?;
            self.args.push(*arg);
            self.accumulators.push(ProcessAccumulator::new());
        }
        Ok(())
    }

    fn sample_all(&mut self) -> Result<()> {
        let clock = self.clock.ok_or_else(|| {
            ProbeError::Config("process sampler sampled before init".to_string())
        })?;
        self.epoch += 1;
        let now = Instant::now();
        self.wall_elapsed_usec = match self.last_sample_at {
            Some(prev) => now.duration_since(prev).as_micros() as u64,
            None => 0,
        };
        self.last_sample_at = Some(now);

        let snapshot = self.inventory.snapshot()?;
        if snapshot.len() > MAX_DOBJECTS {
            return Err(ProbeError::ResourceLimit(format!(
                "process inventory returned {} entries, exceeding MAX_DOBJECTS ({MAX_DOBJECTS})",
                snapshot.len()
            )));
        }
        for proc in &snapshot {
            if proc.comm.len() > MAX_OBJSIZE {
                return Err(ProbeError::ResourceLimit(format!(
                    "process {:?} command name is {} bytes, exceeding MAX_OBJSIZE ({MAX_OBJSIZE})",
                    proc.comm,
                    proc.comm.len()
                )));
            }
        }
        for proc in snapshot {
            let Some(idx) = self.index.lookup(&proc.comm) else {
                continue;
            };
            let utime_usec = clock.ticks_to_usec(proc.utime_ticks);
            let stime_usec = clock.ticks_to_usec(proc.stime_ticks);
            let rtime_usec = clock.ticks_to_usec(proc.elapsed_ticks);
            let mem_rss = clock.pages_to_bytes(proc.rss_pages);
            self.accumulators[idx].observe(
                self.epoch,
                utime_usec,
                stime_usec,
                rtime_usec,
                proc.vsize_bytes,
                mem_rss,
            );
        }
        Ok(())
    }

    fn pack(&mut self, arg: &Arg, buf: &mut Vec<u8>, capacity: usize, version: u8) -> PackOutcome {
        let Some(idx) = self.stream_index(arg) else {
            return PackOutcome::NoData;
        };
        let Some(sample) = self.accumulators[idx].diff(self.epoch, self.wall_elapsed_usec) else {
            return PackOutcome::NoData;
        };
        let payload = RecordPayload::Process {
            cnt: sample.cnt as u16,
            utime_usec: sample.utime_diff_usec,
            stime_usec: sample.stime_diff_usec,
            rtime_usec: sample.rtime_diff_usec,
            cpu_pct: sample.cpu_pct,
            mem_size: sample.mem_size,
            mem_rss: sample.mem_rss,
        };
        let record = Record { arg: *arg, payload };
        match pack_record(buf, capacity, &record, version) {
            Some(n) => PackOutcome::Wrote(n),
            None => PackOutcome::BufferFull,
        }
    }
}

/// Grouping used by config loading to tell the scheduler which Arg maps
/// to which already-registered stream index, kept separate from the
/// sampler so config parsing doesn't need to reach into sampler internals.
pub type StreamArgs = HashMap<String, Arg>;
