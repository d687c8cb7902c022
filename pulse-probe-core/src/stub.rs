//! Stand-in for the platform counter modules whose sampling logic isn't
//! built out yet (CPU, interface, disk I/O, filesystem, memory, sensor,
//! S.M.A.R.T., load, flukso, io1, pf, pfq, wg, rtt). Each still satisfies
//! the [`Sampler`] contract so the scheduler, config loading and wire
//! codec can be exercised end to end without depending on real kernel
//! counters.

use crate::error::Result;
use crate::sampler::{PackOutcome, Sampler};
use pulse_proto::{pack_record, Arg, Record, RecordPayload, RecordType};

pub struct StubSampler {
    record_type: RecordType,
    args: Vec<Arg>,
}

impl StubSampler {
    pub fn new(record_type: RecordType) -> Self {
        Self { record_type, args: Vec::new() }
    }

    fn fixed_payload(&self) -> RecordPayload {
        use RecordType::*;
        match self.record_type {
            Cpu => RecordPayload::Cpu { user: 0.0, nice: 0.0, sys: 0.0, idle: 100.0, iowait: 0.0 },
            CpuWeighted => RecordPayload::CpuWeighted {
                user: 0.0,
                nice: 0.0,
                sys: 0.0,
                idle: 100.0,
                iowait: 0.0,
                weight: 1.0,
            },
            Interface => RecordPayload::Interface {
                ibytes: 0,
                ipackets: 0,
                ierrs: 0,
                obytes: 0,
                opackets: 0,
                oerrs: 0,
            },
            DiskIo => RecordPayload::DiskIo { rxfer: 0, wxfer: 0, rbytes: 0, wbytes: 0 },
            Filesystem => RecordPayload::Filesystem {
                bytes_free: 0,
                bytes_total: 0,
                files_free: 0,
                files_total: 0,
            },
            Memory => RecordPayload::Memory {
                real_active: 0,
                real_total: 0,
                free: 0,
                swap_used: 0,
                swap_total: 0,
            },
            Sensor => RecordPayload::Sensor { kind: 0, value: 0.0 },
            Smart => RecordPayload::Smart { health_pct: 100, raw: 0 },
            Load => RecordPayload::Load { load1: 0.0, load5: 0.0, load15: 0.0 },
            Flukso => RecordPayload::Flukso { watt: 0.0 },
            Io1 => RecordPayload::Io1 { rbytes: 0, wbytes: 0 },
            Mbuf => RecordPayload::Mbuf { used: 0, total: 0 },
            Pf => RecordPayload::Pf { bytes_in: 0, bytes_out: 0, states_cur: 0 },
            Pfq => RecordPayload::Pfq { qlen: 0, qlimit: 0, qdrops: 0 },
            Wg => RecordPayload::Wg { last_handshake_secs: 0, rx_bytes: 0, tx_bytes: 0 },
            Rtt => RecordPayload::Rtt { rtt_usec: 0, rttvar_usec: 0 },
            Test => RecordPayload::Test,
            Process | Eot => RecordPayload::Test,
        }
    }
}

impl Sampler for StubSampler {
    fn init(&mut self, args: &[Arg]) -> Result<()> {
        self.args = args.to_vec();
        Ok(())
    }

    fn sample_all(&mut self) -> Result<()> {
        Ok(())
    }

    fn pack(&mut self, arg: &Arg, buf: &mut Vec<u8>, capacity: usize, version: u8) -> PackOutcome {
        if !self.args.contains(arg) {
            return PackOutcome::NoData;
        }
        let record = Record { arg: *arg, payload: self.fixed_payload() };
        match pack_record(buf, capacity, &record, version) {
            Some(n) => PackOutcome::Wrote(n),
            None => PackOutcome::BufferFull,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_only_registered_args() {
        let mut s = StubSampler::new(RecordType::Load);
        let registered = Arg::new("cpu0").unwrap();
        s.init(&[registered]).unwrap();
        let mut buf = Vec::new();
        assert!(matches!(s.pack(&registered, &mut buf, 1024, 2), PackOutcome::Wrote(_)));
        let other = Arg::new("cpu1").unwrap();
        let mut buf2 = Vec::new();
        assert!(matches!(s.pack(&other, &mut buf2, 1024, 2), PackOutcome::NoData));
    }
}
