use crate::arg::{Arg, ARG_LEN};
use crate::error::{Result, WireError};

/// Tag byte identifying the closed set of record types a packet may
/// carry. Samplers other than [`RecordType::Process`] are out of scope
/// for this build (see [`crate::StubPayload`] in the probe crate) but
/// still have a defined wire encoding so the codec round-trips them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RecordType {
    Cpu = 0,
    CpuWeighted = 1,
    Interface = 2,
    DiskIo = 3,
    Filesystem = 4,
    Memory = 5,
    Process = 6,
    Sensor = 7,
    Smart = 8,
    Load = 9,
    Flukso = 10,
    Io1 = 11,
    Mbuf = 12,
    Test = 13,
    Pf = 14,
    Pfq = 15,
    Wg = 16,
    Rtt = 17,
    Eot = 18,
}

impl RecordType {
    /// Parses the lowercase name used in configuration files (e.g.
    /// `"process"`, `"cpu-weighted"`).
    pub fn from_config_name(name: &str) -> Option<Self> {
        use RecordType::*;
        Some(match name {
            "cpu" => Cpu,
            "cpu-weighted" => CpuWeighted,
            "interface" => Interface,
            "diskio" => DiskIo,
            "filesystem" => Filesystem,
            "memory" => Memory,
            "process" => Process,
            "sensor" => Sensor,
            "smart" => Smart,
            "load" => Load,
            "flukso" => Flukso,
            "io1" => Io1,
            "mbuf" => Mbuf,
            "test" => Test,
            "pf" => Pf,
            "pfq" => Pfq,
            "wg" => Wg,
            "rtt" => Rtt,
            "eot" => Eot,
            _ => return None,
        })
    }
}

impl TryFrom<u8> for RecordType {
    type Error = WireError;

    fn try_from(tag: u8) -> Result<Self> {
        use RecordType::*;
        Ok(match tag {
            0 => Cpu,
            1 => CpuWeighted,
            2 => Interface,
            3 => DiskIo,
            4 => Filesystem,
            5 => Memory,
            6 => Process,
            7 => Sensor,
            8 => Smart,
            9 => Load,
            10 => Flukso,
            11 => Io1,
            12 => Mbuf,
            13 => Test,
            14 => Pf,
            15 => Pfq,
            16 => Wg,
            17 => Rtt,
            18 => Eot,
            other => return Err(WireError::UnknownRecordType(other)),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RecordPayload {
    Cpu { user: f32, nice: f32, sys: f32, idle: f32, iowait: f32 },
    CpuWeighted { user: f32, nice: f32, sys: f32, idle: f32, iowait: f32, weight: f32 },
    Interface { ibytes: u64, ipackets: u64, ierrs: u64, obytes: u64, opackets: u64, oerrs: u64 },
    DiskIo { rxfer: u64, wxfer: u64, rbytes: u64, wbytes: u64 },
    Filesystem { bytes_free: u64, bytes_total: u64, files_free: u64, files_total: u64 },
    Memory { real_active: u64, real_total: u64, free: u64, swap_used: u64, swap_total: u64 },
    Process {
        cnt: u16,
        utime_usec: u64,
        stime_usec: u64,
        rtime_usec: u64,
        cpu_pct: f32,
        mem_size: u64,
        mem_rss: u64,
    },
    Sensor { kind: u8, value: f64 },
    Smart { health_pct: u8, raw: u64 },
    Load { load1: f32, load5: f32, load15: f32 },
    Flukso { watt: f64 },
    Io1 { rbytes: u64, wbytes: u64 },
    Mbuf { used: u32, total: u32 },
    Test,
    Pf { bytes_in: u64, bytes_out: u64, states_cur: u64 },
    Pfq { qlen: u32, qlimit: u32, qdrops: u32 },
    Wg { last_handshake_secs: u64, rx_bytes: u64, tx_bytes: u64 },
    Rtt { rtt_usec: u32, rttvar_usec: u32 },
    Eot,
}

impl RecordPayload {
    pub fn record_type(&self) -> RecordType {
        use RecordPayload as P;
        match self {
            P::Cpu { .. } => RecordType::Cpu,
            P::CpuWeighted { .. } => RecordType::CpuWeighted,
            P::Interface { .. } => RecordType::Interface,
            P::DiskIo { .. } => RecordType::DiskIo,
            P::Filesystem { .. } => RecordType::Filesystem,
            P::Memory { .. } => RecordType::Memory,
            P::Process { .. } => RecordType::Process,
            P::Sensor { .. } => RecordType::Sensor,
            P::Smart { .. } => RecordType::Smart,
            P::Load { .. } => RecordType::Load,
            P::Flukso { .. } => RecordType::Flukso,
            P::Io1 { .. } => RecordType::Io1,
            P::Mbuf { .. } => RecordType::Mbuf,
            P::Test => RecordType::Test,
            P::Pf { .. } => RecordType::Pf,
            P::Pfq { .. } => RecordType::Pfq,
            P::Wg { .. } => RecordType::Wg,
            P::Rtt { .. } => RecordType::Rtt,
            P::Eot => RecordType::Eot,
        }
    }

    /// Width in octets of an integer counter field for the given wire
    /// version: version 1 narrows counters to 32 bits, version 2 carries
    /// the full 64 bits. Percentages and small enums are unaffected.
    fn counter_width(version: u8) -> usize {
        if version <= 1 {
            4
        } else {
            8
        }
    }

    fn write_counter(buf: &mut Vec<u8>, value: u64, version: u8) {
        if Self::counter_width(version) == 4 {
            buf.extend_from_slice(&(value as u32).to_be_bytes());
        } else {
            buf.extend_from_slice(&value.to_be_bytes());
        }
    }

    fn read_counter(buf: &[u8], version: u8) -> Result<(u64, usize)> {
        let width = Self::counter_width(version);
        if buf.len() < width {
            return Err(WireError::TruncatedPayload);
        }
        let value = if width == 4 {
            u32::from_be_bytes(buf[..4].try_into().unwrap()) as u64
        } else {
            u64::from_be_bytes(buf[..8].try_into().unwrap())
        };
        Ok((value, width))
    }

    pub fn encode(&self, buf: &mut Vec<u8>, version: u8) {
        use RecordPayload as P;
        match *self {
            P::Cpu { user, nice, sys, idle, iowait } => {
                for v in [user, nice, sys, idle, iowait] {
                    buf.extend_from_slice(&v.to_be_bytes());
                }
            }
            P::CpuWeighted { user, nice, sys, idle, iowait, weight } => {
                for v in [user, nice, sys, idle, iowait, weight] {
                    buf.extend_from_slice(&v.to_be_bytes());
                }
            }
            P::Interface { ibytes, ipackets, ierrs, obytes, opackets, oerrs } => {
                for v in [ibytes, ipackets, ierrs, obytes, opackets, oerrs] {
                    Self::write_counter(buf, v, version);
                }
            }
            P::DiskIo { rxfer, wxfer, rbytes, wbytes } => {
                for v in [rxfer, wxfer, rbytes, wbytes] {
                    Self::write_counter(buf, v, version);
                }
            }
            P::Filesystem { bytes_free, bytes_total, files_free, files_total } => {
                for v in [bytes_free, bytes_total, files_free, files_total] {
                    Self::write_counter(buf, v, version);
                }
            }
            P::Memory { real_active, real_total, free, swap_used, swap_total } => {
                for v in [real_active, real_total, free, swap_used, swap_total] {
                    Self::write_counter(buf, v, version);
                }
            }
            P::Process { cnt, utime_usec, stime_usec, rtime_usec, cpu_pct, mem_size, mem_rss } => {
                buf.extend_from_slice(&cnt.to_be_bytes());
                for v in [utime_usec, stime_usec, rtime_usec] {
                    Self::write_counter(buf, v, version);
                }
                buf.extend_from_slice(&cpu_pct.to_be_bytes());
                for v in [mem_size, mem_rss] {
                    Self::write_counter(buf, v, version);
                }
            }
            P::Sensor { kind, value } => {
                buf.push(kind);
                buf.extend_from_slice(&value.to_be_bytes());
            }
            P::Smart { health_pct, raw } => {
                buf.push(health_pct);
                Self::write_counter(buf, raw, version);
            }
            P::Load { load1, load5, load15 } => {
                for v in [load1, load5, load15] {
                    buf.extend_from_slice(&v.to_be_bytes());
                }
            }
            P::Flukso { watt } => buf.extend_from_slice(&watt.to_be_bytes()),
            P::Io1 { rbytes, wbytes } => {
                for v in [rbytes, wbytes] {
                    Self::write_counter(buf, v, version);
                }
            }
            P::Mbuf { used, total } => {
                buf.extend_from_slice(&used.to_be_bytes());
                buf.extend_from_slice(&total.to_be_bytes());
            }
            P::Test | P::Eot => {}
            P::Pf { bytes_in, bytes_out, states_cur } => {
                for v in [bytes_in, bytes_out, states_cur] {
                    Self::write_counter(buf, v, version);
                }
            }
            P::Pfq { qlen, qlimit, qdrops } => {
                for v in [qlen, qlimit, qdrops] {
                    buf.extend_from_slice(&v.to_be_bytes());
                }
            }
            P::Wg { last_handshake_secs, rx_bytes, tx_bytes } => {
                for v in [last_handshake_secs, rx_bytes, tx_bytes] {
                    Self::write_counter(buf, v, version);
                }
            }
            P::Rtt { rtt_usec, rttvar_usec } => {
                buf.extend_from_slice(&rtt_usec.to_be_bytes());
                buf.extend_from_slice(&rttvar_usec.to_be_bytes());
            }
        }
    }

    pub fn decode(record_type: RecordType, buf: &[u8], version: u8) -> Result<(Self, usize)> {
        fn f32_at(buf: &[u8], off: usize) -> Result<f32> {
            buf.get(off..off + 4)
                .map(|b| f32::from_be_bytes(b.try_into().unwrap()))
                .ok_or(WireError::TruncatedPayload)
        }
        fn f64_at(buf: &[u8], off: usize) -> Result<f64> {
            buf.get(off..off + 8)
                .map(|b| f64::from_be_bytes(b.try_into().unwrap()))
                .ok_or(WireError::TruncatedPayload)
        }
        fn u16_at(buf: &[u8], off: usize) -> Result<u16> {
            buf.get(off..off + 2)
                .map(|b| u16::from_be_bytes(b.try_into().unwrap()))
                .ok_or(WireError::TruncatedPayload)
        }
        fn u32_at(buf: &[u8], off: usize) -> Result<u32> {
            buf.get(off..off + 4)
                .map(|b| u32::from_be_bytes(b.try_into().unwrap()))
                .ok_or(WireError::TruncatedPayload)
        }
        fn u8_at(buf: &[u8], off: usize) -> Result<u8> {
            buf.get(off).copied().ok_or(WireError::TruncatedPayload)
        }

        use RecordType as T;
        let (payload, len) = match record_type {
            T::Cpu => {
                let user = f32_at(buf, 0)?;
                let nice = f32_at(buf, 4)?;
                let sys = f32_at(buf, 8)?;
                let idle = f32_at(buf, 12)?;
                let iowait = f32_at(buf, 16)?;
                (RecordPayload::Cpu { user, nice, sys, idle, iowait }, 20)
            }
            T::CpuWeighted => {
                let user = f32_at(buf, 0)?;
                let nice = f32_at(buf, 4)?;
                let sys = f32_at(buf, 8)?;
                let idle = f32_at(buf, 12)?;
                let iowait = f32_at(buf, 16)?;
                let weight = f32_at(buf, 20)?;
                (
                    RecordPayload::CpuWeighted { user, nice, sys, idle, iowait, weight },
                    24,
                )
            }
            T::Interface => {
                let mut off = 0;
                let mut vals = [0u64; 6];
                for v in vals.iter_mut() {
                    let (val, w) = Self::read_counter(&buf[off..], version)?;
                    *v = val;
                    off += w;
                }
                (
                    RecordPayload::Interface {
                        ibytes: vals[0],
                        ipackets: vals[1],
                        ierrs: vals[2],
                        obytes: vals[3],
                        opackets: vals[4],
                        oerrs: vals[5],
                    },
                    off,
                )
            }
            T::DiskIo => {
                let mut off = 0;
                let mut vals = [0u64; 4];
                for v in vals.iter_mut() {
                    let (val, w) = Self::read_counter(&buf[off..], version)?;
                    *v = val;
                    off += w;
                }
                (RecordPayload::DiskIo { rxfer: vals[0], wxfer: vals[1], rbytes: vals[2], wbytes: vals[3] }, off)
            }
            T::Filesystem => {
                let mut off = 0;
                let mut vals = [0u64; 4];
                for v in vals.iter_mut() {
                    let (val, w) = Self::read_counter(&buf[off..], version)?;
                    *v = val;
                    off += w;
                }
                (
                    RecordPayload::Filesystem {
                        bytes_free: vals[0],
                        bytes_total: vals[1],
                        files_free: vals[2],
                        files_total: vals[3],
                    },
                    off,
                )
            }
            T::Memory => {
                let mut off = 0;
                let mut vals = [0u64; 5];
                for v in vals.iter_mut() {
                    let (val, w) = Self::read_counter(&buf[off..], version)?;
                    *v = val;
                    off += w;
                }
                (
                    RecordPayload::Memory {
                        real_active: vals[0],
                        real_total: vals[1],
                        free: vals[2],
                        swap_used: vals[3],
                        swap_total: vals[4],
                    },
                    off,
                )
            }
            T::Process => {
                let cnt = u16_at(buf, 0)?;
                let mut off = 2;
                let (utime_usec, w) = Self::read_counter(&buf[off..], version)?;
                off += w;
                let (stime_usec, w) = Self::read_counter(&buf[off..], version)?;
                off += w;
                let (rtime_usec, w) = Self::read_counter(&buf[off..], version)?;
                off += w;
                let cpu_pct = f32_at(buf, off)?;
                off += 4;
                let (mem_size, w) = Self::read_counter(&buf[off..], version)?;
                off += w;
                let (mem_rss, w) = Self::read_counter(&buf[off..], version)?;
                off += w;
                (
                    RecordPayload::Process {
                        cnt,
                        utime_usec,
                        stime_usec,
                        rtime_usec,
                        cpu_pct,
                        mem_size,
                        mem_rss,
                    },
                    off,
                )
            }
            T::Sensor => {
                let kind = u8_at(buf, 0)?;
                let value = f64_at(buf, 1)?;
                (RecordPayload::Sensor { kind, value }, 9)
            }
            T::Smart => {
                let health_pct = u8_at(buf, 0)?;
                let (raw, w) = Self::read_counter(&buf[1..], version)?;
                (RecordPayload::Smart { health_pct, raw }, 1 + w)
            }
            T::Load => {
                let load1 = f32_at(buf, 0)?;
                let load5 = f32_at(buf, 4)?;
                let load15 = f32_at(buf, 8)?;
                (RecordPayload::Load { load1, load5, load15 }, 12)
            }
            T::Flukso => (RecordPayload::Flukso { watt: f64_at(buf, 0)? }, 8),
            T::Io1 => {
                let (rbytes, w1) = Self::read_counter(buf, version)?;
                let (wbytes, w2) = Self::read_counter(&buf[w1..], version)?;
                (RecordPayload::Io1 { rbytes, wbytes }, w1 + w2)
            }
            T::Mbuf => {
                let used = u32_at(buf, 0)?;
                let total = u32_at(buf, 4)?;
                (RecordPayload::Mbuf { used, total }, 8)
            }
            T::Test => (RecordPayload::Test, 0),
            T::Pf => {
                let mut off = 0;
                let mut vals = [0u64; 3];
                for v in vals.iter_mut() {
                    let (val, w) = Self::read_counter(&buf[off..], version)?;
                    *v = val;
                    off += w;
                }
                (RecordPayload::Pf { bytes_in: vals[0], bytes_out: vals[1], states_cur: vals[2] }, off)
            }
            T::Pfq => {
                let qlen = u32_at(buf, 0)?;
                let qlimit = u32_at(buf, 4)?;
                let qdrops = u32_at(buf, 8)?;
                (RecordPayload::Pfq { qlen, qlimit, qdrops }, 12)
            }
            T::Wg => {
                let mut off = 0;
                let mut vals = [0u64; 3];
                for v in vals.iter_mut() {
                    let (val, w) = Self::read_counter(&buf[off..], version)?;
                    *v = val;
                    off += w;
                }
                (
                    RecordPayload::Wg {
                        last_handshake_secs: vals[0],
                        rx_bytes: vals[1],
                        tx_bytes: vals[2],
                    },
                    off,
                )
            }
            T::Rtt => {
                let rtt_usec = u32_at(buf, 0)?;
                let rttvar_usec = u32_at(buf, 4)?;
                (RecordPayload::Rtt { rtt_usec, rttvar_usec }, 8)
            }
            T::Eot => (RecordPayload::Eot, 0),
        };
        Ok((payload, len))
    }
}

/// A decoded `(arg, payload)` record, tagged implicitly by the payload
/// variant's [`RecordType`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Record {
    pub arg: Arg,
    pub payload: RecordPayload,
}

/// Appends one encoded record (tag + arg + payload) to `buf`, returning
/// the number of bytes written. Returns `None` if the record would not
/// fit in `capacity` remaining bytes, so callers can flush and retry in
/// a fresh packet rather than silently truncating.
pub fn pack_record(buf: &mut Vec<u8>, capacity: usize, record: &Record, version: u8) -> Option<usize> {
    let mut body = Vec::with_capacity(32);
    body.push(record.payload.record_type() as u8);
    body.extend_from_slice(record.arg.as_bytes());
    record.payload.encode(&mut body, version);
    if buf.len() + body.len() > capacity {
        return None;
    }
    buf.extend_from_slice(&body);
    Some(body.len())
}

/// Decodes one record starting at `buf[0]`, returning it and the number
/// of bytes consumed.
pub fn unpack_record(buf: &[u8], version: u8) -> Result<(Record, usize)> {
    if buf.len() < 1 + ARG_LEN {
        return Err(WireError::TruncatedPayload);
    }
    let record_type = RecordType::try_from(buf[0])?;
    let mut arg_bytes = [0u8; ARG_LEN];
    arg_bytes.copy_from_slice(&buf[1..1 + ARG_LEN]);
    let arg = Arg::from_bytes(arg_bytes);
    let (payload, payload_len) = RecordPayload::decode(record_type, &buf[1 + ARG_LEN..], version)?;
    Ok((Record { arg, payload }, 1 + ARG_LEN + payload_len))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(payload: RecordPayload, version: u8) {
        let record = Record { arg: Arg::new("eth0").unwrap(), payload };
        let mut buf = Vec::new();
        let written = pack_record(&mut buf, 1024, &record, version).unwrap();
        assert_eq!(written, buf.len());
        let (decoded, consumed) = unpack_record(&buf, version).unwrap();
        assert_eq!(consumed, buf.len());
        assert_eq!(decoded.arg.as_str().unwrap(), "eth0");
        match (decoded.payload, record.payload) {
            (RecordPayload::Interface { ibytes: a, .. }, RecordPayload::Interface { ibytes: b, .. }) => {
                assert_eq!(a, b)
            }
            (a, b) => assert_eq!(format!("{a:?}"), format!("{b:?}")),
        }
    }

    #[test]
    fn process_round_trips_v2() {
        roundtrip(
            RecordPayload::Process {
                cnt: 3,
                utime_usec: 1_000_000,
                stime_usec: 250_000,
                rtime_usec: 4_000_000,
                cpu_pct: 12.5,
                mem_size: 1 << 30,
                mem_rss: 1 << 20,
            },
            2,
        );
    }

    #[test]
    fn interface_counters_narrow_on_v1() {
        let big = u64::from(u32::MAX) + 10;
        let record = Record {
            arg: Arg::new("eth0").unwrap(),
            payload: RecordPayload::Interface {
                ibytes: big,
                ipackets: 1,
                ierrs: 0,
                obytes: 2,
                opackets: 0,
                oerrs: 0,
            },
        };
        let mut buf = Vec::new();
        pack_record(&mut buf, 1024, &record, 1).unwrap();
        let (decoded, _) = unpack_record(&buf, 1).unwrap();
        match decoded.payload {
            RecordPayload::Interface { ibytes, .. } => assert_eq!(ibytes, big as u32 as u64),
            _ => unreachable!(),
        }
    }

    #[test]
    fn pack_record_reports_insufficient_capacity() {
        let record = Record { arg: Arg::new("x").unwrap(), payload: RecordPayload::Load { load1: 0.0, load5: 0.0, load15: 0.0 } };
        let mut buf = Vec::new();
        assert!(pack_record(&mut buf, 4, &record, 2).is_none());
        assert!(buf.is_empty());
    }

    #[test]
    fn eot_and_test_have_empty_payload() {
        roundtrip(RecordPayload::Eot, 2);
        roundtrip(RecordPayload::Test, 2);
    }
}
