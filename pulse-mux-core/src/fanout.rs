//! Subscriber fan-out over a `tokio::sync::broadcast` channel of
//! formatted lines: the mux loop is the single writer, and each
//! subscriber connection holds its own receiver. A `String` moves as a
//! whole, so no reader ever observes a half-written line.

use pulse_proto::{RecordType, RecordPayload};
use std::net::IpAddr;
use tokio::sync::broadcast;

pub const FANOUT_CHANNEL_CAPACITY: usize = 1024;

#[derive(Clone)]
pub struct FanOut {
    tx: broadcast::Sender<String>,
}

impl Default for FanOut {
    fn default() -> Self {
        Self::new()
    }
}

impl FanOut {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(FANOUT_CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }

    /// Publishes one line summarizing every authorized record decoded
    /// from a single incoming packet: `source;type:arg:ts:fields;...\n`.
    pub fn publish(&self, source: IpAddr, timestamp: u64, records: &[(RecordType, String, String)]) {
        let mut line = format!("{source};");
        for (record_type, arg, fields_csv) in records {
            line.push_str(&format!("{record_type:?}:{arg}:{timestamp}:{fields_csv};"));
        }
        line.push('\n');
        // A lagging or absent subscriber is not this call's problem;
        // `send` only errors when there are zero receivers.
        let _ = self.tx.send(line);
    }
}

/// Renders a decoded record's payload as the comma-separated field list
/// subscribers and the archive backend both expect.
pub fn format_fields(payload: &RecordPayload) -> String {
    use RecordPayload as P;
    match *payload {
        P::Cpu { user, nice, sys, idle, iowait } => format!("{user},{nice},{sys},{idle},{iowait}"),
        P::CpuWeighted { user, nice, sys, idle, iowait, weight } => {
            format!("{user},{nice},{sys},{idle},{iowait},{weight}")
        }
        P::Interface { ibytes, ipackets, ierrs, obytes, opackets, oerrs } => {
            format!("{ibytes},{ipackets},{ierrs},{obytes},{opackets},{oerrs}")
        }
        P::DiskIo { rxfer, wxfer, rbytes, wbytes } => format!("{rxfer},{wxfer},{rbytes},{wbytes}"),
        P::Filesystem { bytes_free, bytes_total, files_free, files_total } => {
            format!("{bytes_free},{bytes_total},{files_free},{files_total}")
        }
        P::Memory { real_active, real_total, free, swap_used, swap_total } => {
            format!("{real_active},{real_total},{free},{swap_used},{swap_total}")
        }
        P::Process { cnt, utime_usec, stime_usec, rtime_usec, cpu_pct, mem_size, mem_rss } => {
            format!("{cnt},{utime_usec},{stime_usec},{rtime_usec},{cpu_pct},{mem_size},{mem_rss}")
        }
        P::Sensor { kind, value } => format!("{kind},{value}"),
        P::Smart { health_pct, raw } => format!("{health_pct},{raw}"),
        P::Load { load1, load5, load15 } => format!("{load1},{load5},{load15}"),
        P::Flukso { watt } => format!("{watt}"),
        P::Io1 { rbytes, wbytes } => format!("{rbytes},{wbytes}"),
        P::Mbuf { used, total } => format!("{used},{total}"),
        P::Test | P::Eot => String::new(),
        P::Pf { bytes_in, bytes_out, states_cur } => format!("{bytes_in},{bytes_out},{states_cur}"),
        P::Pfq { qlen, qlimit, qdrops } => format!("{qlen},{qlimit},{qdrops}"),
        P::Wg { last_handshake_secs, rx_bytes, tx_bytes } => {
            format!("{last_handshake_secs},{rx_bytes},{tx_bytes}")
        }
        P::Rtt { rtt_usec, rttvar_usec } => format!("{rtt_usec},{rttvar_usec}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_published_line() {
        let fanout = FanOut::new();
        let mut rx = fanout.subscribe();
        fanout.publish(
            "10.0.0.5".parse().unwrap(),
            42,
            &[(RecordType::Load, "cpu0".into(), "1.0,2.0,3.0".into())],
        );
        let line = rx.recv().await.unwrap();
        assert_eq!(line, "10.0.0.5;Load:cpu0:42:1.0,2.0,3.0;\n");
    }

    #[test]
    fn format_fields_process_matches_field_order() {
        let payload = RecordPayload::Process {
            cnt: 1,
            utime_usec: 10,
            stime_usec: 20,
            rtime_usec: 30,
            cpu_pct: 1.5,
            mem_size: 100,
            mem_rss: 50,
        };
        assert_eq!(format_fields(&payload), "1,10,20,30,1.5,100,50");
    }
}
