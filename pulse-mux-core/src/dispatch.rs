//! Shared packet-handling logic for both transports: look up the
//! source, walk its records, archive and fan out whatever is
//! authorized.

use crate::archive::{ArchiveErrorTracker, ArchiveOutcome, ArchiveWriter};
use crate::fanout::{format_fields, FanOut};
use crate::registry::{find_source_by_ip, Source};
use crate::telemetry::Metrics;
use pulse_proto::{unpack_record, Header, HEADER_LEN, MAX_SUPPORTED_VERSION};
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct Mux {
    pub sources: Vec<Source>,
    pub archive: Arc<dyn ArchiveWriter>,
    pub archive_errors: ArchiveErrorTracker,
    pub fanout: FanOut,
    pub metrics: Option<Arc<Metrics>>,
}

impl Mux {
    pub fn new(sources: Vec<Source>, archive: Arc<dyn ArchiveWriter>) -> Self {
        Self {
            sources,
            archive,
            archive_errors: ArchiveErrorTracker::new(),
            fanout: FanOut::new(),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Validates a complete packet (`buf[..]` is exactly one packet) and
    /// dispatches every authorized record within it to the archive and
    /// the subscriber fan-out. Never panics on malformed input; warns
    /// and drops whatever portion cannot be parsed.
    pub fn handle_packet(&self, source_ip: IpAddr, buf: &[u8]) {
        if let Some(m) = &self.metrics {
            m.packets_received_total.add(1, &[]);
        }
        let header = match Header::validate(buf, buf.len(), MAX_SUPPORTED_VERSION) {
            Ok(h) => h,
            Err(err) => {
                if let Some(m) = &self.metrics {
                    m.packets_rejected_total.add(1, &[]);
                }
                warn!(%err, %source_ip, "rejecting packet");
                return;
            }
        };
        let Some(source) = find_source_by_ip(&self.sources, source_ip) else {
            debug!(%source_ip, "ignored packet from unaccepted source");
            return;
        };

        let length = header.length as usize;
        let mut offset = HEADER_LEN;
        let mut published = Vec::new();
        while offset < length {
            let (record, consumed) = match unpack_record(&buf[offset..length], header.version) {
                Ok(pair) => pair,
                Err(err) => {
                    if let Some(m) = &self.metrics {
                        m.records_dropped_total.add(1, &[]);
                    }
                    warn!(%err, %source_ip, "malformed record, dropping rest of packet");
                    break;
                }
            };
            offset += consumed;

            let record_type = record.payload.record_type();
            let Some(stream) = source.find_stream(record_type, &record.arg) else {
                if let Some(m) = &self.metrics {
                    m.records_dropped_total.add(1, &[]);
                }
                debug!(%source_ip, ?record_type, arg = %record.arg, "ignored unaccepted stream");
                continue;
            };

            let fields_csv = format_fields(&record.payload);
            if let Some(archive_file) = &stream.archive_file {
                let result = self.archive.update(archive_file, header.timestamp, &fields_csv);
                match self.archive_errors.record(result) {
                    ArchiveOutcome::ErrorReported(err) => {
                        if let Some(m) = &self.metrics {
                            m.archive_errors_total.add(1, &[]);
                        }
                        warn!(%err, path = %archive_file.display(), "archive update failed");
                    }
                    ArchiveOutcome::ErrorReportedFinal(err) => {
                        if let Some(m) = &self.metrics {
                            m.archive_errors_total.add(1, &[]);
                        }
                        warn!(%err, path = %archive_file.display(), "archive update failed");
                        warn!("maximum archive errors reached, will stop reporting them");
                    }
                    ArchiveOutcome::ErrorSuppressed => {
                        if let Some(m) = &self.metrics {
                            m.archive_errors_total.add(1, &[]);
                        }
                    }
                    ArchiveOutcome::Ok => {
                        if let Some(m) = &self.metrics {
                            m.archive_writes_total.add(1, &[]);
                        }
                    }
                }
            }
            if let Some(m) = &self.metrics {
                m.records_decoded_total.add(1, &[]);
            }
            published.push((record_type, record.arg.to_string(), fields_csv));
        }

        if !published.is_empty() {
            self.fanout.publish(source_ip, header.timestamp, &published);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::AppendFileArchive;
    use crate::registry::Stream;
    use pulse_proto::{pack_record, Arg, Record, RecordPayload, RecordType};

    fn packet_with(record: Record) -> Vec<u8> {
        let mut buf = vec![0u8; HEADER_LEN];
        pack_record(&mut buf, 4096, &record, MAX_SUPPORTED_VERSION).unwrap();
        let total = buf.len();
        buf.resize(4096, 0);
        Header::finalize(&mut buf, total, MAX_SUPPORTED_VERSION, 7).unwrap();
        buf.truncate(total);
        buf
    }

    fn mux_with_source(host: &str, record_type: RecordType, arg: &str) -> Mux {
        let sources = vec![Source {
            host: host.parse().unwrap(),
            streams: vec![Stream { record_type, arg: Arg::new(arg).unwrap(), archive_file: None }],
        }];
        Mux::new(sources, Arc::new(AppendFileArchive))
    }

    #[test]
    fn drops_packet_from_unknown_source() {
        let mux = mux_with_source("10.0.0.5", RecordType::Load, "cpu0");
        let mut rx = mux.fanout.subscribe();
        let record = Record { arg: Arg::new("cpu0").unwrap(), payload: RecordPayload::Load { load1: 1.0, load5: 1.0, load15: 1.0 } };
        mux.handle_packet("10.0.0.9".parse().unwrap(), &packet_with(record));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn publishes_authorized_stream_from_known_source() {
        let mux = mux_with_source("10.0.0.5", RecordType::Load, "cpu0");
        let mut rx = mux.fanout.subscribe();
        let record = Record { arg: Arg::new("cpu0").unwrap(), payload: RecordPayload::Load { load1: 1.0, load5: 2.0, load15: 3.0 } };
        mux.handle_packet("10.0.0.5".parse().unwrap(), &packet_with(record));
        let line = rx.try_recv().unwrap();
        assert!(line.starts_with("10.0.0.5;Load:cpu0:7:"));
    }

    #[test]
    fn ignores_unaccepted_stream_from_known_source() {
        let mux = mux_with_source("10.0.0.5", RecordType::Load, "cpu0");
        let mut rx = mux.fanout.subscribe();
        let record = Record { arg: Arg::new("cpu1").unwrap(), payload: RecordPayload::Load { load1: 1.0, load5: 1.0, load15: 1.0 } };
        mux.handle_packet("10.0.0.5".parse().unwrap(), &packet_with(record));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn corrupted_packet_is_dropped_without_panicking() {
        let mux = mux_with_source("10.0.0.5", RecordType::Load, "cpu0");
        let record = Record { arg: Arg::new("cpu0").unwrap(), payload: RecordPayload::Load { load1: 1.0, load5: 1.0, load15: 1.0 } };
        let mut buf = packet_with(record);
        let last = buf.len() - 1;
        buf[last] ^= 0xff;
        mux.handle_packet("10.0.0.5".parse().unwrap(), &buf);
    }

    #[tokio::test]
    async fn attached_metrics_are_incremented_on_a_handled_packet() {
        use http_body_util::BodyExt;

        let (metrics, registry) = crate::telemetry::init_metrics().unwrap();
        let mux = mux_with_source("10.0.0.5", RecordType::Load, "cpu0").with_metrics(metrics);
        let record = Record { arg: Arg::new("cpu0").unwrap(), payload: RecordPayload::Load { load1: 1.0, load5: 1.0, load15: 1.0 } };
        mux.handle_packet("10.0.0.5".parse().unwrap(), &packet_with(record));

        let body = crate::telemetry::handle_metrics(&registry).unwrap().into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("pulse_mux_packets_received_total"));
        assert!(text.contains("pulse_mux_records_decoded_total"));
    }
}
