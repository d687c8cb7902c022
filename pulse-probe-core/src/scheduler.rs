use crate::error::{ProbeError, Result};
use crate::sampler::{PackOutcome, Sampler};
use crate::telemetry::Metrics;
use crate::transport::Transport;
use pulse_proto::{Arg, Header, RecordType, HEADER_LEN};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::watch;
use tracing::{debug, warn};

struct StreamBinding {
    record_type: RecordType,
    arg: Arg,
}

/// Drives every registered sampler on a fixed tick, packs their current
/// readings into packets bounded by `max_packet_size`, and ships each
/// finished packet to the mux.
pub struct Scheduler {
    samplers: HashMap<RecordType, Box<dyn Sampler>>,
    bindings: Vec<StreamBinding>,
    transport: Transport,
    version: u8,
    max_packet_size: usize,
    metrics: Option<Arc<Metrics>>,
}

fn now_usec() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_micros() as u64
}

impl Scheduler {
    pub fn new(transport: Transport, max_packet_size: usize, version: u8) -> Self {
        Self {
            samplers: HashMap::new(),
            bindings: Vec::new(),
            transport,
            version,
            max_packet_size: max_packet_size.max(HEADER_LEN + 1),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn register_sampler(&mut self, record_type: RecordType, sampler: Box<dyn Sampler>) {
        self.samplers.insert(record_type, sampler);
    }

    pub fn bind_stream(&mut self, record_type: RecordType, arg: Arg) {
        self.bindings.push(StreamBinding { record_type, arg });
    }

    pub async fn run(&mut self, interval: Duration, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.tick().await {
                        Ok(()) => {}
                        Err(err @ (ProbeError::ResourceLimit(_) | ProbeError::Config(_))) => {
                            return Err(err);
                        }
                        Err(err) => {
                            warn!(%err, "probe tick failed");
                        }
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        debug!("scheduler shutting down");
                        return Ok(());
                    }
                }
            }
        }
    }

    async fn tick(&mut self) -> Result<()> {
        for sampler in self.samplers.values_mut() {
            sampler.sample_all()?;
        }
        if let Some(m) = &self.metrics {
            m.samples_total.add(1, &[]);
        }
        self.flush().await
    }

    async fn flush(&mut self) -> Result<()> {
        let mut buf = vec![0u8; HEADER_LEN];
        for binding in &self.bindings {
            let Some(sampler) = self.samplers.get_mut(&binding.record_type) else {
                continue;
            };
            loop {
                match sampler.pack(&binding.arg, &mut buf, self.max_packet_size, self.version) {
                    PackOutcome::Wrote(_) | PackOutcome::NoData => break,
                    PackOutcome::BufferFull => {
                        if let Some(m) = &self.metrics {
                            m.packets_flushed_on_buffer_full_total.add(1, &[]);
                        }
                        self.send_packet(std::mem::replace(&mut buf, vec![0u8; HEADER_LEN])).await?;
                    }
                }
            }
        }
        if buf.len() > HEADER_LEN {
            self.send_packet(buf).await?;
        }
        Ok(())
    }

    async fn send_packet(&mut self, mut buf: Vec<u8>) -> Result<()> {
        let total = buf.len();
        Header::finalize(&mut buf, total, self.version, now_usec())?;
        match self.transport.send(&buf).await {
            Ok(()) => {
                if let Some(m) = &self.metrics {
                    m.packets_sent_total.add(1, &[]);
                }
                Ok(())
            }
            Err(err) => {
                if let Some(m) = &self.metrics {
                    m.send_errors_total.add(1, &[]);
                }
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_proto::{Arg, MAX_SUPPORTED_VERSION};
    use tokio::net::UdpSocket;

    /// Always has a fixed-size record ready for any arg, refusing to pack
    /// it if doing so would exceed the packet's remaining capacity.
    struct FixedSizeSampler {
        record_size: usize,
    }

    impl Sampler for FixedSizeSampler {
        fn init(&mut self, _args: &[Arg]) -> Result<()> {
            Ok(())
        }

        fn sample_all(&mut self) -> Result<()> {
            Ok(())
        }

        fn pack(&mut self, _arg: &Arg, buf: &mut Vec<u8>, capacity: usize, _version: u8) -> PackOutcome {
            if buf.len() + self.record_size > capacity {
                return PackOutcome::BufferFull;
            }
            buf.resize(buf.len() + self.record_size, 0xAA);
            PackOutcome::Wrote(self.record_size)
        }
    }

    #[tokio::test]
    async fn flush_splits_into_multiple_packets_once_capacity_is_exceeded() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let server_addr = server.local_addr().unwrap();
        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        client.connect(server_addr).await.unwrap();

        // header(16) + two 12-byte records fits exactly in 40; a third
        // record can never share that packet.
        let mut scheduler = Scheduler::new(Transport::Udp(client), HEADER_LEN + 24, MAX_SUPPORTED_VERSION);
        scheduler.register_sampler(RecordType::Load, Box::new(FixedSizeSampler { record_size: 12 }));
        scheduler.bind_stream(RecordType::Load, Arg::new("cpu0").unwrap());
        scheduler.bind_stream(RecordType::Load, Arg::new("cpu1").unwrap());
        scheduler.bind_stream(RecordType::Load, Arg::new("cpu2").unwrap());

        scheduler.flush().await.unwrap();

        let mut buf = [0u8; 128];
        let (first_len, _) = server.recv_from(&mut buf).await.unwrap();
        assert_eq!(first_len, HEADER_LEN + 24);
        let (second_len, _) = server.recv_from(&mut buf).await.unwrap();
        assert_eq!(second_len, HEADER_LEN + 12);
    }

    #[tokio::test]
    async fn flush_sends_nothing_when_every_sampler_reports_no_data() {
        struct EmptySampler;
        impl Sampler for EmptySampler {
            fn init(&mut self, _args: &[Arg]) -> Result<()> {
                Ok(())
            }
            fn sample_all(&mut self) -> Result<()> {
                Ok(())
            }
            fn pack(&mut self, _arg: &Arg, _buf: &mut Vec<u8>, _capacity: usize, _version: u8) -> PackOutcome {
                PackOutcome::NoData
            }
        }

        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let server_addr = server.local_addr().unwrap();
        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        client.connect(server_addr).await.unwrap();

        let mut scheduler = Scheduler::new(Transport::Udp(client), 1400, MAX_SUPPORTED_VERSION);
        scheduler.register_sampler(RecordType::Load, Box::new(EmptySampler));
        scheduler.bind_stream(RecordType::Load, Arg::new("cpu0").unwrap());

        scheduler.flush().await.unwrap();

        let mut buf = [0u8; 128];
        let result = tokio::time::timeout(std::time::Duration::from_millis(50), server.recv_from(&mut buf)).await;
        assert!(result.is_err(), "no packet should have been sent");
    }
}
