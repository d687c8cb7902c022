//! Double-buffered epoch accounting for the process sampler, grounded
//! on `platform/Linux/sm_proc.c`'s `struct usir` / `gets_proc` /
//! `get_proc`. Each tick ("epoch") samples land in `buckets[epoch % 2]`
//! so the previous epoch's totals remain available for a saturating
//! diff without a second pass over `/proc`.

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Usir {
    pub utime_usec: u64,
    pub stime_usec: u64,
    pub rtime_usec: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcessSample {
    pub cnt: u32,
    pub utime_diff_usec: u64,
    pub stime_diff_usec: u64,
    pub rtime_diff_usec: u64,
    pub cpu_pct: f32,
    pub mem_size: u64,
    pub mem_rss: u64,
}

#[derive(Debug, Clone, Default)]
pub struct ProcessAccumulator {
    buckets: [Usir; 2],
    cnt: u32,
    mem_size: u64,
    mem_rss: u64,
    last_seen_epoch: Option<u64>,
}

impl ProcessAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds in one matching process's counters for `epoch`. Resets the
    /// current bucket the first time this epoch is observed, warning if
    /// one or more epochs were skipped entirely (the stream had no
    /// matching process last tick).
    pub fn observe(
        &mut self,
        epoch: u64,
        utime_usec: u64,
        stime_usec: u64,
        rtime_usec: u64,
        mem_size: u64,
        mem_rss: u64,
    ) {
        if self.last_seen_epoch != Some(epoch) {
            if let Some(prev) = self.last_seen_epoch {
                if epoch > prev + 1 {
                    tracing::warn!(skipped = epoch - prev - 1, "process sampler skipped epochs");
                }
            }
            self.buckets[(epoch % 2) as usize] = Usir::default();
            self.cnt = 0;
            self.mem_size = 0;
            self.mem_rss = 0;
            self.last_seen_epoch = Some(epoch);
        }
        let bucket = &mut self.buckets[(epoch % 2) as usize];
        bucket.utime_usec += utime_usec;
        bucket.stime_usec += stime_usec;
        bucket.rtime_usec += rtime_usec;
        self.cnt += 1;
        self.mem_size += mem_size;
        self.mem_rss += mem_rss;
    }

    /// Computes the saturating diff against the previous epoch's bucket.
    /// Returns `None` for the first two epochs (no prior bucket yet) or
    /// when nothing was observed for `epoch` (the stream matched no
    /// process this tick).
    pub fn diff(&self, epoch: u64, wall_elapsed_usec: u64) -> Option<ProcessSample> {
        if epoch <= 1 || self.last_seen_epoch != Some(epoch) {
            return None;
        }
        let cur = self.buckets[(epoch % 2) as usize];
        let prev = self.buckets[((epoch + 1) % 2) as usize];
        let utime_diff_usec = cur.utime_usec.saturating_sub(prev.utime_usec);
        let stime_diff_usec = cur.stime_usec.saturating_sub(prev.stime_usec);
        let rtime_diff_usec = cur.rtime_usec.saturating_sub(prev.rtime_usec);
        let cpu_pct = if wall_elapsed_usec > 0 {
            ((utime_diff_usec + stime_diff_usec) as f64 / wall_elapsed_usec as f64 * 100.0) as f32
        } else {
            0.0
        };
        Some(ProcessSample {
            cnt: self.cnt,
            utime_diff_usec,
            stime_diff_usec,
            rtime_diff_usec,
            cpu_pct,
            mem_size: self.mem_size,
            mem_rss: self.mem_rss,
        })
    }
}
