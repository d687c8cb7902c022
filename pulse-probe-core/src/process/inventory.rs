//! Platform collaborator: enumerates running processes and their raw
//! CPU/memory counters. Grounded on `platform/Linux/sm_proc.c`'s
//! `init_proc`/`gets_proc`, which walk `/proc` once per epoch and parse
//! `/proc/<pid>/stat`.

use crate::error::{ProbeError, Result};

/// One process's raw counters for the current epoch, in kernel clock
/// ticks / memory pages — not yet converted to usec/bytes, since that
/// conversion needs the platform's clock rate and page size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    pub comm: String,
    pub utime_ticks: u64,
    pub stime_ticks: u64,
    /// Process age in ticks at sampling time (uptime - start time).
    pub elapsed_ticks: u64,
    pub vsize_bytes: u64,
    pub rss_pages: u64,
}

/// Platform-queried constants the raw counters must be scaled by.
#[derive(Debug, Clone, Copy)]
pub struct ClockConfig {
    pub clk_tck: u64,
    pub page_size: u64,
}

impl ClockConfig {
    #[cfg(unix)]
    pub fn query() -> Result<Self> {
        use nix::unistd::{sysconf, SysconfVar};

        let query_one = |var: SysconfVar, what: &str| -> Result<u64> {
            sysconf(var)
                .map_err(|e| ProbeError::ResourceLimit(format!("sysconf({what}) failed: {e}")))?
                .filter(|v| *v > 0)
                .map(|v| v as u64)
                .ok_or_else(|| ProbeError::ResourceLimit(format!("sysconf({what}) unavailable")))
        };
        Ok(ClockConfig {
            clk_tck: query_one(SysconfVar::CLK_TCK, "CLK_TCK")?,
            page_size: query_one(SysconfVar::PAGE_SIZE, "PAGE_SIZE")?,
        })
    }

    #[cfg(not(unix))]
    pub fn query() -> Result<Self> {
        Ok(ClockConfig { clk_tck: 100, page_size: 4096 })
    }

    pub fn ticks_to_usec(&self, ticks: u64) -> u64 {
        ticks.saturating_mul(1_000_000) / self.clk_tck
    }

    pub fn pages_to_bytes(&self, pages: u64) -> u64 {
        pages.saturating_mul(self.page_size)
    }
}

/// The platform collaborator `ProcessSampler::sample_all` drives once
/// per epoch. Out-of-process so tests can substitute a fixture.
pub trait ProcessInventory: Send {
    fn snapshot(&mut self) -> Result<Vec<ProcessInfo>>;
}

#[cfg(target_os = "linux")]
pub struct ProcfsInventory;

#[cfg(target_os = "linux")]
impl ProcfsInventory {
    pub fn new() -> Self {
        Self
    }

    fn uptime_secs() -> Result<f64> {
        let raw = std::fs::read_to_string("/proc/uptime")?;
        let first = raw.split_whitespace().next().unwrap_or("0");
        first.parse().map_err(|_| ProbeError::Io(std::io::Error::other("malformed /proc/uptime")))
    }

    fn parse_stat(contents: &str, clk_tck: u64, uptime_ticks: u64) -> Option<ProcessInfo> {
        let open = contents.find('(')?;
        let close = contents.rfind(')')?;
        let comm = contents.get(open + 1..close)?.to_string();
        let rest: Vec<&str> = contents.get(close + 2..)?.split_whitespace().collect();
        // rest[0] is field 3 (state); utime=14, stime=15, starttime=22, vsize=23, rss=24
        let field = |n: usize| -> Option<u64> { rest.get(n - 3).and_then(|s| s.parse().ok()) };
        let utime_ticks = field(14)?;
        let stime_ticks = field(15)?;
        let starttime_ticks = field(22)?;
        let vsize_bytes = field(23)?;
        let rss_pages = field(24)?;
        let elapsed_ticks = uptime_ticks.saturating_sub(starttime_ticks);
        let _ = clk_tck;
        Some(ProcessInfo { comm, utime_ticks, stime_ticks, elapsed_ticks, vsize_bytes, rss_pages })
    }
}

#[cfg(target_os = "linux")]
impl Default for ProcfsInventory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(target_os = "linux")]
impl ProcessInventory for ProcfsInventory {
    fn snapshot(&mut self) -> Result<Vec<ProcessInfo>> {
        let clock = ClockConfig::query()?;
        let uptime_ticks = (Self::uptime_secs()? * clock.clk_tck as f64) as u64;
        let mut out = Vec::new();
        for entry in std::fs::read_dir("/proc")? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(pid) = name.to_str().and_then(|s| s.parse::<u32>().ok()) else {
                continue;
            };
            let stat_path = format!("/proc/{pid}/stat");
            let Ok(contents) = std::fs::read_to_string(&stat_path) else {
                continue; // process exited between readdir and read
            };
            if let Some(info) = Self::parse_stat(&contents, clock.clk_tck, uptime_ticks) {
                out.push(info);
            }
        }
        Ok(out)
    }
}

/// Fixed fixture inventory for tests and non-Linux builds, where the
/// real `/proc`-backed sampler isn't available.
#[derive(Debug, Default, Clone)]
pub struct FixtureInventory {
    pub processes: Vec<ProcessInfo>,
}

impl ProcessInventory for FixtureInventory {
    fn snapshot(&mut self) -> Result<Vec<ProcessInfo>> {
        Ok(self.processes.clone())
    }
}
