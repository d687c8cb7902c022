//! The archive is an opaque external collaborator: the mux only depends
//! on a single `update` operation. [`AppendFileArchive`] is a minimal
//! concrete adapter so the contract is exercisable without vendoring a
//! real time-series engine.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

/// Per-stream archive write failures are suppressed after this many
/// consecutive errors, so a single broken archive file cannot flood the
/// log forever.
pub const MAX_ARCHIVE_ERRORS: u32 = 5;

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct ArchiveError(pub String);

pub trait ArchiveWriter: Send + Sync {
    fn update(&self, series_file: &Path, timestamp: u64, fields_csv: &str) -> Result<(), ArchiveError>;
}

/// Appends one `timestamp,fields\n` line per update. Stands in for a
/// real round-robin-database library.
#[derive(Default)]
pub struct AppendFileArchive;

impl ArchiveWriter for AppendFileArchive {
    fn update(&self, series_file: &Path, timestamp: u64, fields_csv: &str) -> Result<(), ArchiveError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(series_file)
            .map_err(|e| ArchiveError(format!("open {}: {e}", series_file.display())))?;
        writeln!(file, "{timestamp},{fields_csv}")
            .map_err(|e| ArchiveError(format!("write {}: {e}", series_file.display())))
    }
}

/// A single, process-wide count of archive errors. Once it reaches
/// [`MAX_ARCHIVE_ERRORS`] further errors are suppressed; a successful
/// write does not reset it, so the tracker only ever counts up over the
/// life of the process.
#[derive(Default)]
pub struct ArchiveErrorTracker {
    count: Mutex<u32>,
}

pub enum ArchiveOutcome {
    Ok,
    ErrorReported(ArchiveError),
    /// This was the error that crossed the threshold; log it plus a
    /// one-time "no longer reporting" notice.
    ErrorReportedFinal(ArchiveError),
    ErrorSuppressed,
}

impl ArchiveErrorTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, result: Result<(), ArchiveError>) -> ArchiveOutcome {
        match result {
            Ok(()) => ArchiveOutcome::Ok,
            Err(err) => {
                let mut count = self.count.lock().unwrap();
                if *count < MAX_ARCHIVE_ERRORS {
                    *count += 1;
                    if *count == MAX_ARCHIVE_ERRORS {
                        ArchiveOutcome::ErrorReportedFinal(err)
                    } else {
                        ArchiveOutcome::ErrorReported(err)
                    }
                } else {
                    ArchiveOutcome::ErrorSuppressed
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_file_archive_writes_csv_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("series.csv");
        let archive = AppendFileArchive;
        archive.update(&path, 1, "a,b,c").unwrap();
        archive.update(&path, 2, "d,e,f").unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "1,a,b,c\n2,d,e,f\n");
    }

    #[test]
    fn error_tracker_suppresses_after_max_errors() {
        let tracker = ArchiveErrorTracker::new();
        let mut final_seen = false;
        let mut suppressed_seen = false;
        for _ in 0..MAX_ARCHIVE_ERRORS + 2 {
            match tracker.record(Err(ArchiveError("boom".into()))) {
                ArchiveOutcome::ErrorReportedFinal(_) => final_seen = true,
                ArchiveOutcome::ErrorSuppressed => suppressed_seen = true,
                _ => {}
            }
        }
        assert!(final_seen);
        assert!(suppressed_seen);
    }

    #[test]
    fn success_does_not_reset_error_count() {
        let tracker = ArchiveErrorTracker::new();
        for _ in 0..MAX_ARCHIVE_ERRORS {
            tracker.record(Err(ArchiveError("boom".into())));
        }
        assert!(matches!(tracker.record(Ok(())), ArchiveOutcome::Ok));
        assert!(matches!(
            tracker.record(Err(ArchiveError("boom".into()))),
            ArchiveOutcome::ErrorSuppressed
        ));
    }
}
