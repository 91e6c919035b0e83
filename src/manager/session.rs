//! Per-profile session logging.
//!
//! Every profile run accumulates its own list of timestamped, levelled
//! records. The list is what the notification layer filters and renders at
//! the end of the run, so records are kept at full fidelity here and
//! context-specific filtering happens later.

use crate::manager::result_error::result::Result;
use chrono::{DateTime, Utc};
use getset::Getters;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

/// Severity scale for session records, lowest to highest.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    #[default]
    Debug,
    Info,
    Notice,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    pub fn name(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Notice => "notice",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
            LogLevel::Critical => "critical",
        }
    }

    pub fn all() -> [LogLevel; 6] {
        [
            LogLevel::Debug,
            LogLevel::Info,
            LogLevel::Notice,
            LogLevel::Warning,
            LogLevel::Error,
            LogLevel::Critical,
        ]
    }
}

impl Display for LogLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One captured log record.
#[derive(Clone, Debug, Getters)]
#[getset(get = "pub")]
pub struct Record {
    time: DateTime<Utc>,
    level: LogLevel,
    message: String,
}

/// Count of records at one level, for summary tables.
#[derive(Clone, Copy, Debug, Serialize, Getters)]
#[getset(get = "pub")]
pub struct LevelCount {
    level: LogLevel,
    count: usize,
}

/// Accumulating record buffer for one profile run.
///
/// Records are mirrored to `tracing` as they arrive so the console sees them
/// live; the stored copies feed file logging and e-mail notification once the
/// run finishes.
#[derive(Debug, Default)]
pub struct SessionLog {
    records: Vec<Record>,
}

impl SessionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record<S: Into<String>>(&mut self, level: LogLevel, message: S) {
        let message = message.into();
        match level {
            LogLevel::Debug => tracing::debug!("{message}"),
            LogLevel::Info | LogLevel::Notice => tracing::info!("{message}"),
            LogLevel::Warning => tracing::warn!("{message}"),
            LogLevel::Error | LogLevel::Critical => tracing::error!("{message}"),
        }
        self.records.push(Record {
            time: Utc::now(),
            level,
            message,
        });
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Per-level record counts, in ascending level order, empty bins included.
    pub fn summary(&self) -> Vec<LevelCount> {
        LogLevel::all()
            .into_iter()
            .map(|level| LevelCount {
                level,
                count: self.records.iter().filter(|r| r.level == level).count(),
            })
            .collect()
    }

    /// Records at or above the given level, original order preserved.
    pub fn at_or_above(&self, level: LogLevel) -> Vec<&Record> {
        self.records.iter().filter(|r| r.level >= level).collect()
    }

    /// Whether the configured per-level thresholds allow a notification.
    ///
    /// No thresholds configured means always eligible; otherwise at least one
    /// level bin must reach its threshold.
    pub fn meets_thresholds(&self, thresholds: &HashMap<LogLevel, usize>) -> bool {
        if thresholds.is_empty() {
            return true;
        }

        self.summary()
            .iter()
            .any(|bin| match thresholds.get(bin.level()) {
                Some(threshold) => bin.count >= *threshold,
                None => false,
            })
    }

    /// Append or rewrite the run's records to a log file.
    pub fn write_to_file<P: AsRef<Path>>(
        &self,
        path: P,
        append: bool,
        min_level: LogLevel,
    ) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(append)
            .write(true)
            .truncate(!append)
            .open(path.as_ref())?;

        for record in self.at_or_above(min_level) {
            writeln!(
                file,
                "{} [{}] {}",
                record.time().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.message()
            )?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_session() -> SessionLog {
        let mut session = SessionLog::new();
        session.record(LogLevel::Debug, "debug message");
        session.record(LogLevel::Info, "info message");
        session.record(LogLevel::Notice, "notice message");
        session.record(LogLevel::Warning, "warning message");
        session.record(LogLevel::Error, "error message");
        session.record(LogLevel::Error, "second error message");
        session
    }

    #[test]
    fn test_level_ordering() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Warning < LogLevel::Error);
        assert!(LogLevel::Error < LogLevel::Critical);
    }

    #[test]
    fn test_level_serde_names() {
        let level: LogLevel = serde_yml::from_str("warning").unwrap();
        assert_eq!(level, LogLevel::Warning);
        assert_eq!(serde_json::to_string(&LogLevel::Critical).unwrap(), "\"critical\"");
    }

    #[test]
    fn test_summary_bins() {
        let session = sample_session();
        let summary = session.summary();

        assert_eq!(summary.len(), 6);
        assert_eq!(*summary[0].level(), LogLevel::Debug);
        assert_eq!(*summary[0].count(), 1);
        assert_eq!(*summary[4].level(), LogLevel::Error);
        assert_eq!(*summary[4].count(), 2);
        assert_eq!(*summary[5].count(), 0);
    }

    #[test]
    fn test_at_or_above_preserves_order() {
        let session = sample_session();
        let filtered = session.at_or_above(LogLevel::Warning);

        let messages: Vec<_> = filtered.iter().map(|r| r.message().as_str()).collect();
        assert_eq!(
            messages,
            vec!["warning message", "error message", "second error message"]
        );
    }

    #[test]
    fn test_no_thresholds_always_eligible() {
        let session = sample_session();
        assert!(session.meets_thresholds(&HashMap::new()));
    }

    #[test]
    fn test_unmet_thresholds_suppress() {
        let session = sample_session();
        let thresholds = HashMap::from([(LogLevel::Critical, 1), (LogLevel::Error, 5)]);
        assert!(!session.meets_thresholds(&thresholds));
    }

    #[test]
    fn test_met_threshold_allows() {
        let session = sample_session();
        let thresholds = HashMap::from([(LogLevel::Error, 2)]);
        assert!(session.meets_thresholds(&thresholds));
    }

    #[test]
    fn test_write_to_file_filters_by_level() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.log");

        let session = sample_session();
        session.write_to_file(&path, false, LogLevel::Error).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("[error] error message"));
        assert!(content.contains("second error message"));
        assert!(!content.contains("warning message"));
    }

    #[test]
    fn test_write_to_file_append() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.log");

        let session = sample_session();
        session.write_to_file(&path, true, LogLevel::Error).unwrap();
        session.write_to_file(&path, true, LogLevel::Error).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.matches("error message").count(), 4);
    }
}
