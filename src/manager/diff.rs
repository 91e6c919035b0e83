//! Structured change statistics extracted from a snapshot diff report.

use crate::manager::output_grammar;
use getset::Getters;
use regex::Captures;

/// Summary of the differences between two snapshots.
///
/// Sizes are normalized to bytes. Every statistic defaults to zero when its
/// line is absent from the report; the raw report text is retained for audit.
#[derive(Clone, Debug, Default, PartialEq, Getters)]
#[getset(get = "pub")]
pub struct SnapshotDiff {
    report: String,
    files_new: u64,
    files_removed: u64,
    files_changed: u64,
    dirs_new: u64,
    dirs_removed: u64,
    bytes_added: f64,
    bytes_removed: f64,
}

impl SnapshotDiff {
    /// Scan a diff report line by line, extracting whichever statistics are
    /// present.
    ///
    /// The scan is order-independent and never fails: unrecognized lines are
    /// skipped, and a malformed number is logged and leaves its field at the
    /// previous value.
    pub fn parse<S: Into<String>>(report: S) -> SnapshotDiff {
        let mut diff = SnapshotDiff {
            report: report.into(),
            ..SnapshotDiff::default()
        };

        // The section being extracted looks like this:
        //
        //   Files:          80 new,     0 removed,     0 changed
        //   Dirs:           57 new,     0 removed
        //   Others:          0 new,     0 removed
        //   Data Blobs:     90 new,     0 removed
        //   Tree Blobs:     60 new,     3 removed
        //     Added:   27.734 MiB
        //     Removed: 941 B

        let report = diff.report.clone();
        for line in report.lines() {
            if let Some(caps) = output_grammar::diff_files_line().captures(line) {
                update_count(&caps, 1, "new-file", &mut diff.files_new);
                update_count(&caps, 2, "removed-file", &mut diff.files_removed);
                update_count(&caps, 3, "changed-file", &mut diff.files_changed);
            }

            if let Some(caps) = output_grammar::diff_dirs_line().captures(line) {
                update_count(&caps, 1, "new-dir", &mut diff.dirs_new);
                update_count(&caps, 2, "removed-dir", &mut diff.dirs_removed);
            }

            if let Some(caps) = output_grammar::diff_added_line().captures(line) {
                update_size(&caps, "added", &mut diff.bytes_added);
            }

            if let Some(caps) = output_grammar::diff_removed_line().captures(line) {
                update_size(&caps, "removed", &mut diff.bytes_removed);
            }
        }

        diff
    }
}

fn update_count(caps: &Captures, index: usize, what: &str, field: &mut u64) {
    let Some(matched) = caps.get(index) else {
        tracing::error!("Error extracting {what} count at index {index} from {caps:?}");
        return;
    };

    match matched.as_str().parse() {
        Ok(count) => *field = count,
        Err(e) => {
            tracing::error!("Error converting {what} count ({}): {e}", matched.as_str());
        }
    }
}

fn update_size(caps: &Captures, what: &str, field: &mut f64) {
    let (Some(value), Some(unit)) = (caps.get(1), caps.get(2)) else {
        tracing::error!("Error extracting {what} bytes from {caps:?}");
        return;
    };

    match value.as_str().parse::<f64>() {
        Ok(value) => {
            *field = value * output_grammar::unit_multiplier(unit.as_str());
        }
        Err(e) => {
            tracing::error!("Error converting {what} bytes count ({}): {e}", value.as_str());
        }
    }
}
