//! Fixed patterns for interpreting restic's console output.
//!
//! Everything the crate knows about the shape of the tool's output lives
//! here, so a change in an upstream release only requires touching this
//! module. Patterns were written against the restic 0.9 series; see
//! [`TOOL_OUTPUT_SERIES`].

use regex::Regex;
use std::sync::OnceLock;

/// The restic release series the patterns below were validated against.
pub const TOOL_OUTPUT_SERIES: &str = "0.9";

/// Terminal clear-line fragment emitted between progress updates.
pub static CLEAR_LINE: &str = "[2K";
/// Terminal cursor-up fragment emitted between progress updates.
pub static CURSOR_UP: &str = "[1A";

fn pattern(cell: &'static OnceLock<Regex>, pattern: &'static str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).unwrap())
}

/// Carriage-return/form-feed runs, normalized to a single line feed before
/// any of the line-shaped patterns below are applied.
pub fn control_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    pattern(&RE, r"[\r\x0c]+")
}

/// Transient progress lines, e.g.
/// `[0:01] 0 files 0 B, total 1 files 35 B, 0 errors`.
pub fn progress_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    pattern(&RE, r"(?m)^.*\[.*\].* files .* total .* files .* errors.*$")
}

/// Per-file notices for files the backup left unchanged.
pub fn unchanged_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    pattern(&RE, r"(?m)^unchanged.*$")
}

/// Runs of blank lines, collapsed after line stripping.
pub fn blank_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    pattern(&RE, r"\n+")
}

/// `Files: <N> new, <N> removed, <N> changed` in a diff report.
pub fn diff_files_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    pattern(&RE, r"Files:\s*(\d+)\s+new,\s*(\d+)\s+removed,\s*(\d+)\s+changed")
}

/// `Dirs: <N> new, <N> removed` in a diff report.
pub fn diff_dirs_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    pattern(&RE, r"Dirs:\s*(\d+)\s+new,\s*(\d+)\s+removed")
}

/// `Added: <value> <unit>` in a diff report.
pub fn diff_added_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    pattern(&RE, r"Added:\s*(\d+\.?\d*)\s+(.*)")
}

/// `Removed: <value> <unit>` in a diff report.
pub fn diff_removed_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    pattern(&RE, r"Removed:\s*(\d+\.?\d*)\s+(.*)")
}

/// Bytes-per-unit factor for a diff report size unit.
///
/// An unrecognized unit maps to 1, leaving the value unconverted; a lossy
/// fallback, but a partial number beats discarding the report.
pub fn unit_multiplier(unit: &str) -> f64 {
    match unit {
        "B" => 1.0,
        "KiB" => 1024.0,
        "MiB" => 1024.0 * 1024.0,
        "GiB" => 1024.0 * 1024.0 * 1024.0,
        "TiB" => 1024.0 * 1024.0 * 1024.0 * 1024.0,
        _ => 1.0,
    }
}
