//! Adapter around the external restic executable.
//!
//! Builds argument vectors, isolates the child environment (the repository
//! password travels via `RESTIC_PASSWORD`, never the argument vector),
//! captures and sanitizes console output, and exposes one method per
//! high-level repository operation.

use crate::manager::app_config::AppConfig;
use crate::manager::diff::SnapshotDiff;
use crate::manager::output_grammar::{self, CLEAR_LINE, CURSOR_UP};
use crate::manager::profile::Profile;
use crate::manager::result_error::error::Error;
use crate::manager::result_error::result::Result;
use crate::manager::result_error::WithMsg;
use chrono::Utc;
use getset::Getters;
use serde::Deserialize;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::process::{Command, Stdio};

/// Captured outcome of one tool invocation.
///
/// Failure to start the process and a non-zero exit are both reported here
/// rather than as errors; callers decide whether a failure aborts their
/// containing sequence.
#[derive(Clone, Debug, Default, Getters)]
#[getset(get = "pub")]
pub struct Execution {
    stdout: String,
    stderr: String,
    success: bool,
}

impl Execution {
    /// The captured streams joined for error reporting.
    pub fn combined(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (true, _) => self.stderr.clone(),
            (false, true) => self.stdout.clone(),
            (false, false) => format!("{}\n{}", self.stdout, self.stderr),
        }
    }

    /// Sanitized stdout on success, the captured output as an error otherwise.
    pub fn into_result(self) -> Result<String> {
        if self.success {
            Ok(self.stdout)
        } else {
            Err(Error::Tool(self.combined()))
        }
    }
}

/// One record of the machine-readable snapshot listing. The listing carries
/// many more fields; only the id is needed here.
#[derive(Clone, Debug, Deserialize, Getters)]
#[getset(get = "pub")]
pub struct SnapshotRecord {
    id: String,
}

pub struct Restic<'a> {
    config: &'a AppConfig,
    raw_log: Option<File>,
}

impl<'a> Restic<'a> {
    pub fn new(config: &'a AppConfig) -> Restic<'a> {
        let raw_log = config.raw_log().and_then(|path| {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| tracing::error!("Could not open {:?} for raw logging: {e}", path))
                .ok()
        });

        Restic { config, raw_log }
    }

    /// Run the tool with the given command and arguments against a profile's
    /// repository, returning the captured and sanitized output.
    pub fn execute(&self, command: &str, arguments: &[String], profile: &Profile) -> Execution {
        let mut process = Command::new(self.config.executable());
        process
            .arg("--repo")
            .arg(profile.repo())
            .arg(command)
            .args(arguments)
            .env("TMPDIR", self.config.effective_tempdir())
            .env("RESTIC_PASSWORD", profile.password().expose())
            .stdin(Stdio::null());

        tracing::debug!(
            "Executing {:?} --repo {:?} {} {:?}",
            self.config.executable(),
            profile.repo(),
            command,
            arguments
        );

        if *self.config.dry_run() {
            tracing::info!("Dry-run; no action will be performed.");
            return Execution {
                stdout: String::new(),
                stderr: String::new(),
                success: true,
            };
        }

        let output = match process.output() {
            Ok(output) => output,
            Err(e) => {
                return Execution {
                    stdout: String::new(),
                    stderr: format!("could not run {:?}: {e}", self.config.executable()),
                    success: false,
                }
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        self.mirror_raw(&stdout, &stderr);

        let stdout = sanitize_output(stdout, command);

        tracing::debug!("Return:\n{:?}", output.status);
        tracing::debug!("Stdout:\n{stdout}");
        tracing::debug!("Stderr:\n{stderr}");

        Execution {
            stdout,
            stderr,
            success: output.status.success(),
        }
    }

    /// Append the pre-sanitized capture to the raw log sink, if one is open.
    fn mirror_raw(&self, stdout: &str, stderr: &str) {
        if let Some(file) = &self.raw_log {
            let now = Utc::now();
            let mut sink = file;
            if let Err(e) = write!(sink, "\nSTDOUT {now}\n{stdout}\nSTDERR {now}\n{stderr}") {
                tracing::error!("Could not write raw capture: {e}");
            }
        }
    }

    /// Test for the existence of a profile's repository.
    ///
    /// The path is checked locally first; only an existing directory is
    /// probed with a listing operation, which catches wrong passwords and
    /// paths that are not repositories.
    pub fn repo_exists(&self, profile: &Profile) -> Result<bool> {
        match std::fs::metadata(profile.repo()) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(_) => return Err(Error::RepoUnreadable),
            Ok(stat) if !stat.is_dir() => return Err(Error::RepoNotDirectory),
            Ok(_) => {}
        }

        let exec = self.execute("snapshots", &[], profile);
        if !exec.success {
            return Err(Error::Tool(exec.combined()));
        }

        Ok(true)
    }

    fn simple_repo_operation(&self, profile: &Profile, command: &str) -> Result<String> {
        self.execute(command, &[], profile).into_result()
    }

    /// Initialise a new repository.
    pub fn initialise(&self, profile: &Profile) -> Result<String> {
        self.simple_repo_operation(profile, "init")
    }

    /// Back up the profile's source into its repository.
    pub fn backup(&self, profile: &Profile) -> Result<String> {
        let arguments = backup_arguments(profile);
        self.execute("backup", &arguments, profile).into_result()
    }

    /// Check repository integrity.
    pub fn check(&self, profile: &Profile) -> Result<String> {
        self.simple_repo_operation(profile, "check")
    }

    /// Remove stale repository locks.
    pub fn unlock(&self, profile: &Profile) -> Result<String> {
        self.simple_repo_operation(profile, "unlock")
    }

    /// List the repository's snapshots.
    pub fn snapshots(&self, profile: &Profile) -> Result<String> {
        self.simple_repo_operation(profile, "snapshots")
    }

    /// List the files recorded in a snapshot.
    pub fn ls(&self, profile: &Profile, snapshot: &str) -> Result<String> {
        let exec = self.execute("ls", &[snapshot.to_string()], profile);

        if !exec.success {
            return Err(Error::Tool(exec.combined()));
        }

        if !exec.stderr.is_empty() {
            return Err(Error::Tool(exec.stderr));
        }

        Ok(exec.stdout)
    }

    /// Apply the profile's retention rules via a forget operation.
    pub fn apply_retention_policy(&self, profile: &Profile) -> Result<String> {
        let arguments = retention_arguments(profile);
        self.execute("forget", &arguments, profile).into_result()
    }

    /// Prune unreferenced data from the repository.
    pub fn clean(&self, profile: &Profile) -> Result<String> {
        self.simple_repo_operation(profile, "prune")
    }

    /// Rebuild the repository index.
    pub fn rebuild_index(&self, profile: &Profile) -> Result<String> {
        self.simple_repo_operation(profile, "rebuild-index")
    }

    /// Run an arbitrary tool command against the profile's repository.
    pub fn raw(&self, profile: &Profile, command: &str, arguments: &[String]) -> Result<String> {
        tracing::info!(
            "Performing {command} {arguments:?} on repo {:?}",
            profile.repo()
        );
        self.execute(command, arguments, profile).into_result()
    }

    /// The id of the snapshot at the given reverse-chronological index, where
    /// 0 is the most recent snapshot.
    pub fn snapshot_id_from_index(&self, profile: &Profile, index: usize) -> Result<String> {
        let exec = self.execute("snapshots", &["--json".to_string()], profile);

        if !exec.success {
            return Err(Error::Tool(exec.combined()));
        }

        if !exec.stderr.is_empty() {
            return Err(Error::Tool(exec.stderr));
        }

        let records: Vec<SnapshotRecord> = serde_json::from_str(&exec.stdout)
            .map_err(Error::from)
            .with_msg("Could not decode snapshot listing")?;

        snapshot_id_at(&records, index)
    }

    /// Produce a change summary between two snapshot ids.
    ///
    /// Exceeding a configured change threshold logs a warning; the summary is
    /// still returned.
    pub fn diff(&self, profile: &Profile, before_id: &str, after_id: &str) -> Result<SnapshotDiff> {
        let exec = self.execute(
            "diff",
            &[before_id.to_string(), after_id.to_string()],
            profile,
        );

        if !exec.success {
            return Err(Error::Tool(exec.combined()));
        }

        if !exec.stderr.is_empty() {
            tracing::warn!("Diff produced error output: {}", exec.stderr);
        }

        let diff = SnapshotDiff::parse(exec.stdout);

        if let Some(thresholds) = profile.change_thresholds() {
            if let Some(max_files) = thresholds.total_files() {
                let total_files = diff.files_new() + diff.files_removed() + diff.files_changed();
                if total_files > *max_files {
                    tracing::warn!(
                        "Total file change threshold exceeded ({total_files} > {max_files})."
                    );
                }
            }

            if let Some(max_bytes) = thresholds.total_bytes() {
                let total_bytes = diff.bytes_added() + diff.bytes_removed();
                if total_bytes > *max_bytes {
                    tracing::warn!(
                        "Total size change threshold exceeded ({total_bytes} > {max_bytes})."
                    );
                }
            }
        }

        Ok(diff)
    }

    /// Produce a change summary between two snapshot indices, 0 being the
    /// most recent.
    pub fn diff_from_indices(
        &self,
        profile: &Profile,
        before_index: usize,
        after_index: usize,
    ) -> Result<SnapshotDiff> {
        let before_id = self
            .snapshot_id_from_index(profile, before_index)
            .with_msg(format!(
                "Could not determine snapshot (before) at index {before_index}"
            ))?;
        tracing::debug!("Snapshot (before) ID: {before_id}");

        let after_id = self
            .snapshot_id_from_index(profile, after_index)
            .with_msg(format!(
                "Could not determine snapshot (after) at index {after_index}"
            ))?;
        tracing::debug!("Snapshot (after) ID: {after_id}");

        self.diff(profile, &before_id, &after_id)
    }
}

/// Strip terminal control noise from captured stdout; backup output gets the
/// additional progress/unchanged/blank-line treatment, in an order where the
/// line-shaped patterns see already-normalized line endings.
pub(crate) fn sanitize_output(stdout: String, command: &str) -> String {
    let mut stdout = stdout.replace(CLEAR_LINE, "").replace(CURSOR_UP, "");

    if command == "backup" {
        stdout = output_grammar::control_runs()
            .replace_all(&stdout, "\n")
            .into_owned();
        stdout = output_grammar::progress_line()
            .replace_all(&stdout, "")
            .into_owned();
        stdout = output_grammar::unchanged_line()
            .replace_all(&stdout, "")
            .into_owned();
        stdout = output_grammar::blank_runs()
            .replace_all(&stdout, "\n")
            .into_owned();
    }

    stdout
}

/// Argument vector for a backup operation: verbosity, one `--exclude` per
/// non-comment exclusion with placeholder tokens expanded, and the source
/// path as the final positional argument.
pub(crate) fn backup_arguments(profile: &Profile) -> Vec<String> {
    let mut arguments = vec!["--verbose=8".to_string()];

    for exclusion in profile.exclusions() {
        if exclusion.starts_with('#') {
            continue;
        }

        arguments.push(format!("--exclude={}", profile.expand(exclusion)));
    }

    arguments.push(profile.source().to_string_lossy().into_owned());

    arguments
}

/// Argument vector for a forget operation: `--keep-<period> <count>` pairs in
/// configuration order.
pub(crate) fn retention_arguments(profile: &Profile) -> Vec<String> {
    profile
        .keep_policy()
        .iter()
        .flat_map(|rule| [format!("--keep-{}", rule.period()), rule.value().to_string()])
        .collect()
}

pub(crate) fn snapshot_id_at(records: &[SnapshotRecord], index: usize) -> Result<String> {
    let count = records.len();

    if index >= count {
        return Err(Error::SnapshotIndex { index, count });
    }

    Ok(records[count - index - 1].id().clone())
}
