//! Per-profile operation sequencing.
//!
//! Runs a profile's configured maintenance operations in order, fail-fast:
//! the first operation error abandons the remainder of that profile's
//! sequence. Operations within a profile are strictly sequential because the
//! underlying tool locks the repository per invocation.

use crate::manager::profile::Profile;
use crate::manager::restic::Restic;
use crate::manager::result_error::result::Result;
use crate::manager::session::{LogLevel, SessionLog};
use serde::de::Visitor;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Display, Formatter};
use std::result;

/// One named maintenance operation in a profile's sequence.
///
/// The vocabulary is closed; names outside it deserialize into
/// [`Operation::Unknown`] and are skipped with a warning at dispatch, so a
/// typo is visible in the session log instead of disappearing silently.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Operation {
    Initialise,
    Unlock,
    Backup,
    Check,
    ApplyRetention,
    ShowSnapshots,
    ShowListing,
    Unknown(String),
}

impl Operation {
    pub fn from_name(name: &str) -> Operation {
        match name {
            "initialise" => Operation::Initialise,
            "unlock" => Operation::Unlock,
            "backup" => Operation::Backup,
            "check" => Operation::Check,
            "apply-retention" => Operation::ApplyRetention,
            "show-snapshots" => Operation::ShowSnapshots,
            "show-listing" => Operation::ShowListing,
            other => Operation::Unknown(other.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Operation::Initialise => "initialise",
            Operation::Unlock => "unlock",
            Operation::Backup => "backup",
            Operation::Check => "check",
            Operation::ApplyRetention => "apply-retention",
            Operation::ShowSnapshots => "show-snapshots",
            Operation::ShowListing => "show-listing",
            Operation::Unknown(name) => name,
        }
    }
}

impl Display for Operation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for Operation {
    fn serialize<S: Serializer>(&self, serializer: S) -> result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for Operation {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> result::Result<Self, D::Error> {
        deserializer.deserialize_str(OperationVisitor)
    }
}

struct OperationVisitor;

impl Visitor<'_> for OperationVisitor {
    type Value = Operation;

    fn expecting(&self, formatter: &mut Formatter) -> std::fmt::Result {
        formatter.write_str("an operation name")
    }

    fn visit_str<E>(self, v: &str) -> result::Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        Ok(Operation::from_name(v))
    }
}

/// State of one profile's sequence run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunState {
    Pending,
    Running,
    Aborted,
    Completed,
}

/// Drives one profile through its configured operation sequence.
pub struct Sequencer<'a> {
    restic: &'a Restic<'a>,
    profile: &'a Profile,
    state: RunState,
    repo_exists: bool,
}

impl<'a> Sequencer<'a> {
    /// `repo_exists` is the outcome of the caller's repository probe; it is
    /// carried through the run so a successful initialise is visible to the
    /// remaining operations.
    pub fn new(restic: &'a Restic<'a>, profile: &'a Profile, repo_exists: bool) -> Sequencer<'a> {
        Sequencer {
            restic,
            profile,
            state: RunState::Pending,
            repo_exists,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn repo_exists(&self) -> bool {
        self.repo_exists
    }

    /// Run the profile's operations in order. Stops at the first failure,
    /// leaving the sequencer [`RunState::Aborted`]; otherwise ends
    /// [`RunState::Completed`].
    pub fn run(&mut self, session: &mut SessionLog) -> RunState {
        self.state = RunState::Running;

        for operation in self.profile.operation_sequence() {
            if !self.dispatch(operation, session) {
                session.record(
                    LogLevel::Error,
                    "Error performing operation. Cannot proceed with profile.",
                );
                self.state = RunState::Aborted;
                return self.state;
            }
        }

        self.state = RunState::Completed;
        self.state
    }

    fn dispatch(&mut self, operation: &Operation, session: &mut SessionLog) -> bool {
        match operation {
            Operation::Initialise => {
                if self.repo_exists {
                    return true;
                }

                session.record(LogLevel::Info, "Repository does not exist. Initialising...");
                let proceed = self.step(session, "Initialising repository", |restic, profile| {
                    restic.initialise(profile)
                });
                if proceed {
                    self.repo_exists = true;
                }
                proceed
            }
            Operation::Unlock => self.step(session, "Unlocking repository", |restic, profile| {
                restic.unlock(profile)
            }),
            Operation::Backup => {
                let description = format!("Performing backup of {:?}", self.profile.source());
                self.step(session, description, |restic, profile| restic.backup(profile))
            }
            Operation::Check => self.step(session, "Checking repository", |restic, profile| {
                restic.check(profile)
            }),
            Operation::ApplyRetention => self.step(
                session,
                "Performing retention policy application",
                |restic, profile| restic.apply_retention_policy(profile),
            ),
            Operation::ShowSnapshots => self.step(
                session,
                "Listing snapshots for repository",
                |restic, profile| restic.snapshots(profile),
            ),
            Operation::ShowListing => {
                self.step(session, "Listing files for repository", |restic, profile| {
                    restic.ls(profile, "latest")
                })
            }
            Operation::Unknown(name) => {
                session.record(
                    LogLevel::Warning,
                    format!("Ignoring unrecognised operation {name:?}"),
                );
                true
            }
        }
    }

    fn step<S, F>(&self, session: &mut SessionLog, description: S, operation: F) -> bool
    where
        S: Into<String>,
        F: FnOnce(&Restic, &Profile) -> Result<String>,
    {
        session.record(LogLevel::Notice, description);

        match operation(self.restic, self.profile) {
            Ok(response) => {
                session.record(LogLevel::Info, response);
                true
            }
            Err(e) => {
                session.record(LogLevel::Error, e.to_string());
                false
            }
        }
    }
}
