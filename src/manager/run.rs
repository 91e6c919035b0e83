//! Command entry points: the per-profile processing loops behind each CLI
//! subcommand.

use crate::manager::app_config::AppConfig;
use crate::manager::profile::Profile;
use crate::manager::report::{MailMessage, ReportData};
use crate::manager::restic::Restic;
use crate::manager::result_error::result::Result;
use crate::manager::notifications::Notification;
use crate::manager::sequencer::Sequencer;
use crate::manager::session::{LogLevel, SessionLog};
use chrono::Utc;
use lettre::message::Mailbox;
use std::collections::HashMap;

/// Runtime switches taken from the command line, never from configuration.
#[derive(Clone, Copy, Debug, Default)]
pub struct RunOptions {
    pub no_email: bool,
    pub no_file_logging: bool,
}

/// Full automatic management: every profile runs its configured operation
/// sequence, and each profile's session is reported to the configured
/// recipients afterwards.
pub fn auto(config: &AppConfig, profiles: &[Profile], options: &RunOptions) {
    tracing::info!("==== ==== ==== ====");
    let t_start = Utc::now();

    for profile in profiles {
        let t_profile = Utc::now();

        let mut session = SessionLog::new();
        session.record(LogLevel::Info, "---- ---- ---- ----");
        session.record(
            LogLevel::Notice,
            format!("Processing profile {}", profile.name()),
        );
        if let Some(file) = profile.file() {
            session.record(LogLevel::Debug, format!("  from file {:?}", file));
        }
        session.record(LogLevel::Info, "Performing automatic management.");

        let restic = Restic::new(config);

        match restic.repo_exists(profile) {
            Err(e) => {
                session.record(
                    LogLevel::Error,
                    format!("Could not determine state of repository path: {e}"),
                );
            }
            Ok(exists) => {
                if !exists {
                    session.record(
                        LogLevel::Warning,
                        format!("Repository does not exist at {:?}", profile.repo()),
                    );
                }

                Sequencer::new(&restic, profile, exists).run(&mut session);
            }
        }

        session.record(
            LogLevel::Info,
            format!("Profile elapsed time: {}", Utc::now() - t_profile),
        );

        flush_profile_log(profile, &session, options);

        if !*config.dry_run() {
            send_session_reports(config, profile, &session, options);
        }
    }

    tracing::info!("Total elapsed time: {}", Utc::now() - t_start);
    tracing::info!("==== ==== ==== ====");
}

/// One repository operation per profile, gated on repository existence.
pub fn simple_command<F>(
    config: &AppConfig,
    profiles: &[Profile],
    options: &RunOptions,
    description: &str,
    operation: F,
) where
    F: Fn(&Restic, &Profile) -> Result<String>,
{
    for profile in profiles {
        let mut session = SessionLog::new();
        session.record(
            LogLevel::Info,
            format!("Processing profile {}", profile.name()),
        );
        if let Some(file) = profile.file() {
            session.record(LogLevel::Debug, format!("  from file {:?}", file));
        }
        session.record(LogLevel::Info, description);

        let restic = Restic::new(config);

        match restic.repo_exists(profile) {
            Err(e) => {
                session.record(
                    LogLevel::Error,
                    format!("Could not determine state of repository path: {e}"),
                );
            }
            Ok(false) => session.record(LogLevel::Error, "Repository does not exist."),
            Ok(true) => match operation(&restic, profile) {
                Ok(response) => {
                    session.record(LogLevel::Info, response);
                    session.record(LogLevel::Info, "Processing complete.");
                }
                Err(e) => session.record(LogLevel::Error, e.to_string()),
            },
        }

        flush_profile_log(profile, &session, options);
    }
}

/// Initialise each profile's repository, refusing to re-initialise one that
/// already exists.
pub fn init(config: &AppConfig, profiles: &[Profile], options: &RunOptions) {
    for profile in profiles {
        let mut session = SessionLog::new();
        session.record(
            LogLevel::Info,
            format!("Processing profile {}", profile.name()),
        );
        session.record(LogLevel::Info, "Initialising repository.");

        let restic = Restic::new(config);

        match restic.repo_exists(profile) {
            Err(e) => {
                session.record(
                    LogLevel::Error,
                    format!("Could not determine state of repository path: {e}"),
                );
            }
            Ok(true) => session.record(LogLevel::Error, "Repository already exists."),
            Ok(false) => match restic.initialise(profile) {
                Ok(response) => session.record(LogLevel::Info, response),
                Err(e) => session.record(LogLevel::Error, e.to_string()),
            },
        }

        flush_profile_log(profile, &session, options);
    }
}

/// Configuration validity checks that need no tool invocation.
pub fn sanity(profiles: &[Profile]) {
    for profile in profiles {
        tracing::info!("Processing profile {}", profile.name());
        tracing::info!("Performing sanity check.");

        let mut errors = 0;

        if !profile.source_is_present() {
            tracing::error!("  Source {:?} is not present.", profile.source());
            errors += 1;
        }

        if errors > 0 {
            tracing::error!("Profile is problematic.");
        } else {
            tracing::info!("Profile is sane.");
        }
    }
}

/// Change summary between two snapshot indices for each profile.
pub fn diff(config: &AppConfig, profiles: &[Profile], before: usize, after: usize) {
    for profile in profiles {
        tracing::info!("Processing profile {}", profile.name());
        tracing::info!("Performing diff.");

        let restic = Restic::new(config);

        match restic.diff_from_indices(profile, before, after) {
            Ok(diff) => tracing::info!("Diff:\n{:#?}", diff),
            Err(e) => tracing::error!("{e}"),
        }
    }
}

/// File listing of a snapshot for each profile.
pub fn ls(config: &AppConfig, profiles: &[Profile], snapshot: &str) {
    for profile in profiles {
        tracing::info!("Processing profile {}", profile.name());
        tracing::info!("Performing ls.");

        let restic = Restic::new(config);

        match restic.repo_exists(profile) {
            Err(e) => {
                tracing::error!("Could not determine state of repository path: {e}");
                continue;
            }
            Ok(false) => {
                tracing::error!("Repository does not exist.");
                continue;
            }
            Ok(true) => {}
        }

        match restic.ls(profile, snapshot) {
            Ok(listing) => tracing::info!("Listing:\n{listing}"),
            Err(e) => tracing::error!("{e}"),
        }
    }
}

/// Arbitrary tool command against each profile's repository.
pub fn raw(config: &AppConfig, profiles: &[Profile], command: &str, arguments: &[String]) {
    for profile in profiles {
        tracing::info!("Processing profile {}", profile.name());
        tracing::info!("Performing {command}.");

        let restic = Restic::new(config);

        match restic.raw(profile, command, arguments) {
            Ok(response) => tracing::info!("{response}"),
            Err(e) => tracing::error!("{e}"),
        }
    }
}

/// Render and deliver a test report carrying one record at every level.
pub fn email_test(config: &AppConfig, options: &RunOptions) {
    let mut session = SessionLog::new();
    session.record(LogLevel::Debug, "Debug message");
    session.record(LogLevel::Info, "Info message");
    session.record(LogLevel::Notice, "Notice message");
    session.record(LogLevel::Warning, "Warning message");
    session.record(LogLevel::Error, "Error message");
    session.record(LogLevel::Critical, "Critical message");

    let Some(email) = config.email() else {
        tracing::warn!("No email configuration present.");
        return;
    };

    let level = *email.level();

    let mut message = MailMessage::new(email.sender().clone());
    message.add_recipients(email.recipients());
    message.set_context(&format!("Test message from {}.", env!("CARGO_PKG_NAME")));

    let data = ReportData::from_session(
        format!("Note: only log messages at or above level {level} are displayed."),
        &session,
        level,
    );

    if let Err(e) = message.add_templated_report(email.template().as_deref(), &data) {
        tracing::error!("Could not render report: {e}");
        return;
    }

    if options.no_email {
        let path = format!("{}.email.html", env!("CARGO_PKG_NAME"));
        if let Err(e) = std::fs::write(&path, message.content()) {
            tracing::error!("Could not write {path}: {e}");
        }
    } else if let Err(e) = email.transport().send(
        message.sender(),
        message.recipients(),
        message.subject(),
        message.content(),
    ) {
        tracing::error!("Could not send report: {e}");
    }
}

fn flush_profile_log(profile: &Profile, session: &SessionLog, options: &RunOptions) {
    if options.no_file_logging {
        return;
    }

    let Some(logging) = profile.logging() else {
        return;
    };

    let Some(path) = profile.log_file() else {
        return;
    };

    if let Err(e) = session.write_to_file(&path, *logging.append(), *logging.level()) {
        tracing::error!("Could not write profile log {:?}: {e}", path);
    }
}

fn send_session_reports(
    config: &AppConfig,
    profile: &Profile,
    session: &SessionLog,
    options: &RunOptions,
) {
    let Some(email) = config.email() else {
        return;
    };

    let context = format!(
        "Performing automatic management of profile {}",
        profile.name()
    );

    // One report per recipient group: the application-configured recipients
    // and the profile-configured recipients, each with its own level filter
    // and thresholds.
    let mut groups: Vec<(&Vec<Mailbox>, LogLevel, &HashMap<LogLevel, usize>)> =
        vec![(email.recipients(), *email.level(), email.thresholds())];

    if let Some(policy) = profile.email() {
        groups.push((policy.recipients(), *policy.level(), policy.thresholds()));
    }

    for (recipients, level, thresholds) in groups {
        if recipients.is_empty() {
            continue;
        }

        if !session.meets_thresholds(thresholds) {
            continue;
        }

        let mut message = MailMessage::new(email.sender().clone());
        message.add_recipients(recipients);
        message.set_context(&context);

        let data = ReportData::from_session(
            format!("Note: only log messages at or above level {level} are displayed."),
            session,
            level,
        );

        if let Err(e) = message.add_templated_report(email.template().as_deref(), &data) {
            tracing::error!("Could not render report: {e}");
            continue;
        }

        if options.no_email {
            let path = format!("{}.html", profile.name());
            if let Err(e) = std::fs::write(&path, message.content()) {
                tracing::error!("Could not write {path}: {e}");
            }
        } else if let Err(e) = email.transport().send(
            message.sender(),
            message.recipients(),
            message.subject(),
            message.content(),
        ) {
            tracing::error!("Could not send report: {e}");
        }
    }
}
