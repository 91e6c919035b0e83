//! # restic-warden
//!
//! Profile-based management of restic backups.
//!
//! ## Features
//!
//! - **Profiles**: One declarative YAML/JSON file per backup target, with
//!   application-level defaults and name/tag/active selection filters
//! - **Operation Sequences**: Each profile runs a configured list of
//!   maintenance operations (initialise, backup, check, retention, ...),
//!   abandoned at the first failure
//! - **Output Capture**: Tool console output is captured, scrubbed of
//!   progress noise, and optionally mirrored raw to an audit log
//! - **Snapshot Diffs**: Change statistics extracted from diff reports,
//!   with configurable change-size warnings
//! - **E-mail Reports**: Per-run session logs delivered over SMTP, gated by
//!   per-recipient-group severity thresholds
//!
//! ## Quick Start
//!
//! ```no_run
//! use restic_warden::manager::app_config::AppConfig;
//! use restic_warden::manager::filter::ProfileFilter;
//! use restic_warden::manager::profile;
//! use restic_warden::manager::run::{self, RunOptions};
//!
//! let config = AppConfig::load(Some(std::path::Path::new("warden.yaml")))?;
//!
//! let files = profile::find_profiles("/etc/restic-warden/profiles");
//! let profiles = profile::load_profiles(
//!     &files,
//!     &ProfileFilter::default(),
//!     config.profile_defaults().as_ref(),
//! );
//!
//! run::auto(&config, &profiles, &RunOptions::default());
//! # Ok::<(), restic_warden::manager::result_error::error::Error>(())
//! ```

pub mod manager;
