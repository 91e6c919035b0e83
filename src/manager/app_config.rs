//! Application-level configuration.
//!
//! Loaded once at startup from a YAML file and passed by reference into the
//! components that need it; there is no process-wide configuration state.

use crate::manager::notifications::NotificationConfig;
use crate::manager::result_error::error::Error;
use crate::manager::result_error::result::Result;
use crate::manager::result_error::WithMsg;
use crate::manager::session::LogLevel;
use crate::manager::validate::{validate_dir_exist, validate_executable_name};
use bon::Builder;
use getset::Getters;
use lettre::message::Mailbox;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use validator::Validate;

static DEFAULT_CONFIG_BASENAME: &str = ".restic-warden.yaml";

fn default_executable() -> PathBuf {
    PathBuf::from("restic")
}

/// File logging settings, shared by the application and profile `logging`
/// keys. The `raw` capture sink is only honoured at application level.
#[skip_serializing_none]
#[derive(Clone, Debug, Default, Serialize, Deserialize, Builder, Getters)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
#[getset(get = "pub")]
pub struct LoggingConfig {
    #[builder(into)]
    file: Option<PathBuf>,
    #[serde(default)]
    #[builder(default)]
    level: LogLevel,
    #[serde(default)]
    #[builder(default)]
    append: bool,
    #[builder(into)]
    raw: Option<PathBuf>,
}

/// E-mail reporting settings: who receives session reports, from which
/// address, above which level, gated by which thresholds, over which
/// transport.
#[skip_serializing_none]
#[derive(Clone, Debug, Serialize, Deserialize, Validate, Builder, Getters)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
#[getset(get = "pub")]
pub struct EmailConfig {
    sender: Mailbox,
    #[serde(default)]
    #[builder(default)]
    recipients: Vec<Mailbox>,
    #[serde(default)]
    #[builder(default)]
    level: LogLevel,
    #[serde(default)]
    #[builder(default)]
    thresholds: HashMap<LogLevel, usize>,
    /// Report template override; the built-in template is used when unset.
    #[builder(into)]
    template: Option<String>,
    #[validate(nested)]
    transport: NotificationConfig,
}

#[skip_serializing_none]
#[derive(Clone, Debug, Serialize, Deserialize, Validate, Builder, Getters)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
#[getset(get = "pub")]
pub struct AppConfig {
    #[serde(default = "default_executable")]
    #[validate(custom(function = validate_executable_name))]
    #[builder(default = default_executable(), into)]
    executable: PathBuf,
    /// Handed to restic as TMPDIR; the process temp dir when unset.
    #[validate(custom(function = validate_dir_exist))]
    #[builder(into)]
    tempdir: Option<PathBuf>,
    logging: Option<LoggingConfig>,
    #[validate(nested)]
    email: Option<EmailConfig>,
    /// Free-form mapping overlaid underneath every profile file.
    profile_defaults: Option<serde_yml::Value>,
    #[serde(skip)]
    #[builder(default)]
    dry_run: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            executable: default_executable(),
            tempdir: None,
            logging: None,
            email: None,
            profile_defaults: None,
            dry_run: false,
        }
    }
}

impl AppConfig {
    /// Load from the given file, or from `~/.restic-warden.yaml` when no path
    /// is given.
    pub fn load(path: Option<&Path>) -> Result<AppConfig> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => dirs_next::home_dir()
                .ok_or_else(|| {
                    Error::Io(std::io::Error::other("could not determine home directory"))
                })?
                .join(DEFAULT_CONFIG_BASENAME),
        };

        let config: AppConfig = File::open(&path)
            .map_err(Error::from)
            .and_then(|f| serde_yml::from_reader(f).map_err(Error::from))
            .with_msg(format!("Could not load application configuration from {:?}", path))?;

        tracing::debug!("Using config file: {:?}", path);

        Ok(config)
    }

    pub fn set_dry_run(&mut self, dry_run: bool) {
        self.dry_run = dry_run;
    }

    /// TMPDIR value passed to the tool.
    pub fn effective_tempdir(&self) -> PathBuf {
        self.tempdir.clone().unwrap_or_else(std::env::temp_dir)
    }

    /// Raw capture sink, when one is configured.
    pub fn raw_log(&self) -> Option<&PathBuf> {
        self.logging.as_ref().and_then(|logging| logging.raw().as_ref())
    }
}
