//! Backup profile configuration.
//!
//! One file per profile, YAML or JSON, parsed into a typed schema at load
//! time. Application-level defaults are overlaid underneath each file before
//! parsing, so explicit profile values always win.

use crate::manager::app_config::LoggingConfig;
use crate::manager::filter::ProfileFilter;
use crate::manager::result_error::error::Error;
use crate::manager::result_error::result::Result;
use crate::manager::result_error::WithMsg;
use crate::manager::secret::Secret;
use crate::manager::sequencer::Operation;
use crate::manager::session::LogLevel;
use bon::Builder;
use getset::Getters;
use lettre::message::Mailbox;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::collections::HashMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Placeholder token replaced with the profile's source path.
pub static SOURCE_TOKEN: &str = "<source>";
/// Placeholder token replaced with the profile's repository path.
pub static REPO_TOKEN: &str = "<repo>";

/// One `--keep-<period> <count>` retention rule, order-significant.
///
/// Accepts the capitalised key spelling of older profile files.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Builder, Getters)]
#[serde(deny_unknown_fields)]
#[getset(get = "pub")]
pub struct RetentionRule {
    #[serde(alias = "Period")]
    #[builder(into)]
    period: String,
    #[serde(alias = "Value")]
    value: u32,
}

/// Limits on snapshot-to-snapshot change, checked after a diff. Exceeding a
/// limit logs a warning; it never fails the operation.
#[skip_serializing_none]
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, Builder, Getters)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
#[getset(get = "pub")]
pub struct ChangeThresholds {
    total_files: Option<u64>,
    total_bytes: Option<f64>,
}

/// Per-profile e-mail recipients and filtering.
#[derive(Clone, Debug, Default, Serialize, Deserialize, Builder, Getters)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
#[getset(get = "pub")]
pub struct EmailPolicy {
    #[builder(default)]
    recipients: Vec<Mailbox>,
    #[builder(default)]
    level: LogLevel,
    #[builder(default)]
    thresholds: HashMap<LogLevel, usize>,
}

/// A configured backup target: what to back up, where to, and which
/// maintenance operations to run against it.
#[skip_serializing_none]
#[derive(Clone, Debug, Default, Serialize, Deserialize, Builder, Getters)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
#[getset(get = "pub")]
pub struct Profile {
    #[builder(default)]
    active: bool,
    #[builder(into, default)]
    name: String,
    #[builder(default)]
    tags: Vec<String>,
    #[builder(into, default)]
    source: PathBuf,
    #[builder(into, default)]
    repo: PathBuf,
    #[builder(into, default)]
    password: Secret,
    /// Exclusion patterns handed to the tool; `#`-prefixed entries are
    /// comments, and entries may contain `<source>`/`<repo>` tokens.
    #[builder(default)]
    exclusions: Vec<String>,
    logging: Option<LoggingConfig>,
    email: Option<EmailPolicy>,
    #[builder(default)]
    keep_policy: Vec<RetentionRule>,
    #[builder(default)]
    operation_sequence: Vec<Operation>,
    change_thresholds: Option<ChangeThresholds>,
    /// File the profile was read from, for diagnostics.
    #[serde(skip)]
    file: Option<PathBuf>,
}

impl Profile {
    /// Expand `<source>`/`<repo>` tokens against this profile's paths.
    pub fn expand(&self, input: &str) -> String {
        expand_placeholders(input, &self.source, &self.repo)
    }

    /// The profile's log file path with placeholder tokens expanded.
    pub fn log_file(&self) -> Option<PathBuf> {
        self.logging
            .as_ref()
            .and_then(|logging| logging.file().as_ref())
            .map(|file| PathBuf::from(self.expand(&file.to_string_lossy())))
    }

    /// Whether the source directory exists.
    pub fn source_is_present(&self) -> bool {
        !self.source.as_os_str().is_empty() && self.source.is_dir()
    }
}

pub fn expand_placeholders(input: &str, source: &Path, repo: &Path) -> String {
    input
        .replace(SOURCE_TOKEN, &source.to_string_lossy())
        .replace(REPO_TOKEN, &repo.to_string_lossy())
}

/// Recursively search a directory for profile files.
///
/// Paths are sorted lexicographically so profile processing order is
/// deterministic across platforms and runs.
pub fn find_profiles<P: AsRef<Path>>(directory: P) -> Vec<PathBuf> {
    let mut profiles: Vec<PathBuf> = WalkDir::new(directory.as_ref())
        .follow_links(true)
        .into_iter()
        .filter_map(|res| match res {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!("Skipping unreadable entry while searching profiles: {e}");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            matches!(
                path.extension().and_then(OsStr::to_str),
                Some("yaml") | Some("json")
            )
        })
        .collect();

    profiles.sort();
    profiles
}

/// Load the subset of the given profile files that match the filter.
///
/// A file that fails to parse yields an inactive, empty profile rather than
/// aborting the load; one malformed profile must not prevent the others from
/// running.
pub fn load_profiles(
    files: &[PathBuf],
    filter: &ProfileFilter,
    defaults: Option<&serde_yml::Value>,
) -> Vec<Profile> {
    let mut profiles = Vec::new();

    for file in files {
        let profile = match load_profile(file, defaults) {
            Ok(profile) => {
                tracing::debug!("Read profile from {:?}", file);
                profile
            }
            Err(e) => {
                tracing::error!("Could not read profile from {:?}: {}", file, e);
                Profile::default()
            }
        };

        match filter.matches(&profile) {
            Ok(()) => profiles.push(profile),
            Err(reason) => {
                tracing::debug!("Skipping profile (filter criteria not matched: {reason}).");
            }
        }
    }

    profiles
}

fn load_profile(path: &Path, defaults: Option<&serde_yml::Value>) -> Result<Profile> {
    let text = std::fs::read_to_string(path)?;

    let mut value: serde_yml::Value = serde_yml::from_str(&text)
        .map_err(Error::from)
        .with_msg(format!("Could not parse {:?}", path))?;

    if let Some(defaults) = defaults {
        overlay_defaults(&mut value, defaults);
    }

    let mut profile: Profile = serde_yml::from_value(value)
        .map_err(Error::from)
        .with_msg(format!("Unexpected profile schema in {:?}", path))?;

    profile.file = Some(path.to_path_buf());

    Ok(profile)
}

/// Insert default keys that the profile file did not set. Nested mappings are
/// merged key by key; any explicitly-set value is left untouched.
fn overlay_defaults(target: &mut serde_yml::Value, defaults: &serde_yml::Value) {
    let (serde_yml::Value::Mapping(target), serde_yml::Value::Mapping(defaults)) =
        (target, defaults)
    else {
        return;
    };

    for (key, default_value) in defaults {
        match target.get_mut(key) {
            None => {
                target.insert(key.clone(), default_value.clone());
            }
            Some(existing) => overlay_defaults(existing, default_value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static FULL_PROFILE: &str = r##"
active: true
name: home
tags: [nightly, critical]
source: /home/user
repo: /backups/home
password: correct-horse
exclusions:
  - "# caches"
  - "<source>/.cache"
  - "*.tmp"
logging:
  file: "<repo>/warden.log"
  level: info
  append: true
email:
  recipients: ["ops@example.com"]
  level: warning
  thresholds:
    error: 1
keep-policy:
  - { period: daily, value: 7 }
  - { period: weekly, value: 5 }
operation-sequence: [initialise, backup, check]
change-thresholds:
  total-files: 1000
  total-bytes: 1e9
"##;

    #[test]
    fn test_parse_full_profile() {
        let profile: Profile = serde_yml::from_str(FULL_PROFILE).unwrap();

        assert!(*profile.active());
        assert_eq!(profile.name(), "home");
        assert_eq!(profile.tags(), &["nightly", "critical"]);
        assert_eq!(profile.password().expose(), "correct-horse");
        assert_eq!(profile.exclusions().len(), 3);
        assert_eq!(profile.keep_policy()[1].period(), "weekly");
        assert_eq!(*profile.keep_policy()[1].value(), 5);
        assert_eq!(profile.operation_sequence().len(), 3);
        assert_eq!(
            profile.change_thresholds().as_ref().unwrap().total_files(),
            &Some(1000)
        );

        let email = profile.email().as_ref().unwrap();
        assert_eq!(*email.level(), LogLevel::Warning);
    }

    #[test]
    fn test_retention_rule_accepts_capitalised_keys() {
        let rule: RetentionRule = serde_yml::from_str("{ Period: monthly, Value: 12 }").unwrap();
        assert_eq!(rule.period(), "monthly");
        assert_eq!(*rule.value(), 12);
    }

    #[test]
    fn test_expand_placeholders() {
        let profile = Profile::builder()
            .source("/data/photos")
            .repo("/backups/photos")
            .build();

        assert_eq!(
            profile.expand("<source>/.thumbnails"),
            "/data/photos/.thumbnails"
        );
        assert_eq!(profile.expand("<repo>/log"), "/backups/photos/log");
        assert_eq!(profile.expand("plain"), "plain");
    }

    #[test]
    fn test_log_file_expansion() {
        let profile: Profile = serde_yml::from_str(FULL_PROFILE).unwrap();
        assert_eq!(
            profile.log_file(),
            Some(PathBuf::from("/backups/home/warden.log"))
        );
    }

    #[test]
    fn test_defaults_never_override_explicit_values() {
        let defaults: serde_yml::Value = serde_yml::from_str(
            r#"
active: false
source: /default/source
logging:
  level: error
  append: true
"#,
        )
        .unwrap();

        let mut value: serde_yml::Value = serde_yml::from_str(
            r#"
active: true
name: explicit
logging:
  level: debug
"#,
        )
        .unwrap();

        overlay_defaults(&mut value, &defaults);
        let profile: Profile = serde_yml::from_value(value).unwrap();

        // Explicit values survive the overlay.
        assert!(*profile.active());
        assert_eq!(
            *profile.logging().as_ref().unwrap().level(),
            LogLevel::Debug
        );
        // Missing keys are filled in, including nested ones.
        assert_eq!(profile.source(), &PathBuf::from("/default/source"));
        assert!(*profile.logging().as_ref().unwrap().append());
    }

    #[test]
    fn test_load_profiles_tolerates_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.yaml");
        let bad = dir.path().join("bad.yaml");
        std::fs::write(&good, "active: true\nname: good\n").unwrap();
        std::fs::write(&bad, ": not yaml at all {{{").unwrap();

        let filter = ProfileFilter {
            only_active: false,
            ..ProfileFilter::default()
        };
        let profiles = load_profiles(&[bad, good], &filter, None);

        // The malformed file degrades to an empty profile; the good one loads.
        assert_eq!(profiles.len(), 2);
        assert_eq!(profiles[0].name(), "");
        assert_eq!(profiles[1].name(), "good");
    }

    #[test]
    fn test_load_profiles_applies_filter() {
        let dir = tempfile::tempdir().unwrap();
        let inactive = dir.path().join("inactive.yaml");
        std::fs::write(&inactive, "active: false\nname: dormant\n").unwrap();

        let profiles = load_profiles(&[inactive], &ProfileFilter::default(), None);
        assert!(profiles.is_empty());
    }

    #[test]
    fn test_find_profiles_recursive_sorted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("sub/deeper")).unwrap();
        std::fs::write(dir.path().join("zeta.yaml"), "").unwrap();
        std::fs::write(dir.path().join("alpha.json"), "").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "").unwrap();
        std::fs::write(dir.path().join("sub/beta.yaml"), "").unwrap();
        std::fs::write(dir.path().join("sub/deeper/gamma.yaml"), "").unwrap();

        let found = find_profiles(dir.path());
        let names: Vec<_> = found
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_string_lossy().into_owned())
            .collect();

        assert_eq!(
            names,
            vec![
                "alpha.json",
                "sub/beta.yaml",
                "sub/deeper/gamma.yaml",
                "zeta.yaml"
            ]
        );
    }

    #[test]
    fn test_json_profile_parses() {
        let profile: Profile =
            serde_yml::from_str(r#"{"active": true, "name": "from-json"}"#).unwrap();
        assert_eq!(profile.name(), "from-json");
    }
}
