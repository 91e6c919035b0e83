use clap::{Parser, Subcommand};
use restic_warden::manager::app_config::AppConfig;
use restic_warden::manager::filter::ProfileFilter;
use restic_warden::manager::profile;
use restic_warden::manager::run::{self, RunOptions};
use std::path::PathBuf;
use std::process::exit;
use tracing::{error, warn};
use validator::Validate;

/// Profile-based management of restic backups.
///
/// A profile specifies a source and destination as well as an exclusion list,
/// a retention policy and the sequence of maintenance operations to run.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Config file (default is $HOME/.restic-warden.yaml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Profile directory, searched recursively
    #[arg(long)]
    profile_dir: Option<PathBuf>,

    /// Profile file (repeatable)
    #[arg(long = "profile")]
    profile_files: Vec<PathBuf>,

    /// Select only active profiles
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    filter_active: bool,

    /// Select only profiles with one of the specified names
    #[arg(long, value_delimiter = ',')]
    filter_names: Vec<String>,

    /// Select only profiles with all specified tags
    #[arg(long, value_delimiter = ',')]
    filter_tags: Vec<String>,

    /// Console logging level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Disable sending of emails
    #[arg(long)]
    no_email: bool,

    /// Disable logging to file
    #[arg(long = "no-logfiles")]
    no_file_logging: bool,

    /// Dry-run (restic will not be executed)
    #[arg(long)]
    dry_run: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Perform automatic management of backup profiles
    Auto,
    /// Perform a sanity check of the selected profiles
    Sanity,
    /// Display the difference summary between two snapshots
    Diff {
        /// Earliest snapshot index (0 is the most recent)
        #[arg(long, default_value_t = 1)]
        before: usize,
        /// Latest snapshot index (0 is the most recent)
        #[arg(long, default_value_t = 0)]
        after: usize,
    },
    /// List the files recorded in a snapshot
    Ls {
        /// Snapshot to list
        #[arg(long, default_value = "latest")]
        snapshot: String,
    },
    /// Perform an arbitrary restic operation
    Raw {
        /// Tool command to run
        command: String,
        /// Arguments passed through to the tool
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        arguments: Vec<String>,
    },
    /// Render and deliver a test report
    Email,
    /// Initialise repositories that do not exist yet
    Init,
    /// Back up each profile's source
    Backup,
    /// Check repository integrity
    Check,
    /// Remove stale repository locks
    Unlock,
    /// List each repository's snapshots
    Snapshots,
    /// Apply each profile's retention policy
    Forget,
    /// Prune unreferenced repository data
    Prune,
    /// Rebuild each repository's index
    RebuildIndex,
}

fn console_level(name: &str) -> tracing::Level {
    match name {
        "debug" => tracing::Level::DEBUG,
        "info" | "notice" => tracing::Level::INFO,
        "warning" => tracing::Level::WARN,
        "error" | "critical" => tracing::Level::ERROR,
        other => {
            eprintln!("Unknown log level {other:?}, using info");
            tracing::Level::INFO
        }
    }
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(console_level(&cli.log_level))
        .with_writer(std::io::stderr)
        .init();

    let mut config = match AppConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            AppConfig::default()
        }
    };
    config.set_dry_run(cli.dry_run);

    if let Err(e) = config.validate() {
        error!("Application configuration is invalid: {e}");
        exit(1);
    }

    let mut files = cli.profile_files.clone();
    if let Some(profile_dir) = &cli.profile_dir {
        tracing::info!("Searching for profiles in {:?}", profile_dir);
        files.extend(profile::find_profiles(profile_dir));
    }
    tracing::debug!("Specified and discovered profile files:\n{files:?}");

    let filter = ProfileFilter {
        only_active: cli.filter_active,
        names: cli.filter_names.clone(),
        tags: cli.filter_tags.clone(),
    };

    let profiles = profile::load_profiles(&files, &filter, config.profile_defaults().as_ref());

    if profiles.is_empty() {
        warn!("No profiles loaded!");
    }

    let options = RunOptions {
        no_email: cli.no_email,
        no_file_logging: cli.no_file_logging,
    };

    match &cli.command {
        Commands::Auto => run::auto(&config, &profiles, &options),
        Commands::Sanity => run::sanity(&profiles),
        Commands::Diff { before, after } => run::diff(&config, &profiles, *before, *after),
        Commands::Ls { snapshot } => run::ls(&config, &profiles, snapshot),
        Commands::Raw { command, arguments } => run::raw(&config, &profiles, command, arguments),
        Commands::Email => run::email_test(&config, &options),
        Commands::Init => run::init(&config, &profiles, &options),
        Commands::Backup => run::simple_command(
            &config,
            &profiles,
            &options,
            "Performing backup.",
            |restic, profile| restic.backup(profile),
        ),
        Commands::Check => run::simple_command(
            &config,
            &profiles,
            &options,
            "Checking repository.",
            |restic, profile| restic.check(profile),
        ),
        Commands::Unlock => run::simple_command(
            &config,
            &profiles,
            &options,
            "Unlocking repository.",
            |restic, profile| restic.unlock(profile),
        ),
        Commands::Snapshots => run::simple_command(
            &config,
            &profiles,
            &options,
            "Listing snapshots.",
            |restic, profile| restic.snapshots(profile),
        ),
        Commands::Forget => run::simple_command(
            &config,
            &profiles,
            &options,
            "Applying retention policy.",
            |restic, profile| restic.apply_retention_policy(profile),
        ),
        Commands::Prune => run::simple_command(
            &config,
            &profiles,
            &options,
            "Cleaning repository.",
            |restic, profile| restic.clean(profile),
        ),
        Commands::RebuildIndex => run::simple_command(
            &config,
            &profiles,
            &options,
            "Rebuilding repository index.",
            |restic, profile| restic.rebuild_index(profile),
        ),
    }
}
