use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use super::common::{MigrationIntent, RepoRef};
use super::reader::load_mappings;
use crate::error::ConfigError;
use crate::logger::LogOptions;

#[derive(Parser, Debug)]
#[clap(
    name = "migry",
    about = "Migrates a repository between hosted git platforms: mirror transfer, \
             pipeline repoint, permission mapping, validation."
)]
pub struct Args {
    /// Source repository as owner/name
    #[clap(long)]
    pub source_repo: String,

    /// Destination repository as owner/name
    #[clap(long)]
    pub dest_repo: String,

    /// Git remote URL of the source repository
    #[clap(long)]
    pub source_remote: String,

    /// Git remote URL of the destination repository
    #[clap(long)]
    pub dest_remote: String,

    /// Base URL of the source platform API
    #[clap(long)]
    pub source_api: String,

    /// Base URL of the destination platform API
    #[clap(long)]
    pub dest_api: String,

    /// Token for the source platform
    #[clap(long)]
    pub source_token: String,

    /// Token for the destination platform
    #[clap(long)]
    pub dest_token: String,

    /// Local working-copy path. Wiped and recreated at the start of the run.
    #[clap(long, parse(from_os_str))]
    pub workdir: PathBuf,

    /// Pipeline definition to repoint at the destination
    #[clap(long)]
    pub pipeline: Option<String>,

    /// YAML file with the group-to-team permission mappings
    #[clap(long, parse(from_os_str))]
    pub mappings: Option<PathBuf>,

    #[clap(long)]
    pub skip_pipeline: bool,

    #[clap(long)]
    pub skip_permissions: bool,

    #[clap(long, default_value = "info")]
    pub log_level: String,

    /// Additional plain-text log sink
    #[clap(long, parse(from_os_str))]
    pub log_file: Option<PathBuf>,

    /// Write the machine-readable report here at run end
    #[clap(long, parse(from_os_str))]
    pub report: Option<PathBuf>,

    #[clap(long, default_value_t = 600)]
    pub step_timeout_secs: u64,
}

/// Everything one run needs, assembled from the flags before any side effect.
#[derive(Clone, Debug)]
pub struct ParsedConfig {
    pub intent: MigrationIntent,
    pub source_api: String,
    pub dest_api: String,
    pub source_token: String,
    pub dest_token: String,
    pub skip_pipeline: bool,
    pub skip_permissions: bool,
    pub log: LogOptions,
    pub report: Option<PathBuf>,
    pub step_timeout: Duration,
}

pub fn parse_args(args: Args) -> Result<ParsedConfig, ConfigError> {
    let source_repo = RepoRef::parse(&args.source_repo, &args.source_remote)?;
    let destination_repo = RepoRef::parse(&args.dest_repo, &args.dest_remote)?;

    let mappings = match &args.mappings {
        Some(path) => Some(load_mappings(path)?),
        None => None,
    };

    Ok(ParsedConfig {
        intent: MigrationIntent {
            source_repo,
            destination_repo,
            workdir: args.workdir,
            pipeline: args.pipeline,
            mappings,
        },
        source_api: args.source_api,
        dest_api: args.dest_api,
        source_token: args.source_token,
        dest_token: args.dest_token,
        skip_pipeline: args.skip_pipeline,
        skip_permissions: args.skip_permissions,
        log: LogOptions {
            level: args.log_level,
            file: args.log_file,
        },
        report: args.report,
        step_timeout: Duration::from_secs(args.step_timeout_secs),
    })
}
