use clap::Parser;

use crate::config::{ClientConfig, DEFAULT_NUM_BACKUPS, DEFAULT_TAG, RunConfig};
use crate::error::{Result, SnapshotError};
use crate::logging::DEFAULT_LOG_LEVEL;
use crate::types::Selector;

/// Snapshot EBS volumes of tagged EC2 instances and rotate old snapshots
#[derive(Parser, Debug)]
#[command(name = "ebs-snapshot-automation")]
#[command(about = "Script to automate snapshotting of EBS volumes")]
#[command(version)]
pub struct Cli {
    /// Use this AWS_ACCESS_KEY_ID instead of the one configured for the AWS CLI
    #[arg(long)]
    pub aws_access_key_id: Option<String>,

    /// Use this AWS_SECRET_ACCESS_KEY instead of the one configured for the AWS CLI
    #[arg(long)]
    pub aws_secret_access_key: Option<String>,

    /// The AWS CLI profile to use. Defaults to the default profile
    #[arg(long)]
    pub profile: Option<String>,

    /// The AWS region to connect to. Defaults to the one configured for the AWS CLI
    #[arg(long)]
    pub region: Option<String>,

    /// The number of backups for each volume to keep
    #[arg(short = 'n', long, default_value_t = DEFAULT_NUM_BACKUPS)]
    pub num_backups: u32,

    /// Key and value (separated by a colon) of a tag attached to instances
    /// whose EBS volumes should be backed up
    #[arg(short = 't', long, default_value = DEFAULT_TAG)]
    pub tag: String,

    /// Log the snapshots that would be created and deleted without changing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Log level (trace, debug, info, warn, error). RUST_LOG takes precedence
    #[arg(long, default_value = DEFAULT_LOG_LEVEL)]
    pub log_level: String,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Split the command line into run and client configuration.
    ///
    /// Validates everything that can be checked without talking to AWS, so
    /// a malformed `--tag` fails before any client exists.
    pub fn to_configs(&self) -> Result<(RunConfig, ClientConfig)> {
        let selector: Selector = self
            .tag
            .parse()
            .map_err(|e| SnapshotError::config(format!("{}", e)))?;

        let run = RunConfig::new(selector, self.num_backups).with_dry_run(self.dry_run);
        let client = ClientConfig::new(
            self.aws_access_key_id.clone(),
            self.aws_secret_access_key.clone(),
            self.profile.clone(),
            self.region.clone(),
        )?;
        Ok((run, client))
    }
}
