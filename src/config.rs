//! Run and client configuration.
//!
//! Both structs are built once in `main` from the parsed command line and
//! passed by reference from there; nothing reads AWS settings from globals.

use std::fmt;

use crate::error::{Result, SnapshotError};
use crate::types::Selector;

/// Snapshots kept per volume unless `--num-backups` says otherwise.
pub const DEFAULT_NUM_BACKUPS: u32 = 14;

/// Selector used unless `--tag` says otherwise.
pub const DEFAULT_TAG: &str = "Lifecycle:legacy";

/// Access key pair given on the command line.
#[derive(Clone, PartialEq, Eq)]
pub struct StaticCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

// Keep the secret out of debug logs.
impl fmt::Debug for StaticCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

/// How to reach the EC2 API. Unset fields fall back to the ambient AWS
/// configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientConfig {
    pub credentials: Option<StaticCredentials>,
    pub profile: Option<String>,
    pub region: Option<String>,
}

impl ClientConfig {
    /// Assemble a client config, pairing the two halves of a static key.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when only one of the access key id and
    /// secret access key is given, or when any given value is blank.
    pub fn new(
        access_key_id: Option<String>,
        secret_access_key: Option<String>,
        profile: Option<String>,
        region: Option<String>,
    ) -> Result<Self> {
        let credentials = match (access_key_id, secret_access_key) {
            (Some(access_key_id), Some(secret_access_key)) => Some(StaticCredentials {
                access_key_id,
                secret_access_key,
            }),
            (None, None) => None,
            (Some(_), None) => {
                return Err(SnapshotError::config(
                    "--aws-access-key-id requires --aws-secret-access-key",
                ));
            }
            (None, Some(_)) => {
                return Err(SnapshotError::config(
                    "--aws-secret-access-key requires --aws-access-key-id",
                ));
            }
        };

        let config = Self {
            credentials,
            profile,
            region,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(keys) = &self.credentials {
            if keys.access_key_id.trim().is_empty() || keys.secret_access_key.trim().is_empty() {
                return Err(SnapshotError::config("AWS access keys must not be empty"));
            }
        }
        if self.profile.as_deref().is_some_and(|p| p.trim().is_empty()) {
            return Err(SnapshotError::config("--profile must not be empty"));
        }
        if self.region.as_deref().is_some_and(|r| r.trim().is_empty()) {
            return Err(SnapshotError::config("--region must not be empty"));
        }
        Ok(())
    }
}

/// What a run does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Tag picking instances to snapshot and snapshots to rotate
    pub selector: Selector,
    /// Snapshots kept per volume
    pub num_backups: u32,
    /// Log intended mutations instead of issuing them
    pub dry_run: bool,
}

impl RunConfig {
    pub fn new(selector: Selector, num_backups: u32) -> Self {
        Self {
            selector,
            num_backups,
            dry_run: false,
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_config_defaults_to_ambient() {
        let config = ClientConfig::new(None, None, None, None).expect("empty config is valid");
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn test_client_config_pairs_keys() {
        let config = ClientConfig::new(
            Some("AKIA".to_string()),
            Some("secret".to_string()),
            None,
            Some("eu-west-1".to_string()),
        )
        .expect("paired keys are valid");
        let keys = config.credentials.expect("credentials set");
        assert_eq!(keys.access_key_id, "AKIA");
        assert_eq!(config.region.as_deref(), Some("eu-west-1"));
    }

    #[test]
    fn test_client_config_rejects_half_a_key() {
        let err = ClientConfig::new(Some("AKIA".to_string()), None, None, None)
            .expect_err("lone access key id must fail");
        assert!(err.is_config());

        let err = ClientConfig::new(None, Some("secret".to_string()), None, None)
            .expect_err("lone secret must fail");
        assert!(err.is_config());
    }

    #[test]
    fn test_client_config_rejects_blank_values() {
        assert!(ClientConfig::new(None, None, Some(" ".to_string()), None).is_err());
        assert!(ClientConfig::new(None, None, None, Some(String::new())).is_err());
    }

    #[test]
    fn test_credentials_debug_redacts_secret() {
        let keys = StaticCredentials {
            access_key_id: "AKIA".to_string(),
            secret_access_key: "hunter2".to_string(),
        };
        let debug = format!("{:?}", keys);
        assert!(debug.contains("AKIA"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_default_tag_is_a_valid_selector() {
        let selector: Selector = DEFAULT_TAG.parse().expect("default tag parses");
        let config = RunConfig::new(selector, DEFAULT_NUM_BACKUPS);
        assert_eq!(config.num_backups, 14);
        assert!(!config.dry_run);
        assert!(config.with_dry_run(true).dry_run);
    }
}
