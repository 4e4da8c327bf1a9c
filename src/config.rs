use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{
    error::{RelayError, Result},
    types::RepoCoordinate,
};

pub const DEFAULT_API_BASE: &str = "https://api.github.com";
pub const DEFAULT_ARCHIVE_BASE: &str = "https://github.com";

/// Everything the relay needs to reach its destination store and sources.
///
/// Built once at startup and handed by reference to the clients.
#[derive(Clone, Deserialize)]
pub struct RelayConfig {
    /// Destination store coordinate
    pub store: RepoCoordinate,
    /// Access credential for the store
    pub token: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_archive_base")]
    pub archive_base: String,
    /// Branches tried, in order, when fetching a source snapshot
    #[serde(default = "default_candidate_branches")]
    pub candidate_branches: Vec<String>,
    #[serde(default = "default_api_timeout_secs")]
    pub api_timeout_secs: u64,
    #[serde(default = "default_archive_timeout_secs")]
    pub archive_timeout_secs: u64,
    /// Where snapshots are staged; the system temp dir when unset
    #[serde(default)]
    pub temp_dir: Option<PathBuf>,
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_archive_base() -> String {
    DEFAULT_ARCHIVE_BASE.to_string()
}

fn default_candidate_branches() -> Vec<String> {
    vec!["main".to_string(), "master".to_string()]
}

fn default_api_timeout_secs() -> u64 {
    15
}

fn default_archive_timeout_secs() -> u64 {
    60
}

impl RelayConfig {
    pub fn new(store: RepoCoordinate, token: impl Into<String>) -> Self {
        Self {
            store,
            token: token.into(),
            api_base: default_api_base(),
            archive_base: default_archive_base(),
            candidate_branches: default_candidate_branches(),
            api_timeout_secs: default_api_timeout_secs(),
            archive_timeout_secs: default_archive_timeout_secs(),
            temp_dir: None,
        }
    }

    /// Point both the contents API and the archive host elsewhere
    #[must_use]
    pub fn with_endpoints(mut self, api_base: &str, archive_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self.archive_base = archive_base.trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    /// Load config from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: RelayConfig =
            serde_json::from_str(&content).map_err(|e| RelayError::InvalidConfig {
                message: format!("{}: {}", path.display(), e),
            })?;
        config.api_base = config.api_base.trim_end_matches('/').to_string();
        config.archive_base = config.archive_base.trim_end_matches('/').to_string();
        config.validate()?;
        Ok(config)
    }

    /// Load config from `RELAY_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_vars<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key).ok_or_else(|| RelayError::InvalidConfig {
                message: format!("{} is not set", key),
            })
        };

        let store = RepoCoordinate::new(
            required("RELAY_STORE_OWNER")?,
            required("RELAY_STORE_REPO")?,
            lookup("RELAY_STORE_BRANCH").unwrap_or_else(|| "main".to_string()),
        );
        let mut config = RelayConfig::new(store, required("RELAY_TOKEN")?);

        if let Some(api_base) = lookup("RELAY_API_BASE") {
            config.api_base = api_base.trim_end_matches('/').to_string();
        }
        if let Some(archive_base) = lookup("RELAY_ARCHIVE_BASE") {
            config.archive_base = archive_base.trim_end_matches('/').to_string();
        }
        if let Some(dir) = lookup("RELAY_TEMP_DIR") {
            config.temp_dir = Some(PathBuf::from(dir));
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("store.owner", &self.store.owner),
            ("store.repo", &self.store.repo),
            ("store.branch", &self.store.branch),
            ("token", &self.token),
        ];
        for (name, value) in fields {
            if value.trim().is_empty() {
                return Err(RelayError::InvalidConfig {
                    message: format!("{} must not be empty", name),
                });
            }
        }
        if self.candidate_branches.is_empty() {
            return Err(RelayError::InvalidConfig {
                message: "candidate_branches must not be empty".to_string(),
            });
        }
        Ok(())
    }

    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api_timeout_secs)
    }

    pub fn archive_timeout(&self) -> Duration {
        Duration::from_secs(self.archive_timeout_secs)
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

impl std::fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayConfig")
            .field("store", &self.store)
            .field("token", &"<redacted>")
            .field("api_base", &self.api_base)
            .field("archive_base", &self.archive_base)
            .field("candidate_branches", &self.candidate_branches)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("archive_timeout_secs", &self.archive_timeout_secs)
            .field("temp_dir", &self.temp_dir)
            .finish()
    }
}
