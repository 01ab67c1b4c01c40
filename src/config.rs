use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

const CONFIG_FILE: &str = "config.yaml";

const DEFAULT_LISTEN: &str = "0.0.0.0:8080";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 20;
const DEFAULT_BATCH_CONCURRENCY: usize = 4;
/// Upper bound on URLs accepted by one batch call
const DEFAULT_BATCH_MAX_URLS: usize = 20;
const DEFAULT_USER_AGENT: &str = "medialink/0.1 (media link extractor)";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Address the daemon binds to
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Per outbound request timeout, in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Max URLs extracted at the same time within one batch
    #[serde(default = "default_batch_concurrency")]
    pub batch_concurrency: usize,

    #[serde(default = "default_batch_max_urls")]
    pub batch_max_urls: usize,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(skip_serializing, skip_deserializing)]
    base_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: DEFAULT_LISTEN.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            batch_concurrency: DEFAULT_BATCH_CONCURRENCY,
            batch_max_urls: DEFAULT_BATCH_MAX_URLS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            base_path: PathBuf::new(),
        }
    }
}

fn default_listen() -> String {
    DEFAULT_LISTEN.to_string()
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_batch_concurrency() -> usize {
    DEFAULT_BATCH_CONCURRENCY
}

fn default_batch_max_urls() -> usize {
    DEFAULT_BATCH_MAX_URLS
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

impl Config {
    fn validate(&mut self) -> Result<()> {
        if self.batch_concurrency == 0 {
            self.batch_concurrency = 1
        }

        if self.request_timeout_secs == 0 {
            bail!("request_timeout_secs must be greater than 0");
        }

        if self.batch_max_urls == 0 {
            bail!("batch_max_urls must be greater than 0");
        }

        if self.user_agent.trim().is_empty() {
            bail!("user_agent must not be empty");
        }

        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Load `config.yaml` from `base_path`, writing the defaults first if it does not exist.
    pub fn load_with(base_path: impl AsRef<Path>) -> Result<Self> {
        let base_path = base_path.as_ref();
        let path = base_path.join(CONFIG_FILE);

        // create new if does not exist
        if !path.exists() {
            fs::create_dir_all(base_path)
                .with_context(|| format!("failed to create {}", base_path.display()))?;
            fs::write(&path, serde_yml::to_string(&Self::default())?)
                .with_context(|| format!("failed to write {}", path.display()))?;
        }

        let config_str = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let mut config: Self = serde_yml::from_str(&config_str)
            .with_context(|| format!("{} is malformed", path.display()))?;

        config.base_path = base_path.to_path_buf();

        config.validate()?;

        // resave in case config version needs an upgrade
        if config_str != serde_yml::to_string(&config)? {
            config.save()?;
        }

        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_str = serde_yml::to_string(&self)?;
        fs::write(self.base_path.join(CONFIG_FILE), config_str)?;
        Ok(())
    }
}
