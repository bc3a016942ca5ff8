//! CLI configuration
//!
//! An optional TOML file overrides the library defaults; command-line
//! flags override the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use stackforge_compiler::{CompileOptions, FetchConfig};
use stackforge_deploy::{FleetConfig, MonitorConfig};
use stackforge_store::StoreConfig;

use crate::error::{CliError, CliResult};

/// Region used when nothing else names one.
pub const DEFAULT_REGION: &str = "us-west-1";

/// Name of the per-project profile file.
pub const PROFILE_FILE: &str = ".awsprofile";

/// CLI configuration file
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Default AWS region
    pub region: Option<String>,

    /// Default AWS credentials profile
    pub profile: Option<String>,

    pub store: StoreConfig,

    pub compile: CompileOptions,

    pub fetch: FetchSettings,

    pub monitor: MonitorSettings,

    pub fleet: FleetSettings,
}

/// HTTP fetch overrides
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchSettings {
    pub max_redirects: Option<usize>,
    pub max_retries: Option<u32>,
    pub retry_delay_ms: Option<u64>,
    pub timeout_secs: Option<u64>,
}

impl FetchSettings {
    pub fn apply(&self, mut config: FetchConfig) -> FetchConfig {
        if let Some(v) = self.max_redirects {
            config.max_redirects = v;
        }
        if let Some(v) = self.max_retries {
            config.max_retries = v;
        }
        if let Some(v) = self.retry_delay_ms {
            config.retry_delay = Duration::from_millis(v);
        }
        if let Some(v) = self.timeout_secs {
            config.timeout = Duration::from_secs(v);
        }
        config
    }
}

/// Event monitor overrides
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    pub poll_interval_ms: Option<u64>,
    pub pace_interval_ms: Option<u64>,
    pub throttle_delay_ms: Option<u64>,
    pub max_timeouts: Option<u32>,
}

impl MonitorSettings {
    pub fn apply(&self, mut config: MonitorConfig) -> MonitorConfig {
        if let Some(v) = self.poll_interval_ms {
            config.poll_interval = Duration::from_millis(v);
        }
        if let Some(v) = self.pace_interval_ms {
            config.pace_interval = Duration::from_millis(v);
        }
        if let Some(v) = self.throttle_delay_ms {
            config.throttle_delay = Duration::from_millis(v);
        }
        if let Some(v) = self.max_timeouts {
            config.max_timeouts = v;
        }
        config
    }
}

/// Fleet action polling overrides
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetSettings {
    pub scale_poll_secs: Option<u64>,
    pub recycle_poll_secs: Option<u64>,
    pub invalidation_poll_secs: Option<u64>,
}

impl FleetSettings {
    pub fn apply(&self, mut config: FleetConfig) -> FleetConfig {
        if let Some(v) = self.scale_poll_secs {
            config.scale_poll = Duration::from_secs(v);
        }
        if let Some(v) = self.recycle_poll_secs {
            config.recycle_poll = Duration::from_secs(v);
        }
        if let Some(v) = self.invalidation_poll_secs {
            config.invalidation_poll = Duration::from_secs(v);
        }
        config
    }
}

impl CliConfig {
    /// Load configuration from file
    pub fn load(path: Option<&str>) -> CliResult<Self> {
        let config_path = match path {
            Some(p) => PathBuf::from(p),
            None => Self::default_config_path()?,
        };

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)?;
            toml::from_str(&contents).map_err(|e| CliError::Config(e.to_string()))
        } else {
            Ok(CliConfig::default())
        }
    }

    /// Get the default configuration file path
    fn default_config_path() -> CliResult<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| CliError::Config("Cannot find config directory".into()))?;
        Ok(config_dir.join("stackforge").join("config.toml"))
    }

    /// Region: flag (or `AWS_DEFAULT_REGION`), then file, then default.
    pub fn region(&self, flag: Option<&str>) -> String {
        flag.map(str::to_string)
            .or_else(|| self.region.clone())
            .unwrap_or_else(|| DEFAULT_REGION.to_string())
    }

    /// Profile: flag, then the nearest profile file, then the environment,
    /// then file, then `default`.
    pub fn profile(&self, flag: Option<&str>, cwd: &Path) -> String {
        if let Some(profile) = flag {
            return profile.to_string();
        }
        find_profile_file(cwd)
            .or_else(|| std::env::var("AWS_PROFILE").ok())
            .or_else(|| std::env::var("AWS_DEFAULT_PROFILE").ok())
            .or_else(|| self.profile.clone())
            .unwrap_or_else(|| "default".to_string())
    }
}

/// Profile named by the first profile file found walking up from `dir`.
pub fn find_profile_file(dir: &Path) -> Option<String> {
    dir.ancestors().find_map(|d| {
        let contents = std::fs::read_to_string(d.join(PROFILE_FILE)).ok()?;
        let profile = contents.trim();
        (!profile.is_empty()).then(|| profile.to_string())
    })
}
