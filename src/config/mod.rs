// ABOUTME: Settings for ecsdeploy from ecsdeploy.yml and the environment.
// ABOUTME: The file is optional; environment values override it, CLI flags override both.

use crate::api::ClientConfig;
use crate::deploy::{CompletionStrategy, DEFAULT_TIMEOUT, POLL_INTERVAL};
use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILENAME: &str = "ecsdeploy.yml";
pub const CONFIG_FILENAME_ALT: &str = "ecsdeploy.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".ecsdeploy/config.yml";

/// Control-plane endpoint used when nothing else is configured.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:4566";

pub const ENV_PROFILE: &str = "AWS_PROFILE";
pub const ENV_REGION: &str = "AWS_REGION";
pub const ENV_DEFAULT_REGION: &str = "AWS_DEFAULT_REGION";
pub const ENV_ENDPOINT: &str = "ECSDEPLOY_ENDPOINT";
pub const ENV_EVENTS_ENDPOINT: &str = "ECSDEPLOY_EVENTS_ENDPOINT";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub profile: Option<String>,
    pub region: Option<String>,
    pub endpoint: String,
    pub events_endpoint: Option<String>,

    /// Deadline for a service rollout to become live.
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,

    pub completion: CompletionStrategy,
    pub rollback: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            profile: None,
            region: None,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            events_endpoint: None,
            timeout: DEFAULT_TIMEOUT,
            poll_interval: POLL_INTERVAL,
            completion: CompletionStrategy::default(),
            rollback: false,
        }
    }
}

impl Settings {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let settings: Settings = serde_yaml::from_str(yaml)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// First config file found in `dir`, if any.
    pub fn find(dir: &Path) -> Option<PathBuf> {
        [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ]
        .into_iter()
        .find(|path| path.exists())
    }

    /// Load the config file in `dir`, or defaults when there is none.
    pub fn discover(dir: &Path) -> Result<Self> {
        match Self::find(dir) {
            Some(path) => {
                tracing::debug!(path = %path.display(), "loading settings");
                Self::load(&path)
            }
            None => Ok(Self::default()),
        }
    }

    /// Overlay values from the process environment.
    pub fn apply_env(self) -> Self {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Overlay values from `lookup`; empty values are ignored.
    pub fn apply_env_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(profile) = get(ENV_PROFILE) {
            self.profile = Some(profile);
        }
        if let Some(region) = get(ENV_REGION).or_else(|| get(ENV_DEFAULT_REGION)) {
            self.region = Some(region);
        }
        if let Some(endpoint) = get(ENV_ENDPOINT) {
            self.endpoint = endpoint;
        }
        if let Some(endpoint) = get(ENV_EVENTS_ENDPOINT) {
            self.events_endpoint = Some(endpoint);
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(Error::InvalidConfig(
                "poll_interval must be greater than zero".to_string(),
            ));
        }
        if self.endpoint.trim().is_empty() {
            return Err(Error::InvalidConfig("endpoint cannot be empty".to_string()));
        }
        Ok(())
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            endpoint: self.endpoint.clone(),
            events_endpoint: self.events_endpoint.clone(),
            region: self.region.clone(),
            profile: self.profile.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn empty_file_gives_defaults() {
        let settings = Settings::from_yaml("").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.timeout, Duration::from_secs(300));
        assert_eq!(settings.poll_interval, Duration::from_secs(5));
    }

    #[test]
    fn parses_humantime_durations() {
        let settings = Settings::from_yaml(
            r#"
region: eu-west-1
timeout: 10m
poll_interval: 2s
completion: tasks
rollback: true
"#,
        )
        .unwrap();

        assert_eq!(settings.region.as_deref(), Some("eu-west-1"));
        assert_eq!(settings.timeout, Duration::from_secs(600));
        assert_eq!(settings.poll_interval, Duration::from_secs(2));
        assert_eq!(settings.completion, CompletionStrategy::RunningTasks);
        assert!(settings.rollback);
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        let err = Settings::from_yaml("poll_interval: 0s").unwrap_err();
        assert!(err.to_string().contains("poll_interval"));
    }

    #[test]
    fn env_overrides_file_values() {
        let env: HashMap<&str, &str> = [
            (ENV_PROFILE, "staging"),
            (ENV_DEFAULT_REGION, "us-west-2"),
            (ENV_ENDPOINT, "http://127.0.0.1:5000"),
        ]
        .into_iter()
        .collect();

        let settings = Settings::from_yaml("region: eu-west-1\nprofile: default")
            .unwrap()
            .apply_env_from(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(settings.profile.as_deref(), Some("staging"));
        assert_eq!(settings.region.as_deref(), Some("us-west-2"));
        assert_eq!(settings.endpoint, "http://127.0.0.1:5000");
    }

    #[test]
    fn aws_region_wins_over_default_region() {
        let settings = Settings::default().apply_env_from(|key| match key {
            ENV_REGION => Some("ap-northeast-1".to_string()),
            ENV_DEFAULT_REGION => Some("us-east-1".to_string()),
            _ => None,
        });
        assert_eq!(settings.region.as_deref(), Some("ap-northeast-1"));
    }

    #[test]
    fn empty_env_values_are_ignored() {
        let settings = Settings::default().apply_env_from(|key| match key {
            ENV_ENDPOINT => Some(String::new()),
            _ => None,
        });
        assert_eq!(settings.endpoint, DEFAULT_ENDPOINT);
    }
}
