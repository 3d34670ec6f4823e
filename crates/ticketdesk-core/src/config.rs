use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::backend::{RetryPolicy, Tables};
use crate::realtime::ReconnectPolicy;

/// Project-local config location, relative to the working directory.
pub const LOCAL_CONFIG: &str = ".ticketdesk/config.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Display name recorded in audit entries.
    #[serde(default)]
    pub user: Option<String>,
    /// Preferred output mode: `pretty`, `text` or `json`.
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub realtime: RealtimeConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub tables: Tables,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            tables: Tables::default(),
            timeout_secs: default_timeout_secs(),
            retries: default_retries(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

impl BackendConfig {
    /// `(url, api_key)` when both are set and non-blank.
    #[must_use]
    pub fn credentials(&self) -> Option<(&str, &str)> {
        let url = self.url.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
        let key = self
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())?;
        Some((url, key))
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.retries,
            base_delay: Duration::from_millis(self.retry_delay_ms),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RealtimeConfig {
    #[serde(default = "default_channel")]
    pub channel: String,
    #[serde(default = "default_retry_backoff_secs")]
    pub retry_backoff_secs: u64,
    #[serde(default = "default_liveness_interval_secs")]
    pub liveness_interval_secs: u64,
    #[serde(default = "default_refresh_debounce_ms")]
    pub refresh_debounce_ms: u64,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            channel: default_channel(),
            retry_backoff_secs: default_retry_backoff_secs(),
            liveness_interval_secs: default_liveness_interval_secs(),
            refresh_debounce_ms: default_refresh_debounce_ms(),
        }
    }
}

impl RealtimeConfig {
    #[must_use]
    pub const fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            retry_backoff: Duration::from_secs(self.retry_backoff_secs),
            liveness_interval: Duration::from_secs(self.liveness_interval_secs),
        }
    }

    #[must_use]
    pub const fn refresh_debounce(&self) -> Duration {
        Duration::from_millis(self.refresh_debounce_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Application base URL hosting the relay endpoint.
    #[serde(default)]
    pub base_url: Option<String>,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            base_url: None,
        }
    }
}

impl NotifyConfig {
    /// Base URL when announcements are enabled and configured.
    #[must_use]
    pub fn target(&self) -> Option<&str> {
        if !self.enabled {
            return None;
        }
        self.base_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveConfig {
    pub config: Config,
    /// File the config was read from; `None` when defaults were used.
    pub source: Option<PathBuf>,
}

/// Pick the config file: an explicit path, else `./.ticketdesk/config.toml`,
/// else `<config dir>/ticketdesk/config.toml`. Only the explicit path may be
/// missing on disk (and then loading fails).
#[must_use]
pub fn config_path(explicit: Option<&Path>, cwd: &Path) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    let local = cwd.join(LOCAL_CONFIG);
    if local.exists() {
        return Some(local);
    }

    let user = dirs::config_dir()?.join("ticketdesk/config.toml");
    user.exists().then_some(user)
}

/// Parse one config file.
///
/// # Errors
///
/// Fails when the file cannot be read or is not valid TOML for [`Config`].
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<Config>(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Load the config for this invocation and apply environment overrides.
///
/// # Errors
///
/// Fails when the chosen file cannot be read or parsed.
pub fn resolve_config(explicit: Option<&Path>, cwd: &Path) -> Result<EffectiveConfig> {
    let source = config_path(explicit, cwd);
    let mut config = match &source {
        Some(path) => load_config(path)?,
        None => Config::default(),
    };
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    tracing::debug!(source = ?source, "config resolved");
    Ok(EffectiveConfig { config, source })
}

/// `TICKETDESK_URL` and `TICKETDESK_API_KEY` replace the file values when set.
pub fn apply_env_overrides<F>(config: &mut Config, env: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = env("TICKETDESK_URL").filter(|v| !v.trim().is_empty()) {
        config.backend.url = Some(url);
    }
    if let Some(key) = env("TICKETDESK_API_KEY").filter(|v| !v.trim().is_empty()) {
        config.backend.api_key = Some(key);
    }
}

const fn default_true() -> bool {
    true
}

const fn default_timeout_secs() -> u64 {
    30
}

const fn default_retries() -> u32 {
    3
}

const fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_channel() -> String {
    "tickets-changes".to_string()
}

const fn default_retry_backoff_secs() -> u64 {
    5
}

const fn default_liveness_interval_secs() -> u64 {
    30
}

const fn default_refresh_debounce_ms() -> u64 {
    100
}
