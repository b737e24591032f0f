//! Config - 広告コアの設定
//!
//! JSON から読み込み、欠けている項目はデフォルト値で埋める。

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::{SlotId, TaskType};
use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdCenterConfig {
    /// Platform key selected from the slot configuration payload.
    pub platform: String,

    pub load_timeout_ms: u64,

    /// Wait between a `closed` event and removal from the registry.
    pub close_grace_ms: u64,

    /// Let `show()` start a load when nothing is loaded yet.
    pub auto_load: bool,

    /// How long a fetched slot pool stays fresh. 0 means every lookup of
    /// freshness fails and `refresh_if_stale` always refetches.
    pub cache_validity_secs: u64,

    pub banner_refresh_secs: u64,
    pub banner_min_reload_secs: u64,

    pub splash_load_timeout_ms: u64,

    /// Slot tried once when the selected slot fails to load.
    pub fallback_slots: HashMap<TaskType, SlotId>,

    /// Passed through to the SDK for server-side reward verification.
    pub user_id: Option<String>,
}

impl Default for AdCenterConfig {
    fn default() -> Self {
        Self {
            platform: "ios".to_string(),
            load_timeout_ms: 15_000,
            close_grace_ms: 500,
            auto_load: true,
            cache_validity_secs: 0,
            banner_refresh_secs: 30,
            banner_min_reload_secs: 10,
            splash_load_timeout_ms: 3_500,
            fallback_slots: HashMap::new(),
            user_id: None,
        }
    }
}

impl AdCenterConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.platform.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "platform",
                reason: "must not be empty".to_string(),
            });
        }
        let non_zero = [
            ("load_timeout_ms", self.load_timeout_ms),
            ("splash_load_timeout_ms", self.splash_load_timeout_ms),
            ("banner_refresh_secs", self.banner_refresh_secs),
        ];
        for (field, value) in non_zero {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    field,
                    reason: "must be greater than zero".to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn reward_options(&self) -> RewardAdOptions {
        RewardAdOptions {
            load_timeout: Duration::from_millis(self.load_timeout_ms),
            close_grace: Duration::from_millis(self.close_grace_ms),
            auto_load: self.auto_load,
        }
    }

    pub fn banner_options(&self) -> BannerOptions {
        BannerOptions {
            refresh_interval: Duration::from_secs(self.banner_refresh_secs),
            min_reload_interval: Duration::from_secs(self.banner_min_reload_secs),
        }
    }

    pub fn splash_options(&self) -> SplashOptions {
        SplashOptions {
            load_timeout: Duration::from_millis(self.splash_load_timeout_ms),
        }
    }

    pub fn cache_validity(&self) -> chrono::Duration {
        i64::try_from(self.cache_validity_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or(chrono::Duration::MAX)
    }
}

/// Behavior knobs of a `RewardAdInstance`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RewardAdOptions {
    pub load_timeout: Duration,
    pub close_grace: Duration,
    pub auto_load: bool,
}

impl Default for RewardAdOptions {
    fn default() -> Self {
        AdCenterConfig::default().reward_options()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BannerOptions {
    pub refresh_interval: Duration,
    pub min_reload_interval: Duration,
}

impl Default for BannerOptions {
    fn default() -> Self {
        AdCenterConfig::default().banner_options()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplashOptions {
    pub load_timeout: Duration,
}

impl Default for SplashOptions {
    fn default() -> Self {
        AdCenterConfig::default().splash_options()
    }
}
