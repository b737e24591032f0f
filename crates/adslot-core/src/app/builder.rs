//! AdCenterBuilder - 広告コアの組み立て
//!
//! # 方針
//! - グローバルなシングルトンは持たない。依存はすべて builder で渡す
//! - 起動時に設定を検証し、足りない依存があれば build() で失敗する

use std::sync::Arc;

use super::center::AdCenter;
use crate::config::AdCenterConfig;
use crate::error::ConfigError;
use crate::ports::{AdRequestConfig, AdSdk, Clock, SlotConfigSource, SystemClock};
use crate::reward::RewardAdRegistry;
use crate::slots::{AdSlotDirectory, SlotSelectionPolicy};
use crate::splash::SplashGate;

/// AdCenterBuilder は AdCenter を構築
///
/// # 使用例
/// ```ignore
/// let center = AdCenterBuilder::new()
///     .config(config)
///     .sdk(sdk)
///     .slot_source(source)
///     .build()?;
/// ```
pub struct AdCenterBuilder {
    config: AdCenterConfig,
    sdk: Option<Arc<dyn AdSdk>>,
    source: Option<Arc<dyn SlotConfigSource>>,
    clock: Arc<dyn Clock>,
    policy: Option<SlotSelectionPolicy>,
    show_splash: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("no ad sdk was provided")]
    MissingSdk,

    #[error("no slot configuration source was provided")]
    MissingSlotSource,

    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),
}

impl AdCenterBuilder {
    pub fn new() -> Self {
        Self {
            config: AdCenterConfig::default(),
            sdk: None,
            source: None,
            clock: Arc::new(SystemClock),
            policy: None,
            show_splash: true,
        }
    }

    pub fn config(mut self, config: AdCenterConfig) -> Self {
        self.config = config;
        self
    }

    pub fn sdk(mut self, sdk: Arc<dyn AdSdk>) -> Self {
        self.sdk = Some(sdk);
        self
    }

    pub fn slot_source(mut self, source: Arc<dyn SlotConfigSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Fixed-seed policy for reproducible random selection.
    pub fn selection_policy(mut self, policy: SlotSelectionPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Whether a splash ad may be shown this session.
    pub fn show_splash(mut self, show: bool) -> Self {
        self.show_splash = show;
        self
    }

    /// Must be called inside a tokio runtime.
    pub fn build(self) -> Result<AdCenter, BuildError> {
        self.config.validate()?;
        let sdk = self.sdk.ok_or(BuildError::MissingSdk)?;
        let source = self.source.ok_or(BuildError::MissingSlotSource)?;

        let mut directory = AdSlotDirectory::new(
            self.config.platform.clone(),
            source,
            self.clock,
            self.config.cache_validity(),
        );
        if let Some(policy) = self.policy {
            directory = directory.with_policy(policy);
        }
        let registry = RewardAdRegistry::with_default_config(
            Arc::clone(&sdk),
            self.config.reward_options(),
            AdRequestConfig {
                user_id: self.config.user_id.clone(),
                ..AdRequestConfig::default()
            },
        );
        let gate = Arc::new(SplashGate::new(self.show_splash));
        Ok(AdCenter::new(self.config, sdk, directory, registry, gate))
    }
}

impl Default for AdCenterBuilder {
    fn default() -> Self {
        Self::new()
    }
}
