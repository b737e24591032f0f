//! AdCenter - UI 層から見た広告コアの窓口
//!
//! # フロー（watch_ad_for_task）
//! 1. 視聴回数からスロットを選ぶ（プールが空なら Unavailable）
//! 2. レジストリ経由で表示（未ロードなら自動ロード）
//! 3. 読み込みに失敗し、フォールバックスロットがあれば 1 回だけ試す
//! 4. 逐次タスクは次のスロットを裏で先読みする

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::banner::BannerAdInstance;
use crate::config::AdCenterConfig;
use crate::domain::{RewardAdState, SlotId, TaskProgress, TaskType};
use crate::error::{AdError, ConfigError};
use crate::ports::{AdRequestConfig, AdSdk, PresentationSurface};
use crate::reward::{EventSubscription, RewardAdRegistry};
use crate::slots::AdSlotDirectory;
use crate::splash::{SplashAdInstance, SplashGate};

/// Result of `watch_ad_for_task`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchOutcome {
    /// Presentation started. Follow the event stream for reward and close.
    Presented {
        slot_id: SlotId,
        used_fallback: bool,
        /// Slot being preloaded for the following view, if any.
        preloading: Option<SlotId>,
    },
    /// No slot is configured for the task.
    Unavailable,
}

pub struct AdCenter {
    config: AdCenterConfig,
    sdk: Arc<dyn AdSdk>,
    directory: AdSlotDirectory,
    registry: Arc<RewardAdRegistry>,
    splash_gate: Arc<SplashGate>,
}

impl AdCenter {
    pub(crate) fn new(
        config: AdCenterConfig,
        sdk: Arc<dyn AdSdk>,
        directory: AdSlotDirectory,
        registry: RewardAdRegistry,
        splash_gate: Arc<SplashGate>,
    ) -> Self {
        Self {
            config,
            sdk,
            directory,
            registry: Arc::new(registry),
            splash_gate,
        }
    }

    pub fn config(&self) -> &AdCenterConfig {
        &self.config
    }

    pub fn directory(&self) -> &AdSlotDirectory {
        &self.directory
    }

    pub fn registry(&self) -> &Arc<RewardAdRegistry> {
        &self.registry
    }

    /// Force a slot configuration fetch.
    pub async fn refresh_slots(&self) -> Result<(), ConfigError> {
        self.directory.refresh().await
    }

    /// Fetch only when the cached slot configuration is missing or expired.
    pub async fn ensure_slots(&self) -> Result<(), ConfigError> {
        self.directory.refresh_if_stale().await
    }

    pub fn current_slot(&self, task: TaskType, progress: &TaskProgress) -> Option<SlotId> {
        self.directory.current_slot(task, progress.view_count(task))
    }

    pub fn next_slot(&self, task: TaskType, progress: &TaskProgress) -> Option<SlotId> {
        self.directory.next_slot(task, progress.view_count(task))
    }

    pub fn watch_interval(&self, task: TaskType) -> u64 {
        self.directory.watch_interval(task)
    }

    pub fn has_available_slots(&self, task: TaskType) -> bool {
        self.directory.has_available_slots(task)
    }

    pub async fn preload_ad(&self, slot_id: &SlotId) -> Result<(), AdError> {
        self.registry.preload(slot_id, None).await
    }

    pub async fn show_ad(&self, slot_id: &SlotId, surface: PresentationSurface) -> Result<(), AdError> {
        self.registry.show(slot_id, surface).await
    }

    pub async fn is_ad_ready(&self, slot_id: &SlotId) -> bool {
        self.registry.is_ready(slot_id).await
    }

    pub async fn ad_state(&self, slot_id: &SlotId) -> RewardAdState {
        self.registry.state(slot_id).await
    }

    /// Human readable state for debug overlays, e.g. `"loaded"`.
    pub async fn state_description(&self, slot_id: &SlotId) -> String {
        self.registry.state(slot_id).await.to_string()
    }

    pub fn subscribe(&self) -> EventSubscription {
        self.registry.subscribe()
    }

    pub fn subscribe_slot(&self, slot_id: &SlotId) -> EventSubscription {
        self.registry.subscribe_slot(slot_id)
    }

    /// Preload the slot the next `watch_ad_for_task` would use.
    pub async fn preload_for_task(
        &self,
        task: TaskType,
        progress: &TaskProgress,
    ) -> Result<Option<SlotId>, AdError> {
        let Some(slot_id) = self.current_slot(task, progress) else {
            return Ok(None);
        };
        self.registry.preload(&slot_id, None).await?;
        Ok(Some(slot_id))
    }

    /// Select, present and preload ahead for `task`.
    pub async fn watch_ad_for_task(
        &self,
        task: TaskType,
        progress: &TaskProgress,
        surface: PresentationSurface,
    ) -> Result<WatchOutcome, AdError> {
        let Some(slot_id) = self.current_slot(task, progress) else {
            info!(%task, "no ad slot configured");
            return Ok(WatchOutcome::Unavailable);
        };

        let (slot_id, used_fallback) = match self.registry.show(&slot_id, surface.clone()).await {
            Ok(()) => (slot_id, false),
            Err(error @ (AdError::LoadFailed(_) | AdError::LoadTimeout)) => {
                let Some(fallback) = self.fallback_for(task, &slot_id) else {
                    return Err(error);
                };
                warn!(%task, failed = %slot_id, %fallback, %error, "trying fallback slot");
                self.registry.show(&fallback, surface).await?;
                (fallback, true)
            }
            Err(error) => return Err(error),
        };

        let preloading = self.preload_ahead(task, progress, &slot_id);
        info!(%task, %slot_id, used_fallback, "ad presentation started");
        Ok(WatchOutcome::Presented {
            slot_id,
            used_fallback,
            preloading,
        })
    }

    fn fallback_for(&self, task: TaskType, failed: &SlotId) -> Option<SlotId> {
        self.config
            .fallback_slots
            .get(&task)
            .filter(|fallback| *fallback != failed)
            .cloned()
    }

    /// Start loading the next slot in the background for preloading task types.
    fn preload_ahead(&self, task: TaskType, progress: &TaskProgress, shown: &SlotId) -> Option<SlotId> {
        let next = self.next_slot(task, progress)?;
        // 1 スロットしかないときは表示中のインスタンスと同じになる
        if next == *shown {
            return None;
        }
        let registry = Arc::clone(&self.registry);
        let slot_id = next.clone();
        tokio::spawn(async move {
            match registry.preload(&slot_id, None).await {
                Ok(()) => debug!(%slot_id, "next slot preloaded"),
                Err(error) => warn!(%slot_id, %error, "next slot preload failed"),
            }
        });
        Some(next)
    }

    /// Banner bound to `slot_id`, configured from this center's settings.
    pub fn banner(&self, slot_id: SlotId) -> Arc<BannerAdInstance> {
        BannerAdInstance::new(
            slot_id,
            self.request_config(),
            self.config.banner_options(),
            Arc::clone(&self.sdk),
        )
    }

    /// Splash ad sharing this center's session gate.
    pub fn splash(&self, slot_id: SlotId) -> SplashAdInstance {
        SplashAdInstance::new(
            slot_id,
            self.request_config(),
            self.config.splash_options(),
            Arc::clone(&self.sdk),
            Arc::clone(&self.splash_gate),
        )
    }

    pub fn splash_gate(&self) -> &Arc<SplashGate> {
        &self.splash_gate
    }

    /// Destroy every tracked reward instance, e.g. on app exit.
    pub async fn shutdown(&self) {
        self.registry.clear().await;
    }

    fn request_config(&self) -> AdRequestConfig {
        AdRequestConfig {
            user_id: self.config.user_id.clone(),
            ..AdRequestConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::AdCenterBuilder;
    use crate::domain::{BannerState, RewardAdEvent};
    use crate::error::SdkError;
    use crate::impls::{SimulatedSdk, StaticSlotSource};
    use crate::slots::SlotSelectionPolicy;
    use crate::splash::SplashOutcome;
    use std::collections::HashMap;
    use std::time::Duration;

    const PAYLOAD: &str = r#"{
        "ios": [
            { "taskId": "daily_task", "taskName": "Daily", "slotIds": ["A", "B", "C"], "watchIntervalSeconds": 60 },
            { "taskId": "swipe_task", "taskName": "Swipe", "slotIds": ["S1"] },
            { "taskId": "feed", "taskName": "Feed", "slotIds": [] }
        ]
    }"#;

    fn auto_sdk() -> Arc<SimulatedSdk> {
        Arc::new(SimulatedSdk::auto(Duration::from_millis(100), Duration::from_secs(5)))
    }

    async fn center_with(sdk: &Arc<SimulatedSdk>, config: AdCenterConfig) -> AdCenter {
        let center = AdCenterBuilder::new()
            .config(config)
            .sdk(Arc::clone(sdk) as Arc<dyn AdSdk>)
            .slot_source(Arc::new(StaticSlotSource::new(PAYLOAD)))
            .selection_policy(SlotSelectionPolicy::seeded(7))
            .build()
            .unwrap();
        center.refresh_slots().await.unwrap();
        center
    }

    async fn center(sdk: &Arc<SimulatedSdk>) -> AdCenter {
        center_with(sdk, AdCenterConfig::default()).await
    }

    fn surface() -> PresentationSurface {
        PresentationSurface::new("task-center")
    }

    #[tokio::test(start_paused = true)]
    async fn lookups_follow_the_directory() {
        let sdk = auto_sdk();
        let center = center(&sdk).await;
        let progress = TaskProgress::new().with_count(TaskType::DailyTask, 4);

        assert_eq!(center.current_slot(TaskType::DailyTask, &progress), Some(SlotId::from("B")));
        assert_eq!(center.next_slot(TaskType::DailyTask, &progress), Some(SlotId::from("C")));
        assert_eq!(center.watch_interval(TaskType::DailyTask), 60);
        assert!(!center.has_available_slots(TaskType::Feed));
        assert_eq!(center.current_slot(TaskType::Feed, &progress), None);
    }

    #[tokio::test(start_paused = true)]
    async fn watch_presents_current_and_preloads_next() {
        let sdk = auto_sdk();
        let center = center(&sdk).await;
        let progress = TaskProgress::new().with_count(TaskType::DailyTask, 4);

        let outcome = center
            .watch_ad_for_task(TaskType::DailyTask, &progress, surface())
            .await
            .unwrap();
        assert_eq!(
            outcome,
            WatchOutcome::Presented {
                slot_id: SlotId::from("B"),
                used_fallback: false,
                preloading: Some(SlotId::from("C")),
            }
        );
        assert_eq!(center.ad_state(&SlotId::from("B")).await, RewardAdState::Showing);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(center.is_ad_ready(&SlotId::from("C")).await);
        assert_eq!(center.state_description(&SlotId::from("C")).await, "video_downloaded");
    }

    #[tokio::test(start_paused = true)]
    async fn single_slot_task_does_not_preload_itself() {
        let sdk = auto_sdk();
        let center = center(&sdk).await;

        let outcome = center
            .watch_ad_for_task(TaskType::SwipeTask, &TaskProgress::new(), surface())
            .await
            .unwrap();
        assert!(matches!(outcome, WatchOutcome::Presented { preloading: None, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn empty_pool_is_unavailable() {
        let sdk = auto_sdk();
        let center = center(&sdk).await;

        let outcome = center
            .watch_ad_for_task(TaskType::Feed, &TaskProgress::new(), surface())
            .await;
        assert_eq!(outcome, Ok(WatchOutcome::Unavailable));
        assert_eq!(sdk.requests().len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn load_failure_falls_back_once() {
        let sdk = auto_sdk();
        let config = AdCenterConfig {
            fallback_slots: HashMap::from([(TaskType::DailyTask, SlotId::from("FB"))]),
            ..AdCenterConfig::default()
        };
        let center = center_with(&sdk, config).await;
        sdk.fail_next_create(SdkError::new(-1, "placement disabled"));

        let outcome = center
            .watch_ad_for_task(TaskType::DailyTask, &TaskProgress::new(), surface())
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            WatchOutcome::Presented { ref slot_id, used_fallback: true, .. } if *slot_id == SlotId::from("FB")
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn load_failure_without_fallback_is_returned() {
        let sdk = auto_sdk();
        let center = center(&sdk).await;
        let err = SdkError::new(-1, "placement disabled");
        sdk.fail_next_create(err.clone());

        let outcome = center
            .watch_ad_for_task(TaskType::DailyTask, &TaskProgress::new(), surface())
            .await;
        assert_eq!(outcome, Err(AdError::LoadFailed(err)));
    }

    #[tokio::test(start_paused = true)]
    async fn full_watch_is_observable_and_cleaned_up() {
        let sdk = auto_sdk();
        let center = center(&sdk).await;
        let a = SlotId::from("A");
        let mut events = center.subscribe_slot(&a);

        center
            .watch_ad_for_task(TaskType::DailyTask, &TaskProgress::new(), surface())
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(6)).await;

        let kinds: Vec<_> = events.drain().into_iter().map(|e| e.event).collect();
        assert!(kinds.contains(&RewardAdEvent::RewardSuccess));
        assert_eq!(kinds.last(), Some(&RewardAdEvent::Closed));
        assert!(!center.registry().contains(&a).await);
    }

    #[tokio::test(start_paused = true)]
    async fn splash_and_banner_share_the_sdk() {
        let sdk = auto_sdk();
        let center = center(&sdk).await;
        center.splash_gate().enter_splash_view();

        let banner = center.banner(SlotId::from("banner-1"));
        banner.load(PresentationSurface::new("feed-header")).unwrap();
        let splash = center.splash(SlotId::from("splash-1"));
        let run = tokio::spawn(async move { splash.run(PresentationSurface::new("launch")).await });
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(banner.state(), BannerState::Showing);

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(run.await.unwrap(), Ok(SplashOutcome::Dismissed));
        assert!(center.splash_gate().has_shown_this_session());

        center.shutdown().await;
        assert!(center.registry().is_empty().await);
    }
}
