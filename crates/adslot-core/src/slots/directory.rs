//! AdSlotDirectory - スロット設定のキャッシュと検索
//!
//! # 鮮度
//! - 取得に成功したときだけ fresh とマークする
//! - 取得に失敗しても古いプールは捨てない（stale だが使える）
//! - 有効期間は設定値（`cache_validity_secs`）。0 なら常に期限切れ扱い
//! - refresh は 1 本ずつ。古い取得結果が新しいプールを上書きしない
//!
//! # 検索
//! プールが空・未取得でも検索はエラーにせず `None` / 0 を返す。
//! 呼び出し側は「広告なし」を通常の結果として扱う。

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::config::parse_payload;
use super::pool::AdSlotPool;
use super::selection::SlotSelectionPolicy;
use crate::domain::{SlotId, TaskType};
use crate::error::{AdError, ConfigError};
use crate::ports::{Clock, SlotConfigSource};

#[derive(Debug, Clone)]
struct CachedPool {
    pool: Arc<AdSlotPool>,
    fetched_at: DateTime<Utc>,
}

pub struct AdSlotDirectory {
    platform: String,
    source: Arc<dyn SlotConfigSource>,
    clock: Arc<dyn Clock>,
    cache_validity: Duration,
    policy: SlotSelectionPolicy,
    cache: RwLock<Option<CachedPool>>,
    refreshing: Mutex<()>,
}

impl AdSlotDirectory {
    pub fn new(
        platform: impl Into<String>,
        source: Arc<dyn SlotConfigSource>,
        clock: Arc<dyn Clock>,
        cache_validity: Duration,
    ) -> Self {
        Self {
            platform: platform.into(),
            source,
            clock,
            cache_validity,
            policy: SlotSelectionPolicy::new(),
            cache: RwLock::new(None),
            refreshing: Mutex::new(()),
        }
    }

    pub fn with_policy(mut self, policy: SlotSelectionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn platform(&self) -> &str {
        &self.platform
    }

    /// Fetch, parse and swap in a new pool.
    ///
    /// On failure the previous pool stays in place and keeps serving lookups.
    pub async fn refresh(&self) -> Result<(), ConfigError> {
        let _refreshing = self.refreshing.lock().await;
        let raw = match self.source.fetch_slot_configuration().await {
            Ok(raw) => raw,
            Err(err) => {
                warn!(platform = %self.platform, error = %err, "slot configuration fetch failed, keeping cached pool");
                return Err(err);
            }
        };
        let pool = match parse_payload(&raw, &self.platform) {
            Ok(pool) => pool,
            Err(err) => {
                warn!(platform = %self.platform, error = %err, "slot configuration rejected, keeping cached pool");
                return Err(err);
            }
        };
        info!(platform = %self.platform, tasks = pool.len(), "slot configuration refreshed");
        self.install_cached(pool, self.clock.now());
        Ok(())
    }

    /// Refresh only when the cache is missing or expired.
    pub async fn refresh_if_stale(&self) -> Result<(), ConfigError> {
        if self.is_cache_valid() {
            return Ok(());
        }
        self.refresh().await
    }

    /// Replace the pool wholesale, e.g. from an externally persisted blob.
    pub fn install_cached(&self, pool: AdSlotPool, fetched_at: DateTime<Utc>) {
        *self.cache.write() = Some(CachedPool {
            pool: Arc::new(pool),
            fetched_at,
        });
    }

    pub fn is_cache_valid(&self) -> bool {
        let cache = self.cache.read();
        match cache.as_ref() {
            Some(cached) => cached
                .fetched_at
                .checked_add_signed(self.cache_validity)
                .is_none_or(|expires_at| self.clock.now() < expires_at),
            None => false,
        }
    }

    pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
        self.cache.read().as_ref().map(|cached| cached.fetched_at)
    }

    pub fn snapshot(&self) -> Option<Arc<AdSlotPool>> {
        self.cache.read().as_ref().map(|cached| Arc::clone(&cached.pool))
    }

    /// Like `snapshot`, for callers that want the unavailable case as an error.
    pub fn require_pool(&self) -> Result<Arc<AdSlotPool>, AdError> {
        self.snapshot().ok_or(AdError::ConfigurationUnavailable)
    }

    pub fn current_slot(&self, task: TaskType, view_count: u64) -> Option<SlotId> {
        let pool = self.snapshot()?;
        self.policy.current_slot(&pool, task, view_count)
    }

    pub fn next_slot(&self, task: TaskType, view_count: u64) -> Option<SlotId> {
        let pool = self.snapshot()?;
        self.policy.next_slot(&pool, task, view_count)
    }

    /// Per-task cooldown in seconds; 0 means none.
    pub fn watch_interval(&self, task: TaskType) -> u64 {
        self.snapshot()
            .map(|pool| pool.watch_interval_secs(task))
            .unwrap_or(0)
    }

    pub fn has_available_slots(&self, task: TaskType) -> bool {
        self.snapshot()
            .map(|pool| !pool.slots(task).is_empty())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::StaticSlotSource;
    use crate::ports::FixedClock;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::collections::VecDeque;

    /// Answers each fetch with the next payload after its delay.
    struct DelayedSource {
        responses: parking_lot::Mutex<VecDeque<(std::time::Duration, String)>>,
    }

    #[async_trait]
    impl SlotConfigSource for DelayedSource {
        async fn fetch_slot_configuration(&self) -> Result<String, ConfigError> {
            let next = self.responses.lock().pop_front();
            let (delay, payload) = next.ok_or_else(|| ConfigError::Fetch("no response".to_string()))?;
            tokio::time::sleep(delay).await;
            Ok(payload)
        }
    }

    const PAYLOAD: &str = r#"{
        "ios": [
            { "taskId": "daily_task", "taskName": "Daily", "slotIds": ["A", "B", "C"], "watchIntervalSeconds": 60 },
            { "taskId": "swipe_task", "taskName": "Swipe", "slotIds": ["S1"] }
        ]
    }"#;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    fn directory(source: Arc<StaticSlotSource>, clock: Arc<FixedClock>, validity_secs: i64) -> AdSlotDirectory {
        AdSlotDirectory::new("ios", source, clock, Duration::seconds(validity_secs))
    }

    #[tokio::test]
    async fn lookups_before_any_fetch_degrade_to_unavailable() {
        let dir = directory(
            Arc::new(StaticSlotSource::new(PAYLOAD)),
            Arc::new(FixedClock::new(start())),
            3600,
        );
        assert_eq!(dir.current_slot(TaskType::DailyTask, 0), None);
        assert_eq!(dir.next_slot(TaskType::DailyTask, 0), None);
        assert_eq!(dir.watch_interval(TaskType::DailyTask), 0);
        assert!(!dir.has_available_slots(TaskType::DailyTask));
        assert_eq!(dir.require_pool().unwrap_err(), AdError::ConfigurationUnavailable);
    }

    #[tokio::test]
    async fn refresh_serves_the_documented_example() {
        let dir = directory(
            Arc::new(StaticSlotSource::new(PAYLOAD)),
            Arc::new(FixedClock::new(start())),
            3600,
        );
        dir.refresh().await.unwrap();

        assert_eq!(dir.current_slot(TaskType::DailyTask, 4), Some(SlotId::from("B")));
        assert_eq!(dir.next_slot(TaskType::DailyTask, 4), Some(SlotId::from("C")));
        assert_eq!(dir.watch_interval(TaskType::DailyTask), 60);
        assert_eq!(dir.current_slot(TaskType::Feed, 12), None);
        assert!(!dir.has_available_slots(TaskType::Feed));
        assert_eq!(dir.fetched_at(), Some(start()));
    }

    #[tokio::test]
    async fn failed_refresh_keeps_the_stale_pool() {
        let source = Arc::new(StaticSlotSource::new(PAYLOAD));
        let dir = directory(Arc::clone(&source), Arc::new(FixedClock::new(start())), 3600);
        dir.refresh().await.unwrap();

        source.fail_with("gateway timeout");
        assert!(matches!(dir.refresh().await, Err(ConfigError::Fetch(_))));
        assert!(dir.has_available_slots(TaskType::DailyTask));

        source.set_payload("[]");
        assert!(dir.refresh().await.is_err());
        assert!(dir.has_available_slots(TaskType::DailyTask));
    }

    #[tokio::test]
    async fn successful_refresh_drops_tasks_missing_from_the_payload() {
        let source = Arc::new(StaticSlotSource::new(PAYLOAD));
        let dir = directory(Arc::clone(&source), Arc::new(FixedClock::new(start())), 3600);
        dir.refresh().await.unwrap();
        assert!(dir.has_available_slots(TaskType::SwipeTask));

        source.set_payload(
            r#"{ "ios": [ { "taskId": "daily_task", "taskName": "Daily", "slotIds": ["Z"] } ] }"#,
        );
        dir.refresh().await.unwrap();
        assert!(!dir.has_available_slots(TaskType::SwipeTask));
        assert_eq!(dir.current_slot(TaskType::DailyTask, 4), Some(SlotId::from("Z")));
    }

    #[tokio::test]
    async fn cache_validity_window_is_configurable() {
        let source = Arc::new(StaticSlotSource::new(PAYLOAD));
        let clock = Arc::new(FixedClock::new(start()));
        let dir = directory(Arc::clone(&source), Arc::clone(&clock), 600);

        dir.refresh_if_stale().await.unwrap();
        dir.refresh_if_stale().await.unwrap();
        assert_eq!(source.fetch_count(), 1);
        assert!(dir.is_cache_valid());

        clock.advance(Duration::seconds(601));
        assert!(!dir.is_cache_valid());
        dir.refresh_if_stale().await.unwrap();
        assert_eq!(source.fetch_count(), 2);
    }

    #[tokio::test]
    async fn zero_validity_always_refetches() {
        let source = Arc::new(StaticSlotSource::new(PAYLOAD));
        let dir = directory(Arc::clone(&source), Arc::new(FixedClock::new(start())), 0);
        dir.refresh_if_stale().await.unwrap();
        assert!(!dir.is_cache_valid());
        dir.refresh_if_stale().await.unwrap();
        assert_eq!(source.fetch_count(), 2);
    }

    #[tokio::test]
    async fn installed_cache_serves_until_it_expires() {
        let source = Arc::new(StaticSlotSource::new(PAYLOAD));
        let clock = Arc::new(FixedClock::new(start()));
        let dir = directory(Arc::clone(&source), Arc::clone(&clock), 600);

        dir.install_cached(
            AdSlotPool::new().with_slots(TaskType::Feed, &["cached"], 0),
            start() - Duration::seconds(60),
        );
        dir.refresh_if_stale().await.unwrap();
        assert_eq!(source.fetch_count(), 0);
        assert_eq!(dir.current_slot(TaskType::Feed, 0), Some(SlotId::from("cached")));
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_refreshes_install_in_call_order() {
        let slow = r#"{ "ios": [ { "taskId": "feed", "taskName": "Feed", "slotIds": ["old"] } ] }"#;
        let fast = r#"{ "ios": [ { "taskId": "feed", "taskName": "Feed", "slotIds": ["new"] } ] }"#;
        let source = Arc::new(DelayedSource {
            responses: parking_lot::Mutex::new(VecDeque::from([
                (std::time::Duration::from_millis(100), slow.to_string()),
                (std::time::Duration::ZERO, fast.to_string()),
            ])),
        });
        let dir = Arc::new(AdSlotDirectory::new(
            "ios",
            source,
            Arc::new(FixedClock::new(start())),
            Duration::seconds(0),
        ));

        let first = tokio::spawn({
            let dir = Arc::clone(&dir);
            async move { dir.refresh().await }
        });
        tokio::time::sleep(std::time::Duration::from_millis(1)).await;
        let second = tokio::spawn({
            let dir = Arc::clone(&dir);
            async move { dir.refresh().await }
        });

        first.await.unwrap().unwrap();
        second.await.unwrap().unwrap();
        assert_eq!(dir.current_slot(TaskType::Feed, 0), Some(SlotId::from("new")));
    }
}
