//! RewardAdRegistry - slot_id ごとに RewardAdInstance を 1 つだけ持つ
//!
//! # 同時実行
//! - マップは `tokio::sync::RwLock`。参照は read、生成・削除は write
//! - 同じ slot_id への同時 `get_or_create` は同じインスタンスを返す
//!
//! # 自動削除
//! インスタンスは close 後の猶予時間が過ぎると `Retirement` を送る。
//! reaper タスクが受け取り、マップ上のインスタンスが同じ instance_id で、
//! かつ close 後に読み込み直されていないときだけ取り除く。

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::instance::{RewardAdInstance, Retirement};
use super::subscription::{EVENT_CAPACITY, EventSubscription};
use crate::config::RewardAdOptions;
use crate::domain::{RewardAdState, SlotEvent, SlotId};
use crate::error::AdError;
use crate::ports::{AdRequestConfig, AdSdk, PresentationSurface};

type InstanceMap = Arc<RwLock<HashMap<SlotId, Arc<RewardAdInstance>>>>;

pub struct RewardAdRegistry {
    sdk: Arc<dyn AdSdk>,
    options: RewardAdOptions,
    default_config: AdRequestConfig,
    instances: InstanceMap,
    events: broadcast::Sender<SlotEvent>,
    retire_tx: mpsc::UnboundedSender<Retirement>,
    reaper: JoinHandle<()>,
}

impl RewardAdRegistry {
    /// Must be called inside a tokio runtime.
    pub fn new(sdk: Arc<dyn AdSdk>, options: RewardAdOptions) -> Self {
        Self::with_default_config(sdk, options, AdRequestConfig::default())
    }

    /// `default_config` is used for instances created without their own config.
    pub fn with_default_config(
        sdk: Arc<dyn AdSdk>,
        options: RewardAdOptions,
        default_config: AdRequestConfig,
    ) -> Self {
        let instances: InstanceMap = Arc::new(RwLock::new(HashMap::new()));
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (retire_tx, retire_rx) = mpsc::unbounded_channel();
        let reaper = tokio::spawn(reap(Arc::clone(&instances), retire_rx));
        Self {
            sdk,
            options,
            default_config,
            instances,
            events,
            retire_tx,
            reaper,
        }
    }

    pub fn options(&self) -> RewardAdOptions {
        self.options
    }

    /// Existing instance for `slot_id`, or a new one built from `config`.
    ///
    /// `config` only matters when the instance is created here.
    pub async fn get_or_create(
        &self,
        slot_id: &SlotId,
        config: Option<AdRequestConfig>,
    ) -> Arc<RewardAdInstance> {
        if let Some(instance) = self.instances.read().await.get(slot_id) {
            return Arc::clone(instance);
        }

        let mut instances = self.instances.write().await;
        // 書き込みロック待ちの間に他のタスクが作っている可能性がある
        if let Some(instance) = instances.get(slot_id) {
            return Arc::clone(instance);
        }
        let instance = RewardAdInstance::wired(
            slot_id.clone(),
            config.unwrap_or_else(|| self.default_config.clone()),
            self.options,
            Arc::clone(&self.sdk),
            self.events.clone(),
            Some(self.retire_tx.clone()),
        );
        info!(%slot_id, instance_id = %instance.instance_id(), "registered reward ad instance");
        instances.insert(slot_id.clone(), Arc::clone(&instance));
        instance
    }

    pub async fn get(&self, slot_id: &SlotId) -> Option<Arc<RewardAdInstance>> {
        self.instances.read().await.get(slot_id).cloned()
    }

    pub async fn preload(
        &self,
        slot_id: &SlotId,
        config: Option<AdRequestConfig>,
    ) -> Result<(), AdError> {
        self.get_or_create(slot_id, config).await.preload().await
    }

    pub async fn show(&self, slot_id: &SlotId, surface: PresentationSurface) -> Result<(), AdError> {
        self.get_or_create(slot_id, None).await.show(surface).await
    }

    /// Destroy and forget the instance for `slot_id`. No-op when absent.
    pub async fn remove(&self, slot_id: &SlotId) -> Option<Arc<RewardAdInstance>> {
        let removed = self.instances.write().await.remove(slot_id)?;
        removed.destroy();
        info!(%slot_id, instance_id = %removed.instance_id(), "removed reward ad instance");
        Some(removed)
    }

    /// Destroy every instance.
    pub async fn clear(&self) {
        let drained: Vec<_> = self.instances.write().await.drain().collect();
        for (_, instance) in &drained {
            instance.destroy();
        }
        info!(count = drained.len(), "cleared reward ad registry");
    }

    pub async fn len(&self) -> usize {
        self.instances.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.instances.read().await.is_empty()
    }

    pub async fn contains(&self, slot_id: &SlotId) -> bool {
        self.instances.read().await.contains_key(slot_id)
    }

    /// `Initial` when nothing is registered for `slot_id`.
    pub async fn state(&self, slot_id: &SlotId) -> RewardAdState {
        self.get(slot_id)
            .await
            .map(|instance| instance.state())
            .unwrap_or_default()
    }

    pub async fn is_ready(&self, slot_id: &SlotId) -> bool {
        self.state(slot_id).await.is_ready()
    }

    pub async fn is_loading(&self, slot_id: &SlotId) -> bool {
        self.state(slot_id).await.is_loading()
    }

    pub async fn is_showing(&self, slot_id: &SlotId) -> bool {
        self.state(slot_id).await.is_showing()
    }

    /// Events of every slot.
    pub fn subscribe(&self) -> EventSubscription {
        EventSubscription::new(self.events.subscribe(), None)
    }

    pub fn subscribe_slot(&self, slot_id: &SlotId) -> EventSubscription {
        EventSubscription::new(self.events.subscribe(), Some(slot_id.clone()))
    }
}

impl Drop for RewardAdRegistry {
    fn drop(&mut self) {
        self.reaper.abort();
        if let Ok(mut instances) = self.instances.try_write() {
            for (_, instance) in instances.drain() {
                instance.destroy();
            }
        }
    }
}

async fn reap(instances: InstanceMap, mut rx: mpsc::UnboundedReceiver<Retirement>) {
    while let Some(notice) = rx.recv().await {
        let mut map = instances.write().await;
        let Some(current) = map.get(&notice.slot_id) else {
            continue;
        };
        if current.instance_id() != notice.instance_id {
            debug!(slot_id = %notice.slot_id, instance_id = %notice.instance_id, "ignoring retirement of a replaced instance");
            continue;
        }
        if !current.is_retirable(notice.generation) {
            debug!(slot_id = %notice.slot_id, instance_id = %notice.instance_id, "ignoring retirement of a reloaded instance");
            continue;
        }
        if let Some(instance) = map.remove(&notice.slot_id) {
            drop(map);
            instance.destroy();
            info!(slot_id = %notice.slot_id, instance_id = %notice.instance_id, "retired closed reward ad instance");
        }
    }
}
