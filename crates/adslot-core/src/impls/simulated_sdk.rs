//! SimulatedSdk - メディエーション SDK の代役
//!
//! # モード
//! - **Manual**: 何も自動で通知しない。テストが `emit` でイベントを注入する
//! - **Auto**: load / show に対して一定時間後に成功イベントを流す（デモ CLI 用）
//!
//! どちらのモードでも create / load / show / destroy の呼び出し回数を
//! スロットごとに記録する。

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use crate::domain::SlotId;
use crate::error::SdkError;
use crate::ports::{AdListener, AdObject, AdRequest, AdSdk, PresentationSurface, SdkEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulatedBehavior {
    Manual,
    Auto {
        load_delay: Duration,
        play_duration: Duration,
        reward_verified: bool,
    },
}

/// Call counters for one slot id.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SlotCalls {
    pub created: usize,
    pub loads: usize,
    pub shows: usize,
    pub destroys: usize,
}

#[derive(Default)]
struct SdkLog {
    calls: HashMap<SlotId, SlotCalls>,
    latest: HashMap<SlotId, AdListener>,
    requests: Vec<AdRequest>,
    fail_next_create: Option<SdkError>,
    fail_next_show: Option<SdkError>,
}

pub struct SimulatedSdk {
    behavior: SimulatedBehavior,
    log: Arc<Mutex<SdkLog>>,
}

impl SimulatedSdk {
    pub fn manual() -> Self {
        Self::with_behavior(SimulatedBehavior::Manual)
    }

    pub fn auto(load_delay: Duration, play_duration: Duration) -> Self {
        Self::with_behavior(SimulatedBehavior::Auto {
            load_delay,
            play_duration,
            reward_verified: true,
        })
    }

    pub fn with_behavior(behavior: SimulatedBehavior) -> Self {
        Self {
            behavior,
            log: Arc::new(Mutex::new(SdkLog::default())),
        }
    }

    /// Push `event` through the listener of the most recent ad object for `slot`.
    pub fn emit(&self, slot: &SlotId, event: SdkEvent) -> bool {
        let listener = self.log.lock().latest.get(slot).cloned();
        listener.is_some_and(|listener| listener.notify(event))
    }

    pub fn calls(&self, slot: &SlotId) -> SlotCalls {
        self.log.lock().calls.get(slot).copied().unwrap_or_default()
    }

    pub fn requests(&self) -> Vec<AdRequest> {
        self.log.lock().requests.clone()
    }

    pub fn fail_next_create(&self, error: SdkError) {
        self.log.lock().fail_next_create = Some(error);
    }

    pub fn fail_next_show(&self, error: SdkError) {
        self.log.lock().fail_next_show = Some(error);
    }
}

impl AdSdk for SimulatedSdk {
    fn create_ad(
        &self,
        request: &AdRequest,
        listener: AdListener,
    ) -> Result<Box<dyn AdObject>, SdkError> {
        let mut log = self.log.lock();
        if let Some(err) = log.fail_next_create.take() {
            return Err(err);
        }
        log.calls.entry(request.slot_id.clone()).or_default().created += 1;
        log.latest.insert(request.slot_id.clone(), listener.clone());
        log.requests.push(request.clone());
        Ok(Box::new(SimulatedAd {
            slot_id: request.slot_id.clone(),
            listener,
            behavior: self.behavior,
            log: Arc::clone(&self.log),
            destroyed: Arc::new(AtomicBool::new(false)),
        }))
    }
}

struct SimulatedAd {
    slot_id: SlotId,
    listener: AdListener,
    behavior: SimulatedBehavior,
    log: Arc<Mutex<SdkLog>>,
    destroyed: Arc<AtomicBool>,
}

impl SimulatedAd {
    fn bump(&self, f: impl FnOnce(&mut SlotCalls)) {
        let mut log = self.log.lock();
        f(log.calls.entry(self.slot_id.clone()).or_default());
    }

    /// Deliver `events` after `delay` unless the ad was destroyed meanwhile.
    fn deliver_later(&self, delay: Duration, events: Vec<SdkEvent>) {
        let listener = self.listener.clone();
        let destroyed = Arc::clone(&self.destroyed);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            for event in events {
                if destroyed.load(Ordering::SeqCst) {
                    return;
                }
                listener.notify(event);
            }
        });
    }
}

impl AdObject for SimulatedAd {
    fn load(&mut self) {
        self.bump(|calls| calls.loads += 1);
        if let SimulatedBehavior::Auto { load_delay, .. } = self.behavior {
            self.deliver_later(
                load_delay,
                vec![SdkEvent::LoadSucceeded, SdkEvent::VideoDownloaded],
            );
        }
    }

    fn show(&mut self, _surface: &PresentationSurface) -> Result<(), SdkError> {
        self.bump(|calls| calls.shows += 1);
        if let Some(err) = self.log.lock().fail_next_show.take() {
            return Err(err);
        }
        if let SimulatedBehavior::Auto {
            play_duration,
            reward_verified,
            ..
        } = self.behavior
        {
            self.deliver_later(Duration::ZERO, vec![SdkEvent::BecameVisible]);
            self.deliver_later(
                play_duration,
                vec![
                    SdkEvent::PlayFinished(None),
                    SdkEvent::RewardVerified(reward_verified),
                    SdkEvent::Closed,
                ],
            );
        }
        Ok(())
    }

    fn destroy(&mut self) {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.bump(|calls| calls.destroys += 1);
    }
}
