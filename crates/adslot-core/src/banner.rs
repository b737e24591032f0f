//! BannerAdInstance - バナー 1 枠分のライフサイクル
//!
//! `Idle → Loading → Loaded → Showing → Closed`
//!
//! 表示中は一定間隔で自動リロードする。リロードは
//! - 読み込み中なら見送る
//! - 前回の読み込み開始から最小間隔が経っていなければ見送る
//!
//! SDK 通知はリワード広告と同じ pump 経由で届く。

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::BannerOptions;
use crate::domain::{BannerEvent, BannerState, SlotId};
use crate::error::AdError;
use crate::ports::{
    AdKind, AdListener, AdObject, AdRequest, AdRequestConfig, AdSdk, PresentationSurface, SdkEvent,
};
use crate::pump::{self, PumpMessage, PumpTarget};

const BANNER_EVENT_CAPACITY: usize = 32;

/// What a `reload` call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadDecision {
    Started,
    /// A load is still in flight.
    SkippedPending,
    /// The previous load started less than the minimum interval ago.
    SkippedTooSoon,
    /// Never loaded, closed or disposed.
    Inactive,
}

struct BannerInner {
    state: BannerState,
    generation: u64,
    ad: Option<Box<dyn AdObject>>,
    surface: Option<PresentationSurface>,
    last_load_at: Option<Instant>,
    refreshing: bool,
    refresh: Option<JoinHandle<()>>,
    pump: Option<JoinHandle<()>>,
    disposed: bool,
}

impl BannerInner {
    fn dispose_ad(&mut self) {
        if let Some(mut ad) = self.ad.take() {
            ad.destroy();
        }
        self.generation += 1;
    }

    fn stop_refresh(&mut self) {
        if let Some(refresh) = self.refresh.take() {
            refresh.abort();
        }
    }
}

pub struct BannerAdInstance {
    slot_id: SlotId,
    request: AdRequest,
    options: BannerOptions,
    sdk: Arc<dyn AdSdk>,
    tx: mpsc::UnboundedSender<PumpMessage>,
    events: broadcast::Sender<BannerEvent>,
    inner: Mutex<BannerInner>,
}

impl BannerAdInstance {
    pub fn new(
        slot_id: SlotId,
        config: AdRequestConfig,
        options: BannerOptions,
        sdk: Arc<dyn AdSdk>,
    ) -> Arc<Self> {
        let (tx, rx) = pump::channel();
        let (events, _) = broadcast::channel(BANNER_EVENT_CAPACITY);
        let banner = Arc::new(Self {
            request: AdRequest::new(AdKind::Banner, slot_id.clone(), config),
            slot_id,
            options,
            sdk,
            tx,
            events,
            inner: Mutex::new(BannerInner {
                state: BannerState::Idle,
                generation: 0,
                ad: None,
                surface: None,
                last_load_at: None,
                refreshing: false,
                refresh: None,
                pump: None,
                disposed: false,
            }),
        });
        let handle = pump::spawn_pump(Arc::downgrade(&banner), rx);
        banner.inner.lock().pump = Some(handle);
        banner
    }

    pub fn slot_id(&self) -> &SlotId {
        &self.slot_id
    }

    pub fn state(&self) -> BannerState {
        self.inner.lock().state
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BannerEvent> {
        self.events.subscribe()
    }

    /// Load a banner for `surface`; it is presented there once loaded.
    pub fn load(&self, surface: PresentationSurface) -> Result<(), AdError> {
        let mut inner = self.inner.lock();
        if inner.disposed || inner.state.is_terminal() {
            return Err(AdError::InstanceMissing(self.slot_id.to_string()));
        }
        inner.surface = Some(surface);
        inner.refreshing = false;
        self.start_load(&mut inner)
    }

    /// Load again on the same surface, subject to the debounce rules.
    pub fn reload(&self) -> ReloadDecision {
        let mut inner = self.inner.lock();
        if inner.disposed || inner.state.is_terminal() || inner.surface.is_none() {
            return ReloadDecision::Inactive;
        }
        if inner.state == BannerState::Loading {
            return ReloadDecision::SkippedPending;
        }
        let too_soon = inner
            .last_load_at
            .is_some_and(|at| at.elapsed() < self.options.min_reload_interval);
        if too_soon {
            return ReloadDecision::SkippedTooSoon;
        }
        inner.refreshing = true;
        // a refused create is already reported as LoadFailed
        let _ = self.start_load(&mut inner);
        ReloadDecision::Started
    }

    /// Call `reload` every refresh interval until stopped, closed or dropped.
    pub fn start_auto_refresh(self: &Arc<Self>) {
        let period = self.options.refresh_interval;
        let weak: Weak<Self> = Arc::downgrade(self);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(banner) = weak.upgrade() else {
                    break;
                };
                let decision = banner.reload();
                debug!(slot_id = %banner.slot_id, ?decision, "banner refresh tick");
                if decision == ReloadDecision::Inactive {
                    break;
                }
            }
        });
        let mut inner = self.inner.lock();
        inner.stop_refresh();
        if inner.disposed {
            task.abort();
        } else {
            inner.refresh = Some(task);
        }
    }

    pub fn stop_auto_refresh(&self) {
        self.inner.lock().stop_refresh();
    }

    pub fn is_auto_refreshing(&self) -> bool {
        self.inner
            .lock()
            .refresh
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Release the ad object and stop refreshing. Safe to call more than once.
    pub fn dispose(&self) {
        let mut inner = self.inner.lock();
        if inner.disposed {
            return;
        }
        inner.disposed = true;
        inner.stop_refresh();
        inner.dispose_ad();
        if let Some(pump) = inner.pump.take() {
            pump.abort();
        }
        debug!(slot_id = %self.slot_id, "banner disposed");
    }

    fn emit(&self, event: BannerEvent) {
        let _ = self.events.send(event);
    }

    fn start_load(&self, inner: &mut BannerInner) -> Result<(), AdError> {
        inner.dispose_ad();
        inner.last_load_at = Some(Instant::now());
        let listener = AdListener::new(inner.generation, self.tx.clone());
        let mut ad = match self.sdk.create_ad(&self.request, listener) {
            Ok(ad) => ad,
            Err(err) => {
                let error = AdError::LoadFailed(err);
                self.fail_load(inner, error.clone());
                return Err(error);
            }
        };
        inner.state = BannerState::Loading;
        info!(slot_id = %self.slot_id, refreshing = inner.refreshing, "loading banner");
        ad.load();
        inner.ad = Some(ad);
        Ok(())
    }

    fn fail_load(&self, inner: &mut BannerInner, error: AdError) {
        warn!(slot_id = %self.slot_id, %error, "banner load failed");
        inner.state = BannerState::Idle;
        inner.dispose_ad();
        self.emit(BannerEvent::LoadFailed(error));
    }

    fn present(&self, inner: &mut BannerInner) {
        inner.state = BannerState::Loaded;
        self.emit(BannerEvent::Loaded);
        let Some(surface) = inner.surface.clone() else {
            return;
        };
        let Some(ad) = inner.ad.as_mut() else {
            return;
        };
        match ad.show(&surface) {
            Ok(()) => {
                inner.state = BannerState::Showing;
                self.emit(BannerEvent::Shown);
                if inner.refreshing {
                    self.emit(BannerEvent::Refreshed);
                }
            }
            Err(err) => {
                warn!(slot_id = %self.slot_id, error = %err, "banner show failed");
                inner.state = BannerState::Idle;
                inner.dispose_ad();
                self.emit(BannerEvent::ShowFailed(AdError::ShowFailed(err)));
            }
        }
    }

    fn close(&self, inner: &mut BannerInner) {
        inner.state = BannerState::Closed;
        inner.stop_refresh();
        inner.dispose_ad();
        info!(slot_id = %self.slot_id, "banner closed by user");
        self.emit(BannerEvent::Closed);
    }
}

impl PumpTarget for BannerAdInstance {
    fn dispatch(&self, message: PumpMessage) {
        let mut inner = self.inner.lock();
        if inner.disposed {
            return;
        }
        let PumpMessage::Sdk { generation, event } = message else {
            return;
        };
        if generation != inner.generation {
            return;
        }
        match event {
            SdkEvent::LoadSucceeded if inner.state == BannerState::Loading => {
                self.present(&mut inner)
            }
            SdkEvent::LoadFailed(err) if inner.state == BannerState::Loading => {
                self.fail_load(&mut inner, AdError::LoadFailed(err))
            }
            SdkEvent::ShowFailed(err) => {
                inner.state = BannerState::Idle;
                inner.dispose_ad();
                self.emit(BannerEvent::ShowFailed(AdError::ShowFailed(err)));
            }
            SdkEvent::Clicked => self.emit(BannerEvent::Clicked),
            SdkEvent::Closed => self.close(&mut inner),
            other => debug!(slot_id = %self.slot_id, ?other, "ignoring banner event"),
        }
    }
}

impl Drop for BannerAdInstance {
    fn drop(&mut self) {
        self.dispose();
    }
}
