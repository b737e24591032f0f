//! RewardAdInstance - リワード動画 1 スロット分の状態機械
//!
//! # 状態遷移
//! ```text
//! Initial ─preload/show─► Loading ─success─► Loaded / VideoDownloaded ─show─► Showing ─closed─► Closed
//!                            │                                                   │
//!                            └─failure / timeout─► LoadFailed                    └─show failed─► ShowFailed
//! ```
//!
//! # 設計
//! - 状態は `parking_lot::Mutex<Inner>` に閉じ込め、ロックを持ったまま await しない
//! - SDK 通知とタイムアウトは pump タスク経由で `dispatch` に届く（先に届いた方が勝つ）
//! - 広告オブジェクトを作り直すたびに generation を進め、古い通知は捨てる
//! - 待ち合わせは oneshot。インスタンスが破棄されると受信側は `InstanceMissing` になる

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::subscription::{EVENT_CAPACITY, EventSubscription};
use crate::config::RewardAdOptions;
use crate::domain::{InstanceId, RewardAdEvent, RewardAdState, SlotEvent, SlotId};
use crate::error::AdError;
use crate::ports::{
    AdKind, AdListener, AdObject, AdRequest, AdRequestConfig, AdSdk, PresentationSurface, SdkEvent,
};
use crate::pump::{self, PumpMessage, PumpTarget};

type Reply = oneshot::Sender<Result<(), AdError>>;

/// Sent to the owner once a closed instance has finished its grace delay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Retirement {
    pub slot_id: SlotId,
    pub instance_id: InstanceId,
    /// Generation of the ad object that closed.
    pub generation: u64,
}

struct PendingShow {
    surface: PresentationSurface,
    reply: Reply,
}

struct Inner {
    state: RewardAdState,
    generation: u64,
    ad: Option<Box<dyn AdObject>>,
    pending_loads: Vec<Reply>,
    pending_show: Option<PendingShow>,
    load_deadline: Option<Instant>,
    reward_verified: Option<bool>,
    timeout: Option<JoinHandle<()>>,
    grace: Option<JoinHandle<()>>,
    pump: Option<JoinHandle<()>>,
    destroyed: bool,
}

impl Inner {
    fn new() -> Self {
        Self {
            state: RewardAdState::Initial,
            generation: 0,
            ad: None,
            pending_loads: Vec::new(),
            pending_show: None,
            load_deadline: None,
            reward_verified: None,
            timeout: None,
            grace: None,
            pump: None,
            destroyed: false,
        }
    }

    fn cancel_timeout(&mut self) {
        if let Some(timer) = self.timeout.take() {
            timer.abort();
        }
        self.load_deadline = None;
    }

    fn cancel_grace(&mut self) {
        if let Some(grace) = self.grace.take() {
            grace.abort();
        }
    }

    /// Destroy and drop the SDK object. Its listener stays attached until the
    /// generation moves on.
    fn dispose_ad(&mut self) {
        if let Some(mut ad) = self.ad.take() {
            ad.destroy();
        }
    }
}

pub struct RewardAdInstance {
    instance_id: InstanceId,
    slot_id: SlotId,
    request: AdRequest,
    options: RewardAdOptions,
    sdk: Arc<dyn AdSdk>,
    tx: mpsc::UnboundedSender<PumpMessage>,
    events: broadcast::Sender<SlotEvent>,
    retire: Option<mpsc::UnboundedSender<Retirement>>,
    inner: Mutex<Inner>,
}

impl RewardAdInstance {
    /// Standalone instance with its own event channel and no owner to retire to.
    pub fn new(
        slot_id: SlotId,
        config: AdRequestConfig,
        options: RewardAdOptions,
        sdk: Arc<dyn AdSdk>,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self::wired(slot_id, config, options, sdk, events, None)
    }

    /// Instance that reports on a shared event channel and retires to its owner.
    pub(crate) fn wired(
        slot_id: SlotId,
        config: AdRequestConfig,
        options: RewardAdOptions,
        sdk: Arc<dyn AdSdk>,
        events: broadcast::Sender<SlotEvent>,
        retire: Option<mpsc::UnboundedSender<Retirement>>,
    ) -> Arc<Self> {
        let (tx, rx) = pump::channel();
        let instance = Arc::new(Self {
            instance_id: InstanceId::generate(),
            request: AdRequest::new(AdKind::RewardVideo, slot_id.clone(), config),
            slot_id,
            options,
            sdk,
            tx,
            events,
            retire,
            inner: Mutex::new(Inner::new()),
        });
        let handle = pump::spawn_pump(Arc::downgrade(&instance), rx);
        instance.inner.lock().pump = Some(handle);
        debug!(slot_id = %instance.slot_id, instance_id = %instance.instance_id, "reward ad instance created");
        instance
    }

    pub fn slot_id(&self) -> &SlotId {
        &self.slot_id
    }

    pub fn instance_id(&self) -> InstanceId {
        self.instance_id
    }

    pub fn state(&self) -> RewardAdState {
        self.inner.lock().state
    }

    pub fn is_ready(&self) -> bool {
        self.state().is_ready()
    }

    pub fn is_loading(&self) -> bool {
        self.state().is_loading()
    }

    pub fn is_showing(&self) -> bool {
        self.state().is_showing()
    }

    /// When the in-flight load times out, if one is in flight.
    pub fn load_deadline(&self) -> Option<Instant> {
        self.inner.lock().load_deadline
    }

    /// Outcome of reward verification for the current presentation.
    pub fn reward_verified(&self) -> Option<bool> {
        self.inner.lock().reward_verified
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.lock().destroyed
    }

    /// Whether a retirement notice sent at `generation` still applies.
    ///
    /// False once the instance was loaded again after that close.
    pub(crate) fn is_retirable(&self, generation: u64) -> bool {
        let inner = self.inner.lock();
        !inner.destroyed && inner.state == RewardAdState::Closed && inner.generation == generation
    }

    #[cfg(test)]
    pub(crate) fn generation(&self) -> u64 {
        self.inner.lock().generation
    }

    /// Events of this slot only.
    pub fn subscribe(&self) -> EventSubscription {
        EventSubscription::new(self.events.subscribe(), Some(self.slot_id.clone()))
    }

    /// Make sure an ad is loaded.
    ///
    /// Resolves immediately when already loaded; otherwise joins (or starts)
    /// the in-flight load and resolves with its outcome.
    pub async fn preload(&self) -> Result<(), AdError> {
        let reply = {
            let mut inner = self.inner.lock();
            if inner.destroyed {
                return Err(self.missing());
            }
            let state = inner.state;
            match state {
                state if state.is_ready() => return Ok(()),
                RewardAdState::Showing => return Err(AdError::AlreadyShowing),
                RewardAdState::Loading => {
                    let (tx, rx) = oneshot::channel();
                    inner.pending_loads.push(tx);
                    rx
                }
                _ => {
                    let (tx, rx) = oneshot::channel();
                    inner.pending_loads.push(tx);
                    self.start_load(&mut inner);
                    rx
                }
            }
        };
        self.await_reply(reply).await
    }

    /// Present the ad on `surface`.
    ///
    /// `Ok(())` means presentation started, not that the reward was granted;
    /// follow the event stream for the rest.
    pub async fn show(&self, surface: PresentationSurface) -> Result<(), AdError> {
        let reply = {
            let mut inner = self.inner.lock();
            if inner.destroyed {
                return Err(self.missing());
            }
            let (tx, rx) = oneshot::channel();
            let pending = PendingShow { surface, reply: tx };
            let state = inner.state;
            match state {
                state if state.is_ready() => self.begin_show(&mut inner, pending),
                RewardAdState::Showing => return Err(AdError::AlreadyShowing),
                RewardAdState::Loading => self.queue_show(&mut inner, pending),
                _ if self.options.auto_load => {
                    self.queue_show(&mut inner, pending);
                    self.start_load(&mut inner);
                }
                _ => return Err(AdError::NotReady),
            }
            rx
        };
        self.await_reply(reply).await
    }

    /// Tear down: detach the listener, drop the ad object, cancel timers and
    /// drop every waiting continuation. Safe to call more than once.
    pub fn destroy(&self) {
        let mut inner = self.inner.lock();
        if inner.destroyed {
            return;
        }
        inner.destroyed = true;
        inner.generation += 1;
        inner.cancel_timeout();
        inner.cancel_grace();
        if let Some(pump) = inner.pump.take() {
            pump.abort();
        }
        inner.dispose_ad();
        inner.pending_loads.clear();
        inner.pending_show = None;
        debug!(slot_id = %self.slot_id, instance_id = %self.instance_id, "reward ad instance destroyed");
    }

    fn missing(&self) -> AdError {
        AdError::InstanceMissing(self.slot_id.to_string())
    }

    async fn await_reply(&self, reply: oneshot::Receiver<Result<(), AdError>>) -> Result<(), AdError> {
        reply.await.unwrap_or_else(|_| Err(self.missing()))
    }

    fn emit(&self, event: RewardAdEvent) {
        let _ = self.events.send(SlotEvent {
            slot_id: self.slot_id.clone(),
            instance_id: self.instance_id,
            event,
        });
    }

    /// Replace any previous pending show; only the latest is honored.
    fn queue_show(&self, inner: &mut Inner, pending: PendingShow) {
        if let Some(displaced) = inner.pending_show.replace(pending) {
            let _ = displaced.reply.send(Err(AdError::ShowSuperseded));
        }
    }

    fn start_load(&self, inner: &mut Inner) {
        inner.cancel_timeout();
        // A closed instance that is loaded again is kept instead of retired.
        inner.cancel_grace();
        inner.dispose_ad();
        inner.generation += 1;
        inner.reward_verified = None;

        let listener = AdListener::new(inner.generation, self.tx.clone());
        let mut ad = match self.sdk.create_ad(&self.request, listener) {
            Ok(ad) => ad,
            Err(err) => {
                warn!(slot_id = %self.slot_id, error = %err, "sdk refused to create reward ad");
                self.fail_load(inner, AdError::LoadFailed(err));
                return;
            }
        };

        let timeout = self.options.load_timeout;
        inner.state = RewardAdState::Loading;
        inner.load_deadline = Some(Instant::now() + timeout);
        inner.timeout = Some(pump::arm_timeout(self.tx.clone(), inner.generation, timeout));
        info!(slot_id = %self.slot_id, generation = inner.generation, "loading reward ad");
        self.emit(RewardAdEvent::LoadStarted);
        ad.load();
        inner.ad = Some(ad);
    }

    fn finish_load(&self, inner: &mut Inner, state: RewardAdState, event: RewardAdEvent) {
        inner.cancel_timeout();
        inner.state = state;
        info!(slot_id = %self.slot_id, %state, waiting = inner.pending_loads.len(), "reward ad loaded");
        self.emit(event);
        for reply in inner.pending_loads.drain(..) {
            let _ = reply.send(Ok(()));
        }
        if let Some(pending) = inner.pending_show.take() {
            self.begin_show(inner, pending);
        }
    }

    fn fail_load(&self, inner: &mut Inner, error: AdError) {
        inner.cancel_timeout();
        inner.state = RewardAdState::LoadFailed;
        warn!(slot_id = %self.slot_id, %error, "reward ad load failed");
        self.emit(RewardAdEvent::LoadFailed(error.clone()));
        for reply in inner.pending_loads.drain(..) {
            let _ = reply.send(Err(error.clone()));
        }
        if let Some(pending) = inner.pending_show.take() {
            let _ = pending.reply.send(Err(error));
        }
        inner.dispose_ad();
        inner.generation += 1;
    }

    fn begin_show(&self, inner: &mut Inner, pending: PendingShow) {
        let Some(ad) = inner.ad.as_mut() else {
            let _ = pending.reply.send(Err(AdError::NotReady));
            return;
        };
        inner.state = RewardAdState::Showing;
        let _ = pending.reply.send(Ok(()));
        self.emit(RewardAdEvent::ShowStarted);
        info!(slot_id = %self.slot_id, surface = pending.surface.id(), "presenting reward ad");
        if let Err(err) = ad.show(&pending.surface) {
            self.fail_show(inner, AdError::ShowFailed(err));
        }
    }

    fn fail_show(&self, inner: &mut Inner, error: AdError) {
        inner.state = RewardAdState::ShowFailed;
        warn!(slot_id = %self.slot_id, %error, "reward ad show failed");
        self.emit(RewardAdEvent::ShowFailed(error));
        inner.dispose_ad();
    }

    fn close(&self, inner: &mut Inner) {
        inner.state = RewardAdState::Closed;
        inner.cancel_timeout();
        inner.dispose_ad();
        info!(slot_id = %self.slot_id, instance_id = %self.instance_id, "reward ad closed");
        self.emit(RewardAdEvent::Closed);

        let Some(retire) = self.retire.clone() else {
            return;
        };
        let notice = Retirement {
            slot_id: self.slot_id.clone(),
            instance_id: self.instance_id,
            generation: inner.generation,
        };
        let grace = self.options.close_grace;
        inner.grace = Some(tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            let _ = retire.send(notice);
        }));
    }

    fn on_sdk_event(&self, inner: &mut Inner, event: SdkEvent) {
        match event {
            SdkEvent::LoadSucceeded => {
                if inner.state.is_loading() {
                    self.finish_load(inner, RewardAdState::Loaded, RewardAdEvent::Loaded);
                } else {
                    debug!(slot_id = %self.slot_id, state = %inner.state, "ignoring late load success");
                }
            }
            SdkEvent::VideoDownloaded => match inner.state {
                RewardAdState::Loading => self.finish_load(
                    inner,
                    RewardAdState::VideoDownloaded,
                    RewardAdEvent::VideoDownloaded,
                ),
                RewardAdState::Loaded => {
                    inner.state = RewardAdState::VideoDownloaded;
                    self.emit(RewardAdEvent::VideoDownloaded);
                }
                _ => self.emit(RewardAdEvent::VideoDownloaded),
            },
            SdkEvent::LoadFailed(err) => {
                if inner.state.is_loading() {
                    self.fail_load(inner, AdError::LoadFailed(err));
                }
            }
            SdkEvent::BecameVisible => self.emit(RewardAdEvent::Visible),
            SdkEvent::ShowFailed(err) => {
                if inner.state.is_showing() {
                    self.fail_show(inner, AdError::ShowFailed(err));
                }
            }
            SdkEvent::Clicked => self.emit(RewardAdEvent::Clicked),
            SdkEvent::Skipped => self.emit(RewardAdEvent::Skipped),
            SdkEvent::PlayFinished(None) => self.emit(RewardAdEvent::PlayFinished),
            SdkEvent::PlayFinished(Some(err)) => self.emit(RewardAdEvent::PlayFailed(err)),
            SdkEvent::RewardVerified(verified) => {
                inner.reward_verified = Some(verified);
                if verified {
                    self.emit(RewardAdEvent::RewardSuccess);
                } else {
                    self.emit(RewardAdEvent::RewardFailed(AdError::RewardVerificationFailed));
                }
            }
            SdkEvent::Closed => match inner.state {
                RewardAdState::Showing | RewardAdState::ShowFailed => self.close(inner),
                state => debug!(slot_id = %self.slot_id, %state, "ignoring close outside of a presentation"),
            },
        }
    }
}

impl PumpTarget for RewardAdInstance {
    fn dispatch(&self, message: PumpMessage) {
        let mut inner = self.inner.lock();
        if inner.destroyed {
            return;
        }
        match message {
            PumpMessage::LoadTimeout { generation } => {
                if generation == inner.generation && inner.state.is_loading() {
                    self.fail_load(&mut inner, AdError::LoadTimeout);
                }
            }
            PumpMessage::Sdk { generation, event } => {
                if generation != inner.generation {
                    debug!(slot_id = %self.slot_id, generation, current = inner.generation, "dropping event from a detached ad object");
                    return;
                }
                self.on_sdk_event(&mut inner, event);
            }
        }
    }
}

impl Drop for RewardAdInstance {
    fn drop(&mut self) {
        self.destroy();
    }
}
