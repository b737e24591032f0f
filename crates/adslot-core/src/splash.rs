//! Splash - 起動時の全画面広告
//!
//! セッションにつき 1 回だけ。表示条件（SplashGate）は
//! 1. 読み込み前
//! 2. 読み込み完了直後
//! 3. 表示の直前
//!
//! の 3 回確認し、途中で条件が崩れたら広告は表示せずに破棄する。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info, warn};

use crate::config::SplashOptions;
use crate::domain::SlotId;
use crate::error::AdError;
use crate::ports::{
    AdKind, AdListener, AdObject, AdRequest, AdRequestConfig, AdSdk, PresentationSurface, SdkEvent,
};
use crate::pump::{self, PumpMessage};

/// Why a splash run ended without presenting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The app asked for no splash ad this launch.
    Disabled,
    AlreadyShown,
    /// The splash screen was left before the ad could be presented.
    LeftSplashView,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplashOutcome {
    /// Presented and then dismissed (closed or skipped by the user).
    Dismissed,
    Skipped(SkipReason),
}

/// Session-wide conditions for presenting a splash ad.
#[derive(Debug)]
pub struct SplashGate {
    should_show: AtomicBool,
    has_shown_this_session: AtomicBool,
    in_splash_view: AtomicBool,
}

impl SplashGate {
    pub fn new(should_show: bool) -> Self {
        Self {
            should_show: AtomicBool::new(should_show),
            has_shown_this_session: AtomicBool::new(false),
            in_splash_view: AtomicBool::new(false),
        }
    }

    pub fn set_should_show(&self, should_show: bool) {
        self.should_show.store(should_show, Ordering::SeqCst);
    }

    pub fn enter_splash_view(&self) {
        self.in_splash_view.store(true, Ordering::SeqCst);
    }

    pub fn leave_splash_view(&self) {
        self.in_splash_view.store(false, Ordering::SeqCst);
    }

    pub fn has_shown_this_session(&self) -> bool {
        self.has_shown_this_session.load(Ordering::SeqCst)
    }

    /// Returns false if another run already claimed this session.
    fn mark_shown(&self) -> bool {
        !self.has_shown_this_session.swap(true, Ordering::SeqCst)
    }

    /// Give the session back after the SDK refused to present.
    fn release(&self) {
        self.has_shown_this_session.store(false, Ordering::SeqCst);
    }

    pub fn check(&self) -> Result<(), SkipReason> {
        if !self.should_show.load(Ordering::SeqCst) {
            return Err(SkipReason::Disabled);
        }
        if self.has_shown_this_session() {
            return Err(SkipReason::AlreadyShown);
        }
        if !self.in_splash_view.load(Ordering::SeqCst) {
            return Err(SkipReason::LeftSplashView);
        }
        Ok(())
    }
}

/// Destroys the ad object on every exit path of a run.
struct LoadedSplash(Box<dyn AdObject>);

impl Drop for LoadedSplash {
    fn drop(&mut self) {
        self.0.destroy();
    }
}

pub struct SplashAdInstance {
    request: AdRequest,
    options: SplashOptions,
    sdk: Arc<dyn AdSdk>,
    gate: Arc<SplashGate>,
}

impl SplashAdInstance {
    pub fn new(
        slot_id: SlotId,
        config: AdRequestConfig,
        options: SplashOptions,
        sdk: Arc<dyn AdSdk>,
        gate: Arc<SplashGate>,
    ) -> Self {
        Self {
            request: AdRequest::new(AdKind::Splash, slot_id, config),
            options,
            sdk,
            gate,
        }
    }

    pub fn slot_id(&self) -> &SlotId {
        &self.request.slot_id
    }

    pub fn gate(&self) -> &Arc<SplashGate> {
        &self.gate
    }

    /// Load, re-check the gate and present on `surface`, then wait until the
    /// user dismisses the ad.
    pub async fn run(&self, surface: PresentationSurface) -> Result<SplashOutcome, AdError> {
        let slot_id = self.slot_id();
        if let Err(reason) = self.gate.check() {
            debug!(%slot_id, ?reason, "splash skipped before load");
            return Ok(SplashOutcome::Skipped(reason));
        }

        let (tx, mut rx) = pump::channel();
        let ad = self
            .sdk
            .create_ad(&self.request, AdListener::new(0, tx))
            .map_err(AdError::LoadFailed)?;
        let mut ad = LoadedSplash(ad);
        info!(%slot_id, "loading splash ad");
        ad.0.load();

        let loaded = tokio::time::timeout(self.options.load_timeout, async {
            while let Some(message) = rx.recv().await {
                match message {
                    PumpMessage::Sdk {
                        event: SdkEvent::LoadSucceeded,
                        ..
                    } => return Ok(()),
                    PumpMessage::Sdk {
                        event: SdkEvent::LoadFailed(err),
                        ..
                    } => return Err(AdError::LoadFailed(err)),
                    _ => continue,
                }
            }
            Err(AdError::InstanceMissing(slot_id.to_string()))
        })
        .await;
        match loaded {
            Ok(Ok(())) => {}
            Ok(Err(error)) => {
                warn!(%slot_id, %error, "splash load failed");
                return Err(error);
            }
            Err(_) => {
                warn!(%slot_id, timeout_ms = self.options.load_timeout.as_millis() as u64, "splash load timed out");
                return Err(AdError::LoadTimeout);
            }
        }

        if let Err(reason) = self.gate.check() {
            debug!(%slot_id, ?reason, "splash skipped after load");
            return Ok(SplashOutcome::Skipped(reason));
        }
        tokio::task::yield_now().await;
        if let Err(reason) = self.gate.check() {
            debug!(%slot_id, ?reason, "splash skipped before presenting");
            return Ok(SplashOutcome::Skipped(reason));
        }
        if !self.gate.mark_shown() {
            return Ok(SplashOutcome::Skipped(SkipReason::AlreadyShown));
        }

        if let Err(err) = ad.0.show(&surface) {
            self.gate.release();
            warn!(%slot_id, error = %err, "splash show refused");
            return Err(AdError::ShowFailed(err));
        }
        info!(%slot_id, surface = surface.id(), "splash ad presented");

        while let Some(message) = rx.recv().await {
            let PumpMessage::Sdk { event, .. } = message else {
                continue;
            };
            match event {
                SdkEvent::Closed | SdkEvent::Skipped => {
                    info!(%slot_id, "splash ad dismissed");
                    return Ok(SplashOutcome::Dismissed);
                }
                SdkEvent::ShowFailed(err) => {
                    warn!(%slot_id, error = %err, "splash show failed");
                    return Err(AdError::ShowFailed(err));
                }
                other => debug!(%slot_id, ?other, "splash event"),
            }
        }
        Err(AdError::InstanceMissing(slot_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SdkError;
    use crate::impls::SimulatedSdk;
    use std::time::Duration;
    use tokio::task::JoinHandle;

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    fn slot() -> SlotId {
        SlotId::from("splash-1")
    }

    fn open_gate() -> Arc<SplashGate> {
        let gate = Arc::new(SplashGate::new(true));
        gate.enter_splash_view();
        gate
    }

    fn splash(sdk: &Arc<SimulatedSdk>, gate: &Arc<SplashGate>) -> Arc<SplashAdInstance> {
        Arc::new(SplashAdInstance::new(
            slot(),
            AdRequestConfig::default(),
            SplashOptions::default(),
            Arc::clone(sdk) as Arc<dyn AdSdk>,
            Arc::clone(gate),
        ))
    }

    fn spawn_run(splash: &Arc<SplashAdInstance>) -> JoinHandle<Result<SplashOutcome, AdError>> {
        let splash = Arc::clone(splash);
        tokio::spawn(async move { splash.run(PresentationSurface::new("launch")).await })
    }

    #[tokio::test(start_paused = true)]
    async fn closed_gate_skips_without_touching_the_sdk() {
        let sdk = Arc::new(SimulatedSdk::manual());
        let gate = Arc::new(SplashGate::new(false));
        gate.enter_splash_view();

        let outcome = splash(&sdk, &gate).run(PresentationSurface::new("launch")).await;
        assert_eq!(outcome, Ok(SplashOutcome::Skipped(SkipReason::Disabled)));
        assert_eq!(sdk.calls(&slot()).created, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn presents_once_per_session() {
        let sdk = Arc::new(SimulatedSdk::manual());
        let gate = open_gate();
        let splash = splash(&sdk, &gate);

        let run = spawn_run(&splash);
        settle().await;
        sdk.emit(&slot(), SdkEvent::LoadSucceeded);
        settle().await;
        assert_eq!(sdk.calls(&slot()).shows, 1);
        sdk.emit(&slot(), SdkEvent::Closed);

        assert_eq!(run.await.unwrap(), Ok(SplashOutcome::Dismissed));
        assert!(gate.has_shown_this_session());
        assert_eq!(sdk.calls(&slot()).destroys, 1);

        let again = splash.run(PresentationSurface::new("launch")).await;
        assert_eq!(again, Ok(SplashOutcome::Skipped(SkipReason::AlreadyShown)));
    }

    #[tokio::test(start_paused = true)]
    async fn leaving_the_splash_view_during_load_destroys_instead_of_showing() {
        let sdk = Arc::new(SimulatedSdk::manual());
        let gate = open_gate();
        let splash = splash(&sdk, &gate);

        let run = spawn_run(&splash);
        settle().await;
        gate.leave_splash_view();
        sdk.emit(&slot(), SdkEvent::LoadSucceeded);

        assert_eq!(
            run.await.unwrap(),
            Ok(SplashOutcome::Skipped(SkipReason::LeftSplashView))
        );
        assert_eq!(sdk.calls(&slot()).shows, 0);
        assert_eq!(sdk.calls(&slot()).destroys, 1);
        assert!(!gate.has_shown_this_session());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_load_times_out() {
        let sdk = Arc::new(SimulatedSdk::manual());
        let gate = open_gate();
        let splash = splash(&sdk, &gate);

        let run = spawn_run(&splash);
        tokio::time::sleep(Duration::from_millis(3_600)).await;

        assert_eq!(run.await.unwrap(), Err(AdError::LoadTimeout));
        assert_eq!(sdk.calls(&slot()).destroys, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn load_failure_is_returned() {
        let sdk = Arc::new(SimulatedSdk::manual());
        let gate = open_gate();
        let splash = splash(&sdk, &gate);
        let err = SdkError::new(4001, "no fill");

        let run = spawn_run(&splash);
        settle().await;
        sdk.emit(&slot(), SdkEvent::LoadFailed(err.clone()));

        assert_eq!(run.await.unwrap(), Err(AdError::LoadFailed(err)));
        assert!(!gate.has_shown_this_session());
    }

    #[tokio::test(start_paused = true)]
    async fn refused_show_leaves_the_session_unused() {
        let sdk = Arc::new(SimulatedSdk::manual());
        let gate = open_gate();
        let splash = splash(&sdk, &gate);
        let err = SdkError::new(40006, "surface not in window");
        sdk.fail_next_show(err.clone());

        let run = spawn_run(&splash);
        settle().await;
        sdk.emit(&slot(), SdkEvent::LoadSucceeded);
        assert_eq!(run.await.unwrap(), Err(AdError::ShowFailed(err)));
        assert!(!gate.has_shown_this_session());
        assert_eq!(sdk.calls(&slot()).destroys, 1);

        let retry = spawn_run(&splash);
        settle().await;
        sdk.emit(&slot(), SdkEvent::LoadSucceeded);
        settle().await;
        assert_eq!(sdk.calls(&slot()).shows, 2);
        sdk.emit(&slot(), SdkEvent::Closed);
        assert_eq!(retry.await.unwrap(), Ok(SplashOutcome::Dismissed));
        assert!(gate.has_shown_this_session());
    }
}
