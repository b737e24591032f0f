//! AdSdk port - 広告メディエーション SDK との境界
//!
//! SDK は不透明な依存です。コアが呼ぶのは `create_ad` / `load` / `show` /
//! `destroy` だけで、SDK からの通知はすべて `AdListener::notify` に
//! `SdkEvent` として流し込まれます。
//!
//! # スレッド
//! - `notify` はどのスレッドから呼ばれてもよい
//! - 通知はチャネル経由でインスタンスごとの pump タスクに集約され、
//!   そこでのみ状態が変更される

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::domain::SlotId;
use crate::error::SdkError;
use crate::pump::PumpMessage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdKind {
    RewardVideo,
    Banner,
    Splash,
}

/// Media parameters forwarded to the SDK when an ad object is created.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdRequestConfig {
    /// Used by the ad network for server-side reward verification.
    pub user_id: Option<String>,
    pub reward_name: Option<String>,
    pub reward_amount: Option<u32>,
    pub extra: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdRequest {
    pub kind: AdKind,
    pub slot_id: SlotId,
    pub config: AdRequestConfig,
}

impl AdRequest {
    pub fn new(kind: AdKind, slot_id: SlotId, config: AdRequestConfig) -> Self {
        Self {
            kind,
            slot_id,
            config,
        }
    }
}

/// Opaque handle to whatever the UI layer presents ads on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PresentationSurface {
    id: String,
}

impl PresentationSurface {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

/// Everything the SDK can tell us about one ad object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SdkEvent {
    LoadSucceeded,
    LoadFailed(SdkError),
    VideoDownloaded,
    BecameVisible,
    ShowFailed(SdkError),
    Clicked,
    Skipped,
    /// `Some` when playback ended with an error.
    PlayFinished(Option<SdkError>),
    RewardVerified(bool),
    Closed,
}

/// Listener handed to the SDK together with each ad object.
///
/// Carries the generation of the ad object it was created for; once the
/// owner replaces or disposes that object, events from this listener are
/// dropped by the owner.
#[derive(Debug, Clone)]
pub struct AdListener {
    generation: u64,
    tx: mpsc::UnboundedSender<PumpMessage>,
}

impl AdListener {
    pub(crate) fn new(generation: u64, tx: mpsc::UnboundedSender<PumpMessage>) -> Self {
        Self { generation, tx }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Push one event. Returns `false` when the owner is gone.
    pub fn notify(&self, event: SdkEvent) -> bool {
        self.tx
            .send(PumpMessage::Sdk {
                generation: self.generation,
                event,
            })
            .is_ok()
    }
}

/// One underlying ad placement owned by a lifecycle wrapper.
pub trait AdObject: Send {
    /// Start fetching the creative. Results arrive through the listener.
    fn load(&mut self);

    /// Present on `surface`. Synchronous refusals are returned directly.
    fn show(&mut self, surface: &PresentationSurface) -> Result<(), SdkError>;

    /// Detach the listener and release SDK resources.
    fn destroy(&mut self);
}

/// The mediation SDK.
pub trait AdSdk: Send + Sync {
    fn create_ad(
        &self,
        request: &AdRequest,
        listener: AdListener,
    ) -> Result<Box<dyn AdObject>, SdkError>;
}
