//! Events - 広告ライフサイクルイベント
//!
//! SDK のデリゲートメソッド群を 1 つのタグ付き enum にまとめ、
//! 購読チャネル（broadcast）で UI 層に届けます。

use crate::domain::{InstanceId, SlotId};
use crate::error::{AdError, SdkError};

/// Lifecycle events of one rewarded-video instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewardAdEvent {
    LoadStarted,
    Loaded,
    VideoDownloaded,
    LoadFailed(AdError),
    /// Presentation was requested from the SDK.
    ShowStarted,
    /// The SDK reports the ad is on screen.
    Visible,
    ShowFailed(AdError),
    Clicked,
    Skipped,
    PlayFinished,
    PlayFailed(SdkError),
    RewardSuccess,
    RewardFailed(AdError),
    Closed,
}

impl RewardAdEvent {
    /// Closed is the only event after which the instance is torn down.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RewardAdEvent::Closed)
    }
}

/// A `RewardAdEvent` tagged with the slot and instance it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotEvent {
    pub slot_id: SlotId,
    pub instance_id: InstanceId,
    pub event: RewardAdEvent,
}

/// Banner lifecycle events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BannerEvent {
    Loaded,
    LoadFailed(AdError),
    Shown,
    ShowFailed(AdError),
    Clicked,
    Refreshed,
    Closed,
}
