//! State - 広告インスタンスの状態

use serde::{Deserialize, Serialize};
use std::fmt;

/// Controlling states of a rewarded-video instance.
///
/// State transitions:
/// - Initial -> Loading -> Loaded | VideoDownloaded -> Showing -> Closed
/// - Loading -> LoadFailed
/// - Showing -> ShowFailed
///
/// Reward verification, clicks, skips and playback results are events only
/// (see `RewardAdEvent`); they never move the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardAdState {
    #[default]
    Initial,
    Loading,
    Loaded,
    VideoDownloaded,
    Showing,
    Closed,
    LoadFailed,
    ShowFailed,
}

impl RewardAdState {
    /// Can be presented right now.
    pub fn is_ready(self) -> bool {
        matches!(self, RewardAdState::Loaded | RewardAdState::VideoDownloaded)
    }

    pub fn is_loading(self) -> bool {
        matches!(self, RewardAdState::Loading)
    }

    pub fn is_showing(self) -> bool {
        matches!(self, RewardAdState::Showing)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RewardAdState::Initial => "initial",
            RewardAdState::Loading => "loading",
            RewardAdState::Loaded => "loaded",
            RewardAdState::VideoDownloaded => "video_downloaded",
            RewardAdState::Showing => "showing",
            RewardAdState::Closed => "closed",
            RewardAdState::LoadFailed => "load_failed",
            RewardAdState::ShowFailed => "show_failed",
        }
    }
}

impl fmt::Display for RewardAdState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Banner lifecycle (non-multiplexed, one slot per banner view).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BannerState {
    #[default]
    Idle,
    Loading,
    Loaded,
    Showing,
    Closed,
}

impl BannerState {
    pub fn is_terminal(self) -> bool {
        matches!(self, BannerState::Closed)
    }
}
