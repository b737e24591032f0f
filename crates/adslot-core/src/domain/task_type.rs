//! TaskType - タスクセンターのエンゲージメント種別
//!
//! # 選択ポリシー
//! - 逐次アクセス（DailyTask, SwipeTask）: 視聴回数に応じてスロットを順番に進める
//! - ランダム（Splash, Banner, Feed）: バックエンド側の負荷分散のため毎回ランダム

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    DailyTask,
    SwipeTask,
    Splash,
    Banner,
    Feed,
}

impl TaskType {
    pub const ALL: [TaskType; 5] = [
        TaskType::DailyTask,
        TaskType::SwipeTask,
        TaskType::Splash,
        TaskType::Banner,
        TaskType::Feed,
    ];

    /// Slot selection advances with the user's cumulative view count.
    pub fn requires_sequential_access(self) -> bool {
        matches!(self, TaskType::DailyTask | TaskType::SwipeTask)
    }

    /// Whether the "next" slot is predictable and worth preloading.
    pub fn supports_preloading(self) -> bool {
        self.requires_sequential_access()
    }

    /// Identifier used by the task-center payload.
    pub fn wire_id(self) -> &'static str {
        match self {
            TaskType::DailyTask => "daily_task",
            TaskType::SwipeTask => "swipe_task",
            TaskType::Splash => "splash",
            TaskType::Banner => "banner",
            TaskType::Feed => "feed",
        }
    }

    /// Resolve a payload task id. Unknown ids return `None` and are skipped by the parser.
    pub fn from_wire(id: &str) -> Option<Self> {
        let normalized = id.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "daily_task" | "daily" => Some(TaskType::DailyTask),
            "swipe_task" | "swipe" => Some(TaskType::SwipeTask),
            "splash" | "open_screen" => Some(TaskType::Splash),
            "banner" => Some(TaskType::Banner),
            "feed" => Some(TaskType::Feed),
            _ => None,
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_id())
    }
}
