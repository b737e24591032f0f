//! TaskProgress - タスクごとの視聴回数（ネットワークサービスから受け取る）
//!
//! コアは読むだけで永続化しない。

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::TaskType;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskProgress {
    #[serde(default)]
    view_counts: HashMap<TaskType, u64>,
}

impl TaskProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_count(mut self, task: TaskType, count: u64) -> Self {
        self.view_counts.insert(task, count);
        self
    }

    /// Unknown task types count as zero views.
    pub fn view_count(&self, task: TaskType) -> u64 {
        self.view_counts.get(&task).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_task_counts_as_zero() {
        let progress = TaskProgress::new().with_count(TaskType::DailyTask, 4);
        assert_eq!(progress.view_count(TaskType::DailyTask), 4);
        assert_eq!(progress.view_count(TaskType::SwipeTask), 0);
    }

    #[test]
    fn decodes_from_service_json() {
        let progress: TaskProgress =
            serde_json::from_value(serde_json::json!({ "view_counts": { "swipe_task": 7 } }))
                .unwrap();
        assert_eq!(progress.view_count(TaskType::SwipeTask), 7);
    }
}
