//! AdSlotPool - タスク種別ごとのスロット列と視聴間隔

use std::collections::HashMap;

use crate::domain::{SlotId, TaskType};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlotEntry {
    pub slot_ids: Vec<SlotId>,
    pub watch_interval_secs: u64,
}

/// Immutable once built; a refresh builds a new pool and swaps it in whole.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdSlotPool {
    entries: HashMap<TaskType, SlotEntry>,
}

impl AdSlotPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add slots for `task`. A repeated task extends the existing slot list;
    /// a non-zero interval replaces the previous one.
    pub fn insert(&mut self, task: TaskType, slot_ids: Vec<SlotId>, watch_interval_secs: u64) {
        if slot_ids.is_empty() {
            return;
        }
        let entry = self.entries.entry(task).or_default();
        entry.slot_ids.extend(slot_ids);
        if watch_interval_secs > 0 {
            entry.watch_interval_secs = watch_interval_secs;
        }
    }

    pub fn with_slots(mut self, task: TaskType, slot_ids: &[&str], watch_interval_secs: u64) -> Self {
        let ids = slot_ids.iter().filter_map(|raw| SlotId::parse(raw)).collect();
        self.insert(task, ids, watch_interval_secs);
        self
    }

    pub fn entry(&self, task: TaskType) -> Option<&SlotEntry> {
        self.entries.get(&task)
    }

    /// Empty slice when the task has no slots.
    pub fn slots(&self, task: TaskType) -> &[SlotId] {
        self.entries
            .get(&task)
            .map(|entry| entry.slot_ids.as_slice())
            .unwrap_or(&[])
    }

    pub fn watch_interval_secs(&self, task: TaskType) -> u64 {
        self.entries
            .get(&task)
            .map(|entry| entry.watch_interval_secs)
            .unwrap_or(0)
    }

    pub fn tasks(&self) -> impl Iterator<Item = TaskType> + '_ {
        self.entries.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_task_extends_slots() {
        let pool = AdSlotPool::new()
            .with_slots(TaskType::DailyTask, &["A", "B"], 60)
            .with_slots(TaskType::DailyTask, &["C"], 0);
        let ids: Vec<&str> = pool.slots(TaskType::DailyTask).iter().map(SlotId::as_str).collect();
        assert_eq!(ids, vec!["A", "B", "C"]);
        assert_eq!(pool.watch_interval_secs(TaskType::DailyTask), 60);
    }

    #[test]
    fn blank_slots_never_create_an_entry() {
        let pool = AdSlotPool::new().with_slots(TaskType::Feed, &["", "  "], 30);
        assert!(pool.entry(TaskType::Feed).is_none());
        assert!(pool.slots(TaskType::Feed).is_empty());
        assert_eq!(pool.watch_interval_secs(TaskType::Feed), 0);
    }
}
