//! SlotSelectionPolicy - 視聴回数とタスク種別からスロットを選ぶ
//!
//! - 逐次: `slots[view_count % len]`（次に見る枠が予測できるので先読みできる）
//! - ランダム: 毎回一様ランダム（メディエーション側がスロット間で負荷分散する）

use parking_lot::Mutex;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use super::pool::AdSlotPool;
use crate::domain::{SlotId, TaskType};

#[derive(Debug)]
pub struct SlotSelectionPolicy {
    rng: Mutex<StdRng>,
}

impl SlotSelectionPolicy {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Deterministic random picks, for tests and replays.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn current_slot(&self, pool: &AdSlotPool, task: TaskType, view_count: u64) -> Option<SlotId> {
        let slots = pool.slots(task);
        if slots.is_empty() {
            return None;
        }
        if task.requires_sequential_access() {
            slots.get(sequential_index(view_count, slots.len())).cloned()
        } else {
            slots.choose(&mut *self.rng.lock()).cloned()
        }
    }

    /// Slot the user will see after the current one. `None` unless the task
    /// type supports preloading.
    pub fn next_slot(&self, pool: &AdSlotPool, task: TaskType, view_count: u64) -> Option<SlotId> {
        if !task.supports_preloading() {
            return None;
        }
        let slots = pool.slots(task);
        if slots.is_empty() {
            return None;
        }
        let next = (sequential_index(view_count, slots.len()) + 1) % slots.len();
        slots.get(next).cloned()
    }
}

impl Default for SlotSelectionPolicy {
    fn default() -> Self {
        Self::new()
    }
}

/// Reduced modulo the length of the pool at call time, so a refresh that
/// changes the pool size reseats the index instead of running off the end.
fn sequential_index(view_count: u64, len: usize) -> usize {
    (view_count % len as u64) as usize
}
