//! Slot configuration payload → AdSlotPool.
//!
//! The task center returns every platform's task list in one document:
//!
//! ```json
//! { "ios": [ { "taskId": "daily_task", "taskName": "Daily", "slotIds": ["A", "B"], "watchIntervalSeconds": 60 } ] }
//! ```
//!
//! Some deployments wrap it in `{ "data": { ... } }`. Entries are decoded one
//! by one so a malformed task never takes the rest of the list down with it.

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::pool::AdSlotPool;
use crate::domain::{SlotId, TaskType};
use crate::error::ConfigError;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTaskEntry {
    #[serde(default)]
    task_id: String,
    #[serde(default)]
    task_name: String,
    #[serde(default)]
    slot_ids: Option<Value>,
    #[serde(default)]
    watch_interval_seconds: Option<Value>,
}

/// Decode raw JSON text. Only a payload that is not a JSON object fails.
pub fn parse_payload(raw: &str, platform: &str) -> Result<AdSlotPool, ConfigError> {
    let payload: Value = serde_json::from_str(raw)?;
    if !payload.is_object() {
        return Err(ConfigError::NotAnObject);
    }
    Ok(load_configuration(&payload, platform))
}

/// Build the pool for `platform`. Never fails: bad entries are skipped and a
/// missing platform yields an empty pool.
pub fn load_configuration(payload: &Value, platform: &str) -> AdSlotPool {
    let root = match payload.get("data") {
        Some(data) if data.is_object() => data,
        _ => payload,
    };

    let mut pool = AdSlotPool::new();
    let Some(tasks) = root.get(platform).and_then(Value::as_array) else {
        debug!(platform, "no task list for platform");
        return pool;
    };

    for raw in tasks {
        let Ok(entry) = RawTaskEntry::deserialize(raw) else {
            debug!(platform, "skipping malformed task entry");
            continue;
        };
        if entry.task_id.trim().is_empty() || entry.task_name.trim().is_empty() {
            debug!(platform, task_id = %entry.task_id, "skipping task without id or name");
            continue;
        }
        let Some(task) = TaskType::from_wire(&entry.task_id) else {
            debug!(platform, task_id = %entry.task_id, "skipping unknown task id");
            continue;
        };
        let slot_ids = slot_ids(entry.slot_ids.as_ref());
        if slot_ids.is_empty() {
            debug!(platform, %task, "skipping task without slot ids");
            continue;
        }
        pool.insert(task, slot_ids, seconds(entry.watch_interval_seconds.as_ref()));
    }
    pool
}

/// Accepts an array (strings or numbers) or a comma-separated string.
fn slot_ids(raw: Option<&Value>) -> Vec<SlotId> {
    match raw {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => SlotId::parse(s),
                Value::Number(n) => SlotId::parse(&n.to_string()),
                _ => None,
            })
            .collect(),
        Some(Value::String(csv)) => csv.split(',').filter_map(SlotId::parse).collect(),
        _ => Vec::new(),
    }
}

fn seconds(raw: Option<&Value>) -> u64 {
    match raw {
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}
