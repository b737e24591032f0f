//! StaticSlotSource - 固定の JSON を返す SlotConfigSource（開発用・テスト用）

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::ConfigError;
use crate::ports::SlotConfigSource;

pub struct StaticSlotSource {
    response: Mutex<Result<String, String>>,
    fetches: AtomicUsize,
}

impl StaticSlotSource {
    pub fn new(payload: impl Into<String>) -> Self {
        Self {
            response: Mutex::new(Ok(payload.into())),
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn set_payload(&self, payload: impl Into<String>) {
        *self.response.lock() = Ok(payload.into());
    }

    /// Every following fetch fails until `set_payload` is called again.
    pub fn fail_with(&self, reason: impl Into<String>) {
        *self.response.lock() = Err(reason.into());
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SlotConfigSource for StaticSlotSource {
    async fn fetch_slot_configuration(&self) -> Result<String, ConfigError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.response.lock().clone().map_err(ConfigError::Fetch)
    }
}
