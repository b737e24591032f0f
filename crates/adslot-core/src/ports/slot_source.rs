//! SlotConfigSource port - タスクセンターのネットワークサービス
//!
//! スロット設定 JSON を取得するだけ。リトライやバックオフは
//! 下位の HTTP クライアントの責務でここでは扱わない。

use async_trait::async_trait;

use crate::error::ConfigError;

#[async_trait]
pub trait SlotConfigSource: Send + Sync {
    /// Raw JSON: `{ "<platform>": [ { "taskId", "taskName", "slotIds", "watchIntervalSeconds" } ] }`.
    async fn fetch_slot_configuration(&self) -> Result<String, ConfigError>;
}
