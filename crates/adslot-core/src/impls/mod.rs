//! Impls - ports の実装（開発用・テスト用）
//!
//! # 含まれる実装
//! - **SimulatedSdk**: 手動 / 自動でイベントを流す SDK の代役
//! - **StaticSlotSource**: 固定 JSON を返すスロット設定ソース
//!
//! 本番用の SDK バインディングとネットワーククライアントはアプリ側に置く。

pub mod simulated_sdk;
pub mod static_source;

pub use self::simulated_sdk::{SimulatedBehavior, SimulatedSdk, SlotCalls};
pub use self::static_source::StaticSlotSource;
