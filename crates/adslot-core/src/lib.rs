//! adslot-core
//!
//! タスクセンター向け広告スロットのライフサイクル管理。
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（task_type, ids, state, events, progress）
//! - **ports**: 外部境界（AdSdk, SlotConfigSource, Clock）
//! - **slots**: スロット設定の解析・選択ポリシー・ディレクトリ
//! - **reward**: リワード広告の状態機械とレジストリ
//! - **banner** / **splash**: 単一スロットの簡易ライフサイクル
//! - **app**: UI 向けファサード（AdCenter）と組み立て（AdCenterBuilder）
//! - **impls**: 開発用・テスト用の実装（SimulatedSdk, StaticSlotSource）

pub mod app;
pub mod banner;
pub mod config;
pub mod domain;
pub mod error;
pub mod impls;
pub mod ports;
pub mod reward;
pub mod slots;
pub mod splash;

mod pump;

pub use app::{AdCenter, AdCenterBuilder, BuildError, WatchOutcome};
pub use banner::{BannerAdInstance, ReloadDecision};
pub use config::AdCenterConfig;
pub use domain::{InstanceId, RewardAdEvent, RewardAdState, SlotEvent, SlotId, TaskProgress, TaskType};
pub use error::{AdError, ConfigError, SdkError};
pub use reward::{EventSubscription, RewardAdInstance, RewardAdRegistry};
pub use splash::{SkipReason, SplashAdInstance, SplashGate, SplashOutcome};
