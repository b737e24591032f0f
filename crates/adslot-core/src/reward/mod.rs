//! Reward - リワード動画広告
//!
//! # 構成
//! - **instance**: 1 スロット分の状態機械（RewardAdInstance）
//! - **registry**: slot_id ごとのインスタンス管理と close 後の自動削除
//! - **subscription**: ライフサイクルイベントの購読

pub mod instance;
pub mod registry;
pub mod subscription;

pub use self::instance::{Retirement, RewardAdInstance};
pub use self::registry::RewardAdRegistry;
pub use self::subscription::EventSubscription;
