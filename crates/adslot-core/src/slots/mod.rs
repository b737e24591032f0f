//! Slots - タスク種別からスロット ID を引く
//!
//! - **config**: タスクセンターの JSON → AdSlotPool
//! - **pool**: 不変のスロットプール
//! - **selection**: 逐次 / ランダムの選択ポリシー
//! - **directory**: キャッシュ付きの検索窓口

pub mod config;
pub mod directory;
pub mod pool;
pub mod selection;

pub use self::config::{load_configuration, parse_payload};
pub use self::directory::AdSlotDirectory;
pub use self::pool::{AdSlotPool, SlotEntry};
pub use self::selection::SlotSelectionPolicy;
