//! Ports - 外部コラボレーターとの境界
//!
//! - **ad_sdk**: 広告メディエーション SDK（load / show / destroy とイベント通知）
//! - **slot_source**: スロット設定を返すタスクセンター API
//! - **clock**: キャッシュ鮮度判定用の時刻

pub mod ad_sdk;
pub mod clock;
pub mod slot_source;

pub use self::ad_sdk::{
    AdKind, AdListener, AdObject, AdRequest, AdRequestConfig, AdSdk, PresentationSurface,
    SdkEvent,
};
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::slot_source::SlotConfigSource;
