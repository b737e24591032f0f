//! App - UI 層との境界
//!
//! # 主要コンポーネント
//! - **AdCenter**: ディレクトリとレジストリをまとめたファサード
//! - **AdCenterBuilder**: 依存の組み立てと起動時検証

pub mod builder;
pub mod center;

pub use self::builder::{AdCenterBuilder, BuildError};
pub use self::center::{AdCenter, WatchOutcome};
