//! Event pump - SDK コールバックを 1 つの実行コンテキストに集約する
//!
//! SDK の通知はどのスレッドからでも届くので、直接状態を触らずに
//! チャネルへ積み、インスタンスごとの pump タスクが順番に適用する。
//! タイムアウトも同じチャネルに流すので、SDK の完了通知とタイムアウトの
//! どちらが先に適用されたかが一意に決まる。

use std::sync::Weak;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::ports::SdkEvent;

#[derive(Debug)]
pub(crate) enum PumpMessage {
    Sdk { generation: u64, event: SdkEvent },
    LoadTimeout { generation: u64 },
}

pub(crate) trait PumpTarget: Send + Sync + 'static {
    fn dispatch(&self, message: PumpMessage);
}

pub(crate) fn channel() -> (
    mpsc::UnboundedSender<PumpMessage>,
    mpsc::UnboundedReceiver<PumpMessage>,
) {
    mpsc::unbounded_channel()
}

/// Apply messages to `target` in arrival order until the target is dropped.
pub(crate) fn spawn_pump<T: PumpTarget>(
    target: Weak<T>,
    mut rx: mpsc::UnboundedReceiver<PumpMessage>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let Some(target) = target.upgrade() else {
                break;
            };
            target.dispatch(message);
        }
    })
}

/// Post a `LoadTimeout` for `generation` after `after` elapses.
pub(crate) fn arm_timeout(
    tx: mpsc::UnboundedSender<PumpMessage>,
    generation: u64,
    after: std::time::Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(after).await;
        let _ = tx.send(PumpMessage::LoadTimeout { generation });
    })
}
