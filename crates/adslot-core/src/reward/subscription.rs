//! EventSubscription - ライフサイクルイベントの購読口
//!
//! broadcast の受信側をラップして slot_id で絞り込む。
//! 遅い購読者は取りこぼす（Lagged）だけで、コア側を止めない。

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tracing::warn;

use crate::domain::{SlotEvent, SlotId};

pub(crate) const EVENT_CAPACITY: usize = 128;

pub struct EventSubscription {
    rx: broadcast::Receiver<SlotEvent>,
    slot: Option<SlotId>,
}

impl EventSubscription {
    pub(crate) fn new(rx: broadcast::Receiver<SlotEvent>, slot: Option<SlotId>) -> Self {
        Self { rx, slot }
    }

    fn wants(&self, event: &SlotEvent) -> bool {
        self.slot.as_ref().is_none_or(|slot| *slot == event.slot_id)
    }

    /// Next matching event, or `None` once every sender is gone.
    pub async fn recv(&mut self) -> Option<SlotEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) if self.wants(&event) => return Some(event),
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event subscriber lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next matching event already buffered, without waiting.
    pub fn try_recv(&mut self) -> Option<SlotEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) if self.wants(&event) => return Some(event),
                Ok(_) => continue,
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "event subscriber lagged");
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }

    /// Everything currently buffered.
    pub fn drain(&mut self) -> Vec<SlotEvent> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}
