//! Domain model (task types, ids, states, events, progress).

pub mod events;
pub mod ids;
pub mod progress;
pub mod state;
pub mod task_type;

pub use self::events::{BannerEvent, RewardAdEvent, SlotEvent};
pub use self::ids::{InstanceId, SlotId};
pub use self::progress::TaskProgress;
pub use self::state::{BannerState, RewardAdState};
pub use self::task_type::TaskType;
