//! Message types for the engine loop

use lensmirror_core::RawDeviceEvent;

use crate::action::LocalAction;
use crate::jobs::JobResult;
use crate::ticker::TickKind;

/// Everything the engine loop reacts to, processed in arrival order.
#[derive(Debug, Clone)]
pub enum Message {
    /// Local control
    Action(LocalAction),

    /// Raw device event from the bridge bound in `generation`
    Device {
        generation: u64,
        raw: RawDeviceEvent,
    },

    /// The bridge event stream of `generation` ended
    DeviceStreamClosed { generation: u64 },

    Tick { kind: TickKind, epoch: u64 },

    /// Debounced reconnect after an abnormal exit
    Reconnect,

    JobFinished(JobResult),

    Quit,
}
