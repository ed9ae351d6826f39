//! Delivery rate control for packet streams

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Rate at which a subscriber wants to see packets
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub enum UpdateRate {
    /// Every packet as it is decoded
    #[default]
    Native,

    /// At most this many packets per second, latest wins
    ///
    /// `Max(0)` is treated as `Native`; there is no way to ask for silence.
    Max(u32),
}

impl UpdateRate {
    /// Throttle interval, or `None` when every packet should pass.
    pub fn interval(self) -> Option<Duration> {
        match self {
            UpdateRate::Native | UpdateRate::Max(0) => None,
            UpdateRate::Max(hz) => Some(Duration::from_secs_f64(1.0 / hz as f64)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_matches_rate() {
        assert_eq!(UpdateRate::Native.interval(), None);
        assert_eq!(UpdateRate::Max(0).interval(), None);
        assert_eq!(UpdateRate::Max(4).interval(), Some(Duration::from_millis(250)));
        assert_eq!(UpdateRate::default(), UpdateRate::Native);
    }
}
