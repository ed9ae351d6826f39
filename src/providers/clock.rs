//! Follow a host-owned playback clock

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{Interval, MissedTickBehavior, interval};
use tracing::{debug, trace};

use crate::Result;
use crate::playback::{FrameRef, PlaybackSnapshot, PlaybackState};
use crate::provider::Provider;

/// Re-sends whatever frame the host's [`PlaybackClock`](crate::playback::PlaybackClock)
/// currently selects, at a fixed refresh rate.
///
/// A stopped clock sends nothing; a paused clock keeps the current frame on
/// the projector. The provider ends when the clock is dropped.
pub struct ClockProvider {
    snapshots: watch::Receiver<Arc<PlaybackSnapshot>>,
    refresh_hz: f64,
    interval: Option<Interval>,
}

impl ClockProvider {
    pub fn new(snapshots: watch::Receiver<Arc<PlaybackSnapshot>>, refresh_hz: f64) -> Self {
        let refresh_hz = if refresh_hz.is_finite() && refresh_hz > 0.0 { refresh_hz } else { 25.0 };
        Self { snapshots, refresh_hz, interval: None }
    }
}

#[async_trait::async_trait]
impl Provider for ClockProvider {
    async fn next_frame(&mut self) -> Result<Option<FrameRef>> {
        let period = Duration::from_secs_f64(1.0 / self.refresh_hz);
        let interval = self.interval.get_or_insert_with(|| {
            let mut interval = interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });

        loop {
            interval.tick().await;

            if self.snapshots.has_changed().is_err() {
                debug!("Playback clock dropped, provider finished");
                return Ok(None);
            }
            let snapshot = self.snapshots.borrow_and_update().clone();
            if snapshot.state == PlaybackState::Stopped {
                continue;
            }
            if let Some(frame) = snapshot.current() {
                trace!(index = frame.index(), state = ?snapshot.state, "Following playback clock");
                return Ok(Some(frame));
            }
        }
    }

    fn frame_rate(&self) -> f64 {
        self.refresh_hz
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::PlaybackClock;
    use crate::test_utils::sample_frames;

    #[tokio::test(start_paused = true)]
    async fn follows_clock_index() {
        let mut clock = PlaybackClock::new(sample_frames(4).into());
        let mut provider = ClockProvider::new(clock.subscribe(), 50.0);

        clock.set_frame(2);
        clock.play();
        let frame = provider.next_frame().await.expect("ok").expect("frame");
        assert_eq!(frame.index(), 2);

        clock.pause();
        clock.next_frame();
        let frame = provider.next_frame().await.expect("ok").expect("frame");
        assert_eq!(frame.index(), 3, "paused clocks keep refreshing the current frame");
    }

    #[tokio::test(start_paused = true)]
    async fn stopped_clock_sends_nothing() {
        let clock = PlaybackClock::new(sample_frames(2).into());
        let mut provider = ClockProvider::new(clock.subscribe(), 50.0);

        let waited =
            tokio::time::timeout(Duration::from_millis(500), provider.next_frame()).await;
        assert!(waited.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn ends_when_clock_is_dropped() {
        let clock = PlaybackClock::new(sample_frames(2).into());
        let mut provider = ClockProvider::new(clock.subscribe(), 50.0);
        drop(clock);
        assert!(provider.next_frame().await.expect("ok").is_none());
    }
}
