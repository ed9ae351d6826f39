//! Fixed-rate walk over a frame list

use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Interval, MissedTickBehavior, interval};
use tracing::{debug, info, trace};

use crate::Result;
use crate::config::PlaybackConfig;
use crate::ilda::IldaFile;
use crate::playback::{FPS_RANGE, FrameRef};
use crate::provider::Provider;
use crate::types::Frame;

/// Sends every frame in order at a fixed rate, optionally looping.
pub struct SequenceProvider {
    frames: Arc<[Frame]>,
    next_index: usize,
    fps: f64,
    loop_enabled: bool,
    interval: Option<Interval>,
    loops_completed: u64,
}

impl SequenceProvider {
    pub fn new(frames: Arc<[Frame]>, fps: f64, loop_enabled: bool) -> Self {
        let fps = if fps.is_nan() { 25.0 } else { fps.clamp(FPS_RANGE.0, FPS_RANGE.1) };
        Self { frames, next_index: 0, fps, loop_enabled, interval: None, loops_completed: 0 }
    }

    /// Rate is `fps * speed` from the config.
    pub fn from_file(file: &IldaFile, config: &PlaybackConfig) -> Self {
        let config = config.normalized();
        info!(
            frames = file.frame_count(),
            fps = config.fps * config.speed,
            looping = config.loop_enabled,
            "Sequencing ILDA file"
        );
        Self::new(Arc::clone(file.frames()), config.fps * config.speed, config.loop_enabled)
    }

    pub fn loops_completed(&self) -> u64 {
        self.loops_completed
    }

    fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.fps)
    }
}

#[async_trait::async_trait]
impl Provider for SequenceProvider {
    async fn next_frame(&mut self) -> Result<Option<FrameRef>> {
        if self.frames.is_empty() {
            debug!("No frames to sequence");
            return Ok(None);
        }

        if self.next_index >= self.frames.len() {
            if !self.loop_enabled {
                debug!(frames = self.frames.len(), "Sequence finished");
                return Ok(None);
            }
            self.next_index = 0;
            self.loops_completed += 1;
            info!(loops = self.loops_completed, "Sequence looped");
        }

        // Created lazily so the provider can be built outside a runtime.
        let period = self.frame_interval();
        let interval = self.interval.get_or_insert_with(|| {
            let mut interval = interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });
        interval.tick().await;

        let index = self.next_index;
        self.next_index += 1;
        trace!(index, total = self.frames.len(), "Sequencing frame");
        Ok(FrameRef::new(Arc::clone(&self.frames), index))
    }

    fn frame_rate(&self) -> f64 {
        self.fps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::sample_frames;

    async fn collect_indices(provider: &mut SequenceProvider, limit: usize) -> Vec<usize> {
        let mut out = Vec::new();
        while out.len() < limit {
            match provider.next_frame().await.expect("sequence provider never fails") {
                Some(frame) => out.push(frame.index()),
                None => break,
            }
        }
        out
    }

    #[tokio::test(start_paused = true)]
    async fn single_play_ends_after_last_frame() {
        let mut provider = SequenceProvider::new(sample_frames(3).into(), 100.0, false);
        assert_eq!(collect_indices(&mut provider, 10).await, vec![0, 1, 2]);
        assert_eq!(provider.loops_completed(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn looping_wraps_and_counts() {
        let mut provider = SequenceProvider::new(sample_frames(2).into(), 100.0, true);
        assert_eq!(collect_indices(&mut provider, 5).await, vec![0, 1, 0, 1, 0]);
        assert_eq!(provider.loops_completed(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn frames_are_paced() {
        let mut provider = SequenceProvider::new(sample_frames(3).into(), 10.0, false);
        let start = tokio::time::Instant::now();
        collect_indices(&mut provider, 3).await;
        assert!(start.elapsed() >= Duration::from_millis(200));
    }

    #[tokio::test]
    async fn empty_sequence_ends_immediately() {
        let mut provider = SequenceProvider::new(Vec::new().into(), 25.0, true);
        assert!(provider.next_frame().await.expect("ok").is_none());
    }
}
