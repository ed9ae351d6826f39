//! Frame-rate driven playback state machine
//!
//! [`PlaybackClock`] is owned and mutated by the host (a UI loop, a test, a
//! control task). Anything that only needs to read the current frame, such as
//! a transmit loop, subscribes to [`PlaybackSnapshot`]s instead of sharing the
//! clock. Every mutation publishes a fresh snapshot, so readers always see an
//! index and a frame list that belong together.

use serde::{Deserialize, Serialize};
use std::ops::Deref;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::config::PlaybackConfig;
use crate::ilda::IldaFile;
use crate::types::Frame;

/// Allowed frames-per-second range.
pub const FPS_RANGE: (f64, f64) = (0.1, 1000.0);

/// Allowed speed multiplier range.
pub const SPEED_RANGE: (f64, f64) = (0.1, 10.0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackState {
    /// Index is held at 0
    Stopped,
    /// Index is kept, the clock does not advance
    Paused,
    Playing,
}

/// A frame borrowed out of a shared frame list.
#[derive(Debug, Clone)]
pub struct FrameRef {
    frames: Arc<[Frame]>,
    index: usize,
}

impl FrameRef {
    /// `None` when `index` is out of range.
    pub fn new(frames: Arc<[Frame]>, index: usize) -> Option<Self> {
        (index < frames.len()).then_some(Self { frames, index })
    }

    pub fn index(&self) -> usize {
        self.index
    }
}

impl Deref for FrameRef {
    type Target = Frame;

    fn deref(&self) -> &Frame {
        &self.frames[self.index]
    }
}

/// What a reader sees of the clock: one index paired with its frame list.
#[derive(Debug, Clone)]
pub struct PlaybackSnapshot {
    pub index: usize,
    pub frames: Arc<[Frame]>,
    pub state: PlaybackState,
}

impl PlaybackSnapshot {
    pub fn current(&self) -> Option<FrameRef> {
        FrameRef::new(Arc::clone(&self.frames), self.index)
    }
}

/// Plain-data status record for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackStatus {
    pub state: PlaybackState,
    pub playing: bool,
    pub index: usize,
    pub total_frames: usize,
    pub fps: f64,
    pub speed: f64,
    pub loop_enabled: bool,
    pub source: Option<String>,
}

/// Selects the current frame based on elapsed time.
pub struct PlaybackClock {
    frames: Arc<[Frame]>,
    source: Option<String>,
    index: usize,
    state: PlaybackState,
    loop_enabled: bool,
    fps: f64,
    speed: f64,
    last_advance: Instant,
    snapshots: watch::Sender<Arc<PlaybackSnapshot>>,
}

impl PlaybackClock {
    /// A stopped clock over `frames` at the default 25 fps, looping.
    pub fn new(frames: Arc<[Frame]>) -> Self {
        Self::with_config(frames, &PlaybackConfig::default())
    }

    pub fn with_config(frames: Arc<[Frame]>, config: &PlaybackConfig) -> Self {
        let config = config.normalized();
        let snapshot = Arc::new(PlaybackSnapshot {
            index: 0,
            frames: Arc::clone(&frames),
            state: PlaybackState::Stopped,
        });
        let (snapshots, _) = watch::channel(snapshot);
        Self {
            frames,
            source: None,
            index: 0,
            state: PlaybackState::Stopped,
            loop_enabled: config.loop_enabled,
            fps: config.fps,
            speed: config.speed,
            last_advance: Instant::now(),
            snapshots,
        }
    }

    /// A stopped clock over the frames of a decoded file.
    pub fn from_file(file: &IldaFile) -> Self {
        let mut clock = Self::new(Arc::clone(file.frames()));
        clock.source = Some(file.source_name());
        clock
    }

    /// Swap in a new frame list. Stops playback.
    pub fn load(&mut self, frames: Arc<[Frame]>, source: Option<String>) {
        info!(frames = frames.len(), source = ?source, "Loaded frames into playback clock");
        self.frames = frames;
        self.source = source;
        self.index = 0;
        self.state = PlaybackState::Stopped;
        self.publish();
    }

    pub fn play(&mut self) {
        self.play_at(Instant::now());
    }

    /// Start playing with `now` as the advance baseline.
    ///
    /// Already playing is a no-op; the baseline is not reset.
    pub fn play_at(&mut self, now: Instant) {
        if self.state == PlaybackState::Playing {
            return;
        }
        self.state = PlaybackState::Playing;
        self.last_advance = now;
        debug!(index = self.index, "Playback started");
        self.publish();
    }

    /// Pause in place. Only has an effect while playing.
    pub fn pause(&mut self) {
        if self.state == PlaybackState::Playing {
            self.state = PlaybackState::Paused;
            debug!(index = self.index, "Playback paused");
            self.publish();
        }
    }

    pub fn stop(&mut self) {
        self.state = PlaybackState::Stopped;
        self.index = 0;
        debug!("Playback stopped");
        self.publish();
    }

    /// Back to frame 0 with a fresh advance baseline. The play state is kept.
    pub fn restart(&mut self) {
        self.restart_at(Instant::now());
    }

    pub fn restart_at(&mut self, now: Instant) {
        self.index = 0;
        self.last_advance = now;
        debug!(state = ?self.state, "Playback restarted");
        self.publish();
    }

    /// Advance when a frame interval has elapsed.
    ///
    /// Returns `true` only if the current index changed.
    pub fn update(&mut self) -> bool {
        self.update_at(Instant::now())
    }

    pub fn update_at(&mut self, now: Instant) -> bool {
        if self.state != PlaybackState::Playing || self.frames.is_empty() {
            return false;
        }
        if now.saturating_duration_since(self.last_advance) < self.frame_interval() {
            return false;
        }
        self.last_advance = now;
        self.next_frame()
    }

    /// Step forward one frame.
    ///
    /// Wraps to 0 when looping. Without looping, stepping off the last frame
    /// keeps the last index and pauses. Returns whether the index changed.
    pub fn next_frame(&mut self) -> bool {
        let total = self.frames.len();
        if total == 0 {
            return false;
        }
        let before = self.index;
        if self.index + 1 < total {
            self.index += 1;
        } else if self.loop_enabled {
            self.index = 0;
        } else {
            self.index = total - 1;
            if self.state == PlaybackState::Playing {
                self.state = PlaybackState::Paused;
                info!(index = self.index, "Reached last frame, playback paused");
            }
        }
        self.publish();
        self.index != before
    }

    /// Step back one frame, wrapping to the last frame from 0.
    pub fn previous_frame(&mut self) -> bool {
        let total = self.frames.len();
        if total == 0 {
            return false;
        }
        let before = self.index;
        self.index = (self.index + total - 1) % total;
        self.publish();
        self.index != before
    }

    /// Jump to `index`. Out-of-range indices are ignored and return `false`.
    pub fn set_frame(&mut self, index: usize) -> bool {
        if index >= self.frames.len() {
            return false;
        }
        self.index = index;
        self.publish();
        true
    }

    pub fn set_fps(&mut self, fps: f64) {
        self.fps = clamp_or(fps, FPS_RANGE, self.fps);
        debug!(fps = self.fps, "Playback fps set");
    }

    pub fn set_speed(&mut self, speed: f64) {
        self.speed = clamp_or(speed, SPEED_RANGE, self.speed);
        debug!(speed = self.speed, "Playback speed set");
    }

    pub fn set_loop(&mut self, enabled: bool) {
        self.loop_enabled = enabled;
    }

    /// Time between advances: `1 / (fps * speed)`.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / (self.fps * self.speed))
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn loop_enabled(&self) -> bool {
        self.loop_enabled
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn current_frame(&self) -> Option<&Frame> {
        self.frames.get(self.index)
    }

    pub fn status(&self) -> PlaybackStatus {
        PlaybackStatus {
            state: self.state,
            playing: self.is_playing(),
            index: self.index,
            total_frames: self.frames.len(),
            fps: self.fps,
            speed: self.speed,
            loop_enabled: self.loop_enabled,
            source: self.source.clone(),
        }
    }

    /// The latest snapshot.
    pub fn snapshot(&self) -> Arc<PlaybackSnapshot> {
        self.snapshots.borrow().clone()
    }

    /// Receive a snapshot after every mutation.
    ///
    /// The channel closes when the clock is dropped.
    pub fn subscribe(&self) -> watch::Receiver<Arc<PlaybackSnapshot>> {
        self.snapshots.subscribe()
    }

    fn publish(&self) {
        self.snapshots.send_replace(Arc::new(PlaybackSnapshot {
            index: self.index,
            frames: Arc::clone(&self.frames),
            state: self.state,
        }));
    }
}

fn clamp_or(value: f64, (min, max): (f64, f64), fallback: f64) -> f64 {
    if value.is_nan() { fallback } else { value.clamp(min, max) }
}
