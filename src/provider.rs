//! Provider trait for frame sources

use crate::Result;
use crate::playback::FrameRef;

/// A paced source of frames for a [`Driver`](crate::driver::Driver).
///
/// Providers own their timing: `next_frame` resolves when the next frame is
/// due, so the driver can send it immediately.
#[async_trait::async_trait]
pub trait Provider: Send + 'static {
    /// Wait for and return the next frame to send.
    ///
    /// Returns:
    /// - `Ok(Some(frame))` - Frame is due now
    /// - `Ok(None)` - Source finished (normal termination)
    /// - `Err(e)` - Source failed
    async fn next_frame(&mut self) -> Result<Option<FrameRef>>;

    /// Nominal rate in frames per second.
    fn frame_rate(&self) -> f64;
}
