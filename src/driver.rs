//! Driver runs the transmit pacing loop

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

use crate::provider::Provider;
use crate::transmitter::{TransmitStats, Transmitter, TransmitterMonitor};
use crate::{LaserError, Result};

/// Handle to a running pacing loop.
///
/// Dropping the handle cancels the loop. [`join`](Self::join) hands the
/// transmitter back once the loop has finished.
pub struct DriverHandle {
    cancel: CancellationToken,
    monitor: TransmitterMonitor,
    task: Option<JoinHandle<Transmitter>>,
}

impl DriverHandle {
    /// Ask the loop to stop. It checks before every datagram.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Wait for the loop to finish and take back the transmitter.
    pub async fn join(mut self) -> Result<Transmitter> {
        match self.task.take() {
            Some(task) => Ok(task.await?),
            None => Err(LaserError::Task { details: "driver task already joined".to_string() }),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(JoinHandle::is_finished)
    }

    pub fn stats(&self) -> TransmitStats {
        self.monitor.stats()
    }
}

impl Drop for DriverHandle {
    fn drop(&mut self) {
        debug!("Dropping driver handle");
        self.cancel.cancel();
    }
}

/// Spawns the task that pulls frames from a [`Provider`] and sends them.
///
/// The loop ends when the provider finishes, the token is cancelled, or a
/// send fails. Sends are never retried. On the way out the transmitter is
/// disconnected, which turns the laser off.
pub struct Driver;

impl Driver {
    pub fn spawn<P>(provider: P, transmitter: Transmitter) -> DriverHandle
    where
        P: Provider,
    {
        let cancel = CancellationToken::new();
        let monitor = transmitter.monitor();

        let cancel_loop = cancel.clone();
        let task = tokio::spawn(async move {
            Self::pacing_loop(provider, transmitter, cancel_loop).await
        });

        DriverHandle { cancel, monitor, task: Some(task) }
    }

    async fn pacing_loop<P>(
        mut provider: P,
        mut transmitter: Transmitter,
        cancel: CancellationToken,
    ) -> Transmitter
    where
        P: Provider,
    {
        info!(fps = provider.frame_rate(), "Pacing loop started");
        let mut frame_count = 0u64;

        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Pacing loop cancelled while waiting for a frame");
                    break;
                }
                next = provider.next_frame() => next,
            };

            let frame = match next {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    info!("Provider finished after {} frames", frame_count);
                    break;
                }
                Err(e) => {
                    error!("Provider error, stopping: {}", e);
                    break;
                }
            };

            match transmitter.send_frame_cancellable(&frame, &cancel).await {
                Ok(datagrams) => {
                    frame_count += 1;
                    trace!(index = frame.index(), datagrams, "Frame {} sent", frame_count);
                }
                Err(LaserError::Cancelled) => {
                    info!("Pacing loop cancelled mid-frame");
                    break;
                }
                Err(e) => {
                    error!("Send failed, stopping pacing loop: {}", e);
                    break;
                }
            }
        }

        transmitter.disconnect().await;
        info!("Pacing loop ended (sent {} frames)", frame_count);
        transmitter
    }
}
