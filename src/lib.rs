//! ILDA laser show playback and IWP network streaming.
//!
//! Lasercast reads ILDA frame files, plays them back on a clock, and streams
//! the points to a laser DAC over UDP using the IWP protocol. The same crate
//! can listen for IWP traffic and decode it for preview or analysis.
//!
//! # Features
//!
//! - **ILDA decoding**: formats 0, 1, 2, 4 and 5 with palette support
//! - **IWP transmit**: chunked datagrams paced by a cancellable driver
//! - **IWP receive**: background listener with callbacks, a bounded queue and
//!   throttled async streams
//! - **Playback**: frame clock with fps, speed and looping
//!
//! ## Example (file to DAC)
//!
//! ```rust,no_run
//! use lasercast::{Lasercast, TransmitTarget};
//! use lasercast::config::PlaybackConfig;
//!
//! #[tokio::main]
//! async fn main() -> lasercast::Result<()> {
//!     let file = Lasercast::open("show.ild")?;
//!     let target = TransmitTarget::parse("192.168.1.50", 7200, 30_000.0)?;
//!     let transmitter = Lasercast::transmit(target).await?;
//!
//!     let handle = Lasercast::play(&file, transmitter, &PlaybackConfig::default());
//!     tokio::time::sleep(std::time::Duration::from_secs(60)).await;
//!     handle.stop();
//!     handle.join().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Example (preview stream)
//!
//! ```rust,no_run
//! use lasercast::{Lasercast, UpdateRate};
//! use futures::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> lasercast::Result<()> {
//!     let receiver = Lasercast::listen(([0, 0, 0, 0], 7200).into()).await?;
//!     let mut packets = receiver.subscribe(UpdateRate::Max(30));
//!
//!     while let Some(received) = packets.next().await {
//!         println!("{} points from {}", received.packet.point_count(), received.source);
//!     }
//!     Ok(())
//! }
//! ```

// Core types and error handling
mod error;
#[cfg_attr(any(test, feature = "benchmark"), path = "test_utils.rs")]
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod transform;
pub mod types;

// Codecs
pub mod ilda;
pub mod iwp;

// Playback and transmit
pub mod config;
pub mod driver;
pub mod playback;
pub mod provider;
pub mod providers;
pub mod transmitter;

// Receive side
pub mod analysis;
pub mod receiver;
pub mod stream;

// Core exports
pub use error::*;
pub use types::*;

// Main API exports
pub use config::{LasercastConfig, PlaybackConfig, ReceiverConfig, TransmitterConfig};
pub use driver::{Driver, DriverHandle};
pub use ilda::IldaFile;
pub use iwp::IwpParser;
pub use playback::{PlaybackClock, PlaybackState, PlaybackStatus};
pub use receiver::{ReceivedPacket, Receiver};
pub use transmitter::{TransmitTarget, Transmitter};

use std::net::SocketAddr;
use std::path::Path;

use providers::SequenceProvider;

/// Entry point for the common flows.
///
/// Each method is a thin wrapper over the module that does the work, for
/// callers that do not need the finer controls.
pub struct Lasercast;

impl Lasercast {
    /// Read and decode an ILDA file.
    ///
    /// # Errors
    ///
    /// Returns [`LaserError::File`] if the file cannot be read. Malformed
    /// content never fails; decoding stops at the first bad section.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<IldaFile> {
        IldaFile::open(path)
    }

    /// Bind a receiver on `addr` and start listening.
    ///
    /// # Errors
    ///
    /// Returns [`LaserError::Bind`] if the address is unavailable.
    pub async fn listen(addr: SocketAddr) -> Result<Receiver> {
        Receiver::listen(addr).await
    }

    /// Open a transmit socket and announce the scan period to `target`.
    pub async fn transmit(target: TransmitTarget) -> Result<Transmitter> {
        Transmitter::connect(target).await
    }

    /// Stream every frame of `file` through `transmitter` at the configured
    /// rate. Must be called from within a tokio runtime.
    pub fn play(file: &IldaFile, transmitter: Transmitter, config: &PlaybackConfig) -> DriverHandle {
        Driver::spawn(SequenceProvider::from_file(file, config), transmitter)
    }
}
