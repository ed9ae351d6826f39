//! YAML configuration
//!
//! Every field has a default, so an empty document is a valid config.
//! Out-of-range values are clamped by [`LasercastConfig::normalized`] rather
//! than rejected.
//!
//! ```yaml
//! receiver:
//!   port: 7200
//!   queue_capacity: 100
//! transmitter:
//!   target_address: 192.168.1.50
//!   scan_rate_hz: 30000
//! playback:
//!   fps: 30
//!   loop_enabled: false
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::iwp::MAX_DATAGRAM_BYTES;
use crate::playback::{FPS_RANGE, SPEED_RANGE};
use crate::{LaserError, Result};

/// Port the projector listens on unless told otherwise.
pub const DEFAULT_PORT: u16 = 7200;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LasercastConfig {
    pub receiver: ReceiverConfig,
    pub transmitter: TransmitterConfig,
    pub playback: PlaybackConfig,
}

impl LasercastConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml_ng::from_str(yaml)?;
        Ok(config.normalized())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let yaml = fs::read_to_string(path).map_err(|e| LaserError::file_error(path, e))?;
        let config = Self::from_yaml_str(&yaml)?;
        debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }

    pub fn normalized(&self) -> Self {
        Self {
            receiver: self.receiver.normalized(),
            transmitter: self.transmitter.normalized(),
            playback: self.playback.normalized(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReceiverConfig {
    pub bind_address: IpAddr,
    pub port: u16,
    /// Packets kept for `pop`/`drain` before the oldest is dropped
    pub queue_capacity: usize,
    /// How long one receive waits before re-checking for shutdown
    pub recv_timeout_ms: u64,
    /// A valid packet within this window counts as connected
    pub connected_window_ms: u64,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            queue_capacity: 100,
            recv_timeout_ms: 1000,
            connected_window_ms: 5000,
        }
    }
}

impl ReceiverConfig {
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }

    pub fn recv_timeout(&self) -> Duration {
        Duration::from_millis(self.recv_timeout_ms)
    }

    pub fn connected_window(&self) -> Duration {
        Duration::from_millis(self.connected_window_ms)
    }

    pub fn normalized(&self) -> Self {
        Self {
            queue_capacity: self.queue_capacity.max(1),
            recv_timeout_ms: self.recv_timeout_ms.clamp(10, 60_000),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransmitterConfig {
    pub target_address: IpAddr,
    pub port: u16,
    pub scan_rate_hz: f64,
    pub max_datagram_bytes: usize,
    /// Pause after each datagram of a frame
    pub chunk_delay_us: u64,
}

impl Default for TransmitterConfig {
    fn default() -> Self {
        Self {
            target_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_PORT,
            scan_rate_hz: 1000.0,
            max_datagram_bytes: MAX_DATAGRAM_BYTES,
            chunk_delay_us: 0,
        }
    }
}

impl TransmitterConfig {
    pub fn target_addr(&self) -> SocketAddr {
        SocketAddr::new(self.target_address, self.port)
    }

    pub fn chunk_delay(&self) -> Duration {
        Duration::from_micros(self.chunk_delay_us)
    }

    /// Datagram limit capped at [`MAX_DATAGRAM_BYTES`]. Scan rate is left as
    /// is; the period conversion clamps it.
    pub fn normalized(&self) -> Self {
        Self {
            max_datagram_bytes: self.max_datagram_bytes.min(MAX_DATAGRAM_BYTES),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlaybackConfig {
    pub fps: f64,
    pub speed: f64,
    pub loop_enabled: bool,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self { fps: 25.0, speed: 1.0, loop_enabled: true }
    }
}

impl PlaybackConfig {
    pub fn normalized(&self) -> Self {
        let defaults = Self::default();
        let clamp = |v: f64, (lo, hi): (f64, f64), fallback: f64| {
            if v.is_nan() { fallback } else { v.clamp(lo, hi) }
        };
        Self {
            fps: clamp(self.fps, FPS_RANGE, defaults.fps),
            speed: clamp(self.speed, SPEED_RANGE, defaults.speed),
            loop_enabled: self.loop_enabled,
        }
    }
}
