//! UDP transmission of frames to a projector
//!
//! A [`Transmitter`] owns one UDP socket and sends frames as IWP datagrams.
//! It never retries: a failed send marks the transmitter disconnected, bumps
//! the error counter and returns the error. Counters live behind an `Arc` so
//! a [`TransmitterMonitor`] can read them while a pacing loop owns the
//! transmitter.
//!
//! ```rust,no_run
//! use lasercast::transmitter::{TransmitTarget, Transmitter};
//! use lasercast::ilda::IldaFile;
//!
//! # #[tokio::main]
//! # async fn main() -> lasercast::Result<()> {
//! let file = IldaFile::open("show.ild")?;
//! let target = TransmitTarget::parse("192.168.1.50", 7200, 30_000.0)?;
//! let mut transmitter = Transmitter::connect(target).await?;
//!
//! if let Some(frame) = file.frame(0) {
//!     transmitter.send_frame(frame).await?;
//! }
//! transmitter.disconnect().await;
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::config::TransmitterConfig;
use crate::iwp::{off_datagram, pack, period_datagram};
use crate::transform::scan_period_us;
use crate::types::{Frame, WirePoint};
use crate::{LaserError, Result};

/// Where to send and how fast the projector should scan.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransmitTarget {
    pub address: SocketAddr,
    pub scan_rate_hz: f64,
}

impl TransmitTarget {
    pub fn new(address: SocketAddr, scan_rate_hz: f64) -> Self {
        Self { address, scan_rate_hz }
    }

    /// Build a target from a numeric IP string.
    pub fn parse(ip: &str, port: u16, scan_rate_hz: f64) -> Result<Self> {
        let ip: IpAddr =
            ip.trim().parse().map_err(|_| LaserError::invalid_target(format!("{ip}:{port}")))?;
        Ok(Self::new(SocketAddr::new(ip, port), scan_rate_hz))
    }

    /// Scan period sent to the projector, in microseconds.
    pub fn scan_period_us(&self) -> u32 {
        scan_period_us(self.scan_rate_hz)
    }
}

impl From<&TransmitterConfig> for TransmitTarget {
    fn from(config: &TransmitterConfig) -> Self {
        Self::new(config.target_addr(), config.scan_rate_hz)
    }
}

/// Point-in-time transmit counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransmitStats {
    pub target: SocketAddr,
    pub connected: bool,
    pub scan_period_us: u32,
    pub frames_sent: u64,
    pub datagrams_sent: u64,
    pub bytes_sent: u64,
    pub errors: u64,
    pub last_error: Option<String>,
}

#[derive(Debug)]
struct Shared {
    connected: AtomicBool,
    scan_period_us: AtomicU32,
    frames_sent: AtomicU64,
    datagrams_sent: AtomicU64,
    bytes_sent: AtomicU64,
    errors: AtomicU64,
    last_error: Mutex<Option<String>>,
    target: Mutex<SocketAddr>,
}

impl Shared {
    fn new(target: &TransmitTarget) -> Self {
        Self {
            connected: AtomicBool::new(false),
            scan_period_us: AtomicU32::new(target.scan_period_us()),
            frames_sent: AtomicU64::new(0),
            datagrams_sent: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            last_error: Mutex::new(None),
            target: Mutex::new(target.address),
        }
    }

    fn record_error(&self, err: &LaserError) {
        self.errors.fetch_add(1, Ordering::Relaxed);
        self.connected.store(false, Ordering::Relaxed);
        let message = match std::error::Error::source(err) {
            Some(source) => format!("{err}: {source}"),
            None => err.to_string(),
        };
        *self.last_error.lock().unwrap_or_else(PoisonError::into_inner) = Some(message);
    }

    fn record_datagram(&self, bytes: usize) {
        self.datagrams_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    fn snapshot(&self) -> TransmitStats {
        TransmitStats {
            target: *self.target.lock().unwrap_or_else(PoisonError::into_inner),
            connected: self.connected.load(Ordering::Relaxed),
            scan_period_us: self.scan_period_us.load(Ordering::Relaxed),
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            datagrams_sent: self.datagrams_sent.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            last_error: self.last_error.lock().unwrap_or_else(PoisonError::into_inner).clone(),
        }
    }
}

/// Read-only view of a transmitter's counters.
#[derive(Debug, Clone)]
pub struct TransmitterMonitor {
    shared: Arc<Shared>,
}

impl TransmitterMonitor {
    pub fn stats(&self) -> TransmitStats {
        self.shared.snapshot()
    }

    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::Relaxed)
    }
}

/// Sends frames to one projector over UDP.
#[derive(Debug)]
pub struct Transmitter {
    socket: Option<UdpSocket>,
    target: TransmitTarget,
    max_datagram_bytes: usize,
    chunk_delay: Duration,
    shared: Arc<Shared>,
}

impl Transmitter {
    /// A disconnected transmitter for `target`.
    pub fn new(target: TransmitTarget) -> Self {
        Self {
            socket: None,
            max_datagram_bytes: crate::iwp::MAX_DATAGRAM_BYTES,
            chunk_delay: Duration::ZERO,
            shared: Arc::new(Shared::new(&target)),
            target,
        }
    }

    pub fn from_config(config: &TransmitterConfig) -> Self {
        let config = config.normalized();
        let mut transmitter = Self::new(TransmitTarget::from(&config));
        transmitter.max_datagram_bytes = config.max_datagram_bytes;
        transmitter.chunk_delay = config.chunk_delay();
        transmitter
    }

    /// Bind a socket and announce the scan period to `target`.
    pub async fn connect(target: TransmitTarget) -> Result<Self> {
        let mut transmitter = Self::new(target);
        transmitter.reconnect().await?;
        Ok(transmitter)
    }

    pub async fn connect_with_config(config: &TransmitterConfig) -> Result<Self> {
        let mut transmitter = Self::from_config(config);
        transmitter.reconnect().await?;
        Ok(transmitter)
    }

    /// (Re)open the socket and send the period command.
    ///
    /// Any previous socket is released without a turn-off command.
    pub async fn reconnect(&mut self) -> Result<()> {
        self.socket = None;
        self.shared.connected.store(false, Ordering::Relaxed);

        let local = match self.target.address.ip() {
            IpAddr::V4(_) => SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
            IpAddr::V6(_) => SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0),
        };
        let socket = match UdpSocket::bind(local).await {
            Ok(socket) => socket,
            Err(source) => {
                let err = LaserError::Bind { address: local, source };
                error!(addr = %self.target.address, "Failed to open transmit socket: {}", err);
                self.shared.record_error(&err);
                return Err(err);
            }
        };

        let period = self.target.scan_period_us();
        if let Err(e) = socket.send_to(&period_datagram(period), self.target.address).await {
            let err = LaserError::socket("send period", e);
            error!(addr = %self.target.address, "Failed to send scan period: {}", err);
            self.shared.record_error(&err);
            return Err(err);
        }
        self.shared.record_datagram(5);
        self.shared.scan_period_us.store(period, Ordering::Relaxed);

        info!(
            addr = %self.target.address,
            scan_rate_hz = self.target.scan_rate_hz,
            period_us = period,
            "Transmitter connected"
        );
        self.socket = Some(socket);
        self.shared.connected.store(true, Ordering::Relaxed);
        Ok(())
    }

    /// Send one frame, in as many datagrams as it takes.
    pub async fn send_frame(&mut self, frame: &Frame) -> Result<usize> {
        let points = frame.to_wire_points();
        self.send_inner(&points, None).await
    }

    /// Like [`send_frame`](Self::send_frame), but checks `cancel` before
    /// every datagram and returns [`LaserError::Cancelled`] once it fires.
    pub async fn send_frame_cancellable(
        &mut self,
        frame: &Frame,
        cancel: &CancellationToken,
    ) -> Result<usize> {
        let points = frame.to_wire_points();
        self.send_inner(&points, Some(cancel)).await
    }

    /// Send points that are already in wire space.
    pub async fn send_points(&mut self, points: &[WirePoint]) -> Result<usize> {
        self.send_inner(points, None).await
    }

    /// Returns the number of datagrams sent.
    async fn send_inner(
        &mut self,
        points: &[WirePoint],
        cancel: Option<&CancellationToken>,
    ) -> Result<usize> {
        let Some(socket) = self.socket.as_ref() else {
            return Err(LaserError::NotConnected);
        };

        let datagrams = pack(points, self.max_datagram_bytes);
        let address = self.target.address;
        let mut sent = 0usize;
        let mut failure = None;

        for datagram in &datagrams {
            if cancel.is_some_and(CancellationToken::is_cancelled) {
                debug!(sent, total = datagrams.len(), "Frame send cancelled");
                return Err(LaserError::Cancelled);
            }
            match socket.send_to(datagram, address).await {
                Ok(bytes) => {
                    trace!(bytes, "Sent IWP datagram");
                    self.shared.record_datagram(bytes);
                    sent += 1;
                }
                Err(e) => {
                    failure = Some(LaserError::socket("send", e));
                    break;
                }
            }
            if !self.chunk_delay.is_zero() {
                match cancel {
                    Some(cancel) => {
                        tokio::select! {
                            _ = cancel.cancelled() => {}
                            _ = tokio::time::sleep(self.chunk_delay) => {}
                        }
                    }
                    None => tokio::time::sleep(self.chunk_delay).await,
                }
            }
        }

        if let Some(err) = failure {
            error!(
                addr = %address,
                sent,
                total = datagrams.len(),
                "Frame send aborted: {}",
                err
            );
            self.shared.record_error(&err);
            self.socket = None;
            return Err(err);
        }

        self.shared.frames_sent.fetch_add(1, Ordering::Relaxed);
        debug!(points = points.len(), datagrams = sent, "Sent frame");
        Ok(sent)
    }

    /// Change the scan rate, re-announcing the period when connected.
    pub async fn set_scan_rate(&mut self, scan_rate_hz: f64) -> Result<()> {
        self.target.scan_rate_hz = scan_rate_hz;
        let period = self.target.scan_period_us();
        self.shared.scan_period_us.store(period, Ordering::Relaxed);
        debug!(scan_rate_hz, period_us = period, "Scan rate set");

        let Some(socket) = self.socket.as_ref() else {
            return Ok(());
        };
        let result = socket.send_to(&period_datagram(period), self.target.address).await;
        match result {
            Ok(bytes) => {
                self.shared.record_datagram(bytes);
                Ok(())
            }
            Err(e) => {
                let err = LaserError::socket("send period", e);
                error!(addr = %self.target.address, "Failed to send scan period: {}", err);
                self.shared.record_error(&err);
                self.socket = None;
                Err(err)
            }
        }
    }

    /// Send a turn-off command, best effort, and release the socket.
    pub async fn disconnect(&mut self) {
        let Some(socket) = self.socket.take() else {
            return;
        };
        match socket.send_to(&off_datagram(), self.target.address).await {
            Ok(bytes) => self.shared.record_datagram(bytes),
            Err(e) => warn!(addr = %self.target.address, "Turn-off command not sent: {}", e),
        }
        self.shared.connected.store(false, Ordering::Relaxed);
        info!(addr = %self.target.address, "Transmitter disconnected");
    }

    /// Point at a new address. A connected transmitter disconnects first.
    pub async fn set_target(&mut self, address: SocketAddr) {
        if self.is_connected() {
            self.disconnect().await;
        }
        self.target.address = address;
        *self.shared.target.lock().unwrap_or_else(PoisonError::into_inner) = address;
        debug!(addr = %address, "Transmit target set");
    }

    /// Pause after every datagram.
    pub fn set_chunk_delay(&mut self, delay: Duration) {
        self.chunk_delay = delay;
    }

    /// Pause `1 / fps` after every datagram; zero for `fps <= 0`.
    pub fn set_fps_delay(&mut self, fps: f64) {
        self.chunk_delay = if fps > 0.0 && fps.is_finite() {
            Duration::from_secs_f64(1.0 / fps)
        } else {
            Duration::ZERO
        };
    }

    pub fn set_max_datagram_bytes(&mut self, max: usize) {
        self.max_datagram_bytes = max.min(crate::iwp::MAX_DATAGRAM_BYTES);
    }

    pub fn chunk_delay(&self) -> Duration {
        self.chunk_delay
    }

    pub fn target(&self) -> &TransmitTarget {
        &self.target
    }

    pub fn is_connected(&self) -> bool {
        self.socket.is_some() && self.shared.connected.load(Ordering::Relaxed)
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.as_ref().and_then(|s| s.local_addr().ok())
    }

    pub fn stats(&self) -> TransmitStats {
        self.shared.snapshot()
    }

    pub fn monitor(&self) -> TransmitterMonitor {
        TransmitterMonitor { shared: Arc::clone(&self.shared) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iwp::IwpParser;
    use crate::test_utils::sample_frames;
    use anyhow::{Context, ensure};

    const DEFAULT_TEST_PORT: u16 = 7200;

    async fn local_sink() -> anyhow::Result<(UdpSocket, SocketAddr)> {
        let sink = UdpSocket::bind("127.0.0.1:0").await?;
        let addr = sink.local_addr()?;
        Ok((sink, addr))
    }

    async fn recv(sink: &UdpSocket) -> anyhow::Result<Vec<u8>> {
        let mut buf = vec![0u8; 2048];
        let (len, _) = tokio::time::timeout(Duration::from_secs(2), sink.recv_from(&mut buf))
            .await
            .context("timed out waiting for datagram")??;
        buf.truncate(len);
        Ok(buf)
    }

    #[test]
    fn target_parsing() {
        let target = TransmitTarget::parse(" 10.1.2.3 ", 7200, 1000.0).expect("valid");
        assert_eq!(target.address, "10.1.2.3:7200".parse::<SocketAddr>().expect("addr"));
        assert_eq!(target.scan_period_us(), 1000);

        let err = TransmitTarget::parse("projector.local", 7200, 1000.0).unwrap_err();
        assert!(matches!(err, LaserError::InvalidTarget { .. }));
    }

    #[test]
    fn fps_delay() {
        let mut transmitter = Transmitter::new(TransmitTarget::parse("127.0.0.1", 1, 1.0).expect("valid"));
        transmitter.set_fps_delay(50.0);
        assert_eq!(transmitter.chunk_delay(), Duration::from_millis(20));
        transmitter.set_fps_delay(0.0);
        assert_eq!(transmitter.chunk_delay(), Duration::ZERO);
        transmitter.set_fps_delay(-3.0);
        assert_eq!(transmitter.chunk_delay(), Duration::ZERO);
    }

    #[tokio::test]
    async fn connect_announces_scan_period() -> anyhow::Result<()> {
        let _ = tracing_subscriber::fmt::try_init();
        let (sink, addr) = local_sink().await?;

        let transmitter = Transmitter::connect(TransmitTarget::new(addr, 1000.0)).await?;
        ensure!(transmitter.is_connected());
        ensure!(recv(&sink).await? == [0x01, 0x00, 0x00, 0x03, 0xE8]);

        let stats = transmitter.stats();
        ensure!(stats.connected && stats.datagrams_sent == 1 && stats.scan_period_us == 1000);
        Ok(())
    }

    #[tokio::test]
    async fn frames_arrive_as_bounded_datagrams() -> anyhow::Result<()> {
        let (sink, addr) = local_sink().await?;
        let mut transmitter = Transmitter::connect(TransmitTarget::new(addr, 1000.0)).await?;
        recv(&sink).await?;

        let frame = sample_frames(1).pop().context("one frame")?;
        let sent = transmitter.send_frame(&frame).await?;
        ensure!(sent == frame.point_count().div_ceil(93));

        let parser = IwpParser::new();
        let mut received_points = 0;
        for _ in 0..sent {
            let datagram = recv(&sink).await?;
            ensure!(datagram.len() <= 1023 && datagram.len() % 11 == 0);
            received_points += parser.parse(&datagram).context("non-empty")?.point_count();
        }
        ensure!(received_points == frame.point_count());
        ensure!(transmitter.stats().frames_sent == 1);
        Ok(())
    }

    #[tokio::test]
    async fn scan_rate_change_is_resent_and_disconnect_turns_off() -> anyhow::Result<()> {
        let (sink, addr) = local_sink().await?;
        let mut transmitter = Transmitter::connect(TransmitTarget::new(addr, 1000.0)).await?;
        recv(&sink).await?;

        transmitter.set_scan_rate(30_000.0).await?;
        ensure!(recv(&sink).await? == period_datagram(33));

        transmitter.disconnect().await;
        ensure!(recv(&sink).await? == [0x00]);
        ensure!(!transmitter.is_connected());

        let frame = sample_frames(1).pop().context("one frame")?;
        let err = transmitter.send_frame(&frame).await.unwrap_err();
        ensure!(matches!(err, LaserError::NotConnected));

        // Changing the rate while disconnected only updates the target.
        transmitter.set_scan_rate(500.0).await?;
        ensure!(transmitter.stats().scan_period_us == 2000);
        Ok(())
    }

    #[tokio::test]
    async fn cancelled_token_stops_before_first_datagram() -> anyhow::Result<()> {
        let (sink, addr) = local_sink().await?;
        let mut transmitter = Transmitter::connect(TransmitTarget::new(addr, 1000.0)).await?;
        recv(&sink).await?;

        let cancel = CancellationToken::new();
        cancel.cancel();
        let frame = sample_frames(1).pop().context("one frame")?;
        let err = transmitter.send_frame_cancellable(&frame, &cancel).await.unwrap_err();
        ensure!(matches!(err, LaserError::Cancelled));
        ensure!(transmitter.stats().datagrams_sent == 1, "only the period datagram went out");
        ensure!(transmitter.is_connected(), "cancellation is not a failure");
        Ok(())
    }

    #[tokio::test]
    async fn set_target_disconnects_first() -> anyhow::Result<()> {
        let (sink, addr) = local_sink().await?;
        let (_other, other_addr) = local_sink().await?;
        let mut transmitter = Transmitter::connect(TransmitTarget::new(addr, 1000.0)).await?;
        recv(&sink).await?;

        transmitter.set_target(other_addr).await;
        ensure!(recv(&sink).await? == [0x00]);
        ensure!(!transmitter.is_connected());
        ensure!(transmitter.stats().target == other_addr);
        Ok(())
    }

    #[tokio::test]
    async fn cancel_cuts_the_chunk_delay_short() -> anyhow::Result<()> {
        let (sink, addr) = local_sink().await?;
        let mut transmitter = Transmitter::connect(TransmitTarget::new(addr, 1000.0)).await?;
        recv(&sink).await?;
        transmitter.set_chunk_delay(Duration::from_secs(30));

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let frame = sample_frames(1).pop().context("one frame")?;
        let result = tokio::time::timeout(
            Duration::from_secs(5),
            transmitter.send_frame_cancellable(&frame, &cancel),
        )
        .await
        .context("cancel did not interrupt the chunk delay")?;
        ensure!(matches!(result, Err(LaserError::Cancelled)));
        ensure!(transmitter.stats().datagrams_sent == 2, "period plus the first chunk");
        Ok(())
    }

    #[tokio::test]
    async fn failed_announce_is_recorded() -> anyhow::Result<()> {
        // Broadcast without SO_BROADCAST is refused by the kernel.
        let target = TransmitTarget::parse("255.255.255.255", DEFAULT_TEST_PORT, 1000.0)?;
        let mut transmitter = Transmitter::new(target);

        let err = transmitter.reconnect().await.unwrap_err();
        ensure!(matches!(err, LaserError::Socket { .. }), "got {:?}", err);

        let stats = transmitter.stats();
        ensure!(stats.errors == 1);
        ensure!(!stats.connected && !transmitter.is_connected());
        ensure!(stats.last_error.is_some());
        ensure!(stats.datagrams_sent == 0);
        Ok(())
    }

    #[tokio::test]
    async fn send_failure_disconnects_without_retry() -> anyhow::Result<()> {
        let (sink, addr) = local_sink().await?;
        let mut transmitter = Transmitter::connect(TransmitTarget::new(addr, 1000.0)).await?;
        recv(&sink).await?;

        // Redirect the open socket at a destination the kernel refuses.
        transmitter.target.address = SocketAddr::from(([255, 255, 255, 255], DEFAULT_TEST_PORT));

        let frame = sample_frames(1).pop().context("one frame")?;
        let err = transmitter.send_frame(&frame).await.unwrap_err();
        ensure!(matches!(err, LaserError::Socket { .. }), "got {:?}", err);

        let stats = transmitter.stats();
        ensure!(stats.errors == 1);
        ensure!(!stats.connected && !transmitter.is_connected());
        ensure!(stats.last_error.as_deref().is_some_and(|e| e.contains("send")));
        ensure!(stats.datagrams_sent == 1, "nothing after the period went out");
        ensure!(stats.frames_sent == 0);

        let err = transmitter.send_frame(&frame).await.unwrap_err();
        ensure!(matches!(err, LaserError::NotConnected), "no silent reconnect");
        Ok(())
    }
}
