//! UDP packet receiver
//!
//! [`Receiver`] binds a UDP socket and runs a background task that decodes
//! every datagram into an [`IwpPacket`]. Decoded packets are published once to
//! a [`PacketBus`], which fans them out to:
//!
//! - a bounded drop-oldest queue read with [`Receiver::pop`] / [`Receiver::drain`],
//! - callbacks registered with [`Receiver::on_packet`], called on the receive task,
//! - async streams from [`Receiver::subscribe`].
//!
//! Socket errors after startup go to [`Receiver::on_error`] callbacks and the
//! loop keeps running. Only a bind failure is returned to the caller.
//!
//! ```rust,no_run
//! use lasercast::receiver::Receiver;
//! use lasercast::config::ReceiverConfig;
//!
//! # #[tokio::main]
//! # async fn main() -> lasercast::Result<()> {
//! let mut receiver = Receiver::new(ReceiverConfig::default());
//! receiver.on_packet(|packet, source| {
//!     println!("{} points from {}", packet.point_count(), source);
//! });
//! receiver.start().await?;
//! # Ok(())
//! # }
//! ```

mod bus;
mod queue;

pub use bus::{ErrorCallback, PacketBus, PacketCallback};
pub use queue::PacketQueue;

use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::BroadcastStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::config::ReceiverConfig;
use crate::iwp::{IwpParser, ParserStats};
use crate::stream::ThrottleExt;
use crate::types::{IwpPacket, UpdateRate};
use crate::{LaserError, Result};

/// Largest UDP payload.
const RECV_BUFFER_SIZE: usize = 65_536;

/// Pause after a receive error so a persistent failure does not spin.
const ERROR_BACKOFF: Duration = Duration::from_millis(10);

/// A decoded packet and the address it came from.
#[derive(Debug, Clone)]
pub struct ReceivedPacket {
    pub packet: IwpPacket,
    pub source: SocketAddr,
}

/// Point-in-time receiver statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiverStats {
    pub running: bool,
    pub local_addr: Option<SocketAddr>,
    pub uptime: Duration,
    pub datagrams_received: u64,
    pub bytes_received: u64,
    pub sources: Vec<SocketAddr>,
    pub queue_len: usize,
    pub queue_dropped: u64,
    pub last_packet_ago: Option<Duration>,
    pub connected: bool,
    pub parser: ParserStats,
}

#[derive(Debug, Default)]
struct Counters {
    datagrams: AtomicU64,
    bytes: AtomicU64,
    sources: Mutex<BTreeSet<SocketAddr>>,
    last_packet: Mutex<Option<Instant>>,
    last_valid: Mutex<Option<Instant>>,
}

impl Counters {
    fn record_datagram(&self, len: usize, source: SocketAddr) {
        self.datagrams.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(len as u64, Ordering::Relaxed);
        *self.last_packet.lock().unwrap_or_else(PoisonError::into_inner) = Some(Instant::now());
        if self.sources.lock().unwrap_or_else(PoisonError::into_inner).insert(source) {
            info!(%source, "New packet source");
        }
    }

    fn record_valid(&self) {
        *self.last_valid.lock().unwrap_or_else(PoisonError::into_inner) = Some(Instant::now());
    }

    fn last_packet(&self) -> Option<Instant> {
        *self.last_packet.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn last_valid(&self) -> Option<Instant> {
        *self.last_valid.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn sources(&self) -> Vec<SocketAddr> {
        self.sources.lock().unwrap_or_else(PoisonError::into_inner).iter().copied().collect()
    }
}

/// Background UDP listener for IWP datagrams.
pub struct Receiver {
    config: ReceiverConfig,
    bus: Arc<PacketBus>,
    parser: Arc<IwpParser>,
    counters: Arc<Counters>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
    local_addr: Option<SocketAddr>,
    started_at: Option<Instant>,
}

impl Receiver {
    pub fn new(config: ReceiverConfig) -> Self {
        let config = config.normalized();
        Self {
            bus: Arc::new(PacketBus::new(config.queue_capacity)),
            parser: Arc::new(IwpParser::new()),
            counters: Arc::new(Counters::default()),
            cancel: CancellationToken::new(),
            task: None,
            local_addr: None,
            started_at: None,
            config,
        }
    }

    /// Create a receiver on `addr` and start it.
    pub async fn listen(addr: SocketAddr) -> Result<Self> {
        let config = ReceiverConfig {
            bind_address: addr.ip(),
            port: addr.port(),
            ..ReceiverConfig::default()
        };
        let mut receiver = Self::new(config);
        receiver.start().await?;
        Ok(receiver)
    }

    /// Register a packet callback. Callbacks run on the receive task and
    /// should return quickly.
    pub fn on_packet<F>(&self, callback: F)
    where
        F: Fn(&IwpPacket, SocketAddr) + Send + Sync + 'static,
    {
        self.bus.add_packet_callback(Arc::new(callback));
    }

    /// Register an error callback. A bind failure in [`start`](Self::start)
    /// is reported here as well as returned.
    pub fn on_error<F>(&self, callback: F)
    where
        F: Fn(&LaserError) + Send + Sync + 'static,
    {
        self.bus.add_error_callback(Arc::new(callback));
    }

    /// Bind and start the receive loop. Returns the bound address.
    ///
    /// Starting a running receiver is a no-op.
    pub async fn start(&mut self) -> Result<SocketAddr> {
        if let Some(addr) = self.local_addr.filter(|_| self.is_running()) {
            warn!(%addr, "Receiver already running");
            return Ok(addr);
        }

        let bind_addr = self.config.bind_addr();
        let socket = match UdpSocket::bind(bind_addr).await {
            Ok(socket) => socket,
            Err(source) => {
                let err = LaserError::Bind { address: bind_addr, source };
                error!(%bind_addr, "Receiver failed to start: {}", err);
                self.bus.report_error(&err);
                return Err(err);
            }
        };
        let local_addr = socket.local_addr().map_err(|e| LaserError::socket("local_addr", e))?;

        self.cancel = CancellationToken::new();
        let task = tokio::spawn(receive_loop(
            socket,
            Arc::clone(&self.parser),
            Arc::clone(&self.bus),
            Arc::clone(&self.counters),
            self.config.recv_timeout(),
            self.cancel.clone(),
        ));

        self.task = Some(task);
        self.local_addr = Some(local_addr);
        self.started_at = Some(Instant::now());
        info!(%local_addr, "Receiver listening");
        Ok(local_addr)
    }

    /// Stop the receive loop and wait for it to exit.
    pub async fn stop(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("Receive task ended abnormally: {}", e);
            }
        }
        if let Some(addr) = self.local_addr.take() {
            info!(%addr, "Receiver stopped");
        }
        self.started_at = None;
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// True if a valid packet arrived within the connected window.
    pub fn is_connected(&self) -> bool {
        self.counters
            .last_valid()
            .is_some_and(|at| at.elapsed() <= self.config.connected_window())
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Oldest queued packet.
    pub fn pop(&self) -> Option<Arc<ReceivedPacket>> {
        self.bus.pop()
    }

    /// All queued packets, oldest first.
    pub fn drain(&self) -> Vec<Arc<ReceivedPacket>> {
        self.bus.drain()
    }

    /// Stream of packets published after this call.
    ///
    /// With [`UpdateRate::Max`] the stream is throttled with latest-wins
    /// semantics. A subscriber that falls behind skips packets rather than
    /// stalling the receive loop.
    pub fn subscribe(&self, rate: UpdateRate) -> impl Stream<Item = Arc<ReceivedPacket>> + 'static {
        let packets = BroadcastStream::new(self.bus.subscribe()).filter_map(|item| async move {
            match item {
                Ok(packet) => Some(packet),
                Err(e) => {
                    debug!("Packet subscriber lagged: {}", e);
                    None
                }
            }
        });

        match rate.interval() {
            None => packets.boxed(),
            Some(interval) => packets.throttle(interval).boxed(),
        }
    }

    pub fn parser_stats(&self) -> ParserStats {
        self.parser.stats()
    }

    pub fn reset_statistics(&self) {
        self.parser.reset_statistics();
    }

    pub fn stats(&self) -> ReceiverStats {
        ReceiverStats {
            running: self.is_running(),
            local_addr: self.local_addr,
            uptime: self.started_at.map(|at| at.elapsed()).unwrap_or_default(),
            datagrams_received: self.counters.datagrams.load(Ordering::Relaxed),
            bytes_received: self.counters.bytes.load(Ordering::Relaxed),
            sources: self.counters.sources(),
            queue_len: self.bus.queue_len(),
            queue_dropped: self.bus.dropped_count(),
            last_packet_ago: self.counters.last_packet().map(|at| at.elapsed()),
            connected: self.is_connected(),
            parser: self.parser.stats(),
        }
    }
}

impl Drop for Receiver {
    fn drop(&mut self) {
        debug!("Dropping receiver");
        self.cancel.cancel();
    }
}

async fn receive_loop(
    socket: UdpSocket,
    parser: Arc<IwpParser>,
    bus: Arc<PacketBus>,
    counters: Arc<Counters>,
    recv_timeout: Duration,
    cancel: CancellationToken,
) {
    debug!("Receive loop started");
    let mut buf = vec![0u8; RECV_BUFFER_SIZE];

    loop {
        let result = tokio::select! {
            _ = cancel.cancelled() => break,
            result = tokio::time::timeout(recv_timeout, socket.recv_from(&mut buf)) => result,
        };

        let (len, source) = match result {
            // Timed out with nothing to read; go round and re-check cancellation.
            Err(_) => continue,
            Ok(Ok(received)) => received,
            Ok(Err(e)) => {
                let err = LaserError::socket("receive", e);
                warn!("Receive failed: {}", err);
                bus.report_error(&err);
                tokio::time::sleep(ERROR_BACKOFF).await;
                continue;
            }
        };

        counters.record_datagram(len, source);
        match parser.parse(&buf[..len]) {
            Some(packet) => {
                trace!(%source, len, points = packet.point_count(), "Received IWP packet");
                counters.record_valid();
                bus.publish(ReceivedPacket { packet, source });
            }
            None => debug!(%source, "Dropped empty datagram"),
        }
    }

    debug!("Receive loop ended");
}
