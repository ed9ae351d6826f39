//! Single-publish fan-out for received packets

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tokio::sync::broadcast;
use tracing::{trace, warn};

use super::ReceivedPacket;
use super::queue::PacketQueue;
use crate::LaserError;
use crate::types::IwpPacket;

/// Callback for decoded packets, called on the receive loop.
pub type PacketCallback = Arc<dyn Fn(&IwpPacket, SocketAddr) + Send + Sync>;

/// Callback for receive-side failures, called on the receive loop.
pub type ErrorCallback = Arc<dyn Fn(&LaserError) + Send + Sync>;

/// Every packet is published once and delivered to the queue, each callback
/// and each stream subscriber.
pub struct PacketBus {
    queue: Mutex<PacketQueue<Arc<ReceivedPacket>>>,
    packet_callbacks: RwLock<Vec<PacketCallback>>,
    error_callbacks: RwLock<Vec<ErrorCallback>>,
    broadcast: broadcast::Sender<Arc<ReceivedPacket>>,
}

impl PacketBus {
    pub fn new(queue_capacity: usize) -> Self {
        let (broadcast, _) = broadcast::channel(queue_capacity.max(1));
        Self {
            queue: Mutex::new(PacketQueue::new(queue_capacity)),
            packet_callbacks: RwLock::new(Vec::new()),
            error_callbacks: RwLock::new(Vec::new()),
            broadcast,
        }
    }

    pub fn add_packet_callback(&self, callback: PacketCallback) {
        self.packet_callbacks.write().unwrap_or_else(PoisonError::into_inner).push(callback);
    }

    pub fn add_error_callback(&self, callback: ErrorCallback) {
        self.error_callbacks.write().unwrap_or_else(PoisonError::into_inner).push(callback);
    }

    pub fn publish(&self, packet: ReceivedPacket) -> Arc<ReceivedPacket> {
        let packet = Arc::new(packet);

        if let Some(evicted) = self.lock_queue().push(Arc::clone(&packet)) {
            trace!(source = %evicted.source, "Packet queue full, dropped oldest packet");
        }

        // Callbacks run outside the lock so they may register more callbacks.
        let callbacks = self.packet_callbacks.read().unwrap_or_else(PoisonError::into_inner).clone();
        for callback in &callbacks {
            callback(&packet.packet, packet.source);
        }

        // No subscribers is fine.
        let _ = self.broadcast.send(Arc::clone(&packet));
        packet
    }

    pub fn report_error(&self, error: &LaserError) {
        let callbacks = self.error_callbacks.read().unwrap_or_else(PoisonError::into_inner).clone();
        if callbacks.is_empty() {
            warn!("Unhandled receiver error: {}", error);
        }
        for callback in callbacks.iter() {
            callback(error);
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<ReceivedPacket>> {
        self.broadcast.subscribe()
    }

    pub fn pop(&self) -> Option<Arc<ReceivedPacket>> {
        self.lock_queue().pop()
    }

    pub fn drain(&self) -> Vec<Arc<ReceivedPacket>> {
        self.lock_queue().drain()
    }

    pub fn queue_len(&self) -> usize {
        self.lock_queue().len()
    }

    pub fn dropped_count(&self) -> u64 {
        self.lock_queue().dropped_count()
    }

    fn lock_queue(&self) -> std::sync::MutexGuard<'_, PacketQueue<Arc<ReceivedPacket>>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iwp::IwpParser;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn received(n: u16) -> ReceivedPacket {
        let data = crate::iwp::period_datagram(n as u32);
        let packet = IwpParser::new().parse(&data).expect("period datagram");
        ReceivedPacket { packet, source: SocketAddr::from(([127, 0, 0, 1], n)) }
    }

    #[test]
    fn publish_reaches_queue_callbacks_and_subscribers() {
        let bus = PacketBus::new(4);
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        bus.add_packet_callback(Arc::new(move |packet: &IwpPacket, _: SocketAddr| {
            assert_eq!(packet.commands.len(), 1);
            seen.fetch_add(1, Ordering::SeqCst);
        }));
        let mut rx = bus.subscribe();

        let published = bus.publish(received(1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&rx.try_recv().expect("broadcast"), &published));
        assert!(Arc::ptr_eq(&bus.pop().expect("queued"), &published));
    }

    #[test]
    fn queue_keeps_newest() {
        let bus = PacketBus::new(3);
        for n in 1..=5 {
            bus.publish(received(n));
        }
        let ports: Vec<_> = bus.drain().iter().map(|p| p.source.port()).collect();
        assert_eq!(ports, vec![3, 4, 5]);
        assert_eq!(bus.dropped_count(), 2);
    }

    #[test]
    fn errors_reach_error_callbacks() {
        let bus = PacketBus::new(1);
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        bus.add_error_callback(Arc::new(move |err: &LaserError| {
            assert!(matches!(err, LaserError::Socket { .. }));
            seen.fetch_add(1, Ordering::SeqCst);
        }));

        bus.report_error(&LaserError::socket("receive", std::io::Error::other("reset")));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn callbacks_may_register_more_callbacks() {
        let bus = Arc::new(PacketBus::new(4));
        let calls = Arc::new(AtomicUsize::new(0));

        let registrar = Arc::clone(&bus);
        let counter = Arc::clone(&calls);
        bus.add_packet_callback(Arc::new(move |_: &IwpPacket, _: SocketAddr| {
            let seen = Arc::clone(&counter);
            registrar.add_packet_callback(Arc::new(move |_: &IwpPacket, _: SocketAddr| {
                seen.fetch_add(1, Ordering::SeqCst);
            }));
        }));

        bus.publish(received(1));
        assert_eq!(calls.load(Ordering::SeqCst), 0, "added during publish, runs from the next packet");
        bus.publish(received(2));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
