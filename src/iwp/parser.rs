//! IWP datagram decoding
//!
//! The parser is deliberately forgiving: it walks the command stream and stops
//! at the first truncated or unknown command, returning everything decoded up
//! to that point. Only an empty datagram is rejected outright.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;
use tracing::{debug, trace};

use crate::types::{ColorDepth, Command, IwpPacket, WirePoint};

/// Point-in-time parser counters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParserStats {
    pub received: u64,
    pub valid: u64,
    pub invalid: u64,
    /// `valid / received`, 0.0 before the first datagram
    pub success_rate: f64,
}

/// Stateless decoder with running counters.
///
/// Counters use relaxed atomics so `parse` takes `&self` and a parser can be
/// shared between a receive loop and a stats reader.
#[derive(Debug, Default)]
pub struct IwpParser {
    received: AtomicU64,
    valid: AtomicU64,
    invalid: AtomicU64,
}

impl IwpParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode one datagram.
    ///
    /// Returns `None` only for empty input. A datagram whose first command is
    /// already unknown decodes to an empty packet and still counts as valid.
    pub fn parse(&self, data: &[u8]) -> Option<IwpPacket> {
        self.received.fetch_add(1, Ordering::Relaxed);
        if data.is_empty() {
            self.invalid.fetch_add(1, Ordering::Relaxed);
            debug!("Rejected empty IWP datagram");
            return None;
        }

        let mut points = Vec::new();
        let mut commands = Vec::new();
        let mut scan_period = None;
        let mut offset = 0usize;

        while offset < data.len() {
            let type_byte = data[offset];
            let Some(len) = Command::encoded_len_for(type_byte) else {
                debug!(type_byte, offset, "Unknown IWP command, ignoring rest of datagram");
                break;
            };
            let Some(record) = data.get(offset..offset + len) else {
                debug!(type_byte, offset, remaining = data.len() - offset, "Truncated IWP command");
                break;
            };

            let command = decode_command(record);
            trace!(?command, offset, "Decoded IWP command");
            match command {
                Command::Period(period) => scan_period = Some(period),
                Command::Point(point) => points.push(point),
                Command::TurnOff => {}
            }
            commands.push(command);
            offset += len;
        }

        self.valid.fetch_add(1, Ordering::Relaxed);
        Some(IwpPacket {
            points,
            commands,
            scan_period,
            timestamp: SystemTime::now(),
            raw_size: data.len(),
        })
    }

    pub fn stats(&self) -> ParserStats {
        let received = self.received.load(Ordering::Relaxed);
        let valid = self.valid.load(Ordering::Relaxed);
        let invalid = self.invalid.load(Ordering::Relaxed);
        let success_rate = if received == 0 { 0.0 } else { valid as f64 / received as f64 };
        ParserStats { received, valid, invalid, success_rate }
    }

    pub fn reset_statistics(&self) {
        self.received.store(0, Ordering::Relaxed);
        self.valid.store(0, Ordering::Relaxed);
        self.invalid.store(0, Ordering::Relaxed);
    }
}

/// Decode a complete record whose length already matches its type byte.
fn decode_command(record: &[u8]) -> Command {
    let u16_at = |i: usize| u16::from_be_bytes([record[i], record[i + 1]]);
    match record[0] {
        Command::TYPE_PERIOD => {
            Command::Period(u32::from_be_bytes([record[1], record[2], record[3], record[4]]))
        }
        Command::TYPE_POINT_NARROW => Command::Point(WirePoint {
            x: u16_at(1),
            y: u16_at(3),
            r: record[5] as u16,
            g: record[6] as u16,
            b: record[7] as u16,
            depth: ColorDepth::Narrow,
            blanking: false,
        }),
        Command::TYPE_POINT_WIDE => {
            let (r, g, b) = (u16_at(5), u16_at(7), u16_at(9));
            Command::Point(WirePoint {
                x: u16_at(1),
                y: u16_at(3),
                r,
                g,
                b,
                depth: ColorDepth::Wide,
                // A lit point with all channels at zero is indistinguishable
                // from a blanked one on the wire.
                blanking: r == 0 && g == 0 && b == 0,
            })
        }
        _ => Command::TurnOff,
    }
}
