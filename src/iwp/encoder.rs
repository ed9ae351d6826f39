//! IWP datagram encoding
//!
//! Points always go out as 11-byte type 3 records. A frame is cut into
//! datagrams on record boundaries so that no record ever straddles two
//! datagrams.

use tracing::trace;

use crate::types::{ColorDepth, Command, WirePoint};

/// Largest datagram the projector accepts.
pub const MAX_DATAGRAM_BYTES: usize = 1023;

/// Size of a type 3 point record.
pub const POINT_RECORD_SIZE: usize = 11;

/// Encode one point as a type 3 record.
pub fn encode_point(point: &WirePoint) -> [u8; POINT_RECORD_SIZE] {
    let (r, g, b) = point.wide_color();
    let mut out = [0u8; POINT_RECORD_SIZE];
    out[0] = Command::TYPE_POINT_WIDE;
    out[1..3].copy_from_slice(&point.x.to_be_bytes());
    out[3..5].copy_from_slice(&point.y.to_be_bytes());
    out[5..7].copy_from_slice(&r.to_be_bytes());
    out[7..9].copy_from_slice(&g.to_be_bytes());
    out[9..11].copy_from_slice(&b.to_be_bytes());
    out
}

/// Encode points back to back, in order.
pub fn encode_points(points: &[WirePoint]) -> Vec<u8> {
    let mut out = Vec::with_capacity(points.len() * POINT_RECORD_SIZE);
    for point in points {
        out.extend_from_slice(&encode_point(point));
    }
    out
}

/// Number of whole records that fit in one datagram.
///
/// Never less than one: a limit smaller than a record still sends one record
/// per datagram.
pub fn records_per_datagram(max_datagram_bytes: usize) -> usize {
    (max_datagram_bytes / POINT_RECORD_SIZE).max(1)
}

/// Encode points into datagrams of at most `max_datagram_bytes` each.
///
/// Every datagram except possibly the last holds exactly
/// [`records_per_datagram`] records. Concatenating the datagrams gives
/// [`encode_points`] of the same input. No points, no datagrams.
pub fn pack(points: &[WirePoint], max_datagram_bytes: usize) -> Vec<Vec<u8>> {
    let per_chunk = records_per_datagram(max_datagram_bytes);
    let datagrams: Vec<Vec<u8>> = points.chunks(per_chunk).map(encode_points).collect();
    trace!(
        points = points.len(),
        datagrams = datagrams.len(),
        per_chunk,
        "Packed IWP frame"
    );
    datagrams
}

/// Encode an arbitrary command list into one buffer.
///
/// Narrow points stay type 2; this is the path for tooling and tests that
/// need exact control over the wire bytes.
pub fn encode_commands(commands: &[Command]) -> Vec<u8> {
    let mut out = Vec::with_capacity(commands.iter().map(Command::encoded_len).sum());
    for command in commands {
        command.encode_into(&mut out);
    }
    out
}

/// A type 1 scan period datagram.
pub fn period_datagram(period_us: u32) -> [u8; 5] {
    let mut out = [0u8; 5];
    out[0] = Command::TYPE_PERIOD;
    out[1..].copy_from_slice(&period_us.to_be_bytes());
    out
}

/// A type 0 turn-off datagram.
pub fn off_datagram() -> [u8; 1] {
    [Command::TYPE_TURN_OFF]
}

/// Whether a point will be widened on the way out.
pub fn needs_expansion(point: &WirePoint) -> bool {
    point.depth == ColorDepth::Narrow && !point.blanking
}
