//! Decoded ILDA frames

use serde::Serialize;
use std::time::SystemTime;

use super::{Command, IwpPacket, Point, WirePoint};
use crate::ilda::{IldaFormat, SectionHeader};
use crate::iwp::POINT_RECORD_SIZE;
use crate::transform::point_to_wire;

/// One frame section from an ILDA file.
///
/// Frames are immutable once decoded; playback and transmission share them
/// behind an `Arc<[Frame]>`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Frame {
    /// Point format the section was stored in
    pub format: IldaFormat,

    /// Points in file order, colors already resolved
    pub points: Vec<Point>,

    /// Header of the originating section
    pub header: SectionHeader,
}

impl Frame {
    pub fn new(format: IldaFormat, points: Vec<Point>, header: SectionHeader) -> Self {
        Self { format, points, header }
    }

    pub fn point_count(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Frame name from the section header, trailing padding removed.
    pub fn name(&self) -> &str {
        &self.header.name
    }

    /// Points converted to wire space, in the form they are transmitted.
    pub fn to_wire_points(&self) -> Vec<WirePoint> {
        self.points.iter().map(point_to_wire).collect()
    }

    /// Build the packet a receiver would decode from this frame.
    ///
    /// Used for local preview: coordinates and colors go through exactly the
    /// same conversion as the transmit path. No period command is included.
    pub fn to_packet(&self) -> IwpPacket {
        let points = self.to_wire_points();
        let commands = points.iter().copied().map(Command::Point).collect();
        IwpPacket {
            raw_size: points.len() * POINT_RECORD_SIZE,
            points,
            commands,
            scan_period: None,
            timestamp: SystemTime::now(),
        }
    }
}
