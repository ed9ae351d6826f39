//! IWP wire-space types
//!
//! Everything here lives in the projector's coordinate space: unsigned 16-bit
//! X/Y with the origin in the top-left corner and Y growing downward.

use serde::{Deserialize, Serialize};
use std::time::SystemTime;

use super::Rgb;
use crate::transform::{expand_8_to_16, narrow_16_to_8};

/// Width of the color channels carried by a wire point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColorDepth {
    /// 0..=255 per channel (type 2 command)
    Narrow,
    /// 0..=65535 per channel (type 3 command)
    Wide,
}

/// A point as carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WirePoint {
    pub x: u16,
    pub y: u16,
    pub r: u16,
    pub g: u16,
    pub b: u16,
    pub depth: ColorDepth,
    pub blanking: bool,
}

impl WirePoint {
    /// A lit point with 8-bit color.
    pub fn narrow(x: u16, y: u16, color: Rgb) -> Self {
        Self {
            x,
            y,
            r: color.r as u16,
            g: color.g as u16,
            b: color.b as u16,
            depth: ColorDepth::Narrow,
            blanking: false,
        }
    }

    /// A point with 16-bit color. Blanking is left false; the parser decides
    /// inbound blanking separately.
    pub fn wide(x: u16, y: u16, r: u16, g: u16, b: u16) -> Self {
        Self { x, y, r, g, b, depth: ColorDepth::Wide, blanking: false }
    }

    /// A pen-up move to `(x, y)`.
    pub fn blanked(x: u16, y: u16) -> Self {
        Self { x, y, r: 0, g: 0, b: 0, depth: ColorDepth::Wide, blanking: true }
    }

    /// Color as it goes out in a type 3 record.
    ///
    /// Blanking wins over whatever color the point carries, and the check
    /// happens before narrow channels are widened.
    ///
    /// Widening follows the depth tag, not the value. An untagged channel
    /// would have to guess that anything above 255 is already 16-bit, which
    /// misreads a dim 16-bit value; a `Wide` channel of 200 stays 200 here.
    pub fn wide_color(&self) -> (u16, u16, u16) {
        if self.blanking {
            return (0, 0, 0);
        }
        match self.depth {
            ColorDepth::Wide => (self.r, self.g, self.b),
            ColorDepth::Narrow => (
                expand_8_to_16(self.r as u8),
                expand_8_to_16(self.g as u8),
                expand_8_to_16(self.b as u8),
            ),
        }
    }

    /// Color reduced to 8 bits per channel for preview.
    pub fn display_color(&self) -> Rgb {
        if self.blanking {
            return Rgb::BLACK;
        }
        match self.depth {
            ColorDepth::Narrow => Rgb::new(self.r as u8, self.g as u8, self.b as u8),
            ColorDepth::Wide => {
                Rgb::new(narrow_16_to_8(self.r), narrow_16_to_8(self.g), narrow_16_to_8(self.b))
            }
        }
    }
}

/// One IWP command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    /// Type 0: laser off / end of frame
    TurnOff,
    /// Type 1: scan period in microseconds
    Period(u32),
    /// Type 2 or type 3 point, depending on the point's [`ColorDepth`]
    Point(WirePoint),
}

impl Command {
    pub const TYPE_TURN_OFF: u8 = 0x00;
    pub const TYPE_PERIOD: u8 = 0x01;
    pub const TYPE_POINT_NARROW: u8 = 0x02;
    pub const TYPE_POINT_WIDE: u8 = 0x03;

    /// Total encoded length, including the type byte, for a command type.
    ///
    /// Returns `None` for type bytes the protocol does not define.
    pub fn encoded_len_for(type_byte: u8) -> Option<usize> {
        match type_byte {
            Self::TYPE_TURN_OFF => Some(1),
            Self::TYPE_PERIOD => Some(5),
            Self::TYPE_POINT_NARROW => Some(8),
            Self::TYPE_POINT_WIDE => Some(11),
            _ => None,
        }
    }

    pub fn type_byte(&self) -> u8 {
        match self {
            Command::TurnOff => Self::TYPE_TURN_OFF,
            Command::Period(_) => Self::TYPE_PERIOD,
            Command::Point(p) if p.depth == ColorDepth::Narrow => Self::TYPE_POINT_NARROW,
            Command::Point(_) => Self::TYPE_POINT_WIDE,
        }
    }

    pub fn encoded_len(&self) -> usize {
        match self {
            Command::TurnOff => 1,
            Command::Period(_) => 5,
            Command::Point(p) if p.depth == ColorDepth::Narrow => 8,
            Command::Point(_) => 11,
        }
    }

    /// Append the big-endian encoding of this command to `out`.
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        out.push(self.type_byte());
        match self {
            Command::TurnOff => {}
            Command::Period(period) => out.extend_from_slice(&period.to_be_bytes()),
            Command::Point(p) => {
                out.extend_from_slice(&p.x.to_be_bytes());
                out.extend_from_slice(&p.y.to_be_bytes());
                match p.depth {
                    ColorDepth::Narrow => {
                        let c = if p.blanking { Rgb::BLACK } else { p.display_color() };
                        out.extend_from_slice(&[c.r, c.g, c.b]);
                    }
                    ColorDepth::Wide => {
                        let (r, g, b) = p.wide_color();
                        out.extend_from_slice(&r.to_be_bytes());
                        out.extend_from_slice(&g.to_be_bytes());
                        out.extend_from_slice(&b.to_be_bytes());
                    }
                }
            }
        }
    }
}

/// A decoded IWP datagram.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IwpPacket {
    /// Point commands in wire order
    pub points: Vec<WirePoint>,
    /// Every decoded command, points included, in wire order
    pub commands: Vec<Command>,
    /// Period from the last type 1 command in the datagram
    pub scan_period: Option<u32>,
    /// When the datagram was decoded
    pub timestamp: SystemTime,
    /// Datagram length in bytes, including any undecoded tail
    pub raw_size: usize,
}

impl IwpPacket {
    pub fn point_count(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Whether the datagram carried a turn-off command.
    pub fn has_turn_off(&self) -> bool {
        self.commands.iter().any(|c| matches!(c, Command::TurnOff))
    }
}
