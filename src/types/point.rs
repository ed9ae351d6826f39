//! Decoded ILDA point type

use serde::{Deserialize, Serialize};

use super::Rgb;

/// A single decoded ILDA point in file space.
///
/// Coordinates are signed and Y-up. `z` is zero for the 2D formats. Colors are
/// already resolved to truecolor, whether the section was indexed or not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i16,
    pub y: i16,
    pub z: i16,
    /// Raw ILDA status byte; bit 6 marks a blanked (pen-up) point.
    pub status: u8,
    pub color: Rgb,
}

impl Point {
    /// Status bit marking the laser as off for this point.
    pub const BLANKING_BIT: u8 = 0b0100_0000;

    /// Status bit ILDA writers set on the final point of a frame.
    pub const LAST_POINT_BIT: u8 = 0b1000_0000;

    pub fn new(x: i16, y: i16, z: i16, status: u8, color: Rgb) -> Self {
        Self { x, y, z, status, color }
    }

    /// Whether the laser is off while moving to this point.
    pub fn is_blanked(&self) -> bool {
        self.status & Self::BLANKING_BIT != 0
    }

    /// Whether the writer flagged this as the last point of its frame.
    pub fn is_last_point(&self) -> bool {
        self.status & Self::LAST_POINT_BIT != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_bits() {
        let lit = Point::new(0, 0, 0, 0x00, Rgb::WHITE);
        let blanked = Point::new(0, 0, 0, 0x40, Rgb::WHITE);
        let last = Point::new(0, 0, 0, 0xC0, Rgb::WHITE);

        assert!(!lit.is_blanked());
        assert!(blanked.is_blanked());
        assert!(!blanked.is_last_point());
        assert!(last.is_blanked());
        assert!(last.is_last_point());
    }
}
