//! Coordinate and color conversion between file space and wire space.
//!
//! ILDA stores signed coordinates with the origin at the center and Y up.
//! The projector protocol wants unsigned coordinates with the origin in the
//! top-left corner and Y down. Every function here is pure.
//!
//! ```rust
//! use lasercast::transform::{ilda_to_wire, wire_to_ilda, expand_8_to_16, narrow_16_to_8};
//!
//! assert_eq!(ilda_to_wire(0, 0), (32768, 32768));
//! assert_eq!(wire_to_ilda(32768, 32768), (0, 0));
//! assert_eq!(narrow_16_to_8(expand_8_to_16(200)), 200);
//! ```

use crate::types::{ColorDepth, Point, WirePoint};

/// ILDA `(x, y)` to wire `(x, y)`.
///
/// `x + 32768` and `-y + 32768`, both taken modulo 65536. Negating
/// `y = -32768` overflows `i16`, so that row lands on wire `y = 0` (the top
/// edge) instead of the bottom.
pub fn ilda_to_wire(x: i16, y: i16) -> (u16, u16) {
    let wx = (x as i32 + 0x8000) as u16;
    let wy = (-(y as i32) + 0x8000) as u16;
    (wx, wy)
}

/// Wire `(x, y)` back to ILDA `(x, y)`.
///
/// Exact inverse of [`ilda_to_wire`] for every input, including the wrapped
/// `y = -32768` row.
pub fn wire_to_ilda(x: u16, y: u16) -> (i16, i16) {
    let ix = (x as i32 - 0x8000) as i16;
    let iy = (0x8000 - y as i32) as i16;
    (ix, iy)
}

/// Scale a wire coordinate onto a `width` x `height` pixel grid.
///
/// Floors, then clamps into `[0, dim - 1]`. A zero dimension yields 0.
pub fn wire_to_screen(x: u16, y: u16, width: u32, height: u32) -> (u32, u32) {
    (scale_down(x, width), scale_down(y, height))
}

/// Map a pixel back onto the wire grid.
///
/// Pixels outside the grid clamp to the nearest edge.
pub fn screen_to_wire(px: u32, py: u32, width: u32, height: u32) -> (u16, u16) {
    (scale_up(px, width), scale_up(py, height))
}

/// Place an ILDA point on a pixel grid the way the projector would draw it.
pub fn ilda_to_screen(x: i16, y: i16, width: u32, height: u32) -> (u32, u32) {
    let (wx, wy) = ilda_to_wire(x, y);
    wire_to_screen(wx, wy, width, height)
}

/// Inverse of [`ilda_to_screen`], up to pixel quantization.
pub fn screen_to_ilda(px: u32, py: u32, width: u32, height: u32) -> (i16, i16) {
    let (wx, wy) = screen_to_wire(px, py, width, height);
    wire_to_ilda(wx, wy)
}

fn scale_down(value: u16, dim: u32) -> u32 {
    if dim == 0 {
        return 0;
    }
    let scaled = (value as u64 * dim as u64) >> 16;
    (scaled as u32).min(dim - 1)
}

fn scale_up(pixel: u32, dim: u32) -> u16 {
    if dim == 0 {
        return 0;
    }
    let pixel = pixel.min(dim - 1) as u64;
    // Round up so that scale_down(scale_up(p)) == p.
    let wire = (pixel * 65536).div_ceil(dim as u64);
    wire.min(u16::MAX as u64) as u16
}

/// Widen an 8-bit channel so that 255 maps to 65535.
pub const fn expand_8_to_16(c: u8) -> u16 {
    c as u16 * 257
}

/// Narrow a channel for display.
///
/// Values above 255 are taken to be 16-bit and shifted down; anything else is
/// already 8-bit and passes through.
pub const fn narrow_16_to_8(c: u16) -> u8 {
    if c > 255 { (c >> 8) as u8 } else { c as u8 }
}

/// Convert a decoded ILDA point into the point that goes on the wire.
///
/// The result is always wide. Blanked points carry zero color.
pub fn point_to_wire(point: &Point) -> WirePoint {
    let (x, y) = ilda_to_wire(point.x, point.y);
    if point.is_blanked() {
        return WirePoint::blanked(x, y);
    }
    WirePoint {
        x,
        y,
        r: expand_8_to_16(point.color.r),
        g: expand_8_to_16(point.color.g),
        b: expand_8_to_16(point.color.b),
        depth: ColorDepth::Wide,
        blanking: false,
    }
}

/// Scan period in microseconds for a scan rate in Hz.
///
/// `round(1_000_000 / hz)` clamped to `[1, u32::MAX]`. Rates at or below zero
/// (and NaN) never fail: zero and NaN give the slowest period, negative rates
/// the fastest.
pub fn scan_period_us(hz: f64) -> u32 {
    if hz.is_nan() || hz == 0.0 {
        return u32::MAX;
    }
    if hz < 0.0 {
        return 1;
    }
    let period = (1_000_000.0 / hz).round();
    if period >= u32::MAX as f64 {
        u32::MAX
    } else if period < 1.0 {
        1
    } else {
        period as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Rgb;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_ilda_wire_round_trip(x in any::<i16>(), y in any::<i16>()) {
            let (wx, wy) = ilda_to_wire(x, y);
            prop_assert_eq!(wire_to_ilda(wx, wy), (x, y));
        }

        #[test]
        fn prop_wire_ilda_round_trip(x in any::<u16>(), y in any::<u16>()) {
            let (ix, iy) = wire_to_ilda(x, y);
            prop_assert_eq!(ilda_to_wire(ix, iy), (x, y));
        }

        #[test]
        fn prop_color_expansion_round_trip(c in any::<u8>()) {
            prop_assert_eq!(narrow_16_to_8(expand_8_to_16(c)), c);
        }

        #[test]
        fn prop_screen_coordinates_stay_in_bounds(
            x in any::<u16>(),
            y in any::<u16>(),
            w in 1u32..8192,
            h in 1u32..8192,
        ) {
            let (px, py) = wire_to_screen(x, y, w, h);
            prop_assert!(px < w);
            prop_assert!(py < h);
        }

        #[test]
        fn prop_screen_to_wire_inverts_pixels(
            w in 1u32..4096,
            h in 1u32..4096,
            fx in 0.0f64..1.0,
            fy in 0.0f64..1.0,
        ) {
            let px = ((w as f64) * fx) as u32;
            let py = ((h as f64) * fy) as u32;
            let (wx, wy) = screen_to_wire(px, py, w, h);
            prop_assert_eq!(wire_to_screen(wx, wy, w, h), (px.min(w - 1), py.min(h - 1)));
        }

        #[test]
        fn prop_scan_period_is_never_zero(hz in any::<f64>()) {
            prop_assert!(scan_period_us(hz) >= 1);
        }
    }

    #[test]
    fn center_and_corners() {
        assert_eq!(ilda_to_wire(0, 0), (32768, 32768));
        assert_eq!(ilda_to_wire(-32768, 32767), (0, 1));
        assert_eq!(ilda_to_wire(32767, 0), (65535, 32768));
    }

    #[test]
    fn most_negative_y_wraps_to_top_edge() {
        let (_, wy) = ilda_to_wire(0, i16::MIN);
        assert_eq!(wy, 0);
        assert_eq!(wire_to_ilda(32768, 0), (0, i16::MIN));
    }

    #[test]
    fn color_expansion_endpoints() {
        assert_eq!(expand_8_to_16(255), 65535);
        assert_eq!(expand_8_to_16(0), 0);
        assert_eq!(narrow_16_to_8(65535), 255);
        assert_eq!(narrow_16_to_8(200), 200);
    }

    #[test]
    fn wire_to_screen_floors_and_clamps() {
        assert_eq!(wire_to_screen(0, 0, 800, 600), (0, 0));
        assert_eq!(wire_to_screen(65535, 65535, 800, 600), (799, 599));
        assert_eq!(wire_to_screen(32768, 32768, 800, 600), (400, 300));
        assert_eq!(wire_to_screen(1234, 1234, 0, 0), (0, 0));
    }

    #[test]
    fn ilda_preview_uses_transmit_orientation() {
        // Positive Y is up in the file, so it lands in the top half of the screen.
        let (_, top) = ilda_to_screen(0, 16000, 100, 100);
        let (_, bottom) = ilda_to_screen(0, -16000, 100, 100);
        assert!(top < 50);
        assert!(bottom > 50);

        let (ix, iy) = screen_to_ilda(50, 50, 100, 100);
        assert!(ix.abs() < 700 && iy.abs() < 700);
    }

    #[test]
    fn blanked_points_lose_their_color() {
        let lit = point_to_wire(&Point::new(0, 0, 0, 0, Rgb::new(10, 20, 30)));
        assert_eq!((lit.r, lit.g, lit.b), (10 * 257, 20 * 257, 30 * 257));
        assert!(!lit.blanking);

        let dark = point_to_wire(&Point::new(0, 0, 0, Point::BLANKING_BIT, Rgb::WHITE));
        assert!(dark.blanking);
        assert_eq!(dark.wide_color(), (0, 0, 0));
    }

    #[test]
    fn scan_period_clamps_instead_of_failing() {
        assert_eq!(scan_period_us(1000.0), 1000);
        assert_eq!(scan_period_us(30_000.0), 33);
        assert_eq!(scan_period_us(0.0), u32::MAX);
        assert_eq!(scan_period_us(-5.0), 1);
        assert_eq!(scan_period_us(f64::NAN), u32::MAX);
        assert_eq!(scan_period_us(1e12), 1);
        assert_eq!(scan_period_us(1e-9), u32::MAX);
    }
}
