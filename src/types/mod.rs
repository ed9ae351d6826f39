//! Core types for laser point data.
//!
//! Two coordinate spaces meet in this module:
//!
//! - **File space** ([`Point`], [`Frame`]): signed 16-bit X/Y/Z, Y up, origin
//!   at the center, 8-bit color resolved through a [`Palette`] when the section
//!   was indexed.
//! - **Wire space** ([`WirePoint`], [`Command`], [`IwpPacket`]): unsigned 16-bit
//!   X/Y, Y down, origin top-left, color either 8-bit or 16-bit per channel as
//!   tagged by [`ColorDepth`].
//!
//! The conversion between them lives in [`crate::transform`].
//!
//! ## Usage Example
//!
//! ```rust
//! use lasercast::types::{Point, Rgb, WirePoint};
//! use lasercast::transform::point_to_wire;
//!
//! let point = Point::new(0, 0, 0, 0, Rgb::new(255, 0, 0));
//! let wire: WirePoint = point_to_wire(&point);
//!
//! assert_eq!((wire.x, wire.y), (32768, 32768));
//! assert_eq!(wire.wide_color(), (65535, 0, 0));
//! ```

mod frame;
mod palette;
mod point;
mod update_rate;
mod wire;

pub use frame::Frame;
pub use palette::{Palette, Rgb};
pub use point::Point;
pub use update_rate::UpdateRate;
pub use wire::{ColorDepth, Command, IwpPacket, WirePoint};
