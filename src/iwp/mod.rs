//! IWP wire protocol
//!
//! Four commands, each a type byte followed by a fixed big-endian payload:
//!
//! | type | payload                    | total |
//! |------|----------------------------|-------|
//! | 0    | none (laser off)           | 1     |
//! | 1    | u32 scan period in µs      | 5     |
//! | 2    | u16 x, u16 y, u8 r, g, b   | 8     |
//! | 3    | u16 x, u16 y, u16 r, g, b  | 11    |

pub mod encoder;
pub mod parser;

pub use encoder::{
    MAX_DATAGRAM_BYTES, POINT_RECORD_SIZE, encode_commands, encode_point, encode_points,
    off_datagram, pack, period_datagram, records_per_datagram,
};
pub use parser::{IwpParser, ParserStats};
