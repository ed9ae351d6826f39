//! ILDA file decoding
//!
//! This module reads ILDA laser show files into [`Frame`](crate::types::Frame)s.
//! Formats 0, 1, 2, 4 and 5 are supported; anything else ends the decode.

pub mod format;
pub mod reader;

pub use format::{HEADER_SIZE, IldaFormat, MAGIC, SectionHeader};
pub use reader::{Decoded, IldaFile, decode, decode_with_palette};
