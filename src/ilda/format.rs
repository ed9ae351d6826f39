//! ILDA section layout and record parsing
//!
//! An ILDA file is a run of sections, each a 32-byte header followed by
//! `record_count` fixed-size records:
//!
//! | bytes  | field                                   |
//! |--------|-----------------------------------------|
//! | 0..4   | magic `ILDA`                            |
//! | 4..7   | reserved                                |
//! | 7      | format code                             |
//! | 8..16  | frame or palette name, NUL padded       |
//! | 16..24 | company name, NUL padded                |
//! | 24..26 | record count                            |
//! | 26..28 | frame index                             |
//! | 28..30 | total frames                            |
//! | 30     | projector id                            |
//! | 31     | reserved                                |
//!
//! All multi-byte fields are big-endian.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::types::{Palette, Point, Rgb};

/// Size of every section header.
pub const HEADER_SIZE: usize = 32;

/// Section signature.
pub const MAGIC: &[u8; 4] = b"ILDA";

const NAME_LEN: usize = 8;

/// Record layouts this crate understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum IldaFormat {
    /// 3D coordinates, palette color
    Indexed3d = 0,
    /// 2D coordinates, palette color
    Indexed2d = 1,
    /// Palette entries, no points
    Palette = 2,
    /// 3D coordinates, explicit color
    TrueColor3d = 4,
    /// 2D coordinates, explicit color
    TrueColor2d = 5,
}

impl IldaFormat {
    /// Look up a format code. Codes 3 and 6+ are not supported.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Indexed3d),
            1 => Some(Self::Indexed2d),
            2 => Some(Self::Palette),
            4 => Some(Self::TrueColor3d),
            5 => Some(Self::TrueColor2d),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }

    /// Size of one record in bytes.
    pub fn record_size(self) -> usize {
        match self {
            Self::Indexed3d => 8,
            Self::Indexed2d => 6,
            Self::Palette => 3,
            Self::TrueColor3d => 10,
            Self::TrueColor2d => 8,
        }
    }

    pub fn is_palette(self) -> bool {
        self == Self::Palette
    }

    /// Decode one point record.
    ///
    /// `record` must be exactly [`record_size`](Self::record_size) bytes.
    /// Indexed formats resolve their color through `palette` as it stands now.
    /// Returns `None` for palette sections or a short record.
    pub fn parse_point(self, record: &[u8], palette: &Palette) -> Option<Point> {
        if record.len() < self.record_size() {
            return None;
        }
        let x = read_i16_be(record, 0);
        let y = read_i16_be(record, 2);
        let point = match self {
            Self::Indexed3d => Point::new(x, y, read_i16_be(record, 4), record[6], palette.get(record[7])),
            Self::Indexed2d => Point::new(x, y, 0, record[4], palette.get(record[5])),
            Self::TrueColor3d => Point::new(
                x,
                y,
                read_i16_be(record, 4),
                record[6],
                Rgb::new(record[9], record[8], record[7]),
            ),
            Self::TrueColor2d => {
                Point::new(x, y, 0, record[4], Rgb::new(record[7], record[6], record[5]))
            }
            Self::Palette => return None,
        };
        trace!(x = point.x, y = point.y, status = point.status, "Parsed ILDA point");
        Some(point)
    }
}

/// Parse a palette record into a color.
pub fn parse_palette_entry(record: &[u8]) -> Option<Rgb> {
    match record {
        [r, g, b, ..] => Some(Rgb::new(*r, *g, *b)),
        _ => None,
    }
}

/// A decoded section header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionHeader {
    /// Raw format code, kept even when it is not a known [`IldaFormat`]
    pub format_code: u8,
    pub name: String,
    pub company: String,
    pub record_count: u16,
    pub frame_index: u16,
    pub total_frames: u16,
    pub projector: u8,
}

impl SectionHeader {
    /// A header for a single-section file with empty company name.
    pub fn new(format: IldaFormat, name: impl Into<String>, record_count: u16) -> Self {
        Self {
            format_code: format.code(),
            name: name.into(),
            company: String::new(),
            record_count,
            frame_index: 0,
            total_frames: 1,
            projector: 0,
        }
    }

    /// Parse a header from the start of `data`.
    ///
    /// Returns `None` when fewer than [`HEADER_SIZE`] bytes remain or the magic
    /// does not match; either one ends a decode.
    pub fn parse(data: &[u8]) -> Option<Self> {
        let header = data.get(..HEADER_SIZE)?;
        if &header[0..4] != MAGIC {
            trace!("Section magic mismatch: {:?}", &header[0..4]);
            return None;
        }

        Some(Self {
            format_code: header[7],
            name: parse_name(&header[8..16]),
            company: parse_name(&header[16..24]),
            record_count: read_u16_be(header, 24),
            frame_index: read_u16_be(header, 26),
            total_frames: read_u16_be(header, 28),
            projector: header[30],
        })
    }

    pub fn format(&self) -> Option<IldaFormat> {
        IldaFormat::from_code(self.format_code)
    }

    /// Number of body bytes the header declares.
    pub fn declared_body_len(&self) -> Option<usize> {
        self.format().map(|f| f.record_size() * self.record_count as usize)
    }

    /// Serialize back to the 32-byte on-disk form.
    ///
    /// Names longer than 8 bytes are cut at 8 bytes.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[0..4].copy_from_slice(MAGIC);
        out[7] = self.format_code;
        write_name(&mut out[8..16], &self.name);
        write_name(&mut out[16..24], &self.company);
        out[24..26].copy_from_slice(&self.record_count.to_be_bytes());
        out[26..28].copy_from_slice(&self.frame_index.to_be_bytes());
        out[28..30].copy_from_slice(&self.total_frames.to_be_bytes());
        out[30] = self.projector;
        out
    }
}

fn parse_name(bytes: &[u8]) -> String {
    let end = bytes.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

fn write_name(out: &mut [u8], name: &str) {
    let bytes = name.as_bytes();
    let len = bytes.len().min(NAME_LEN).min(out.len());
    out[..len].copy_from_slice(&bytes[..len]);
}

fn read_i16_be(data: &[u8], offset: usize) -> i16 {
    i16::from_be_bytes([data[offset], data[offset + 1]])
}

fn read_u16_be(data: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([data[offset], data[offset + 1]])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_layout() {
        let mut raw = [0u8; HEADER_SIZE];
        raw[0..4].copy_from_slice(b"ILDA");
        raw[7] = 5;
        raw[8..14].copy_from_slice(b"circle");
        raw[16..21].copy_from_slice(b"acme ");
        raw[24..26].copy_from_slice(&300u16.to_be_bytes());
        raw[26..28].copy_from_slice(&2u16.to_be_bytes());
        raw[28..30].copy_from_slice(&9u16.to_be_bytes());
        raw[30] = 3;

        let header = SectionHeader::parse(&raw).expect("valid header");
        assert_eq!(header.format(), Some(IldaFormat::TrueColor2d));
        assert_eq!(header.name, "circle");
        assert_eq!(header.company, "acme ", "only NUL padding is stripped");
        assert_eq!(header.record_count, 300);
        assert_eq!(header.frame_index, 2);
        assert_eq!(header.total_frames, 9);
        assert_eq!(header.projector, 3);
        assert_eq!(header.declared_body_len(), Some(2400));
        assert_eq!(header.to_bytes()[..24], raw[..24]);
    }

    #[test]
    fn short_or_foreign_headers_are_rejected() {
        assert!(SectionHeader::parse(&[0u8; 31]).is_none());

        let mut raw = [0u8; HEADER_SIZE];
        raw[0..4].copy_from_slice(b"ILDB");
        assert!(SectionHeader::parse(&raw).is_none());
    }

    #[test]
    fn unknown_formats() {
        assert_eq!(IldaFormat::from_code(3), None);
        assert_eq!(IldaFormat::from_code(6), None);
        for code in [0, 1, 2, 4, 5] {
            let format = IldaFormat::from_code(code).expect("supported");
            assert_eq!(format.code(), code);
        }
    }

    #[test]
    fn truecolor_records_are_bgr() {
        let palette = Palette::default();
        let record = [0x00, 0x10, 0xFF, 0xF0, 0x40, 0x01, 0x02, 0x03];
        let point = IldaFormat::TrueColor2d.parse_point(&record, &palette).expect("point");
        assert_eq!((point.x, point.y, point.z), (16, -16, 0));
        assert!(point.is_blanked());
        assert_eq!(point.color, Rgb::new(3, 2, 1));

        let record3d = [0, 1, 0, 2, 0, 3, 0x00, 10, 20, 30];
        let point = IldaFormat::TrueColor3d.parse_point(&record3d, &palette).expect("point");
        assert_eq!((point.x, point.y, point.z), (1, 2, 3));
        assert_eq!(point.color, Rgb::new(30, 20, 10));
    }

    #[test]
    fn indexed_records_resolve_through_palette() {
        let mut palette = Palette::default();
        palette.set(4, Rgb::new(9, 8, 7));

        let record = [0, 5, 0, 6, 0x00, 4];
        let point = IldaFormat::Indexed2d.parse_point(&record, &palette).expect("point");
        assert_eq!(point.color, Rgb::new(9, 8, 7));
        assert_eq!(point.z, 0);

        assert!(IldaFormat::Indexed3d.parse_point(&record, &palette).is_none());
        assert!(IldaFormat::Palette.parse_point(&[1, 2, 3], &palette).is_none());
    }
}
